//! demod-soak - exercise the demodulator manager under churn
//!
//! Starts a set of units on synthetic IQ, cycles the active selection,
//! deletes and recreates units every round, then shuts everything down and
//! reports how many units were never reclaimed.
//!
//! ## Command line flags
//!
//! - `--units N`: live units per round (default 4)
//! - `--rounds N`: churn rounds (default 20)
//! - `--config PATH`: manager config YAML (default: user config dir)

use std::f32::consts::PI;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use demod_core::config::{default_config_path, load_config};
use demod_core::{
    BasicWorkerFactory, DemodMode, DemodulatorManager, IqBlock, ManagerConfig, UnitHandle,
    VisualQueue,
};

const SAMPLE_RATE: u32 = 240_000;
const BLOCK_LEN: usize = 2_048;
const BLOCKS_PER_ROUND: usize = 8;
const BASE_FREQUENCY: i64 = 88_100_000;
const CHANNEL_SPACING: i64 = 200_000;

/// Value following `flag` on the command line, parsed
fn flag_value<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|value| value.parse().ok())
}

/// Complex tone at `offset` Hz from the block center
fn synthetic_block(frequency: i64, offset: f32, start: usize) -> IqBlock {
    let step = 2.0 * PI * offset / SAMPLE_RATE as f32;
    let samples = (start..start + BLOCK_LEN)
        .flat_map(|n| {
            let phase = step * n as f32;
            [phase.cos(), phase.sin()]
        })
        .collect();
    IqBlock {
        frequency,
        sample_rate: SAMPLE_RATE,
        samples,
    }
}

fn spawn_unit(manager: &DemodulatorManager, channel: usize) -> anyhow::Result<UnitHandle> {
    let unit = manager.new_unit();
    let frequency = BASE_FREQUENCY + channel as i64 * CHANNEL_SPACING;
    unit.params().set_frequency(frequency);
    unit.params().set_mode(DemodMode::ALL[channel % DemodMode::ALL.len()]);
    unit.start()?;
    Ok(unit)
}

fn run(units: usize, rounds: usize, config: ManagerConfig) -> anyhow::Result<usize> {
    let factory = Arc::new(BasicWorkerFactory::new());
    let shutdown_timeout = config.shutdown_timeout();
    let manager = DemodulatorManager::new(factory.clone(), config);
    let visual_sink = VisualQueue::bounded(64);

    for channel in 0..units {
        spawn_unit(&manager, channel)?;
    }

    let started = Instant::now();
    let mut next_channel = units;
    for round in 0..rounds {
        let live = manager.units();
        for (i, unit) in live.iter().enumerate() {
            for block in 0..BLOCKS_PER_ROUND {
                let offset = 1_000.0 * (i + 1) as f32;
                let iq = synthetic_block(unit.params().frequency(), offset, block * BLOCK_LEN);
                if let Err(e) = unit.push_samples(iq) {
                    log::warn!(
                        "Round {}: unit '{}' refused samples: {}",
                        round,
                        unit.label(),
                        e
                    );
                }
            }
        }

        if let Some(unit) = live.get(round % live.len().max(1)) {
            manager.set_active(Some(unit), round % 3 == 0, &visual_sink);
        }
        while visual_sink.try_pop().is_some() {}

        // Retire the oldest unit and tune a fresh one
        if let Some(oldest) = live.first() {
            manager.delete_unit(oldest);
            spawn_unit(&manager, next_channel)?;
            next_channel += 1;
        }

        let collected = manager.collect_garbage();
        log::info!(
            "Round {}: {} live, {} pending, {} collected",
            round,
            manager.live_count(),
            manager.pending_count(),
            collected
        );
    }

    let remaining = manager.shutdown(shutdown_timeout);
    println!(
        "{} rounds in {:?}: {} audio blocks rendered, {} unit(s) unreclaimed",
        rounds,
        started.elapsed(),
        factory.rendered(),
        remaining
    );
    Ok(remaining)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let units = flag_value(&args, "--units").unwrap_or(4);
    let rounds = flag_value(&args, "--rounds").unwrap_or(20);
    let config_path = flag_value::<PathBuf>(&args, "--config")
        .unwrap_or_else(|| default_config_path("manager.yaml"));

    let config: ManagerConfig = load_config(&config_path);
    log::info!("demod-soak: {} units, {} rounds, config {:?}", units, rounds, config);

    match run(units, rounds, config) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(remaining) => {
            log::error!("{} unit(s) never confirmed exit", remaining);
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("demod-soak failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_value_parsing() {
        let args: Vec<String> = ["demod-soak", "--units", "7", "--rounds", "x"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(flag_value::<usize>(&args, "--units"), Some(7));
        assert_eq!(flag_value::<usize>(&args, "--rounds"), None);
        assert_eq!(flag_value::<usize>(&args, "--config"), None);
    }

    #[test]
    fn test_short_soak_reclaims_everything() {
        let config = ManagerConfig {
            worker_poll_interval_ms: 10,
            shutdown_timeout_ms: 5_000,
            ..ManagerConfig::default()
        };
        assert_eq!(run(2, 3, config).unwrap(), 0);
    }
}
