//! Reference collaborators for running units without real DSP or devices
//!
//! [`BasicDemodulator`] is a minimal AM/FM/SSB detector good enough to drive
//! the pipeline under load; [`NullAudioSink`] discards audio but counts it.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{AudioSink, DemodProcessor, WorkerFactory};
use crate::params::DemodParamsSnapshot;
use crate::types::{AudioBlock, DemodMode, IqBlock};

/// Minimal demodulator (no filtering, no resampling)
#[derive(Debug, Default)]
pub struct BasicDemodulator {
    /// Phase of the last IQ sample, carried across blocks for FM
    last_phase: f32,
}

impl BasicDemodulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn envelope(block: &IqBlock) -> Vec<f32> {
        let magnitudes: Vec<f32> = block.pairs().map(|(i, q)| (i * i + q * q).sqrt()).collect();
        let mean = magnitudes.iter().sum::<f32>() / magnitudes.len().max(1) as f32;
        magnitudes.into_iter().map(|m| m - mean).collect()
    }

    fn discriminate(&mut self, block: &IqBlock) -> Vec<f32> {
        block
            .pairs()
            .map(|(i, q)| {
                let phase = q.atan2(i);
                let mut delta = phase - self.last_phase;
                if delta > PI {
                    delta -= 2.0 * PI;
                } else if delta < -PI {
                    delta += 2.0 * PI;
                }
                self.last_phase = phase;
                delta / PI
            })
            .collect()
    }
}

/// Root mean square of the IQ magnitude
fn rms(block: &IqBlock) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let power: f32 = block.pairs().map(|(i, q)| i * i + q * q).sum();
    (power / block.len() as f32).sqrt()
}

impl DemodProcessor for BasicDemodulator {
    fn process(&mut self, block: &IqBlock, params: &DemodParamsSnapshot) -> Option<AudioBlock> {
        if block.is_empty() {
            return None;
        }
        if params.squelch_enabled && rms(block) < params.squelch_level {
            return None;
        }

        let samples = match params.mode {
            DemodMode::Fm => self.discriminate(block),
            DemodMode::Am => Self::envelope(block),
            DemodMode::Lsb | DemodMode::Usb => block.pairs().map(|(i, _)| i).collect(),
        };

        Some(AudioBlock {
            sample_rate: block.sample_rate,
            channels: 1,
            samples,
        })
    }
}

/// Audio sink that drops everything, counting rendered blocks
#[derive(Debug, Clone, Default)]
pub struct NullAudioSink {
    rendered: Arc<AtomicU64>,
}

impl NullAudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks rendered by this sink and every clone of it
    pub fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }
}

impl AudioSink for NullAudioSink {
    fn render(&mut self, _block: &AudioBlock) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }
}

/// Factory handing every unit a [`BasicDemodulator`] and a shared-counter
/// [`NullAudioSink`]
#[derive(Debug, Clone, Default)]
pub struct BasicWorkerFactory {
    sink: NullAudioSink,
}

impl BasicWorkerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audio blocks rendered across all units built by this factory
    pub fn rendered(&self) -> u64 {
        self.sink.rendered()
    }
}

impl WorkerFactory for BasicWorkerFactory {
    fn processor(&self) -> Box<dyn DemodProcessor> {
        Box::new(BasicDemodulator::new())
    }

    fn audio_sink(&self) -> Box<dyn AudioSink> {
        Box::new(self.sink.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DemodParams;

    fn tone(cycles_per_sample: f32, amplitude: f32, len: usize) -> IqBlock {
        let samples = (0..len)
            .flat_map(|n| {
                let phase = 2.0 * PI * cycles_per_sample * n as f32;
                [amplitude * phase.cos(), amplitude * phase.sin()]
            })
            .collect();
        IqBlock {
            frequency: 0,
            sample_rate: 48_000,
            samples,
        }
    }

    fn params(mode: DemodMode) -> DemodParamsSnapshot {
        let params = DemodParams::new();
        params.set_mode(mode);
        params.snapshot()
    }

    #[test]
    fn test_fm_constant_tone_gives_constant_output() {
        let mut demod = BasicDemodulator::new();
        let audio = demod.process(&tone(0.125, 1.0, 64), &params(DemodMode::Fm)).unwrap();
        assert_eq!(audio.samples.len(), 64);
        // Skip the first sample, which is relative to the initial phase
        for sample in &audio.samples[1..] {
            assert!((sample - 0.25).abs() < 1e-4, "got {}", sample);
        }
    }

    #[test]
    fn test_am_removes_dc() {
        let mut demod = BasicDemodulator::new();
        let audio = demod.process(&tone(0.01, 0.5, 32), &params(DemodMode::Am)).unwrap();
        assert!(audio.samples.iter().all(|s| s.abs() < 1e-5));
    }

    #[test]
    fn test_ssb_passes_in_phase_component() {
        let mut demod = BasicDemodulator::new();
        let block = IqBlock {
            frequency: 0,
            sample_rate: 8_000,
            samples: vec![0.1, 0.9, 0.2, 0.8],
        };
        let audio = demod.process(&block, &params(DemodMode::Usb)).unwrap();
        assert_eq!(audio.samples, vec![0.1, 0.2]);
        assert_eq!(audio.sample_rate, 8_000);
    }

    #[test]
    fn test_squelch_gates_weak_signal() {
        let mut demod = BasicDemodulator::new();
        let mut snapshot = params(DemodMode::Am);
        snapshot.squelch_enabled = true;
        snapshot.squelch_level = 0.5;

        assert!(demod.process(&tone(0.1, 0.1, 16), &snapshot).is_none());
        assert!(demod.process(&tone(0.1, 1.0, 16), &snapshot).is_some());
    }

    #[test]
    fn test_empty_block_produces_nothing() {
        let mut demod = BasicDemodulator::new();
        let block = IqBlock {
            frequency: 0,
            sample_rate: 48_000,
            samples: Vec::new(),
        };
        assert!(demod.process(&block, &params(DemodMode::Fm)).is_none());
    }

    #[test]
    fn test_factory_sinks_share_counter() {
        let factory = BasicWorkerFactory::new();
        let mut a = factory.audio_sink();
        let mut b = factory.audio_sink();
        let block = AudioBlock {
            sample_rate: 48_000,
            channels: 1,
            samples: vec![0.0],
        };
        a.render(&block);
        b.render(&block);
        assert_eq!(factory.rendered(), 2);
    }
}
