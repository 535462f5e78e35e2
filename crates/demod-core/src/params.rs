//! Lock-free demodulator parameters
//!
//! The control thread writes parameters while the processing worker reads
//! them once per block. Each field is an independent atomic, so updates are
//! eventually consistent per field: a worker may see a new frequency with
//! the old bandwidth for one block. Use [`DemodCommand`](crate::DemodCommand)
//! when several fields must change together from the worker's point of view.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU8, Ordering};

use crate::types::DemodMode;

/// Default demodulator bandwidth in Hz (wideband FM)
pub const DEFAULT_BANDWIDTH: i64 = 200_000;

/// Parameters shared between a unit and its processing worker
#[derive(Debug)]
pub struct DemodParams {
    /// Center frequency in Hz
    frequency: AtomicI64,
    /// Bandwidth in Hz
    bandwidth: AtomicI64,
    /// Mode (see [`DemodMode::as_u8`])
    mode: AtomicU8,
    /// Whether the squelch gate is active
    squelch_enabled: AtomicBool,
    /// Squelch threshold as f32 bits (linear RMS amplitude)
    squelch_level: AtomicU32,
}

/// Consistent-per-read copy of [`DemodParams`] handed to processors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemodParamsSnapshot {
    pub frequency: i64,
    pub bandwidth: i64,
    pub mode: DemodMode,
    pub squelch_enabled: bool,
    pub squelch_level: f32,
}

impl Default for DemodParams {
    fn default() -> Self {
        Self {
            frequency: AtomicI64::new(0),
            bandwidth: AtomicI64::new(DEFAULT_BANDWIDTH),
            mode: AtomicU8::new(DemodMode::default().as_u8()),
            squelch_enabled: AtomicBool::new(false),
            squelch_level: AtomicU32::new(0.0f32.to_bits()),
        }
    }
}

impl DemodParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn frequency(&self) -> i64 {
        self.frequency.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_frequency(&self, frequency: i64) {
        self.frequency.store(frequency, Ordering::Relaxed);
    }

    #[inline]
    pub fn bandwidth(&self) -> i64 {
        self.bandwidth.load(Ordering::Relaxed)
    }

    /// Set bandwidth in Hz (negative values clamp to zero)
    #[inline]
    pub fn set_bandwidth(&self, bandwidth: i64) {
        self.bandwidth.store(bandwidth.max(0), Ordering::Relaxed);
    }

    #[inline]
    pub fn mode(&self) -> DemodMode {
        DemodMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_mode(&self, mode: DemodMode) {
        self.mode.store(mode.as_u8(), Ordering::Relaxed);
    }

    #[inline]
    pub fn squelch_enabled(&self) -> bool {
        self.squelch_enabled.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_squelch_enabled(&self, enabled: bool) {
        self.squelch_enabled.store(enabled, Ordering::Relaxed);
    }

    #[inline]
    pub fn squelch_level(&self) -> f32 {
        f32::from_bits(self.squelch_level.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_squelch_level(&self, level: f32) {
        self.squelch_level.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Inclusive occupied interval `[f - bw/2, f + bw/2]`, floor halving
    pub fn occupied_range(&self) -> (i64, i64) {
        let half = self.bandwidth().div_euclid(2);
        let frequency = self.frequency();
        (frequency.saturating_sub(half), frequency.saturating_add(half))
    }

    /// Read every field once
    pub fn snapshot(&self) -> DemodParamsSnapshot {
        DemodParamsSnapshot {
            frequency: self.frequency(),
            bandwidth: self.bandwidth(),
            mode: self.mode(),
            squelch_enabled: self.squelch_enabled(),
            squelch_level: self.squelch_level(),
        }
    }
}
