//! Core types shared between units, workers and the manager

use serde::{Deserialize, Serialize};

use crate::queue::ThreadQueue;

// ────────────────────────────────────────────────────────────────────────────────
// Sample Blocks
// ────────────────────────────────────────────────────────────────────────────────

/// A block of raw complex baseband samples (processing worker input)
#[derive(Debug, Clone, PartialEq)]
pub struct IqBlock {
    /// Center frequency the block was captured at, in Hz
    pub frequency: i64,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved I/Q pairs: [i0, q0, i1, q1, ...]
    pub samples: Vec<f32>,
}

impl IqBlock {
    /// Number of complex samples in the block
    pub fn len(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over (I, Q) pairs, ignoring a trailing odd value
    pub fn pairs(&self) -> impl Iterator<Item = (f32, f32)> + '_ {
        self.samples.chunks_exact(2).map(|iq| (iq[0], iq[1]))
    }
}

/// A block of decoded audio (output worker input, visualization frame)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u16,
    /// Interleaved samples
    pub samples: Vec<f32>,
}

/// Queue of decoded audio frames feeding the shared visualization sink
pub type VisualQueue = ThreadQueue<AudioBlock>;

// ────────────────────────────────────────────────────────────────────────────────
// Modes & Commands
// ────────────────────────────────────────────────────────────────────────────────

/// Demodulation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DemodMode {
    #[default]
    Fm,
    Am,
    Lsb,
    Usb,
}

impl DemodMode {
    /// All modes in wire order
    pub const ALL: [DemodMode; 4] = [DemodMode::Fm, DemodMode::Am, DemodMode::Lsb, DemodMode::Usb];

    /// Compact representation for atomic storage
    pub fn as_u8(self) -> u8 {
        match self {
            DemodMode::Fm => 0,
            DemodMode::Am => 1,
            DemodMode::Lsb => 2,
            DemodMode::Usb => 3,
        }
    }

    /// Inverse of [`as_u8`](Self::as_u8), unknown values map to FM
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => DemodMode::Am,
            2 => DemodMode::Lsb,
            3 => DemodMode::Usb,
            _ => DemodMode::Fm,
        }
    }
}

/// Commands sent to a unit's processing worker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DemodCommand {
    /// Retune the demodulator center frequency (Hz)
    SetFrequency(i64),
    /// Change the demodulator bandwidth (Hz)
    SetBandwidth(i64),
    /// Switch demodulation mode
    SetMode(DemodMode),
    /// Cooperative stop request
    Terminate,
}

/// Commands sent to a unit's output worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCommand {
    /// Discard incoming audio instead of rendering it
    SetMuted(bool),
    /// Cooperative stop request
    Terminate,
}

/// Lifecycle notifications pushed by workers to their owning unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleNotice {
    /// The output worker left its loop
    AudioTerminated,
    /// The processing worker left its loop
    DemodTerminated,
}

/// Observable lifecycle state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Created, workers not spawned yet
    Idle,
    /// Workers spawned and running
    Running,
    /// Stop requested, at least one worker not yet reclaimed
    Stopping,
    /// Both workers reported exit and were joined
    Terminated,
}
