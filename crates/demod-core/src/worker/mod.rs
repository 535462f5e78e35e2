//! Worker threads of a demodulator unit
//!
//! Each unit runs two workers:
//!
//! - [`DemodWorker`] pops raw IQ blocks and commands, runs a
//!   [`DemodProcessor`], and pushes decoded audio to the output worker (and
//!   to the visualization sink when the unit is wired to it).
//! - [`AudioWorker`] pops decoded audio and hands it to an [`AudioSink`].
//!
//! The signal processing and the audio device are pluggable; the loops here
//! only own the queue plumbing and the termination handshake.
//!
//! # Termination Handshake
//!
//! Every worker carries a [`TerminationNotice`]. When the worker is dropped
//! (its loop returned, it panicked, or its thread was never spawned) the
//! notice pushes exactly one [`LifecycleNotice`] to the unit's notification
//! queue. The owner polls that queue and joins the thread only after the
//! notice arrived, so the join never waits on a live loop.

mod audio;
mod basic;
mod demod;

pub use audio::AudioWorker;
pub use basic::{BasicDemodulator, BasicWorkerFactory, NullAudioSink};
pub use demod::DemodWorker;

use crate::params::DemodParamsSnapshot;
use crate::queue::ThreadQueue;
use crate::types::{AudioBlock, IqBlock, LifecycleNotice};

/// Signal processing run by a unit's processing worker
pub trait DemodProcessor: Send {
    /// Demodulate one block of IQ samples
    ///
    /// Returns `None` when the block produced no audio (squelched, too short).
    fn process(&mut self, block: &IqBlock, params: &DemodParamsSnapshot) -> Option<AudioBlock>;
}

/// Audio output run by a unit's output worker
pub trait AudioSink: Send {
    /// Render one block of decoded audio
    fn render(&mut self, block: &AudioBlock);
}

/// Builds the collaborators for each new unit
pub trait WorkerFactory: Send + Sync {
    fn processor(&self) -> Box<dyn DemodProcessor>;
    fn audio_sink(&self) -> Box<dyn AudioSink>;
}

/// Pushes a lifecycle notice when dropped
pub(crate) struct TerminationNotice {
    notify: ThreadQueue<LifecycleNotice>,
    notice: LifecycleNotice,
}

impl TerminationNotice {
    pub(crate) fn new(notify: ThreadQueue<LifecycleNotice>, notice: LifecycleNotice) -> Self {
        Self { notify, notice }
    }
}

impl Drop for TerminationNotice {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::warn!("Worker unwinding after panic, posting {:?}", self.notice);
        }
        self.notify.push(self.notice);
    }
}
