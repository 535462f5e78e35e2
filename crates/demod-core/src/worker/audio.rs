//! Output worker: decoded audio in, rendered by an [`AudioSink`]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{AudioSink, TerminationNotice};
use crate::queue::ThreadQueue;
use crate::types::{AudioBlock, AudioCommand, LifecycleNotice};

/// Output worker of one unit
///
/// Dropping it, on any path, posts [`LifecycleNotice::AudioTerminated`].
pub struct AudioWorker {
    name: String,
    input: ThreadQueue<AudioBlock>,
    commands: ThreadQueue<AudioCommand>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    sink: Box<dyn AudioSink>,
    muted: bool,
    _notice: TerminationNotice,
}

impl AudioWorker {
    pub(crate) fn new(
        name: String,
        input: ThreadQueue<AudioBlock>,
        commands: ThreadQueue<AudioCommand>,
        notify: ThreadQueue<LifecycleNotice>,
        stop: Arc<AtomicBool>,
        poll_interval: Duration,
        sink: Box<dyn AudioSink>,
    ) -> Self {
        Self {
            name,
            input,
            commands,
            stop,
            poll_interval,
            sink,
            muted: false,
            _notice: TerminationNotice::new(notify, LifecycleNotice::AudioTerminated),
        }
    }

    /// Main loop, returns once a stop request is observed
    pub fn run(mut self) {
        log::info!("[{}] Audio worker started", self.name);
        let commands = self.commands.receiver().clone();
        let input = self.input.receiver().clone();

        while !self.stop.load(Ordering::Acquire) {
            crossbeam::select! {
                recv(commands) -> cmd => match cmd {
                    Ok(AudioCommand::Terminate) | Err(_) => break,
                    Ok(AudioCommand::SetMuted(muted)) => self.muted = muted,
                },
                recv(input) -> block => {
                    if let Ok(block) = block {
                        if !self.muted {
                            self.sink.render(&block);
                        }
                    }
                }
                default(self.poll_interval) => {}
            }
        }

        log::info!("[{}] Audio worker stopped", self.name);
    }
}
