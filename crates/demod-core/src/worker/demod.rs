//! Processing worker: IQ in, decoded audio out

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{DemodProcessor, TerminationNotice};
use crate::params::DemodParams;
use crate::queue::ThreadQueue;
use crate::types::{AudioBlock, DemodCommand, IqBlock, LifecycleNotice, VisualQueue};

/// Slot holding the visualization queue a unit currently feeds, if any
pub(crate) type VisualSlot = Arc<Mutex<Option<VisualQueue>>>;

/// Processing worker of one unit
///
/// Built by the unit at creation time and moved onto its own thread by
/// `start()`. Dropping it, on any path, posts
/// [`LifecycleNotice::DemodTerminated`].
pub struct DemodWorker {
    name: String,
    input: ThreadQueue<IqBlock>,
    commands: ThreadQueue<DemodCommand>,
    audio_out: ThreadQueue<AudioBlock>,
    visual_out: VisualSlot,
    params: Arc<DemodParams>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
    processor: Box<dyn DemodProcessor>,
    blocks_processed: u64,
    _notice: TerminationNotice,
}

impl DemodWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        input: ThreadQueue<IqBlock>,
        commands: ThreadQueue<DemodCommand>,
        notify: ThreadQueue<LifecycleNotice>,
        audio_out: ThreadQueue<AudioBlock>,
        visual_out: VisualSlot,
        params: Arc<DemodParams>,
        stop: Arc<AtomicBool>,
        poll_interval: Duration,
        processor: Box<dyn DemodProcessor>,
    ) -> Self {
        Self {
            name,
            input,
            commands,
            audio_out,
            visual_out,
            params,
            stop,
            poll_interval,
            processor,
            blocks_processed: 0,
            _notice: TerminationNotice::new(notify, LifecycleNotice::DemodTerminated),
        }
    }

    /// Main loop, returns once a stop request is observed
    pub fn run(mut self) {
        log::info!("[{}] Processing worker started", self.name);
        let commands = self.commands.receiver().clone();
        let input = self.input.receiver().clone();

        while !self.stop.load(Ordering::Acquire) {
            crossbeam::select! {
                recv(commands) -> cmd => match cmd {
                    Ok(DemodCommand::Terminate) | Err(_) => break,
                    Ok(cmd) => self.apply(cmd),
                },
                recv(input) -> block => {
                    if let Ok(block) = block {
                        self.handle_block(&block);
                    }
                }
                default(self.poll_interval) => {}
            }
        }

        log::info!(
            "[{}] Processing worker stopped after {} blocks",
            self.name,
            self.blocks_processed
        );
    }

    fn apply(&mut self, cmd: DemodCommand) {
        log::debug!("[{}] Command: {:?}", self.name, cmd);
        match cmd {
            DemodCommand::SetFrequency(frequency) => self.params.set_frequency(frequency),
            DemodCommand::SetBandwidth(bandwidth) => self.params.set_bandwidth(bandwidth),
            DemodCommand::SetMode(mode) => self.params.set_mode(mode),
            DemodCommand::Terminate => {}
        }
    }

    fn handle_block(&mut self, block: &IqBlock) {
        let params = self.params.snapshot();
        let Some(audio) = self.processor.process(block, &params) else {
            return;
        };
        self.blocks_processed += 1;

        // Visualization is best effort: a full sink drops the frame
        {
            let visual = self.visual_out.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(queue) = visual.as_ref() {
                if queue.try_push(audio.clone()).is_err() {
                    log::trace!("[{}] Visual queue full, frame dropped", self.name);
                }
            }
        }

        self.audio_out.push(audio);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DemodParamsSnapshot;
    use crate::types::DemodMode;
    use std::thread;

    /// Emits one mono sample per block carrying the frequency it saw
    struct FrequencyEcho;

    impl DemodProcessor for FrequencyEcho {
        fn process(&mut self, block: &IqBlock, params: &DemodParamsSnapshot) -> Option<AudioBlock> {
            Some(AudioBlock {
                sample_rate: block.sample_rate,
                channels: 1,
                samples: vec![params.frequency as f32],
            })
        }
    }

    struct Harness {
        input: ThreadQueue<IqBlock>,
        commands: ThreadQueue<DemodCommand>,
        notify: ThreadQueue<LifecycleNotice>,
        audio: ThreadQueue<AudioBlock>,
        visual: VisualSlot,
        params: Arc<DemodParams>,
        stop: Arc<AtomicBool>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                input: ThreadQueue::unbounded(),
                commands: ThreadQueue::unbounded(),
                notify: ThreadQueue::unbounded(),
                audio: ThreadQueue::unbounded(),
                visual: Arc::new(Mutex::new(None)),
                params: Arc::new(DemodParams::new()),
                stop: Arc::new(AtomicBool::new(false)),
            }
        }

        fn worker(&self) -> DemodWorker {
            DemodWorker::new(
                "demod-test".to_string(),
                self.input.clone(),
                self.commands.clone(),
                self.notify.clone(),
                self.audio.clone(),
                self.visual.clone(),
                self.params.clone(),
                self.stop.clone(),
                Duration::from_millis(5),
                Box::new(FrequencyEcho),
            )
        }
    }

    fn block() -> IqBlock {
        IqBlock {
            frequency: 0,
            sample_rate: 48_000,
            samples: vec![0.0; 8],
        }
    }

    #[test]
    fn test_processes_blocks_and_feeds_visual_queue() {
        let harness = Harness::new();
        let visual = VisualQueue::unbounded();
        *harness.visual.lock().unwrap() = Some(visual.clone());
        harness.params.set_frequency(7_000);

        let worker = harness.worker();
        let handle = thread::spawn(move || worker.run());

        harness.input.push(block());
        let audio = harness.audio.pop(Some(Duration::from_secs(5))).unwrap();
        assert_eq!(audio.samples, vec![7_000.0]);
        assert_eq!(visual.pop(Some(Duration::from_secs(5))), Some(audio));

        harness.commands.push(DemodCommand::Terminate);
        handle.join().unwrap();
        assert_eq!(harness.notify.try_pop(), Some(LifecycleNotice::DemodTerminated));
    }

    #[test]
    fn test_commands_update_params() {
        let harness = Harness::new();
        let worker = harness.worker();
        let handle = thread::spawn(move || worker.run());

        harness.commands.push(DemodCommand::SetFrequency(93_300_000));
        harness.commands.push(DemodCommand::SetMode(DemodMode::Am));
        harness.commands.push(DemodCommand::SetBandwidth(10_000));
        harness.commands.push(DemodCommand::Terminate);
        handle.join().unwrap();

        assert_eq!(harness.params.frequency(), 93_300_000);
        assert_eq!(harness.params.mode(), DemodMode::Am);
        assert_eq!(harness.params.bandwidth(), 10_000);
    }

    #[test]
    fn test_stop_flag_ends_idle_loop() {
        let harness = Harness::new();
        let worker = harness.worker();
        let handle = thread::spawn(move || worker.run());

        harness.stop.store(true, Ordering::Release);
        handle.join().unwrap();
        assert_eq!(harness.notify.try_pop(), Some(LifecycleNotice::DemodTerminated));
        assert_eq!(harness.notify.try_pop(), None);
    }
}
