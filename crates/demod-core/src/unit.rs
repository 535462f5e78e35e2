//! Demodulator unit - one receiver channel with its two worker threads
//!
//! A unit owns a processing worker and an output worker, the queues between
//! them, a display label and the parameters the processing worker reads.
//!
//! # Lifecycle
//!
//! ```text
//!  new() ──► Idle ──start()──► Running ──terminate()──► Stopping
//!             │                                            │
//!             └──terminate()──► Stopping    AudioTerminated / DemodTerminated
//!                                             (either order, via is_terminated)
//!                                                          │
//!                                                          ▼
//!                                                      Terminated
//! ```
//!
//! Termination is two-phase. `terminate()` only posts stop requests. The
//! workers leave their loops and each pushes one notice to the unit's
//! notification queue. `is_terminated()` drains those notices without
//! blocking, joins each thread exactly once (the handle is taken out of
//! its slot in the same step that sets the matching flag), and reports
//! `true` once both workers are reclaimed. A unit must not be discarded
//! before that.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crate::config::ManagerConfig;
use crate::error::{DemodError, DemodResult};
use crate::params::DemodParams;
use crate::queue::ThreadQueue;
use crate::types::{
    AudioBlock, AudioCommand, DemodCommand, IqBlock, LifecycleNotice, UnitState, VisualQueue,
};
use crate::worker::{AudioSink, AudioWorker, DemodProcessor, DemodWorker};

/// Label given to units before the manager names them
const UNNAMED_LABEL: &str = "Unnamed";

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Thread bookkeeping, guarded by one mutex so flags and handles move together
#[derive(Default)]
struct Lifecycle {
    /// Workers built by `new()`, consumed by `start()` or `terminate()`
    workers: Option<(DemodWorker, AudioWorker)>,
    demod_thread: Option<JoinHandle<()>>,
    audio_thread: Option<JoinHandle<()>>,
    started: bool,
    audio_terminated: bool,
    demod_terminated: bool,
    /// Threads joined so far (never exceeds 2)
    joins: usize,
}

/// One demodulation channel
pub struct DemodulatorUnit {
    id: u64,
    label: RwLock<Arc<str>>,
    params: Arc<DemodParams>,

    input_queue: ThreadQueue<IqBlock>,
    command_queue: ThreadQueue<DemodCommand>,
    notify_queue: ThreadQueue<LifecycleNotice>,
    audio_input_queue: ThreadQueue<AudioBlock>,
    audio_command_queue: ThreadQueue<AudioCommand>,
    visual_output: Arc<Mutex<Option<VisualQueue>>>,

    stop_requested: Arc<AtomicBool>,
    terminated: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
    demod_stack_size: Option<usize>,
}

impl DemodulatorUnit {
    /// Create a unit and bind its workers to their queues
    ///
    /// No threads are spawned until [`start`](Self::start).
    pub fn new(
        processor: Box<dyn DemodProcessor>,
        sink: Box<dyn AudioSink>,
        config: &ManagerConfig,
    ) -> Self {
        let id = NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed);
        let poll_interval = config.worker_poll_interval();

        let params = Arc::new(DemodParams::new());
        let input_queue = ThreadQueue::with_capacity(config.sample_queue_capacity);
        let command_queue = ThreadQueue::unbounded();
        let notify_queue = ThreadQueue::unbounded();
        let audio_input_queue = ThreadQueue::unbounded();
        let audio_command_queue = ThreadQueue::unbounded();
        let visual_output = Arc::new(Mutex::new(None));
        let stop_requested = Arc::new(AtomicBool::new(false));

        let demod_worker = DemodWorker::new(
            format!("demod-{}", id),
            input_queue.clone(),
            command_queue.clone(),
            notify_queue.clone(),
            audio_input_queue.clone(),
            visual_output.clone(),
            params.clone(),
            stop_requested.clone(),
            poll_interval,
            processor,
        );
        let audio_worker = AudioWorker::new(
            format!("demod-{}-audio", id),
            audio_input_queue.clone(),
            audio_command_queue.clone(),
            notify_queue.clone(),
            stop_requested.clone(),
            poll_interval,
            sink,
        );

        Self {
            id,
            label: RwLock::new(Arc::from(UNNAMED_LABEL)),
            params,
            input_queue,
            command_queue,
            notify_queue,
            audio_input_queue,
            audio_command_queue,
            visual_output,
            stop_requested,
            terminated: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle {
                workers: Some((demod_worker, audio_worker)),
                ..Lifecycle::default()
            }),
            demod_stack_size: config.demod_stack_size,
        }
    }

    /// Process-unique id, used in thread names and logs
    pub fn id(&self) -> u64 {
        self.id
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ────────────────────────────────────────────────────────────────────────

    /// Spawn the output worker thread, then the processing worker thread
    pub fn start(&self) -> DemodResult<()> {
        let mut lifecycle = self.lifecycle();

        if self.stop_requested.load(Ordering::Acquire) {
            return Err(DemodError::NotRunning {
                label: self.label().to_string(),
            });
        }
        let Some((demod_worker, audio_worker)) = lifecycle.workers.take() else {
            return Err(DemodError::AlreadyStarted {
                label: self.label().to_string(),
            });
        };
        lifecycle.started = true;

        // A worker whose spawn fails is dropped by the builder, which posts
        // its notice, so the unit still terminates once asked to.
        let audio_thread = thread::Builder::new()
            .name(format!("demod-{}-audio", self.id))
            .spawn(move || audio_worker.run());
        let audio_thread = match audio_thread {
            Ok(handle) => handle,
            Err(source) => {
                drop(demod_worker);
                return Err(DemodError::ThreadSpawn { role: "audio", source });
            }
        };
        lifecycle.audio_thread = Some(audio_thread);

        let mut builder = thread::Builder::new().name(format!("demod-{}", self.id));
        if let Some(stack_size) = self.demod_stack_size {
            builder = builder.stack_size(stack_size);
        }
        let demod_thread = builder
            .spawn(move || demod_worker.run())
            .map_err(|source| DemodError::ThreadSpawn {
                role: "demodulator",
                source,
            })?;
        lifecycle.demod_thread = Some(demod_thread);

        log::info!(
            "Demodulator '{}' (id {}) started, processing stack {}",
            self.label(),
            self.id,
            self.demod_stack_size
                .map(|size| format!("{} bytes", size))
                .unwrap_or_else(|| "default".to_string())
        );
        Ok(())
    }

    /// Ask both workers to stop, without waiting for them
    ///
    /// Safe to call repeatedly; only the first call does anything. A unit
    /// that was never started drops its workers here, which completes the
    /// handshake immediately.
    pub fn terminate(&self) {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        log::info!("Terminating demodulator '{}' (id {})", self.label(), self.id);

        let unstarted = self.lifecycle().workers.take();
        if unstarted.is_some() {
            log::debug!("Demodulator {} was never started, releasing workers", self.id);
        }
        drop(unstarted);

        self.command_queue.push(DemodCommand::Terminate);
        self.audio_command_queue.push(AudioCommand::Terminate);
    }

    /// Non-blocking termination poll
    ///
    /// Drains the notices already posted by the workers, joining each worker
    /// thread on its first notice. Returns `true` once both workers are
    /// reclaimed, and on every call after that.
    pub fn is_terminated(&self) -> bool {
        if self.terminated.load(Ordering::Acquire) {
            return true;
        }

        let mut lifecycle = self.lifecycle();
        while let Some(notice) = self.notify_queue.try_pop() {
            match notice {
                LifecycleNotice::AudioTerminated => {
                    if let Some(handle) = lifecycle.audio_thread.take() {
                        self.join_worker(handle, "audio");
                        lifecycle.joins += 1;
                    }
                    lifecycle.audio_terminated = true;
                    log::debug!("Demodulator {}: audio worker reclaimed", self.id);
                }
                LifecycleNotice::DemodTerminated => {
                    if let Some(handle) = lifecycle.demod_thread.take() {
                        self.join_worker(handle, "processing");
                        lifecycle.joins += 1;
                    }
                    lifecycle.demod_terminated = true;
                    log::debug!("Demodulator {}: processing worker reclaimed", self.id);
                }
            }
        }

        let terminated = lifecycle.audio_terminated && lifecycle.demod_terminated;
        if terminated {
            self.terminated.store(true, Ordering::Release);
        }
        terminated
    }

    fn join_worker(&self, handle: JoinHandle<()>, role: &str) {
        if handle.join().is_err() {
            log::warn!(
                "Demodulator '{}' (id {}): {} worker panicked",
                self.label(),
                self.id,
                role
            );
        }
    }

    /// Current lifecycle state (does not drain notices)
    pub fn state(&self) -> UnitState {
        if self.terminated.load(Ordering::Acquire) {
            UnitState::Terminated
        } else if self.stop_requested.load(Ordering::Acquire) {
            UnitState::Stopping
        } else if self.lifecycle().started {
            UnitState::Running
        } else {
            UnitState::Idle
        }
    }

    /// Worker threads joined so far
    pub fn joined_threads(&self) -> usize {
        self.lifecycle().joins
    }

    // ────────────────────────────────────────────────────────────────────────
    // Label
    // ────────────────────────────────────────────────────────────────────────

    /// Replace the label; readers holding the previous snapshot keep it
    pub fn set_label(&self, label: impl Into<String>) {
        let label: Arc<str> = Arc::from(label.into());
        *self.label.write().unwrap_or_else(PoisonError::into_inner) = label;
    }

    /// Immutable snapshot of the current label
    pub fn label(&self) -> Arc<str> {
        self.label.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Label the unit with a frequency in MHz, e.g. `"100.500"`
    pub fn set_label_from_frequency(&self, frequency: i64) {
        self.set_label(format!("{:.3}", frequency as f64 / 1_000_000.0));
    }

    // ────────────────────────────────────────────────────────────────────────
    // Parameters & Queues
    // ────────────────────────────────────────────────────────────────────────

    /// Parameters read by the processing worker (updates seen asynchronously)
    pub fn params(&self) -> &DemodParams {
        &self.params
    }

    /// Shared handle to the parameters, for callers that outlive a borrow
    pub fn params_handle(&self) -> Arc<DemodParams> {
        self.params.clone()
    }

    pub fn input_queue(&self) -> &ThreadQueue<IqBlock> {
        &self.input_queue
    }

    pub fn command_queue(&self) -> &ThreadQueue<DemodCommand> {
        &self.command_queue
    }

    fn ensure_running(&self) -> DemodResult<()> {
        if self.stop_requested.load(Ordering::Acquire) {
            return Err(DemodError::NotRunning {
                label: self.label().to_string(),
            });
        }
        Ok(())
    }

    /// Queue raw samples for the processing worker without blocking
    pub fn push_samples(&self, block: IqBlock) -> DemodResult<()> {
        self.ensure_running()?;
        self.input_queue
            .try_push(block)
            .map_err(|_| DemodError::QueueFull("sample"))
    }

    /// Queue a command for the processing worker
    pub fn send_command(&self, cmd: DemodCommand) -> DemodResult<()> {
        self.ensure_running()?;
        self.command_queue.push(cmd);
        Ok(())
    }

    /// Mute or unmute the output worker
    pub fn set_muted(&self, muted: bool) -> DemodResult<()> {
        self.ensure_running()?;
        self.audio_command_queue.push(AudioCommand::SetMuted(muted));
        Ok(())
    }

    /// Rewire the visualization output; `None` disconnects it
    pub fn set_visual_output_queue(&self, queue: Option<VisualQueue>) {
        *self.visual_output.lock().unwrap_or_else(PoisonError::into_inner) = queue;
    }

    /// Visualization queue currently fed by this unit
    pub fn visual_output_queue(&self) -> Option<VisualQueue> {
        self.visual_output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Audio frames waiting for the output worker
    pub fn pending_audio(&self) -> usize {
        self.audio_input_queue.len()
    }
}

impl std::fmt::Debug for DemodulatorUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemodulatorUnit")
            .field("id", &self.id)
            .field("label", &self.label())
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for DemodulatorUnit {
    fn drop(&mut self) {
        if !self.is_terminated() {
            log::warn!(
                "Demodulator '{}' (id {}) dropped before its workers exited, detaching threads",
                self.label(),
                self.id
            );
            self.terminate();
        }
    }
}
