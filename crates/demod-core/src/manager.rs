//! DemodulatorManager - registry of live and pending demodulator units
//!
//! The manager owns every unit it creates. Deleting a unit detaches it from
//! the live sequence, asks it to stop, and parks it in a pending set until
//! both of its worker threads have confirmed exit; only then is the
//! manager's reference dropped.
//!
//! # Selections
//!
//! Three selections are tracked as weak references into the live sequence:
//!
//! - **active**: the unit targeted by control operations
//! - **last active**: the previous non-temporary selection, the fallback
//!   when the active selection is cleared
//! - **visual**: the unit currently wired to the visualization sink
//!
//! Deleting a unit clears every selection pointing at it, and each read
//! re-validates against the live sequence, so a selection never hands out
//! a unit that is pending reclamation.
//!
//! # Threading
//!
//! All operations take `&self` and serialize on one internal mutex, so the
//! manager can be shared between control threads behind an `Arc`. Worker
//! threads never touch the manager.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{GcPolicy, ManagerConfig};
use crate::types::VisualQueue;
use crate::unit::DemodulatorUnit;
use crate::worker::WorkerFactory;

/// Shared handle to a unit owned by the manager
///
/// Handles are strong references. Reclamation drops the manager's
/// reference once both workers have exited; a caller that keeps a clone
/// past that point keeps the unit's memory alive, but its threads are
/// already joined and it no longer appears in any manager query. Hold
/// handles only as long as an operation needs them.
pub type UnitHandle = Arc<DemodulatorUnit>;

/// Delay between reclamation polls while draining
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Default)]
struct ManagerState {
    /// Live units in creation order
    units: Vec<UnitHandle>,
    /// Units asked to stop, waiting for their workers to exit
    pending: Vec<UnitHandle>,
    active: Option<Weak<DemodulatorUnit>>,
    last_active: Option<Weak<DemodulatorUnit>>,
    visual: Option<Weak<DemodulatorUnit>>,
}

fn points_to(selection: &Option<Weak<DemodulatorUnit>>, unit: &UnitHandle) -> bool {
    selection
        .as_ref()
        .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(unit)))
}

fn contains(units: &[UnitHandle], unit: &UnitHandle) -> bool {
    units.iter().any(|u| Arc::ptr_eq(u, unit))
}

impl ManagerState {
    /// Upgrade a selection, but only if it still names a live unit
    fn resolve(&self, selection: &Option<Weak<DemodulatorUnit>>) -> Option<UnitHandle> {
        let unit = selection.as_ref()?.upgrade()?;
        contains(&self.units, &unit).then_some(unit)
    }

    /// Last active unit, falling back to the active one if it was deleted
    fn last_active(&mut self) -> Option<UnitHandle> {
        if self.resolve(&self.last_active).is_none() {
            self.last_active = self.active.clone();
        }
        self.resolve(&self.last_active)
    }

    fn delete(&mut self, unit: &UnitHandle) {
        if points_to(&self.active, unit) {
            self.active = None;
        }
        if points_to(&self.last_active, unit) {
            self.last_active = None;
        }
        if points_to(&self.visual, unit) {
            unit.set_visual_output_queue(None);
            self.visual = None;
        }

        if let Some(index) = self.units.iter().position(|u| Arc::ptr_eq(u, unit)) {
            self.units.remove(index);
        }
        unit.terminate();

        if !contains(&self.pending, unit) {
            self.pending.push(unit.clone());
        }
    }

    /// Reclaim terminated units per `policy`, returning how many were freed
    fn collect(&mut self, policy: GcPolicy) -> usize {
        match policy {
            GcPolicy::OnePerCall => {
                let Some(index) = self.pending.iter().position(|u| u.is_terminated()) else {
                    return 0;
                };
                let unit = self.pending.remove(index);
                log::info!(
                    "Garbage collected demodulator '{}' (id {})",
                    unit.label(),
                    unit.id()
                );
                1
            }
            GcPolicy::AllEligible => {
                let before = self.pending.len();
                self.pending.retain(|unit| {
                    if unit.is_terminated() {
                        log::info!(
                            "Garbage collected demodulator '{}' (id {})",
                            unit.label(),
                            unit.id()
                        );
                        false
                    } else {
                        true
                    }
                });
                before - self.pending.len()
            }
        }
    }
}

/// Registry of demodulator units with selection tracking
pub struct DemodulatorManager {
    state: Mutex<ManagerState>,
    factory: Arc<dyn WorkerFactory>,
    config: ManagerConfig,
}

impl DemodulatorManager {
    /// Create a manager building unit collaborators from `factory`
    pub fn new(factory: Arc<dyn WorkerFactory>, config: ManagerConfig) -> Self {
        log::info!(
            "DemodulatorManager initialized (gc policy {:?}, shutdown timeout {:?})",
            config.gc_policy,
            config.shutdown_timeout()
        );
        Self {
            state: Mutex::new(ManagerState::default()),
            factory,
            config,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Creation & Deletion
    // ────────────────────────────────────────────────────────────────────────

    /// Create a unit, append it to the live sequence and label it with its
    /// 1-based position
    ///
    /// The unit is not started; set its initial parameters, then call
    /// [`DemodulatorUnit::start`].
    pub fn new_unit(&self) -> UnitHandle {
        let unit = Arc::new(DemodulatorUnit::new(
            self.factory.processor(),
            self.factory.audio_sink(),
            &self.config,
        ));

        let mut state = self.state();
        state.units.push(unit.clone());
        unit.set_label(state.units.len().to_string());
        log::debug!("Created demodulator '{}' (id {})", unit.label(), unit.id());
        unit
    }

    /// Clear selections naming `unit`, detach it, ask it to stop and park it
    /// for reclamation
    pub fn delete_unit(&self, unit: &UnitHandle) {
        let mut state = self.state();
        state.delete(unit);
        state.collect(self.config.gc_policy);
    }

    /// Delete every live unit, newest first
    pub fn terminate_all(&self) {
        let mut state = self.state();
        while let Some(unit) = state.units.last().cloned() {
            state.delete(&unit);
            state.collect(self.config.gc_policy);
        }
    }

    /// Reclaim pending units whose workers have both exited
    ///
    /// Never blocks on a running worker. Returns the number of units freed.
    pub fn collect_garbage(&self) -> usize {
        self.state().collect(self.config.gc_policy)
    }

    /// Poll reclamation until nothing is pending or `timeout` elapses
    ///
    /// Returns the number of units still pending.
    pub fn drain_pending(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = {
                let mut state = self.state();
                state.collect(self.config.gc_policy);
                state.pending.len()
            };
            if remaining == 0 || Instant::now() >= deadline {
                return remaining;
            }
            thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }

    /// Terminate every unit and wait up to `timeout` for reclamation
    ///
    /// Returns the number of units that did not confirm exit in time.
    pub fn shutdown(&self, timeout: Duration) -> usize {
        self.terminate_all();
        self.drain_pending(timeout)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Queries
    // ────────────────────────────────────────────────────────────────────────

    /// Snapshot of the live sequence, in creation order
    pub fn units(&self) -> Vec<UnitHandle> {
        self.state().units.clone()
    }

    pub fn live_count(&self) -> usize {
        self.state().units.len()
    }

    /// Units deleted but not yet reclaimed
    pub fn pending_count(&self) -> usize {
        self.state().pending.len()
    }

    /// Live units whose occupied band overlaps `[center - bw/2, center + bw/2]`
    ///
    /// Half-bandwidths use floor division and both bounds are inclusive.
    /// Results keep live-sequence order.
    pub fn find_units_in_range(&self, center_frequency: i64, bandwidth: i64) -> Vec<UnitHandle> {
        let half_query = bandwidth.div_euclid(2);
        self.state()
            .units
            .iter()
            .filter(|unit| {
                let (low, high) = unit.params().occupied_range();
                center_frequency <= high.saturating_add(half_query)
                    && center_frequency >= low.saturating_sub(half_query)
            })
            .cloned()
            .collect()
    }

    // ────────────────────────────────────────────────────────────────────────
    // Selection
    // ────────────────────────────────────────────────────────────────────────

    /// Select the active unit and rewire the visualization sink
    ///
    /// A non-temporary selection records the previous active unit (or the
    /// new one, if nothing was active) as last active. The visualization
    /// sink follows the new unit, or falls back to the last active unit
    /// when `unit` is `None`. Units that are no longer live are treated as
    /// `None`.
    pub fn set_active(&self, unit: Option<&UnitHandle>, temporary: bool, sink: &VisualQueue) {
        let mut state = self.state();

        let unit = match unit {
            Some(unit) if contains(&state.units, unit) => Some(unit.clone()),
            Some(unit) => {
                log::debug!(
                    "set_active: demodulator {} is not live, clearing selection",
                    unit.id()
                );
                None
            }
            None => None,
        };

        if !temporary {
            state.last_active = match state.resolve(&state.active) {
                Some(previous) => Some(Arc::downgrade(&previous)),
                None => unit.as_ref().map(Arc::downgrade),
            };
        }

        if let Some(visual) = state.resolve(&state.visual) {
            visual.set_visual_output_queue(None);
        }
        let visual = match &unit {
            Some(unit) => Some(unit.clone()),
            None => state.last_active(),
        };
        if let Some(visual) = &visual {
            visual.set_visual_output_queue(Some(sink.clone()));
        }
        state.visual = visual.as_ref().map(Arc::downgrade);

        state.active = unit.as_ref().map(Arc::downgrade);
        state.collect(self.config.gc_policy);
    }

    pub fn get_active(&self) -> Option<UnitHandle> {
        let state = self.state();
        state.resolve(&state.active)
    }

    /// Last active unit, re-validated; a deleted one is replaced by the
    /// current active unit
    pub fn get_last_active(&self) -> Option<UnitHandle> {
        self.state().last_active()
    }

    /// Unit currently feeding the visualization sink
    pub fn get_visual(&self) -> Option<UnitHandle> {
        let state = self.state();
        state.resolve(&state.visual)
    }
}

impl Drop for DemodulatorManager {
    fn drop(&mut self) {
        let remaining = self.shutdown(self.config.shutdown_timeout());
        if remaining > 0 {
            log::warn!(
                "DemodulatorManager dropped with {} unit(s) still running, detaching",
                remaining
            );
        } else {
            log::info!("DemodulatorManager shut down cleanly");
        }
    }
}
