//! Demod Core - lifecycle management for concurrent demodulator units
//!
//! A multi-channel receiver runs one [`DemodulatorUnit`] per tuned channel.
//! Each unit pairs a processing worker (IQ in, audio out) with an output
//! worker (audio in, rendered out), both on their own threads and connected
//! by [`ThreadQueue`]s. The [`DemodulatorManager`] creates units, tracks
//! which one is active, last active and wired to the visualization sink,
//! and reclaims deleted units once both of their workers have exited.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use demod_core::{BasicWorkerFactory, DemodulatorManager, ManagerConfig, VisualQueue};
//!
//! let factory = Arc::new(BasicWorkerFactory::new());
//! let manager = DemodulatorManager::new(factory, ManagerConfig::default());
//! let visual_sink = VisualQueue::bounded(64);
//!
//! let unit = manager.new_unit();
//! unit.params().set_frequency(100_500_000);
//! unit.start().unwrap();
//! manager.set_active(Some(&unit), false, &visual_sink);
//!
//! manager.delete_unit(&unit);
//! let unreclaimed = manager.shutdown(Duration::from_secs(2));
//! assert_eq!(unreclaimed, 0);
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod params;
pub mod queue;
pub mod types;
pub mod unit;
pub mod worker;

pub use config::{GcPolicy, ManagerConfig};
pub use error::{DemodError, DemodResult};
pub use manager::{DemodulatorManager, UnitHandle};
pub use params::{DemodParams, DemodParamsSnapshot};
pub use queue::ThreadQueue;
pub use types::*;
pub use unit::DemodulatorUnit;
pub use worker::{
    AudioSink, BasicDemodulator, BasicWorkerFactory, DemodProcessor, NullAudioSink, WorkerFactory,
};
