//! Configuration for the demodulator manager
//!
//! - [`ManagerConfig`]: reclamation policy and worker thread tuning
//! - Generic YAML loading/saving used by the manager and the soak tool
//!
//! # Usage
//!
//! ```ignore
//! use demod_core::config::{default_config_path, load_config, ManagerConfig};
//!
//! let config: ManagerConfig = load_config(&default_config_path("manager.yaml"));
//! ```

mod io;
mod manager;
mod paths;

pub use io::{load_config, save_config};
pub use manager::{GcPolicy, ManagerConfig};
pub use paths::{default_config_dir, default_config_path};
