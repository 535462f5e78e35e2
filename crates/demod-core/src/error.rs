//! Error types for demodulator units
//!
//! Manager operations never fail: stale selections are healed in place and
//! unreclaimed units are reported as a count. The errors below only cover
//! the few unit operations that can genuinely be refused.

use thiserror::Error;

/// Errors that can occur while driving a demodulator unit
#[derive(Debug, Error)]
pub enum DemodError {
    /// `start()` was called on a unit whose workers were already spawned
    #[error("Demodulator '{label}' has already been started")]
    AlreadyStarted { label: String },

    /// The unit was asked to stop and no longer accepts work
    #[error("Demodulator '{label}' is stopping or terminated")]
    NotRunning { label: String },

    /// The operating system refused to create a worker thread
    #[error("Failed to spawn {role} thread: {source}")]
    ThreadSpawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A bounded queue had no room for the item
    #[error("{0} queue is full")]
    QueueFull(&'static str),
}

/// Result type for demodulator operations
pub type DemodResult<T> = Result<T, DemodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DemodError::AlreadyStarted {
            label: "2".to_string(),
        };
        assert!(err.to_string().contains("'2'"));

        let err = DemodError::ThreadSpawn {
            role: "audio",
            source: std::io::Error::new(std::io::ErrorKind::Other, "no threads left"),
        };
        assert!(err.to_string().contains("audio"));
        assert!(err.to_string().contains("no threads left"));

        assert_eq!(DemodError::QueueFull("sample").to_string(), "sample queue is full");
    }
}
