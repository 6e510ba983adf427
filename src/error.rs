//! Error types for the voicedsp crate.

use std::fmt;

/// Errors that can occur while configuring or driving the DSP components.
///
/// Degraded signal conditions (silence, low correlation) are not errors;
/// they surface as low-confidence results instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DspError {
    /// Configuration rejected at construction.
    InvalidConfig(String),
    /// Malformed per-call arguments.
    InvalidInput(String),
    /// A request exceeds a fixed internal staging capacity.
    BufferTooLarge { provided: usize, capacity: usize },
}

impl fmt::Display for DspError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DspError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            DspError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            DspError::BufferTooLarge { provided, capacity } => {
                write!(
                    f,
                    "buffer too large: {} samples provided, capacity is {}",
                    provided, capacity
                )
            }
        }
    }
}

impl std::error::Error for DspError {}
