//! Error taxonomy for graph construction, parameter validation and execution
//!
//! Control-path errors (adding, removing or rebinding operations) are returned
//! synchronously and never leave the graph half-modified. Errors raised while
//! ticking abort that tick; nothing is retried automatically.

use crate::operation::{Lifecycle, OperationId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A filter parameter is outside its legal range
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// Bindings do not match the operation's declared inputs
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Binding would close a cycle through `operation`
    #[error("binding would create a cycle through operation {operation}")]
    CyclicGraph { operation: OperationId },

    #[error("unknown operation {0}")]
    UnknownOperation(OperationId),

    #[error("operation {0} already exists")]
    DuplicateOperation(OperationId),

    /// `target` is still (or was, for a stale reference) read by `referrer`
    #[error("operation {target} is referenced by {referrer}")]
    DanglingReference {
        target: OperationId,
        referrer: OperationId,
    },

    #[error("operation {operation} cannot be ticked in state {state:?}: {reason}")]
    InvalidState {
        operation: OperationId,
        state: Lifecycle,
        reason: &'static str,
    },

    /// The live command queue has no free slot; retry after the audio thread catches up
    #[error("command queue full")]
    QueueFull,

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &'static str, value: f64, reason: &'static str) -> Self {
        Error::InvalidParameter {
            name,
            value,
            reason,
        }
    }

    /// True for errors caused by graph shape rather than values or I/O
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidGraph(_)
                | Error::CyclicGraph { .. }
                | Error::UnknownOperation(_)
                | Error::DuplicateOperation(_)
                | Error::DanglingReference { .. }
        )
    }
}
