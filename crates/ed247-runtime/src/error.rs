use std::path::PathBuf;
use std::time::Duration;

/// Broad class of an [`Ed247Error`], used to decide whether the component
/// is still usable and which exit status a front end reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or inconsistent topology. Fatal to load.
    Configuration,
    /// Misuse of the API. The component stays usable.
    Usage,
    /// A link could not be opened, read or written.
    Transport,
    /// An inbound frame could not be decoded.
    ProtocolDecode,
    /// A blocking wait expired.
    Timeout,
}

/// Errors that can occur in runtime operations.
#[derive(Debug, thiserror::Error)]
pub enum Ed247Error {
    /// The topology is inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The configuration document is not valid JSON for the topology model.
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("cannot read configuration {path}: {source}")]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// No entity with this name exists in the component.
    #[error("{kind} [{name}] not found")]
    NotFound { kind: &'static str, name: String },

    /// A name pattern is not a valid regular expression.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The sample size violates the stream bound.
    #[error("stream [{stream}]: sample of {size} bytes does not fit bound {max}")]
    SizeMismatch {
        stream: String,
        size: usize,
        max: usize,
    },

    /// The send queue has no free slot.
    #[error("stream [{stream}]: send queue full ({capacity} samples)")]
    QueueFull { stream: String, capacity: usize },

    /// The stream direction forbids the operation.
    #[error("stream [{stream}] is not an {expected} stream")]
    WrongDirection {
        stream: String,
        expected: &'static str,
    },

    /// The stream kind does not carry signals.
    #[error("stream [{0}] does not carry signals")]
    NotSignalBased(String),

    /// The signal belongs to another stream.
    #[error("signal [{signal}] does not belong to stream [{stream}]")]
    ForeignSignal { signal: String, stream: String },

    /// A signal value does not fit the signal definition.
    #[error("signal [{signal}]: {reason}")]
    SignalValue { signal: String, reason: String },

    /// A context-owned collection was released by the caller.
    #[error("collection is owned by the component and cannot be released")]
    ContextOwned,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ed247_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] ed247_frame::FrameError),

    /// A blocking wait expired.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// A receiver thread terminated abnormally.
    #[error("receiver thread for channel [{0}] panicked")]
    ReceiverPanicked(String),
}

impl Ed247Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::Json(_) | Self::ConfigFile { .. } => {
                ErrorCategory::Configuration
            }
            Self::Transport(_) | Self::ReceiverPanicked(_) => ErrorCategory::Transport,
            Self::Frame(_) => ErrorCategory::ProtocolDecode,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::NotFound { .. }
            | Self::Pattern(_)
            | Self::SizeMismatch { .. }
            | Self::QueueFull { .. }
            | Self::WrongDirection { .. }
            | Self::NotSignalBased(_)
            | Self::ForeignSignal { .. }
            | Self::SignalValue { .. }
            | Self::ContextOwned => ErrorCategory::Usage,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Ed247Error>;
