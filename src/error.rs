use thiserror::Error;

/// Signal pipeline error types.
#[derive(Error, Debug)]
pub enum SignalError {
    /// The window holds fewer bars than the detectors need. Not a fault:
    /// callers treat it as "no signal" and wait for more bars.
    #[error("Insufficient data: have {have} bars, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("Malformed bar: {0}")]
    MalformedBar(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No active session")]
    NoSession,

    #[error("Worker channel closed for {0}")]
    ChannelClosed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl SignalError {
    /// Whether the pipeline can keep going after this error without any
    /// intervention (more bars, or simply the next bar).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SignalError::InsufficientData { .. } | SignalError::MalformedBar(_)
        )
    }

    /// Whether this error only means "no signal for this bar".
    pub fn is_no_signal(&self) -> bool {
        matches!(self, SignalError::InsufficientData { .. })
    }
}

pub type Result<T> = std::result::Result<T, SignalError>;
