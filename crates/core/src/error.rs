/// Result alias that carries the custom [`WindowError`] type.
pub type Result<T> = std::result::Result<T, WindowError>;

/// Common error type for the core crate.
///
/// Only load-time entry points (config parsing, chart validation, fraction
/// construction) produce these. The per-tick path never fails; shortfalls there
/// are reported through `tracing` and the window diagnostics instead.
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    /// Free-form message for conditions that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a chart or layer configuration document.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A fraction was built with a zero denominator.
    #[error("fraction {numerator}/{denominator} has a zero denominator")]
    InvalidFraction { numerator: i64, denominator: i64 },
    /// A fraction whose reduced form does not fit in 64 bits.
    #[error("fraction {0} is out of range")]
    FractionOutOfRange(String),
    /// A carrier violates the construction invariants of the timeline.
    #[error("carrier #{index} is invalid: {reason}")]
    InvalidCarrier { index: usize, reason: String },
    /// A layer or window configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WindowError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for WindowError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for WindowError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
