use crate::timeline::StampId;

/// Result alias that carries the custom [`BeatgridError`] type.
pub type Result<T> = std::result::Result<T, BeatgridError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum BeatgridError {
    /// Tempo or time signature values that cannot drive a conductor. Raised at
    /// construction so no partially initialised conductor ever exists.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A chart names an event kind the schema registry does not declare.
    #[error("unknown event kind `{0}`")]
    UnknownEventKind(String),
    /// A stored parameter does not fit the type its schema declares.
    #[error("invalid parameter `{name}` for `{kind}`: {reason}")]
    InvalidParam {
        kind: String,
        name: String,
        reason: String,
    },
    /// The referenced stamp is not part of the timeline.
    #[error("no stamp with id {0} in the timeline")]
    NotFound(StampId),
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Chart or config (de)serialization failure.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl BeatgridError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for BeatgridError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for BeatgridError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
