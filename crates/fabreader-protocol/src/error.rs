use thiserror::Error;

/// Errors raised while decoding an inbound frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame has no string `type` field.
    #[error("Missing message type")]
    MissingType,

    /// The frame carries a `type` the reader does not handle.
    #[error("Unsupported message type: {0}")]
    UnsupportedType(String),

    /// A `command` frame whose payload could not be decoded.
    ///
    /// `uid` is kept when it could be recovered so the failure can be
    /// reported back to the server.
    #[error("Malformed command: {reason}")]
    MalformedCommand { uid: Option<String>, reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(uid: Option<String>, reason: impl Into<String>) -> Self {
        Self::MalformedCommand {
            uid,
            reason: reason.into(),
        }
    }

    /// The uid an error result can be addressed to, if any.
    pub fn addressable_uid(&self) -> Option<&str> {
        match self {
            Self::MalformedCommand { uid, .. } => uid.as_deref(),
            _ => None,
        }
    }
}
