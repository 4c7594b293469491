//! Outbound envelopes sent by the reader.

use serde::{Deserialize, Serialize};

/// Payload of a `status` frame. `uid` is `None` when no card is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub uid: Option<String>,
}

/// Payload of a `command_result` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResultPayload {
    pub uid: String,
    pub success: bool,
    pub message: String,
    pub logs: Vec<String>,
}

/// Every frame the reader sends.
///
/// Serialized adjacently tagged, so each variant becomes
/// `{"type":"<snake_case name>","payload":...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Outbound {
    Status(StatusPayload),
    CommandResult(CommandResultPayload),
    Log(String),
}

impl Outbound {
    pub fn status(uid: Option<&str>) -> Self {
        Outbound::Status(StatusPayload {
            uid: uid.map(str::to_string),
        })
    }

    pub fn command_result(
        uid: impl Into<String>,
        success: bool,
        message: impl Into<String>,
        logs: Vec<String>,
    ) -> Self {
        Outbound::CommandResult(CommandResultPayload {
            uid: uid.into(),
            success,
            message: message.into(),
            logs,
        })
    }

    pub fn log(line: impl Into<String>) -> Self {
        Outbound::Log(line.into())
    }

    /// Serialize to a single JSON text frame.
    ///
    /// # Errors
    /// Only fails if serde_json cannot serialize the payload, which does not
    /// happen for the string and bool fields used here.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The wire `type` of this frame.
    pub fn kind(&self) -> &'static str {
        use fabreader_core::constants::{MSG_TYPE_COMMAND_RESULT, MSG_TYPE_LOG, MSG_TYPE_STATUS};
        match self {
            Outbound::Status(_) => MSG_TYPE_STATUS,
            Outbound::CommandResult(_) => MSG_TYPE_COMMAND_RESULT,
            Outbound::Log(_) => MSG_TYPE_LOG,
        }
    }
}
