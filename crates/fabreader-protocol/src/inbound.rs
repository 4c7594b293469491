//! Inbound command envelopes.

use crate::error::DecodeError;
use fabreader_core::{Error, Key, KeySet, KeySlot, Result, constants::MSG_TYPE_COMMAND};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the command carried by an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    Enroll,
    Authenticate,
    /// Any other name; answered with an "Unknown command" result.
    Unknown(String),
}

impl CommandKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "enroll" => CommandKind::Enroll,
            "authenticate" => CommandKind::Authenticate,
            other => CommandKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Enroll => "enroll",
            CommandKind::Authenticate => "authenticate",
            CommandKind::Unknown(name) => name,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded `{"type":"command"}` frame.
///
/// Command-specific fields stay in `payload` and are validated by the
/// handler that needs them, so a bad key never blocks uid validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub command: CommandKind,
    pub uid: String,
    pub payload: Map<String, Value>,
}

/// Decode an inbound text frame into a command envelope.
///
/// # Errors
///
/// - [`DecodeError::Json`] / [`DecodeError::MissingType`] /
///   [`DecodeError::UnsupportedType`] when the frame is not a command at all
/// - [`DecodeError::MalformedCommand`] when it is a command but the payload,
///   `command` or `uid` field is unusable; the uid is preserved when present
pub fn decode(text: &str) -> std::result::Result<CommandEnvelope, DecodeError> {
    let value: Value = serde_json::from_str(text)?;

    let msg_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;
    if msg_type != MSG_TYPE_COMMAND {
        return Err(DecodeError::UnsupportedType(msg_type.to_string()));
    }

    let Some(payload) = value.get("payload").and_then(Value::as_object) else {
        return Err(DecodeError::malformed(None, "payload must be an object"));
    };

    let uid = payload
        .get("uid")
        .and_then(Value::as_str)
        .map(str::to_string);

    let Some(command) = payload.get("command").and_then(Value::as_str) else {
        return Err(DecodeError::malformed(uid, "missing command name"));
    };

    let Some(uid) = uid else {
        return Err(DecodeError::malformed(None, "missing uid"));
    };

    Ok(CommandEnvelope {
        command: CommandKind::parse(command),
        uid,
        payload: payload.clone(),
    })
}

impl CommandEnvelope {
    /// Parse the six enrollment keys from `payload.keys`.
    ///
    /// # Errors
    /// Returns `Error::MissingField` or `Error::InvalidKey` if any key is
    /// absent or is not a 16-element byte array.
    pub fn enroll_keys(&self) -> Result<KeySet> {
        let keys = self
            .payload
            .get("keys")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::MissingField("keys".to_string()))?;

        Ok(KeySet {
            default_key: parse_key(keys, "defaultKey")?,
            master_key: parse_key(keys, "masterKey")?,
            auth_key: parse_key(keys, "authKey")?,
            read_key: parse_key(keys, "readKey")?,
            write_key: parse_key(keys, "writeKey")?,
            change_key: parse_key(keys, "changeKey")?,
        })
    }

    /// Parse `keyNo` (application slot 1-4) and `authKey`.
    ///
    /// # Errors
    /// Returns `Error::InvalidKeySlot` for slot 0 or out-of-range slots and
    /// `Error::MissingField` / `Error::InvalidKey` for a bad key.
    pub fn authenticate_params(&self) -> Result<(KeySlot, Key)> {
        let key_no = self
            .payload
            .get("keyNo")
            .ok_or_else(|| Error::MissingField("keyNo".to_string()))?;
        let key_no = key_no.as_i64().ok_or_else(|| {
            Error::InvalidMessageFormat(format!("keyNo must be an integer, got {key_no}"))
        })?;

        let slot = KeySlot::application(key_no)?;
        let key = parse_key(&self.payload, "authKey")?;
        Ok((slot, key))
    }
}

fn parse_key(object: &Map<String, Value>, name: &str) -> Result<Key> {
    let value = object
        .get(name)
        .ok_or_else(|| Error::MissingField(name.to_string()))?;

    let invalid = |reason: &str| Error::InvalidKey {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let items = value
        .as_array()
        .ok_or_else(|| invalid("expected an array of bytes"))?;

    let bytes = items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(|| invalid("every element must be an integer 0-255"))?;

    Key::new(name, &bytes)
}
