use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_FRAME_SIZE: usize = 512;

/// A single state request sent to a device, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Request {
    Read { field: String },
    Write { field: String, val: String },
    Override { field: String, val: String },
    Release { field: String },
}

impl Request {
    pub fn field(&self) -> &str {
        match self {
            Request::Read { field }
            | Request::Write { field, .. }
            | Request::Override { field, .. }
            | Request::Release { field } => field,
        }
    }

    pub fn encode(&self) -> Result<String, WireError> {
        let mut line = serde_json::to_string(self).map_err(|_| WireError::Serialization)?;
        if line.len() >= MAX_FRAME_SIZE {
            return Err(WireError::FrameTooLarge(line.len()));
        }
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self, WireError> {
        serde_json::from_str(line.trim()).map_err(|_| WireError::InvalidJson)
    }
}

/// A device's answer to a [`Request`]. Exactly one of `val`/`err` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

impl Reply {
    pub fn value(field: &str, val: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            val: Some(val.into()),
            err: None,
        }
    }

    pub fn error(field: &str, err: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            val: None,
            err: Some(err.into()),
        }
    }

    pub fn encode(&self) -> Result<String, WireError> {
        let mut line = serde_json::to_string(self).map_err(|_| WireError::Serialization)?;
        line.push('\n');
        Ok(line)
    }

    /// Anything that isn't a reply frame is device console output.
    pub fn decode(line: &str) -> Option<Self> {
        let reply: Reply = serde_json::from_str(line.trim()).ok()?;
        if reply.val.is_none() && reply.err.is_none() {
            return None;
        }
        Some(reply)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("Invalid JSON format")]
    InvalidJson,
    #[error("Serialization failed")]
    Serialization,
    #[error("Frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),
}
