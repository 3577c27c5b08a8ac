//! Request/response envelope shared by every transport

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors the caller gets to see. Device-side failures never end up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Malformed request: {0}")]
    MalformedRequest(String),
}

/// A logical command plus its command-specific fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub command: String,
    /// Raw command for `CUSTOM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cec_command: Option<String>,
    /// Logical input for `INPUT` (`hdmi1`..`hdmi4`, `tv`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Entry count for `HISTORY`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }

    pub fn custom(cec_command: impl Into<String>) -> Self {
        Self {
            command: "CUSTOM".to_string(),
            cec_command: Some(cec_command.into()),
            ..Default::default()
        }
    }

    pub fn input(input: impl Into<String>) -> Self {
        Self {
            command: "INPUT".to_string(),
            input: Some(input.into()),
            ..Default::default()
        }
    }

    /// Parse one JSON line as received over serial
    pub fn from_json(line: &str) -> Result<Self, CommandError> {
        serde_json::from_str(line.trim()).map_err(|e| CommandError::MalformedRequest(e.to_string()))
    }

    /// Upper-cased command name
    pub fn name(&self) -> String {
        self.command.trim().to_uppercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// What every transport sends back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub command: String,
    pub status: Status,
    pub result: String,
}

impl Response {
    pub fn success(command: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status: Status::Success,
            result: result.into(),
        }
    }

    pub fn error(command: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status: Status::Error,
            result: result.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let req = Request::from_json(r#"{"command": "custom", "cec_command": "tx 10:04"}"#).unwrap();
        assert_eq!(req.name(), "CUSTOM");
        assert_eq!(req.cec_command.as_deref(), Some("tx 10:04"));
        assert_eq!(req.input, None);
    }

    #[test]
    fn test_malformed_request() {
        assert!(matches!(
            Request::from_json("{not json"),
            Err(CommandError::MalformedRequest(_))
        ));
        assert!(matches!(
            Request::from_json(r#"{"cmd": "PING"}"#),
            Err(CommandError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_response_json() {
        let json = serde_json::to_value(Response::error("DANCE", "Unknown command: DANCE")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["result"], "Unknown command: DANCE");
        assert_eq!(json["command"], "DANCE");
    }
}
