//! Console error taxonomy and the error states views render from it.

use serde::{Deserialize, Serialize};

/// Errors surfaced at view boundaries. Suitable for transport over RPC later.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("not_found: {0}")]
    NotFound(String),
    #[error("load: {message}")]
    Load { code: Option<u16>, message: String },
    #[error("parse: {0}")]
    Parse(String),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

impl ConsoleError {
    pub fn load(code: Option<u16>, message: impl Into<String>) -> Self {
        ConsoleError::Load { code, message: message.into() }
    }

    /// HTTP status code, when one applies.
    pub fn code(&self) -> Option<u16> {
        match self {
            ConsoleError::NotFound(_) => Some(404),
            ConsoleError::Load { code, .. } => *code,
            ConsoleError::Parse(_) => None,
        }
    }
}

/// Rendered error panel: title + message derived from the status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorState {
    pub code: Option<u16>,
    pub title: String,
    pub message: String,
}

pub fn http_reason(code: u16) -> Option<&'static str> {
    Some(match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        408 => "Request Timeout",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => return None,
    })
}

/// Map an error to the state a view shows for `subject` (e.g. "commits").
pub fn error_state(err: &ConsoleError, subject: &str) -> ErrorState {
    match err.code() {
        Some(404) => ErrorState {
            code: Some(404),
            title: "404: Page not found".to_string(),
            message: format!("{} not found.", subject),
        },
        Some(403) => ErrorState {
            code: Some(403),
            title: "403: Access denied".to_string(),
            message: format!("You do not have permission to view {}.", subject),
        },
        code => {
            let message = match code.and_then(http_reason) {
                Some(reason) => format!("{}: {}", code.unwrap_or_default(), reason),
                None => err.to_string(),
            };
            ErrorState { code, title: format!("Unable to load {}", subject), message }
        }
    }
}
