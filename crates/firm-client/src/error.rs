use crate::Resource;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchCause {
    #[error("http status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

/// One resource that did not resolve during a snapshot fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub resource: Resource,
    pub cause: FetchCause,
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.cause)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid backend url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{op} failed: {cause}")]
    Request { op: String, cause: FetchCause },
}

impl ClientError {
    pub fn request(op: impl Into<String>, cause: FetchCause) -> Self {
        ClientError::Request {
            op: op.into(),
            cause,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Request {
                cause: FetchCause::Status { code, .. },
                ..
            } => Some(*code),
            _ => None,
        }
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX_BODY_CHARS: usize = 200;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    out.push('…');
    out
}
