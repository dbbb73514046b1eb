use serde::{Deserialize, Serialize};

/// Machine-readable failure classes shared by rejections and thrown errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    InvalidState,
    RevisionConflict,
    InvariantViolation,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::RevisionConflict => "REVISION_CONFLICT",
            ErrorCode::InvariantViolation => "INVARIANT_VIOLATION",
        }
    }

    /// Prompt a client should show for this class of failure.
    pub fn user_hint(self) -> &'static str {
        match self {
            ErrorCode::RevisionConflict => "The table changed. Refresh and retry.",
            ErrorCode::PermissionDenied => "Check your session membership.",
            _ => "Something went wrong. Please retry.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("revision conflict: {0}")]
    RevisionConflict(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::RevisionConflict(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotFound(_) => ErrorCode::NotFound,
            EngineError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            EngineError::InvalidState(_) => ErrorCode::InvalidState,
            EngineError::RevisionConflict(_) => ErrorCode::RevisionConflict,
            EngineError::InvariantViolation(_) => ErrorCode::InvariantViolation,
        }
    }

    pub fn user_hint(&self) -> &'static str {
        self.code().user_hint()
    }
}

/// A resolver rejection, reported as data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub code: ErrorCode,
    pub message: String,
}

impl Rejection {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }
}

impl From<EngineError> for Rejection {
    fn from(err: EngineError) -> Self {
        Rejection::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_in_screaming_case() {
        assert_eq!(
            serde_json::to_value(ErrorCode::RevisionConflict).unwrap(),
            serde_json::json!("REVISION_CONFLICT")
        );
        assert_eq!(ErrorCode::InvalidState.to_string(), "INVALID_STATE");
    }

    #[test]
    fn hints_follow_error_class() {
        assert!(EngineError::conflict("stale").user_hint().contains("Refresh"));
        assert!(EngineError::permission("uid").user_hint().contains("membership"));
        assert_eq!(
            EngineError::invariant("dup").user_hint(),
            EngineError::not_found("session").user_hint()
        );
    }
}
