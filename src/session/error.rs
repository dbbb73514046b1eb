use crate::engine::EngineError;

use super::storage::DocumentPath;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(DocumentPath),
    #[error("permission denied on {0}")]
    PermissionDenied(DocumentPath),
    #[error("transaction aborted: {0} changed since it was read")]
    Aborted(DocumentPath),
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => EngineError::not_found(path.to_string()),
            StorageError::PermissionDenied(path) => {
                EngineError::permission(format!("storage refused access to {path}"))
            }
            StorageError::Aborted(path) => {
                EngineError::conflict(format!("{path} was modified concurrently"))
            }
            StorageError::Backend(msg) => EngineError::invalid(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ErrorCode, PlayerId, SessionId};

    #[test]
    fn storage_errors_translate_to_engine_codes() {
        let session = DocumentPath::session(&SessionId::new("s1"));
        let private = DocumentPath::private_state(&SessionId::new("s1"), PlayerId::Player2);

        let cases = [
            (StorageError::NotFound(session.clone()), ErrorCode::NotFound),
            (StorageError::PermissionDenied(private.clone()), ErrorCode::PermissionDenied),
            (StorageError::Aborted(session), ErrorCode::RevisionConflict),
            (StorageError::backend("disk full"), ErrorCode::InvalidState),
        ];
        for (err, code) in cases {
            assert_eq!(EngineError::from(err).code(), code);
        }
        assert_eq!(private.to_string(), "sessions/s1/privateState/player2");
    }
}
