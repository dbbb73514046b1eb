use std::fmt;

use async_trait::async_trait;

use crate::engine::{PlayerId, PrivateStateDoc, SessionDoc, SessionId};

use super::error::StorageError;

/// Path of a stored document, used for conflict reporting and logs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DocumentPath {
    Session(SessionId),
    PrivateState(SessionId, PlayerId),
}

impl DocumentPath {
    pub fn session(id: &SessionId) -> Self {
        Self::Session(id.clone())
    }

    pub fn private_state(id: &SessionId, player: PlayerId) -> Self {
        Self::PrivateState(id.clone(), player)
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentPath::Session(id) => write!(f, "sessions/{id}"),
            DocumentPath::PrivateState(id, player) => {
                write!(f, "sessions/{id}/privateState/{player}")
            }
        }
    }
}

/// Document store with transactional read-modify-write.
///
/// A transaction remembers the revision of every document it loads. Commit
/// succeeds only if none of those documents changed in the meantime; the
/// loser of a race gets [`StorageError::Aborted`] and nothing it staged is
/// written.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn SessionStorageTxn + Send>, StorageError>;

    /// Inserts a new session document; fails if the id is taken.
    async fn create_session(&self, id: &SessionId, doc: SessionDoc) -> Result<(), StorageError>;

    async fn read_session(&self, id: &SessionId) -> Result<SessionDoc, StorageError>;

    async fn read_private_state(
        &self,
        id: &SessionId,
        player: PlayerId,
    ) -> Result<Option<PrivateStateDoc>, StorageError>;
}

#[async_trait]
pub trait SessionStorageTxn: Send {
    async fn load_session(&mut self, id: &SessionId) -> Result<SessionDoc, StorageError>;

    /// `Ok(None)` when the document does not exist yet; the absence is
    /// tracked too, so a concurrent creation aborts this transaction.
    async fn load_private_state(
        &mut self,
        id: &SessionId,
        player: PlayerId,
    ) -> Result<Option<PrivateStateDoc>, StorageError>;

    fn stage_session(&mut self, id: &SessionId, doc: SessionDoc);

    fn stage_private_state(&mut self, id: &SessionId, doc: PrivateStateDoc);

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>);
}

pub mod in_memory;
pub use in_memory::InMemorySessionStorage;
