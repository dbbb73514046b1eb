use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::engine::{PlayerId, PrivateStateDoc, SessionDoc, SessionId};

use super::{DocumentPath, SessionStorage, SessionStorageTxn};
use crate::session::error::StorageError;

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionId, SessionDoc>,
    private_states: HashMap<(SessionId, PlayerId), PrivateStateDoc>,
}

impl Inner {
    /// Current revision at `path`, `None` when the document is absent.
    fn revision_at(&self, path: &DocumentPath) -> Option<u64> {
        match path {
            DocumentPath::Session(id) => self.sessions.get(id).map(|doc| doc.revision),
            DocumentPath::PrivateState(id, player) => self
                .private_states
                .get(&(id.clone(), *player))
                .map(|doc| doc.revision),
        }
    }
}

/// Process-local store. Clones share the same documents.
#[derive(Clone, Default)]
pub struct InMemorySessionStorage {
    inner: Arc<RwLock<Inner>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct InMemorySessionTxn {
    inner: Arc<RwLock<Inner>>,
    observed: HashMap<DocumentPath, Option<u64>>,
    sessions: Vec<(SessionId, SessionDoc)>,
    private_states: Vec<(SessionId, PrivateStateDoc)>,
}

impl InMemorySessionTxn {
    fn observe(&mut self, path: DocumentPath, revision: Option<u64>) {
        // The first read fixes the revision the commit is checked against.
        self.observed.entry(path).or_insert(revision);
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn begin(&self) -> Result<Box<dyn SessionStorageTxn + Send>, StorageError> {
        Ok(Box::new(InMemorySessionTxn {
            inner: Arc::clone(&self.inner),
            observed: HashMap::new(),
            sessions: Vec::new(),
            private_states: Vec::new(),
        }))
    }

    async fn create_session(&self, id: &SessionId, doc: SessionDoc) -> Result<(), StorageError> {
        let mut inner = self.inner.write();
        if inner.sessions.contains_key(id) {
            return Err(StorageError::backend(format!(
                "{} already exists",
                DocumentPath::session(id)
            )));
        }
        inner.sessions.insert(id.clone(), doc);
        Ok(())
    }

    async fn read_session(&self, id: &SessionId) -> Result<SessionDoc, StorageError> {
        self.inner
            .read()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(DocumentPath::session(id)))
    }

    async fn read_private_state(
        &self,
        id: &SessionId,
        player: PlayerId,
    ) -> Result<Option<PrivateStateDoc>, StorageError> {
        Ok(self
            .inner
            .read()
            .private_states
            .get(&(id.clone(), player))
            .cloned())
    }
}

#[async_trait]
impl SessionStorageTxn for InMemorySessionTxn {
    async fn load_session(&mut self, id: &SessionId) -> Result<SessionDoc, StorageError> {
        let doc = self
            .inner
            .read()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(DocumentPath::session(id)))?;
        self.observe(DocumentPath::session(id), Some(doc.revision));
        Ok(doc)
    }

    async fn load_private_state(
        &mut self,
        id: &SessionId,
        player: PlayerId,
    ) -> Result<Option<PrivateStateDoc>, StorageError> {
        let doc = self
            .inner
            .read()
            .private_states
            .get(&(id.clone(), player))
            .cloned();
        self.observe(
            DocumentPath::private_state(id, player),
            doc.as_ref().map(|d| d.revision),
        );
        Ok(doc)
    }

    fn stage_session(&mut self, id: &SessionId, doc: SessionDoc) {
        self.sessions.push((id.clone(), doc));
    }

    fn stage_private_state(&mut self, id: &SessionId, doc: PrivateStateDoc) {
        self.private_states.push((id.clone(), doc));
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemorySessionTxn {
            inner,
            observed,
            sessions,
            private_states,
        } = *self;
        let mut guard = inner.write();

        for (path, revision) in observed.iter() {
            if guard.revision_at(path) != *revision {
                return Err(StorageError::Aborted(path.clone()));
            }
        }
        let staged_paths = sessions
            .iter()
            .map(|(id, _)| DocumentPath::session(id))
            .chain(
                private_states
                    .iter()
                    .map(|(id, doc)| DocumentPath::private_state(id, doc.owner_player_id)),
            );
        for path in staged_paths {
            if !observed.contains_key(&path) {
                return Err(StorageError::backend(format!(
                    "{path} was staged without being read in this transaction"
                )));
            }
        }

        for (id, doc) in sessions {
            guard.sessions.insert(id, doc);
        }
        for (id, doc) in private_states {
            let key = (id, doc.owner_player_id);
            guard.private_states.insert(key, doc);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    fn bumped(mut doc: SessionDoc) -> SessionDoc {
        doc.revision += 1;
        doc
    }

    #[tokio::test]
    async fn commit_publishes_staged_documents() {
        let storage = InMemorySessionStorage::new();
        let id = SessionId::new("s1");
        let (session, _) = fixtures::seeded_pair(2, 1);
        storage.create_session(&id, session).await.unwrap();

        let mut txn = storage.begin().await.unwrap();
        let doc = txn.load_session(&id).await.unwrap();
        assert!(txn.load_private_state(&id, PlayerId::Player1).await.unwrap().is_none());
        txn.stage_session(&id, bumped(doc));
        txn.stage_private_state(&id, fixtures::private_state(PlayerId::Player1, 2, 1));
        txn.commit().await.unwrap();

        assert_eq!(storage.read_session(&id).await.unwrap().revision, 1);
        assert!(storage
            .read_private_state(&id, PlayerId::Player1)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn interleaved_transactions_abort_the_later_commit() {
        let storage = InMemorySessionStorage::new();
        let id = SessionId::new("s1");
        let (session, _) = fixtures::seeded_pair(0, 0);
        storage.create_session(&id, session).await.unwrap();

        let mut first = storage.begin().await.unwrap();
        let mut second = storage.begin().await.unwrap();
        let a = first.load_session(&id).await.unwrap();
        let b = second.load_session(&id).await.unwrap();
        first.stage_session(&id, bumped(a));
        second.stage_session(&id, bumped(b));

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StorageError::Aborted(DocumentPath::Session(_))));
        assert_eq!(storage.read_session(&id).await.unwrap().revision, 1);
    }

    #[tokio::test]
    async fn concurrent_private_creation_aborts() {
        let storage = InMemorySessionStorage::new();
        let id = SessionId::new("s1");
        storage
            .create_session(&id, fixtures::seeded_pair(0, 0).0)
            .await
            .unwrap();

        let mut slow = storage.begin().await.unwrap();
        assert!(slow.load_private_state(&id, PlayerId::Player2).await.unwrap().is_none());

        let mut fast = storage.begin().await.unwrap();
        fast.load_private_state(&id, PlayerId::Player2).await.unwrap();
        fast.stage_private_state(&id, fixtures::private_state(PlayerId::Player2, 1, 0));
        fast.commit().await.unwrap();

        slow.stage_private_state(&id, fixtures::private_state(PlayerId::Player2, 3, 0));
        assert!(matches!(
            slow.commit().await,
            Err(StorageError::Aborted(DocumentPath::PrivateState(_, PlayerId::Player2)))
        ));
    }

    #[tokio::test]
    async fn missing_session_and_blind_writes_fail() {
        let storage = InMemorySessionStorage::new();
        let id = SessionId::new("nope");
        assert!(matches!(
            storage.read_session(&id).await,
            Err(StorageError::NotFound(_))
        ));

        let mut txn = storage.begin().await.unwrap();
        txn.stage_session(&id, fixtures::seeded_pair(0, 0).0);
        assert!(matches!(txn.commit().await, Err(StorageError::Backend(_))));
    }
}
