use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::engine::{
    check_session_shape, EngineError, PlayerId, PrivateStateDoc, SessionDoc, SessionId, TxnContext,
};

use super::storage::{DocumentPath, SessionStorage, SessionStorageTxn};

const LOG_TARGET: &str = "session::runner";

/// Who is mutating which session, and against which revision.
#[derive(Clone, Debug)]
pub struct MutationRequest {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub actor_uid: String,
    /// Revision the caller last read; `None` skips the staleness check.
    pub expected_revision: Option<u64>,
    /// Load, and on commit write, the actor's private document.
    pub touch_private_state: bool,
}

/// Documents as written by a successful commit.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedMutation<T> {
    pub session: SessionDoc,
    pub private_state: Option<PrivateStateDoc>,
    pub revision: u64,
    pub output: T,
}

/// Runs mutations as single read-modify-write storage transactions.
pub struct TransactionRunner {
    storage: Arc<dyn SessionStorage>,
    bench_capacity: usize,
    rng: Mutex<StdRng>,
}

impl TransactionRunner {
    pub fn new(storage: Arc<dyn SessionStorage>, config: &EngineConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            storage,
            bench_capacity: config.bench_capacity,
            rng: Mutex::new(rng),
        }
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Loads the documents, runs `mutate` on drafts and commits both drafts
    /// with their revisions bumped, or nothing at all.
    ///
    /// Any error from `mutate` rolls the transaction back unchanged. Errors
    /// the runner raises itself are converted into `E`, so callers can carry
    /// their own failure type through the closure.
    pub async fn apply_mutation<T, E, F>(
        &self,
        request: MutationRequest,
        mutate: F,
    ) -> Result<CommittedMutation<T>, E>
    where
        F: FnOnce(&mut TxnContext) -> Result<T, E> + Send,
        E: From<EngineError>,
    {
        let mut txn = self.storage.begin().await.map_err(EngineError::from)?;
        tracing::debug!(
            target = LOG_TARGET,
            session = %request.session_id,
            player = %request.player_id,
            expected_revision = ?request.expected_revision,
            "transaction started"
        );

        let prepared = match self.load(txn.as_mut(), &request).await {
            Ok(prepared) => prepared,
            Err(err) => {
                txn.rollback().await;
                return Err(err.into());
            }
        };

        let mut ctx = TxnContext::new(
            prepared.session,
            prepared.private_state,
            request.player_id,
            Utc::now(),
            self.txn_rng(),
        );
        let bindings = uid_bindings(&ctx.session);
        let revision = ctx.session.revision;

        let output = match mutate(&mut ctx) {
            Ok(output) => output,
            Err(err) => {
                tracing::debug!(
                    target = LOG_TARGET,
                    session = %request.session_id,
                    "mutation failed; rolling back"
                );
                txn.rollback().await;
                return Err(err);
            }
        };

        let (mut session, mut private_state) = ctx.into_parts();
        let checked = check_session_shape(&session, self.bench_capacity, revision)
            .and_then(|()| {
                if uid_bindings(&session) != bindings {
                    return Err(EngineError::invalid("mutation must not rebind participants"));
                }
                Ok(())
            })
            .and_then(|()| match private_state.as_ref() {
                Some(doc) => ensure_counters_match(&session, doc),
                None => Ok(()),
            });
        if let Err(err) = checked {
            tracing::warn!(
                target = LOG_TARGET,
                session = %request.session_id,
                player = %request.player_id,
                error = %err,
                "draft failed pre-commit checks; aborting"
            );
            txn.rollback().await;
            return Err(err.into());
        }

        let now = Utc::now();
        session.revision = revision + 1;
        session.updated_at = now;
        session.updated_by = Some(request.actor_uid.clone());
        txn.stage_session(&request.session_id, session.clone());
        if request.touch_private_state {
            if let Some(doc) = private_state.as_mut() {
                doc.revision += 1;
                doc.updated_at = now;
                doc.updated_by = Some(request.actor_uid.clone());
                txn.stage_private_state(&request.session_id, doc.clone());
            }
        }

        if let Err(err) = txn.commit().await {
            tracing::info!(
                target = LOG_TARGET,
                session = %request.session_id,
                player = %request.player_id,
                error = %err,
                "commit lost a concurrent write"
            );
            return Err(EngineError::from(err).into());
        }

        tracing::info!(
            target = LOG_TARGET,
            session = %request.session_id,
            player = %request.player_id,
            revision = session.revision,
            "mutation committed"
        );
        Ok(CommittedMutation {
            revision: session.revision,
            session,
            private_state,
            output,
        })
    }

    async fn load(
        &self,
        txn: &mut (dyn SessionStorageTxn + Send),
        request: &MutationRequest,
    ) -> Result<Prepared, EngineError> {
        let session = txn.load_session(&request.session_id).await?;

        match session.participant_uid(request.player_id) {
            Some(uid) if uid == request.actor_uid => {}
            _ => {
                tracing::warn!(
                    target = LOG_TARGET,
                    session = %request.session_id,
                    player = %request.player_id,
                    "actor uid does not hold the slot"
                );
                return Err(EngineError::permission(format!(
                    "{} is not bound to {}",
                    request.actor_uid, request.player_id
                )));
            }
        }

        if let Some(expected) = request.expected_revision {
            if expected != session.revision {
                tracing::info!(
                    target = LOG_TARGET,
                    session = %request.session_id,
                    expected,
                    actual = session.revision,
                    "stale expected revision"
                );
                return Err(EngineError::conflict(format!(
                    "expected revision {expected} but {} is at {}",
                    DocumentPath::session(&request.session_id),
                    session.revision
                )));
            }
        }

        let private_state = if request.touch_private_state {
            let existing = txn
                .load_private_state(&request.session_id, request.player_id)
                .await?;
            Some(existing.unwrap_or_else(|| PrivateStateDoc::new(request.player_id, Utc::now())))
        } else {
            None
        };

        Ok(Prepared {
            session,
            private_state,
        })
    }

    fn txn_rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.rng.lock().gen())
    }
}

struct Prepared {
    session: SessionDoc,
    private_state: Option<PrivateStateDoc>,
}

fn uid_bindings(session: &SessionDoc) -> [Option<String>; 2] {
    PlayerId::ALL.map(|player| session.participant_uid(player).map(str::to_owned))
}

fn ensure_counters_match(session: &SessionDoc, doc: &PrivateStateDoc) -> Result<(), EngineError> {
    let owner = doc.owner_player_id;
    let counters = session.counters(owner);
    if counters.deck_count != doc.zones.deck.len() || counters.hand_count != doc.zones.hand.len() {
        return Err(EngineError::invariant(format!(
            "{owner} counters {}/{} disagree with deck {} and hand {}",
            counters.deck_count,
            counters.hand_count,
            doc.zones.deck.len(),
            doc.zones.hand.len()
        )));
    }
    Ok(())
}
