use chrono::{DateTime, Utc};
use rand::rngs::StdRng;

use super::errors::EngineError;
use super::state::{PrivateStateDoc, SessionDoc};
use super::types::PlayerId;

/// Mutable drafts owned by one transaction.
///
/// Created by the transaction runner from the documents it read, threaded by
/// `&mut` through the applier, and consumed again on commit. Nothing outside
/// the transaction holds a reference to it.
pub struct TxnContext {
    pub session: SessionDoc,
    /// The acting player's private document, when the transaction loaded it.
    pub private_state: Option<PrivateStateDoc>,
    pub actor: PlayerId,
    pub now: DateTime<Utc>,
    pub rng: StdRng,
}

impl TxnContext {
    pub fn new(
        session: SessionDoc,
        private_state: Option<PrivateStateDoc>,
        actor: PlayerId,
        now: DateTime<Utc>,
        rng: StdRng,
    ) -> Self {
        Self {
            session,
            private_state,
            actor,
            now,
            rng,
        }
    }

    /// Private document of `owner`, which must be the one loaded here.
    pub fn private_for(&mut self, owner: PlayerId) -> Result<&mut PrivateStateDoc, EngineError> {
        self.private_state
            .as_mut()
            .filter(|doc| doc.owner_player_id == owner)
            .ok_or_else(|| {
                EngineError::invalid(format!(
                    "private state of {owner} is not available in this transaction"
                ))
            })
    }

    pub fn into_parts(self) -> (SessionDoc, Option<PrivateStateDoc>) {
        (self.session, self.private_state)
    }
}
