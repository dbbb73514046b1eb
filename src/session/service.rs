use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::engine::*;

use super::runner::{CommittedMutation, MutationRequest, TransactionRunner};
use super::storage::{InMemorySessionStorage, SessionStorage};

const LOG_TARGET: &str = "session::service";

/// One operation submitted by a client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommand {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub actor_uid: String,
    pub op_id: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub expected_revision: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub op_id: OperationId,
    pub revision: u64,
    pub effect: ActionEffect,
    pub session: SessionDoc,
    pub private_state: Option<PrivateStateDoc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SubmitOutcome {
    Applied(SubmitReceipt),
    Rejected(Rejection),
}

impl SubmitOutcome {
    pub fn receipt(&self) -> Option<&SubmitReceipt> {
        match self {
            SubmitOutcome::Applied(receipt) => Some(receipt),
            SubmitOutcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            SubmitOutcome::Applied(_) => None,
            SubmitOutcome::Rejected(rejection) => Some(rejection),
        }
    }
}

/// A card handed to [`SessionEngine::seed_deck`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckCard {
    pub original_card_code: String,
    pub image_url: String,
}

/// What one player may read: the shared document plus their own private one.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerView {
    pub session: SessionDoc,
    pub private_state: Option<PrivateStateDoc>,
}

enum SubmitFailure {
    Rejected(Rejection),
    Engine(EngineError),
}

impl From<EngineError> for SubmitFailure {
    fn from(err: EngineError) -> Self {
        SubmitFailure::Engine(err)
    }
}

/// Entry point tying the intent pipeline to the transaction runner.
pub struct SessionEngine {
    runner: TransactionRunner,
    config: EngineConfig,
}

impl SessionEngine {
    pub fn new(storage: Arc<dyn SessionStorage>, config: EngineConfig) -> Self {
        Self {
            runner: TransactionRunner::new(storage, &config),
            config,
        }
    }

    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(InMemorySessionStorage::new()), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn storage(&self) -> &Arc<dyn SessionStorage> {
        self.runner.storage()
    }

    pub async fn create_session(&self, id: SessionId) -> Result<SessionDoc, EngineError> {
        let doc = SessionDoc::new(Utc::now(), self.config.bench_capacity);
        self.storage().create_session(&id, doc.clone()).await?;
        tracing::info!(target = LOG_TARGET, session = %id, "session created");
        Ok(doc)
    }

    /// Binds `uid` to `player`, creating that player's private document.
    ///
    /// Claiming a slot already held by the same uid is a no-op. The session
    /// becomes ready once both slots are bound.
    pub async fn claim_slot(
        &self,
        id: &SessionId,
        player: PlayerId,
        uid: &str,
    ) -> Result<SessionDoc, EngineError> {
        let mut txn = self.storage().begin().await?;
        let mut session = match txn.load_session(id).await {
            Ok(session) => session,
            Err(err) => {
                txn.rollback().await;
                return Err(err.into());
            }
        };

        if let Err(err) = check_claim(&session, player, uid) {
            txn.rollback().await;
            return Err(err);
        }
        if session.participant_uid(player) == Some(uid) {
            txn.rollback().await;
            return Ok(session);
        }

        let now = Utc::now();
        let private_state = match txn.load_private_state(id, player).await {
            Ok(existing) => existing,
            Err(err) => {
                txn.rollback().await;
                return Err(err.into());
            }
        };
        if private_state.is_none() {
            let mut doc = PrivateStateDoc::new(player, now);
            doc.revision = 1;
            doc.updated_by = Some(uid.to_owned());
            txn.stage_private_state(id, doc);
        }

        *session.participants.get_mut(player) = Some(Participant {
            uid: uid.to_owned(),
            connected: true,
            joined_at: now,
        });
        if session.participants.iter().all(|(_, p)| p.is_some()) {
            session.status.advance_to(SessionStatus::Ready);
        }
        session.revision += 1;
        session.updated_at = now;
        session.updated_by = Some(uid.to_owned());
        txn.stage_session(id, session.clone());
        txn.commit().await?;

        tracing::info!(
            target = LOG_TARGET,
            session = %id,
            player = %player,
            status = ?session.status,
            "slot claimed"
        );
        Ok(session)
    }

    /// Creates a card entity per entry and stacks them face down in the
    /// owner's deck, `cards[0]` on top.
    pub async fn seed_deck(
        &self,
        id: &SessionId,
        player: PlayerId,
        uid: &str,
        cards: Vec<DeckCard>,
    ) -> Result<CommittedMutation<Vec<CardId>>, EngineError> {
        let request = MutationRequest {
            session_id: id.clone(),
            player_id: player,
            actor_uid: uid.to_owned(),
            expected_revision: None,
            touch_private_state: true,
        };
        self.runner
            .apply_mutation(request, move |ctx| -> Result<Vec<CardId>, EngineError> {
                let now = ctx.now;
                let doc = ctx.private_for(player)?;
                if !doc.card_catalog.is_empty() {
                    return Err(EngineError::invalid(format!("{player} deck is already seeded")));
                }
                let mut refs = Vec::with_capacity(cards.len());
                for card in cards {
                    let card_id = CardId::new(player, doc.next_card_sequence());
                    doc.card_catalog.insert(
                        card_id.clone(),
                        CardEntity {
                            card_id: card_id.clone(),
                            image_url: card.image_url,
                            original_card_code: card.original_card_code,
                            owner_player_id: player,
                            created_at: now,
                        },
                    );
                    refs.push(CardRef {
                        card_id,
                        orientation: Orientation::Vertical,
                        is_face_down: true,
                        visibility: Visibility::OwnerOnly,
                        image_url: None,
                    });
                }
                let ids = refs.iter().map(|card| card.card_id.clone()).collect();
                doc.zones.deck.insert_top_all(refs);
                sync_counters(ctx);
                Ok(ids)
            })
            .await
    }

    pub async fn set_presence(
        &self,
        id: &SessionId,
        player: PlayerId,
        uid: &str,
        connected: bool,
    ) -> Result<u64, EngineError> {
        let request = MutationRequest {
            session_id: id.clone(),
            player_id: player,
            actor_uid: uid.to_owned(),
            expected_revision: None,
            touch_private_state: false,
        };
        let committed = self
            .runner
            .apply_mutation(request, move |ctx| {
                let participant = ctx
                    .session
                    .participants
                    .get_mut(player)
                    .as_mut()
                    .ok_or_else(|| EngineError::not_found(format!("participant {player}")))?;
                participant.connected = connected;
                Ok::<_, EngineError>(())
            })
            .await?;
        Ok(committed.revision)
    }

    /// Reads the owner view of `player`; only the bound uid may read it.
    pub async fn snapshot(
        &self,
        id: &SessionId,
        player: PlayerId,
        uid: &str,
    ) -> Result<OwnerView, EngineError> {
        let session = self.storage().read_session(id).await?;
        if session.participant_uid(player) != Some(uid) {
            return Err(EngineError::permission(format!("{uid} is not bound to {player}")));
        }
        let private_state = self.storage().read_private_state(id, player).await?;
        Ok(OwnerView {
            session,
            private_state,
        })
    }

    /// Builds, resolves and applies one operation in a single transaction.
    ///
    /// Payload and resolver failures come back as [`SubmitOutcome::Rejected`]
    /// without touching storage. Permission, staleness, storage and
    /// invariant failures are returned as errors.
    pub async fn submit(&self, command: SubmitCommand) -> Result<SubmitOutcome, EngineError> {
        let intent = match build_intent_from_wire(&command.op_id, &command.payload) {
            Ok(intent) => intent,
            Err(err) => {
                tracing::debug!(
                    target = LOG_TARGET,
                    op = %command.op_id,
                    error = %err,
                    "payload rejected"
                );
                return Ok(SubmitOutcome::Rejected(Rejection::invalid(err.to_string())));
            }
        };
        let op_id = intent.op_id();
        if op_id.mode().requires_expected_revision() && command.expected_revision.is_none() {
            return Ok(SubmitOutcome::Rejected(Rejection::invalid(format!(
                "{op_id} requires expectedRevision"
            ))));
        }

        let request = MutationRequest {
            session_id: command.session_id.clone(),
            player_id: command.player_id,
            actor_uid: command.actor_uid.clone(),
            expected_revision: command.expected_revision,
            touch_private_state: op_id.touches_private_state(),
        };
        let config = &self.config;
        let intent = &intent;
        let result = self
            .runner
            .apply_mutation(request, move |ctx| {
                match resolve(intent, &ctx.session, ctx.private_state.as_ref(), ctx.actor, config) {
                    Resolution::Accepted(action) => {
                        apply_action(ctx, &action).map_err(SubmitFailure::Engine)
                    }
                    Resolution::Rejected(rejection) => Err(SubmitFailure::Rejected(rejection)),
                }
            })
            .await;

        match result {
            Ok(committed) => Ok(SubmitOutcome::Applied(SubmitReceipt {
                op_id,
                revision: committed.revision,
                effect: committed.output,
                session: committed.session,
                private_state: committed.private_state,
            })),
            Err(SubmitFailure::Rejected(rejection)) => {
                tracing::debug!(
                    target = LOG_TARGET,
                    session = %command.session_id,
                    op = %op_id,
                    code = %rejection.code,
                    reason = %rejection.message,
                    "operation rejected"
                );
                Ok(SubmitOutcome::Rejected(rejection))
            }
            Err(SubmitFailure::Engine(err)) => Err(err),
        }
    }
}

fn check_claim(session: &SessionDoc, player: PlayerId, uid: &str) -> Result<(), EngineError> {
    if !session.status.accepts_actions() {
        return Err(EngineError::invalid(format!(
            "session is {:?} and cannot be joined",
            session.status
        )));
    }
    match session.participant_uid(player) {
        Some(bound) if bound != uid => {
            return Err(EngineError::permission(format!("{player} is held by another user")));
        }
        _ => {}
    }
    if session.participant_uid(player.other()) == Some(uid) {
        return Err(EngineError::permission(format!(
            "{uid} already holds {}",
            player.other()
        )));
    }
    Ok(())
}
