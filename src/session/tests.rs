#![cfg(test)]

use std::sync::Arc;

use serde_json::{json, Value};

use super::*;
use crate::config::EngineConfig;
use crate::engine::*;

const SESSION: &str = "table-1";

fn uid(player: PlayerId) -> &'static str {
    match player {
        PlayerId::Player1 => "alice",
        PlayerId::Player2 => "bob",
    }
}

fn deck(size: usize) -> Vec<DeckCard> {
    (1..=size)
        .map(|n| DeckCard {
            original_card_code: format!("SV1-{n:03}"),
            image_url: format!("https://cards.example/{n}.png"),
        })
        .collect()
}

/// Both seats claimed and both decks seeded; the session ends at revision 4.
async fn table(deck_size: usize) -> (SessionEngine, SessionId) {
    let engine = SessionEngine::in_memory(EngineConfig::default().with_seed(11));
    let id = SessionId::new(SESSION);
    engine.create_session(id.clone()).await.unwrap();
    for player in PlayerId::ALL {
        engine.claim_slot(&id, player, uid(player)).await.unwrap();
    }
    for player in PlayerId::ALL {
        engine
            .seed_deck(&id, player, uid(player), deck(deck_size))
            .await
            .unwrap();
    }
    (engine, id)
}

fn command(
    player: PlayerId,
    op: &str,
    payload: Value,
    expected_revision: Option<u64>,
) -> SubmitCommand {
    SubmitCommand {
        session_id: SessionId::new(SESSION),
        player_id: player,
        actor_uid: uid(player).to_owned(),
        op_id: op.to_owned(),
        payload,
        expected_revision,
    }
}

async fn revision(engine: &SessionEngine, id: &SessionId) -> u64 {
    engine.snapshot(id, PlayerId::Player1, "alice").await.unwrap().session.revision
}

async fn applied(engine: &SessionEngine, command: SubmitCommand) -> SubmitReceipt {
    match engine.submit(command).await.unwrap() {
        SubmitOutcome::Applied(receipt) => receipt,
        SubmitOutcome::Rejected(rejection) => panic!("unexpected rejection {rejection:?}"),
    }
}

fn assert_consistent(a: &OwnerView, b: &OwnerView) {
    let mut privates = PerPlayer::<Option<PrivateStateDoc>>::default();
    *privates.get_mut(PlayerId::Player1) = a.private_state.clone();
    *privates.get_mut(PlayerId::Player2) = b.private_state.clone();
    let violations = validate_documents(&b.session, &privates);
    assert!(violations.is_empty(), "{violations:?}");
}

#[tokio::test]
async fn claiming_both_slots_makes_the_session_ready() {
    let engine = SessionEngine::in_memory(EngineConfig::default());
    let id = SessionId::new(SESSION);
    let created = engine.create_session(id.clone()).await.unwrap();
    assert_eq!(created.status, SessionStatus::Waiting);

    let first = engine.claim_slot(&id, PlayerId::Player1, "alice").await.unwrap();
    assert_eq!(first.status, SessionStatus::Waiting);
    assert_eq!(first.revision, 1);

    let again = engine.claim_slot(&id, PlayerId::Player1, "alice").await.unwrap();
    assert_eq!(again.revision, 1);

    let err = engine.claim_slot(&id, PlayerId::Player2, "alice").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);

    let second = engine.claim_slot(&id, PlayerId::Player2, "bob").await.unwrap();
    assert_eq!(second.status, SessionStatus::Ready);

    let err = engine.claim_slot(&id, PlayerId::Player2, "mallory").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);

    let view = engine.snapshot(&id, PlayerId::Player2, "bob").await.unwrap();
    let private = view.private_state.expect("created on claim");
    assert_eq!(private.owner_player_id, PlayerId::Player2);
    assert_eq!(private.revision, 1);
}

#[tokio::test]
async fn seeding_fills_the_deck_once() {
    let (engine, id) = table(4).await;
    let view = engine.snapshot(&id, PlayerId::Player1, "alice").await.unwrap();
    let private = view.private_state.unwrap();
    assert_eq!(private.zones.deck.len(), 4);
    assert_eq!(private.card_catalog.len(), 4);
    assert_eq!(view.session.counters(PlayerId::Player1).deck_count, 4);
    assert_eq!(view.session.revision, 4);

    let err = engine
        .seed_deck(&id, PlayerId::Player1, "alice", deck(2))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);
    assert_eq!(revision(&engine, &id).await, 4);
}

#[tokio::test]
async fn wrong_uid_is_denied_without_side_effects() {
    let (engine, id) = table(3).await;
    let mut cmd = command(PlayerId::Player1, "B01", json!({"count": 1}), Some(4));
    cmd.actor_uid = "bob".into();

    let err = engine.submit(cmd).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);
    assert_eq!(revision(&engine, &id).await, 4);

    let err = engine.snapshot(&id, PlayerId::Player1, "bob").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::PermissionDenied);
}

#[tokio::test]
async fn stale_expected_revision_loses() {
    let (engine, id) = table(6).await;
    applied(&engine, command(PlayerId::Player1, "B01", json!({"count": 1}), Some(4))).await;
    assert_eq!(revision(&engine, &id).await, 5);

    // Both clients read revision 5.
    let first = applied(
        &engine,
        command(PlayerId::Player1, "B01", json!({"count": 1}), Some(5)),
    )
    .await;
    assert_eq!(first.revision, 6);

    let err = engine
        .submit(command(PlayerId::Player2, "B01", json!({"count": 1}), Some(5)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RevisionConflict);
    assert!(err.user_hint().contains("Refresh"));

    let view = engine.snapshot(&id, PlayerId::Player2, "bob").await.unwrap();
    assert_eq!(view.session.revision, 6);
    assert_eq!(view.session.counters(PlayerId::Player2).hand_count, 0);
}

#[tokio::test]
async fn direct_operations_require_an_expected_revision() {
    let (engine, id) = table(3).await;
    let outcome = engine
        .submit(command(PlayerId::Player1, "B01", json!({"count": 1}), None))
        .await
        .unwrap();
    let rejection = outcome.rejection().expect("rejected");
    assert_eq!(rejection.code, ErrorCode::InvalidState);
    assert!(rejection.message.contains("expectedRevision"));
    assert_eq!(revision(&engine, &id).await, 4);
}

#[tokio::test]
async fn revision_counts_committed_mutations_only() {
    let (engine, id) = table(10).await;
    let mut expected = 4;
    let ops = vec![
        ("A01", json!({})),
        ("B01", json!({"count": 2})),
        ("A03", json!({})),
        ("H01", json!({})),
        ("B02", json!({"count": 1})),
    ];
    let committed = ops.len() as u64;
    for (op, payload) in ops {
        let receipt =
            applied(&engine, command(PlayerId::Player1, op, payload, Some(expected))).await;
        expected += 1;
        assert_eq!(receipt.revision, expected);
    }

    let rejected = engine
        .submit(command(
            PlayerId::Player1,
            "C01",
            json!({"cardId": "player1_c099"}),
            Some(expected),
        ))
        .await
        .unwrap();
    assert!(rejected.rejection().is_some());
    let unknown = engine
        .submit(command(PlayerId::Player1, "Z01", json!({}), Some(expected)))
        .await
        .unwrap();
    assert!(unknown.rejection().is_some());

    assert_eq!(revision(&engine, &id).await, 4 + committed);
}

#[tokio::test]
async fn approved_random_discard_moves_one_card_from_the_target_hand() {
    let (engine, id) = table(5).await;
    applied(&engine, command(PlayerId::Player2, "B01", json!({"count": 3}), Some(4))).await;
    let before = engine.snapshot(&id, PlayerId::Player1, "alice").await.unwrap();
    let p1_private_revision = before.private_state.as_ref().unwrap().revision;

    let created = applied(
        &engine,
        command(PlayerId::Player1, "I02", json!({"targetPlayerId": "player2", "count": 1}), None),
    )
    .await;
    let request_id = created.effect.request_id.clone().expect("request id");
    assert!(created.private_state.is_none());
    let after_request = engine.snapshot(&id, PlayerId::Player1, "alice").await.unwrap();
    assert_eq!(after_request.private_state.unwrap().revision, p1_private_revision);

    let approved = applied(
        &engine,
        command(
            PlayerId::Player2,
            "REQUEST_APPROVE",
            json!({"requestId": request_id, "action": "approve"}),
            Some(created.revision),
        ),
    )
    .await;

    let session = &approved.session;
    assert_eq!(approved.private_state.as_ref().unwrap().zones.hand.len(), 2);
    assert_eq!(session.counters(PlayerId::Player2).hand_count, 2);
    assert_eq!(session.board(PlayerId::Player2).discard.len(), 1);
    let request = session.request(&request_id).unwrap();
    assert_eq!(request.status, RequestStatus::Completed);
    assert_eq!(request.resolved_by_player_id, Some(PlayerId::Player2));

    let a = engine.snapshot(&id, PlayerId::Player1, "alice").await.unwrap();
    let b = engine.snapshot(&id, PlayerId::Player2, "bob").await.unwrap();
    assert_consistent(&a, &b);
}

#[tokio::test]
async fn requester_cannot_approve_their_own_request() {
    let (engine, id) = table(3).await;
    let created = applied(
        &engine,
        command(PlayerId::Player1, "I01", json!({"targetPlayerId": "player2"}), None),
    )
    .await;
    let request_id = created.effect.request_id.unwrap();

    let outcome = engine
        .submit(command(
            PlayerId::Player1,
            "REQUEST_APPROVE",
            json!({"requestId": request_id, "action": "approve"}),
            Some(created.revision),
        ))
        .await
        .unwrap();
    assert_eq!(outcome.rejection().unwrap().code, ErrorCode::PermissionDenied);
    assert_eq!(revision(&engine, &id).await, created.revision);
}

#[tokio::test]
async fn rejecting_twice_changes_nothing_the_second_time() {
    let (engine, id) = table(3).await;
    let created = applied(
        &engine,
        command(PlayerId::Player1, "I01", json!({"targetPlayerId": "player2"}), None),
    )
    .await;
    let request_id = created.effect.request_id.unwrap();
    let reject = |expected| {
        command(
            PlayerId::Player2,
            "REQUEST_REJECT",
            json!({"requestId": request_id.clone(), "action": "reject"}),
            Some(expected),
        )
    };

    let first = applied(&engine, reject(created.revision)).await;
    let request = first.session.request(&request_id).unwrap();
    assert_eq!(request.status, RequestStatus::Rejected);
    assert_eq!(
        request.result,
        Some(RequestResult::Rejected {
            reason: REJECTED_BY_TARGET.to_owned()
        })
    );

    let second = engine.submit(reject(first.revision)).await.unwrap();
    assert_eq!(second.rejection().unwrap().code, ErrorCode::InvalidState);
    let view = engine.snapshot(&id, PlayerId::Player2, "bob").await.unwrap();
    assert_eq!(view.session.revision, first.revision);
    assert_eq!(view.session.request(&request_id), Some(request));
}

#[tokio::test]
async fn rejection_leaves_the_target_private_state_alone() {
    let (engine, id) = table(3).await;
    let before = engine.snapshot(&id, PlayerId::Player2, "bob").await.unwrap();
    let created = applied(
        &engine,
        command(PlayerId::Player1, "I01", json!({"targetPlayerId": "player2"}), None),
    )
    .await;
    let request_id = created.effect.request_id.unwrap();

    let rejected = applied(
        &engine,
        command(
            PlayerId::Player2,
            "REQUEST_REJECT",
            json!({"requestId": request_id, "action": "reject"}),
            Some(created.revision),
        ),
    )
    .await;
    assert!(rejected.private_state.is_none());
    assert_eq!(rejected.revision, created.revision + 1);

    let after = engine.snapshot(&id, PlayerId::Player2, "bob").await.unwrap();
    assert_eq!(after.private_state, before.private_state);
    assert_eq!(
        after.session.request(&request_id).unwrap().status,
        RequestStatus::Rejected
    );
}

#[tokio::test]
async fn racing_clients_commit_exactly_once() {
    let (engine, id) = table(4).await;
    let engine = Arc::new(engine);

    let tasks: Vec<_> = PlayerId::ALL
        .into_iter()
        .map(|player| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .submit(command(player, "B01", json!({"count": 1}), Some(4)))
                    .await
            })
        })
        .collect();

    let mut committed = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(SubmitOutcome::Applied(_)) => committed += 1,
            Err(err) if err.code() == ErrorCode::RevisionConflict => conflicts += 1,
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!((committed, conflicts), (1, 1));
    assert_eq!(revision(&engine, &id).await, 5);
}

#[tokio::test]
async fn presence_updates_bump_the_revision() {
    let (engine, id) = table(1).await;
    let revision = engine
        .set_presence(&id, PlayerId::Player2, "bob", false)
        .await
        .unwrap();
    assert_eq!(revision, 5);
    let view = engine.snapshot(&id, PlayerId::Player2, "bob").await.unwrap();
    let participant = view.session.participants.get(PlayerId::Player2).as_ref().unwrap();
    assert!(!participant.connected);
    assert_eq!(participant.uid, "bob");
}

#[tokio::test]
async fn runner_skips_private_state_when_not_touched() {
    let storage = Arc::new(InMemorySessionStorage::new());
    let engine = SessionEngine::new(storage.clone(), EngineConfig::default());
    let id = SessionId::new(SESSION);
    engine.create_session(id.clone()).await.unwrap();
    engine.claim_slot(&id, PlayerId::Player1, "alice").await.unwrap();
    let runner = TransactionRunner::new(storage.clone(), &EngineConfig::default());

    let committed = runner
        .apply_mutation(
            MutationRequest {
                session_id: id.clone(),
                player_id: PlayerId::Player1,
                actor_uid: "alice".into(),
                expected_revision: Some(1),
                touch_private_state: false,
            },
            |ctx| {
                assert!(ctx.private_state.is_none());
                ctx.session.public_state.turn_context.turn_number += 1;
                Ok::<_, EngineError>(())
            },
        )
        .await
        .unwrap();
    assert_eq!(committed.revision, 2);
    assert_eq!(committed.session.updated_by.as_deref(), Some("alice"));

    let private = storage
        .read_private_state(&id, PlayerId::Player1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(private.revision, 1);
}

#[tokio::test]
async fn runner_refuses_drafts_that_break_shape_or_counters() {
    let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());
    let id = SessionId::new(SESSION);
    let engine = SessionEngine::new(Arc::clone(&storage), EngineConfig::default());
    engine.create_session(id.clone()).await.unwrap();
    engine.claim_slot(&id, PlayerId::Player1, "alice").await.unwrap();
    let runner = TransactionRunner::new(Arc::clone(&storage), &EngineConfig::default());
    let request = MutationRequest {
        session_id: id.clone(),
        player_id: PlayerId::Player1,
        actor_uid: "alice".into(),
        expected_revision: None,
        touch_private_state: true,
    };

    let err = runner
        .apply_mutation(request.clone(), |ctx| {
            ctx.session.revision = 40;
            Ok::<_, EngineError>(())
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);

    let err = runner
        .apply_mutation(request.clone(), |ctx| {
            ctx.session.public_state.players.player1.counters.hand_count = 3;
            Ok::<_, EngineError>(())
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvariantViolation);

    let err = runner
        .apply_mutation(request, |ctx| {
            *ctx.session.participants.get_mut(PlayerId::Player2) = Some(Participant {
                uid: "mallory".into(),
                connected: true,
                joined_at: ctx.now,
            });
            Ok::<_, EngineError>(())
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidState);

    assert_eq!(storage.read_session(&id).await.unwrap().revision, 1);
}
