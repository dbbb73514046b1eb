use std::collections::HashMap;

use serde_json::Value;

use super::errors::EngineError;
use super::state::*;
use super::types::{CardId, PerPlayer, PlayerId};

/// Documents that can check their own structural invariants.
pub trait InvariantCheck {
    fn validate_invariants(&self) -> Result<(), EngineError>;
}

impl InvariantCheck for PrivateStateDoc {
    fn validate_invariants(&self) -> Result<(), EngineError> {
        let violations = catalog_violations(self);
        match violations.into_iter().next() {
            Some(first) => Err(EngineError::invariant(first)),
            None => Ok(()),
        }
    }
}

/// Where a card was seen, for duplicate reports.
#[derive(Clone, Debug)]
struct Location {
    owner: PlayerId,
    zone: String,
}

/// Checks card uniqueness, catalog ownership and counter sync across the
/// session and whichever private documents are supplied.
///
/// Returns every violation found; an empty list means the documents are
/// consistent. Cards owned by a player whose private document is absent are
/// only checked for uniqueness.
pub fn validate_documents(
    session: &SessionDoc,
    private_states: &PerPlayer<Option<PrivateStateDoc>>,
) -> Vec<String> {
    let mut violations = Vec::new();
    let mut seen: HashMap<CardId, Location> = HashMap::new();

    let mut record = |id: &CardId, owner: PlayerId, zone: &str, violations: &mut Vec<String>| {
        let location = Location {
            owner,
            zone: zone.to_owned(),
        };
        if let Some(previous) = seen.insert(id.clone(), location) {
            violations.push(format!(
                "card {id} appears in {}.{} and {owner}.{zone}",
                previous.owner, previous.zone
            ));
        }
    };

    for (player, public) in session.public_state.players.iter() {
        let board = &public.board;
        if let Some(active) = board.active.as_ref() {
            for id in active.card_ids.iter() {
                record(id, player, "active", &mut violations);
            }
        }
        for (index, stack) in board.bench.iter().enumerate() {
            for id in stack.iter().flat_map(|s| s.card_ids.iter()) {
                record(id, player, &format!("bench[{index}]"), &mut violations);
            }
        }
        for stack in board.stacks() {
            let stray = stack.card_images.keys().find(|id| !stack.card_ids.contains_id(id));
            if let Some(id) = stray {
                violations.push(format!(
                    "{player} stack {} keeps an image for {id} it does not hold",
                    stack.stack_id
                ));
            }
        }
        let piles = [
            ("discard", &board.discard),
            ("lostZone", &board.lost_zone),
            ("prize", &board.prize),
            ("reveal", &board.reveal),
        ];
        for (zone, pile) in piles {
            for card in pile.iter() {
                record(&card.card_id, player, zone, &mut violations);
            }
        }
    }
    if let Some(stadium) = session.public_state.stadium.as_ref() {
        record(&stadium.card_id, stadium.owner_player_id, "stadium", &mut violations);
    }
    for (player, private) in private_states.iter() {
        let Some(private) = private.as_ref() else {
            continue;
        };
        let zones = [
            ("deck", &private.zones.deck),
            ("hand", &private.zones.hand),
            ("deckPeek", &private.zones.deck_peek),
        ];
        for (zone, pile) in zones {
            for card in pile.iter() {
                record(&card.card_id, player, zone, &mut violations);
            }
        }
    }

    for (player, private) in private_states.iter() {
        let Some(private) = private.as_ref() else {
            continue;
        };
        if private.owner_player_id != player {
            violations.push(format!(
                "private state stored for {player} is owned by {}",
                private.owner_player_id
            ));
        }
        violations.extend(catalog_violations(private));

        for (id, location) in seen.iter().filter(|(_, loc)| loc.owner == player) {
            if !private.card_catalog.contains_key(id) {
                violations.push(format!(
                    "card {id} in {player}.{} is missing from the catalog",
                    location.zone
                ));
            }
        }
        for id in private.card_catalog.keys() {
            if !seen.contains_key(id) {
                violations.push(format!("catalog entry {id} of {player} is in no zone"));
            }
        }

        let counters = session.counters(player);
        if counters.deck_count != private.zones.deck.len() {
            violations.push(format!(
                "{player} deckCount is {} but the deck holds {}",
                counters.deck_count,
                private.zones.deck.len()
            ));
        }
        if counters.hand_count != private.zones.hand.len() {
            violations.push(format!(
                "{player} handCount is {} but the hand holds {}",
                counters.hand_count,
                private.zones.hand.len()
            ));
        }
    }

    violations
}

/// Fails on the first violation reported by [`validate_documents`].
pub fn ensure_valid(
    session: &SessionDoc,
    private_states: &PerPlayer<Option<PrivateStateDoc>>,
) -> Result<(), EngineError> {
    match validate_documents(session, private_states).into_iter().next() {
        Some(first) => Err(EngineError::invariant(first)),
        None => Ok(()),
    }
}

fn catalog_violations(private: &PrivateStateDoc) -> Vec<String> {
    let owner = private.owner_player_id;
    let mut violations = Vec::new();
    for (key, entity) in private.card_catalog.iter() {
        if key != &entity.card_id {
            violations.push(format!("catalog key {key} holds entity {}", entity.card_id));
        }
        if entity.owner_player_id != owner {
            violations.push(format!(
                "catalog entry {key} is owned by {} inside {owner}'s catalog",
                entity.owner_player_id
            ));
        }
    }
    violations
}

/// Minimal shape check run on a session draft before it is committed.
pub fn check_session_shape(
    session: &SessionDoc,
    bench_capacity: usize,
    expected_revision: u64,
) -> Result<(), EngineError> {
    if session.version != DOCUMENT_VERSION {
        return Err(EngineError::invalid(format!(
            "session version {} is not {DOCUMENT_VERSION}",
            session.version
        )));
    }
    if session.revision != expected_revision {
        return Err(EngineError::invalid("mutation must not edit the session revision"));
    }
    for (player, public) in session.public_state.players.iter() {
        let bench = public.board.bench.len();
        if bench != bench_capacity {
            return Err(EngineError::invalid(format!(
                "{player} bench has {bench} slots, expected {bench_capacity}"
            )));
        }
        if public.board.stacks().any(StackRef::is_empty) {
            return Err(EngineError::invalid(format!("{player} board holds an empty stack")));
        }
    }
    Ok(())
}

const ORIENTATIONS: [&str; 2] = ["vertical", "horizontal"];

/// Structural checks on an untyped session document: `active` and bench
/// slots must be null or an object, and every orientation must be known.
pub fn validate_raw_session(session: &Value) -> Vec<String> {
    let mut violations = Vec::new();
    let Some(players) = session.pointer("/publicState/players").and_then(Value::as_object) else {
        violations.push("publicState.players is missing".to_owned());
        return violations;
    };

    for (player, state) in players {
        let board = &state["board"];
        match &board["active"] {
            Value::Null | Value::Object(_) => {}
            other => violations.push(format!(
                "{player}.active must be null or an object, found {}",
                json_kind(other)
            )),
        }
        if let Some(bench) = board["bench"].as_array() {
            for (index, slot) in bench.iter().enumerate() {
                if !matches!(slot, Value::Null | Value::Object(_)) {
                    violations.push(format!(
                        "{player}.bench[{index}] must be null or an object, found {}",
                        json_kind(slot)
                    ));
                }
            }
        }
        collect_orientations(board, &format!("{player}.board"), &mut violations);
    }
    violations
}

fn collect_orientations(value: &Value, path: &str, violations: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(orientation) = map.get("orientation") {
                let known = orientation
                    .as_str()
                    .is_some_and(|s| ORIENTATIONS.contains(&s));
                if !known {
                    violations.push(format!("{path}.orientation has invalid value {orientation}"));
                }
            }
            for (key, child) in map {
                collect_orientations(child, &format!("{path}.{key}"), violations);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_orientations(child, &format!("{path}[{index}]"), violations);
            }
        }
        _ => {}
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::errors::ErrorCode;
    use crate::test_utils::fixtures;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn seeded_documents_are_valid() {
        let (session, privates) = fixtures::seeded_pair(3, 2);
        assert!(validate_documents(&session, &privates).is_empty());
        assert!(ensure_valid(&session, &privates).is_ok());
    }

    #[test]
    fn duplicate_card_is_reported() {
        let (mut session, privates) = fixtures::seeded_pair(3, 2);
        let card = privates.player1.as_ref().unwrap().zones.hand.iter().next().unwrap().clone();
        session.board_mut(PlayerId::Player1).discard.insert_top(card);
        let violations = validate_documents(&session, &privates);
        assert!(violations.iter().any(|v| v.contains("appears in")), "{violations:?}");
    }

    #[test]
    fn stack_image_for_a_missing_card_is_reported() {
        let (mut session, mut privates) = fixtures::seeded_pair(3, 2);
        let p1 = privates.player1.as_mut().unwrap();
        let hand = fixtures::hand_ids(p1);
        fixtures::place_stack(&mut session, p1, StackSlot::Active, &hand[..1]);
        assert!(validate_documents(&session, &privates).is_empty());

        let active = session.board_mut(PlayerId::Player1).active.as_mut().unwrap();
        active.card_images.insert(hand[1].clone(), "https://cards.example/x.png".into());
        let violations = validate_documents(&session, &privates);
        assert!(violations.iter().any(|v| v.contains("keeps an image")), "{violations:?}");
    }

    #[test]
    fn stale_counter_is_reported() {
        let (mut session, privates) = fixtures::seeded_pair(3, 2);
        session.public_state.players.player2.counters.hand_count = 7;
        let err = ensure_valid(&session, &privates).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(msg) if msg.contains("handCount")));
    }

    #[test]
    fn orphaned_and_foreign_catalog_entries_are_reported() {
        let (session, mut privates) = fixtures::seeded_pair(1, 1);
        let p1 = privates.player1.as_mut().unwrap();
        let orphan = CardId::new(PlayerId::Player1, 99);
        p1.card_catalog.insert(
            orphan.clone(),
            CardEntity {
                card_id: orphan.clone(),
                image_url: "https://cards.example/99.png".into(),
                original_card_code: "X-99".into(),
                owner_player_id: PlayerId::Player2,
                created_at: Utc::now(),
            },
        );
        let violations = validate_documents(&session, &privates);
        assert!(violations.iter().any(|v| v.contains("is in no zone")));
        assert!(violations.iter().any(|v| v.contains("is owned by player2")));
        assert!(privates.player1.as_ref().unwrap().validate_invariants().is_err());
    }

    #[test]
    fn raw_session_rejects_array_active_and_unknown_orientation() {
        let session = json!({
            "publicState": {
                "players": {
                    "player1": {"board": {"active": [], "bench": [null]}},
                    "player2": {"board": {
                        "active": {"cardIds": ["player2_c001"], "orientation": "sideways"},
                        "bench": [7]
                    }}
                }
            }
        });
        let violations = validate_raw_session(&session);
        assert_eq!(violations.len(), 3, "{violations:?}");
        assert!(violations[0].contains("player1.active"));
    }

    #[test]
    fn typed_session_passes_raw_checks() {
        let (session, _) = fixtures::seeded_pair(2, 2);
        let raw = serde_json::to_value(&session).unwrap();
        assert!(validate_raw_session(&raw).is_empty());
    }

    #[test]
    fn shape_check_rejects_revision_edits_and_bench_resizes() {
        let (mut session, _) = fixtures::seeded_pair(0, 0);
        assert!(check_session_shape(&session, 5, session.revision).is_ok());
        session.revision += 1;
        assert!(check_session_shape(&session, 5, session.revision - 1).is_err());
        session.revision -= 1;
        session.board_mut(PlayerId::Player2).bench.pop();
        let err = check_session_shape(&session, 5, session.revision).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }
}
