use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::actions::{DeckPosition, Destination, ResolutionDecision};
use super::catalog::OperationId;
use super::state::{StackSlot, ZoneKind};
use super::types::{CardId, PlayerId, RequestId, SpecialCondition};

/// A stack named in a payload; `player` defaults to the actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackSelector {
    pub player: Option<PlayerId>,
    pub slot: StackSlot,
}

/// Typed, not-yet-validated form of a player's requested action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Intent {
    CoinFlip,
    RollDie,
    ShuffleDeck,
    ShuffleHandIntoDeck,
    RandomSelection { zone: ZoneKind, count: u64 },
    ReorderDeckTop { card_ids: Vec<CardId> },
    Draw { count: u64 },
    MillToDiscard { count: u64 },
    PeekDeck { count: u64 },
    ReturnPeek { position: DeckPosition },
    SearchDeck { card_ids: Vec<CardId> },
    PutOnDeck { card_ids: Vec<CardId>, position: DeckPosition },
    ReorderPeek { card_ids: Vec<CardId> },
    PlayToActive { card_id: CardId },
    DeployToBench { card_id: CardId, bench_index: u64 },
    SwapActiveBench { bench_index: u64 },
    CallOpponentBench { target_player: PlayerId, bench_index: u64 },
    KnockOut { target: StackSelector },
    PromoteToActive { bench_index: u64 },
    SetStadium { card_id: CardId },
    ClearStadium,
    DiscardFromHand { card_ids: Vec<CardId>, count: Option<u64> },
    ReturnHandToDeck,
    ZoneTransfer {
        source: ZoneKind,
        destination: Destination,
        card_ids: Vec<CardId>,
        count: Option<u64>,
    },
    TakePrize { card_ids: Vec<CardId>, count: Option<u64> },
    SetPrizes { count: Option<u64> },
    RevealFromHand { card_ids: Vec<CardId> },
    ReturnRevealToHand,
    Evolve { card_id: CardId, slot: StackSlot },
    Devolve { slot: StackSlot },
    Attach { card_id: CardId, slot: StackSlot },
    Detach { card_id: CardId, slot: StackSlot, destination: Destination },
    MoveAttachment { card_id: CardId, from: StackSlot, to: StackSlot },
    ApplyDamage { value: u64, target: StackSelector },
    Heal { value: u64, target: StackSelector },
    ApplyCondition { condition: SpecialCondition, target: StackSelector },
    ClearCondition { condition: Option<SpecialCondition>, target: StackSelector },
    MoveDamage {
        value: u64,
        target_player: Option<PlayerId>,
        from: StackSlot,
        to: StackSlot,
    },
    RecordTurnMarker { note: String },
    ClearTurnMarkers,
    EndTurn,
    ExtraTurn,
    RequestRevealHand { target_player: PlayerId, note: String },
    RequestDiscardRandomHand {
        target_player: PlayerId,
        count: Option<u64>,
        note: String,
    },
    RequestDiscardSelectedHand {
        target_player: PlayerId,
        card_ids: Vec<CardId>,
        note: String,
    },
    ResolveRequest {
        /// Decision implied by the chosen internal opcode.
        opcode: ResolutionDecision,
        request_id: RequestId,
        /// Decision stated in the payload's `action` field.
        action: ResolutionDecision,
    },
}

impl Intent {
    pub fn op_id(&self) -> OperationId {
        match self {
            Intent::CoinFlip => OperationId::CoinFlip,
            Intent::RollDie => OperationId::RollDie,
            Intent::ShuffleDeck => OperationId::ShuffleDeck,
            Intent::ShuffleHandIntoDeck => OperationId::ShuffleHandIntoDeck,
            Intent::RandomSelection { .. } => OperationId::RandomSelection,
            Intent::ReorderDeckTop { .. } => OperationId::ReorderDeckTop,
            Intent::Draw { .. } => OperationId::Draw,
            Intent::MillToDiscard { .. } => OperationId::MillToDiscard,
            Intent::PeekDeck { .. } => OperationId::PeekDeck,
            Intent::ReturnPeek { .. } => OperationId::ReturnPeek,
            Intent::SearchDeck { .. } => OperationId::SearchDeck,
            Intent::PutOnDeck { .. } => OperationId::PutOnDeck,
            Intent::ReorderPeek { .. } => OperationId::ReorderPeek,
            Intent::PlayToActive { .. } => OperationId::PlayToActive,
            Intent::DeployToBench { .. } => OperationId::DeployToBench,
            Intent::SwapActiveBench { .. } => OperationId::SwapActiveBench,
            Intent::CallOpponentBench { .. } => OperationId::CallOpponentBench,
            Intent::KnockOut { .. } => OperationId::KnockOut,
            Intent::PromoteToActive { .. } => OperationId::PromoteToActive,
            Intent::SetStadium { .. } => OperationId::SetStadium,
            Intent::ClearStadium => OperationId::ClearStadium,
            Intent::DiscardFromHand { .. } => OperationId::DiscardFromHand,
            Intent::ReturnHandToDeck => OperationId::ReturnHandToDeck,
            Intent::ZoneTransfer { .. } => OperationId::ZoneTransfer,
            Intent::TakePrize { .. } => OperationId::TakePrize,
            Intent::SetPrizes { .. } => OperationId::SetPrizes,
            Intent::RevealFromHand { .. } => OperationId::RevealFromHand,
            Intent::ReturnRevealToHand => OperationId::ReturnRevealToHand,
            Intent::Evolve { .. } => OperationId::Evolve,
            Intent::Devolve { .. } => OperationId::Devolve,
            Intent::Attach { .. } => OperationId::Attach,
            Intent::Detach { .. } => OperationId::Detach,
            Intent::MoveAttachment { .. } => OperationId::MoveAttachment,
            Intent::ApplyDamage { .. } => OperationId::ApplyDamage,
            Intent::Heal { .. } => OperationId::Heal,
            Intent::ApplyCondition { .. } => OperationId::ApplyCondition,
            Intent::ClearCondition { .. } => OperationId::ClearCondition,
            Intent::MoveDamage { .. } => OperationId::MoveDamage,
            Intent::RecordTurnMarker { .. } => OperationId::RecordTurnMarker,
            Intent::ClearTurnMarkers => OperationId::ClearTurnMarkers,
            Intent::EndTurn => OperationId::EndTurn,
            Intent::ExtraTurn => OperationId::ExtraTurn,
            Intent::RequestRevealHand { .. } => OperationId::RequestRevealHand,
            Intent::RequestDiscardRandomHand { .. } => OperationId::RequestDiscardRandomHand,
            Intent::RequestDiscardSelectedHand { .. } => OperationId::RequestDiscardSelectedHand,
            Intent::ResolveRequest { opcode, .. } => match opcode {
                ResolutionDecision::Approve => OperationId::RequestApprove,
                ResolutionDecision::Reject => OperationId::RequestReject,
            },
        }
    }
}

/// Structured payload validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid `{field}`: {reason}")]
pub struct IntentError {
    pub field: &'static str,
    pub reason: String,
}

impl IntentError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    fn missing(field: &'static str) -> Self {
        Self::new(field, "is required")
    }
}

/// Parses a wire operation id and its payload.
pub fn build_intent_from_wire(op_id: &str, payload: &Value) -> Result<Intent, IntentError> {
    let op = op_id
        .parse::<OperationId>()
        .map_err(|reason| IntentError::new("opId", reason))?;
    build_intent(op, payload)
}

/// Normalizes a raw payload into the typed intent for `op`.
pub fn build_intent(op: OperationId, payload: &Value) -> Result<Intent, IntentError> {
    let empty = Map::new();
    let fields = match payload {
        Value::Null => &empty,
        Value::Object(map) => map,
        _ => return Err(IntentError::new("payload", "must be an object")),
    };
    let p = Payload(fields);

    let intent = match op {
        OperationId::CoinFlip => Intent::CoinFlip,
        OperationId::RollDie => Intent::RollDie,
        OperationId::ShuffleDeck => Intent::ShuffleDeck,
        OperationId::ShuffleHandIntoDeck => Intent::ShuffleHandIntoDeck,
        OperationId::RandomSelection => Intent::RandomSelection {
            zone: p.required_enum("zone")?,
            count: p.required_count("count")?,
        },
        OperationId::ReorderDeckTop => Intent::ReorderDeckTop {
            card_ids: p.required_card_ids()?,
        },
        OperationId::Draw => Intent::Draw {
            count: p.required_count("count")?,
        },
        OperationId::MillToDiscard => Intent::MillToDiscard {
            count: p.required_count("count")?,
        },
        OperationId::PeekDeck => Intent::PeekDeck {
            count: p.required_count("count")?,
        },
        OperationId::ReturnPeek => Intent::ReturnPeek {
            position: p.optional_enum("position")?.unwrap_or_default(),
        },
        OperationId::SearchDeck => Intent::SearchDeck {
            card_ids: p.required_card_ids()?,
        },
        OperationId::PutOnDeck => Intent::PutOnDeck {
            card_ids: p.required_card_ids()?,
            position: p.optional_enum("position")?.unwrap_or_default(),
        },
        OperationId::ReorderPeek => Intent::ReorderPeek {
            card_ids: p.required_card_ids()?,
        },
        OperationId::PlayToActive => Intent::PlayToActive {
            card_id: p.required_card_id()?,
        },
        OperationId::DeployToBench => Intent::DeployToBench {
            card_id: p.required_card_id()?,
            bench_index: p.required_count("benchIndex")?,
        },
        OperationId::SwapActiveBench => Intent::SwapActiveBench {
            bench_index: p.required_count("benchIndex")?,
        },
        OperationId::CallOpponentBench => Intent::CallOpponentBench {
            target_player: p.required_enum("targetPlayerId")?,
            bench_index: p.required_count("benchIndex")?,
        },
        OperationId::KnockOut => Intent::KnockOut {
            target: p.stack_selector()?,
        },
        OperationId::PromoteToActive => Intent::PromoteToActive {
            bench_index: p.required_count("benchIndex")?,
        },
        OperationId::SetStadium => Intent::SetStadium {
            card_id: p.required_card_id()?,
        },
        OperationId::ClearStadium => Intent::ClearStadium,
        OperationId::DiscardFromHand => {
            let (card_ids, count) = p.ids_or_count()?;
            Intent::DiscardFromHand { card_ids, count }
        }
        OperationId::ReturnHandToDeck => Intent::ReturnHandToDeck,
        OperationId::ZoneTransfer => {
            let (card_ids, count) = p.ids_or_count()?;
            Intent::ZoneTransfer {
                source: p.required_enum("sourceZone")?,
                destination: p.required_enum("targetZone")?,
                card_ids,
                count,
            }
        }
        OperationId::TakePrize => {
            let (card_ids, count) = p.ids_or_count()?;
            Intent::TakePrize { card_ids, count }
        }
        OperationId::SetPrizes => Intent::SetPrizes {
            count: p.optional_count("count")?,
        },
        OperationId::RevealFromHand => Intent::RevealFromHand {
            card_ids: p.required_card_ids()?,
        },
        OperationId::ReturnRevealToHand => Intent::ReturnRevealToHand,
        OperationId::Evolve => Intent::Evolve {
            card_id: p.required_card_id()?,
            slot: p.slot("stackKind", "benchIndex")?,
        },
        OperationId::Devolve => Intent::Devolve {
            slot: p.slot("stackKind", "benchIndex")?,
        },
        OperationId::Attach => Intent::Attach {
            card_id: p.required_card_id()?,
            slot: p.slot("stackKind", "benchIndex")?,
        },
        OperationId::Detach => Intent::Detach {
            card_id: p.required_card_id()?,
            slot: p.slot("stackKind", "benchIndex")?,
            destination: p.optional_enum("targetZone")?.unwrap_or(Destination::Discard),
        },
        OperationId::MoveAttachment => Intent::MoveAttachment {
            card_id: p.required_card_id()?,
            from: p.slot("fromStackKind", "fromBenchIndex")?,
            to: p.slot("toStackKind", "toBenchIndex")?,
        },
        OperationId::ApplyDamage => Intent::ApplyDamage {
            value: p.required_count("value")?,
            target: p.stack_selector()?,
        },
        OperationId::Heal => Intent::Heal {
            value: p.required_count("value")?,
            target: p.stack_selector()?,
        },
        OperationId::ApplyCondition => Intent::ApplyCondition {
            condition: p.required_enum("condition")?,
            target: p.stack_selector()?,
        },
        OperationId::ClearCondition => Intent::ClearCondition {
            condition: p.optional_enum("condition")?,
            target: p.stack_selector()?,
        },
        OperationId::MoveDamage => Intent::MoveDamage {
            value: p.required_count("value")?,
            target_player: p.optional_enum("targetPlayerId")?,
            from: p.slot("fromStackKind", "fromBenchIndex")?,
            to: p.slot("toStackKind", "toBenchIndex")?,
        },
        OperationId::RecordTurnMarker => Intent::RecordTurnMarker {
            note: p.optional_string("note")?.unwrap_or_default(),
        },
        OperationId::ClearTurnMarkers => Intent::ClearTurnMarkers,
        OperationId::EndTurn => Intent::EndTurn,
        OperationId::ExtraTurn => Intent::ExtraTurn,
        OperationId::RequestRevealHand => Intent::RequestRevealHand {
            target_player: p.required_enum("targetPlayerId")?,
            note: p.optional_string("note")?.unwrap_or_default(),
        },
        OperationId::RequestDiscardRandomHand => Intent::RequestDiscardRandomHand {
            target_player: p.required_enum("targetPlayerId")?,
            count: p.optional_count("count")?,
            note: p.optional_string("note")?.unwrap_or_default(),
        },
        OperationId::RequestDiscardSelectedHand => Intent::RequestDiscardSelectedHand {
            target_player: p.required_enum("targetPlayerId")?,
            card_ids: p.required_card_ids()?,
            note: p.optional_string("note")?.unwrap_or_default(),
        },
        OperationId::RequestApprove | OperationId::RequestReject => Intent::ResolveRequest {
            opcode: if op == OperationId::RequestApprove {
                ResolutionDecision::Approve
            } else {
                ResolutionDecision::Reject
            },
            request_id: RequestId::from(
                p.optional_string("requestId")?
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| IntentError::missing("requestId"))?
                    .as_str(),
            ),
            action: p.required_enum("action")?,
        },
    };
    Ok(intent)
}

struct Payload<'a>(&'a Map<String, Value>);

impl Payload<'_> {
    fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    fn optional_count(&self, key: &'static str) -> Result<Option<u64>, IntentError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .map(Some)
                .ok_or_else(|| IntentError::new(key, "must be a non-negative integer")),
        }
    }

    fn required_count(&self, key: &'static str) -> Result<u64, IntentError> {
        self.optional_count(key)?
            .ok_or_else(|| IntentError::missing(key))
    }

    fn optional_string(&self, key: &'static str) -> Result<Option<String>, IntentError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(IntentError::new(key, "must be a string")),
        }
    }

    fn optional_enum<T: DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, IntentError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|_| IntentError::new(key, format!("unrecognized value {value}"))),
        }
    }

    fn required_enum<T: DeserializeOwned>(&self, key: &'static str) -> Result<T, IntentError> {
        self.optional_enum(key)?
            .ok_or_else(|| IntentError::missing(key))
    }

    fn required_card_id(&self) -> Result<CardId, IntentError> {
        match self.optional_string("cardId")? {
            Some(id) if !id.is_empty() => Ok(CardId::from(id)),
            _ => Err(IntentError::missing("cardId")),
        }
    }

    /// `cardIds` array, falling back to a single `cardId`.
    fn card_ids(&self) -> Result<Vec<CardId>, IntentError> {
        if let Some(value) = self.get("cardIds") {
            let items = value
                .as_array()
                .ok_or_else(|| IntentError::new("cardIds", "must be an array of strings"))?;
            let mut ids = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(id) if !id.is_empty() => ids.push(CardId::from(id)),
                    _ => {
                        return Err(IntentError::new(
                            "cardIds",
                            "must contain only non-empty strings",
                        ))
                    }
                }
            }
            return Ok(ids);
        }
        Ok(match self.optional_string("cardId")? {
            Some(id) if !id.is_empty() => vec![CardId::from(id)],
            _ => Vec::new(),
        })
    }

    fn required_card_ids(&self) -> Result<Vec<CardId>, IntentError> {
        let ids = self.card_ids()?;
        if ids.is_empty() {
            return Err(IntentError::missing("cardIds"));
        }
        Ok(ids)
    }

    fn ids_or_count(&self) -> Result<(Vec<CardId>, Option<u64>), IntentError> {
        let ids = self.card_ids()?;
        let count = self.optional_count("count")?;
        if ids.is_empty() && count.is_none() {
            return Err(IntentError::new("cardIds", "either cardIds or count is required"));
        }
        Ok((ids, count))
    }

    fn slot(
        &self,
        kind_key: &'static str,
        index_key: &'static str,
    ) -> Result<StackSlot, IntentError> {
        let kind: String = self
            .optional_string(kind_key)?
            .ok_or_else(|| IntentError::missing(kind_key))?;
        match kind.as_str() {
            "active" => Ok(StackSlot::Active),
            "bench" => {
                let index = self.required_count(index_key)?;
                Ok(StackSlot::Bench(index as usize))
            }
            other => Err(IntentError::new(
                kind_key,
                format!("expected `active` or `bench`, got `{other}`"),
            )),
        }
    }

    fn stack_selector(&self) -> Result<StackSelector, IntentError> {
        Ok(StackSelector {
            player: self.optional_enum("targetPlayerId")?,
            slot: self.slot("targetStackKind", "targetBenchIndex")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draw_requires_integer_count() {
        assert_eq!(
            build_intent(OperationId::Draw, &json!({"count": 2})).unwrap(),
            Intent::Draw { count: 2 }
        );
        let err = build_intent(OperationId::Draw, &json!({"count": "two"})).unwrap_err();
        assert_eq!(err.field, "count");
        let err = build_intent(OperationId::Draw, &json!({"count": 1.5})).unwrap_err();
        assert_eq!(err.field, "count");
        let err = build_intent(OperationId::Draw, &Value::Null).unwrap_err();
        assert_eq!(err.reason, "is required");
    }

    #[test]
    fn unknown_operation_is_reported_on_op_id() {
        let err = build_intent_from_wire("Q42", &json!({})).unwrap_err();
        assert_eq!(err.field, "opId");
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = build_intent(OperationId::CoinFlip, &json!([1, 2])).unwrap_err();
        assert_eq!(err.field, "payload");
    }

    #[test]
    fn single_card_id_fills_card_ids() {
        let intent = build_intent(
            OperationId::RequestDiscardSelectedHand,
            &json!({"targetPlayerId": "player2", "cardId": "player2_c004"}),
        )
        .unwrap();
        match intent {
            Intent::RequestDiscardSelectedHand {
                target_player,
                card_ids,
                note,
            } => {
                assert_eq!(target_player, PlayerId::Player2);
                assert_eq!(card_ids, vec![CardId::from("player2_c004")]);
                assert_eq!(note, "");
            }
            other => panic!("unexpected intent {other:?}"),
        }
    }

    #[test]
    fn bench_selector_needs_index() {
        let err = build_intent(
            OperationId::ApplyDamage,
            &json!({"value": 30, "targetStackKind": "bench"}),
        )
        .unwrap_err();
        assert_eq!(err.field, "targetBenchIndex");

        let intent = build_intent(
            OperationId::ApplyDamage,
            &json!({
                "value": 30,
                "targetStackKind": "bench",
                "targetBenchIndex": 2,
                "targetPlayerId": "player1"
            }),
        )
        .unwrap();
        assert_eq!(
            intent,
            Intent::ApplyDamage {
                value: 30,
                target: StackSelector {
                    player: Some(PlayerId::Player1),
                    slot: StackSlot::Bench(2)
                }
            }
        );
    }

    #[test]
    fn zone_transfer_accepts_deck_alias_and_needs_selection() {
        let intent = build_intent(
            OperationId::ZoneTransfer,
            &json!({"sourceZone": "discard", "targetZone": "deck", "count": 1}),
        )
        .unwrap();
        assert!(matches!(
            intent,
            Intent::ZoneTransfer {
                source: ZoneKind::Discard,
                destination: Destination::DeckTop,
                count: Some(1),
                ..
            }
        ));

        let err = build_intent(
            OperationId::ZoneTransfer,
            &json!({"sourceZone": "discard", "targetZone": "hand"}),
        )
        .unwrap_err();
        assert_eq!(err.field, "cardIds");

        let err = build_intent(
            OperationId::ZoneTransfer,
            &json!({"sourceZone": "graveyard", "targetZone": "hand", "count": 1}),
        )
        .unwrap_err();
        assert_eq!(err.field, "sourceZone");
    }

    #[test]
    fn resolution_carries_opcode_and_action() {
        let intent = build_intent(
            OperationId::RequestReject,
            &json!({"requestId": "req_1", "action": "approve"}),
        )
        .unwrap();
        assert_eq!(intent.op_id(), OperationId::RequestReject);
        assert_eq!(
            intent,
            Intent::ResolveRequest {
                opcode: ResolutionDecision::Reject,
                request_id: RequestId::from("req_1"),
                action: ResolutionDecision::Approve,
            }
        );
        let err =
            build_intent(OperationId::RequestApprove, &json!({"action": "approve"})).unwrap_err();
        assert_eq!(err.field, "requestId");
    }

    #[test]
    fn every_operation_round_trips_its_op_id() {
        let full = json!({
            "count": 1, "cardId": "player1_c001", "benchIndex": 0, "targetPlayerId": "player2",
            "zone": "hand", "sourceZone": "hand", "targetZone": "discard",
            "stackKind": "active", "targetStackKind": "active",
            "fromStackKind": "active", "toStackKind": "bench", "toBenchIndex": 0,
            "value": 10, "condition": "asleep", "requestId": "req_1", "action": "approve",
        });
        for op in OperationId::ALL {
            let intent = build_intent(*op, &full).unwrap();
            assert_eq!(intent.op_id(), *op);
        }
    }
}
