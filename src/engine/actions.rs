use serde::{Deserialize, Serialize};

use super::catalog::OperationId;
use super::state::{RequestPayload, RequestType, StackSlot, ZoneKind};
use super::types::{CardId, PlayerId, RequestId, SpecialCondition};

/// Which end of the deck a card goes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeckPosition {
    #[default]
    Top,
    Bottom,
}

/// Where moved cards land.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Destination {
    Hand,
    #[serde(alias = "deck")]
    DeckTop,
    DeckBottom,
    DeckPeek,
    Discard,
    LostZone,
    Prize,
    Reveal,
}

impl Destination {
    pub fn deck(position: DeckPosition) -> Self {
        match position {
            DeckPosition::Top => Destination::DeckTop,
            DeckPosition::Bottom => Destination::DeckBottom,
        }
    }
}

/// How the cards to move are chosen within a source zone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardSelection {
    Ids(Vec<CardId>),
    Top(usize),
    Random(usize),
}

/// A stack on a specific player's board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackTarget {
    pub player: PlayerId,
    pub slot: StackSlot,
}

/// Randomized effects whose outcome is drawn inside the transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RandomAction {
    CoinFlip,
    RollDie,
    ShuffleDeck,
    ShuffleHandIntoDeck,
}

/// Informational random pick. Records ids for audit and never moves them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionAudit {
    pub zone: ZoneKind,
    pub count: usize,
}

/// Card movement between the actor's zones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZoneMutation {
    Transfer {
        source: ZoneKind,
        selection: CardSelection,
        destination: Destination,
    },
    /// Reorders the top of `zone` so that `order[0]` is on top.
    ReorderTop { zone: ZoneKind, order: Vec<CardId> },
    PeekDeck { count: usize },
}

/// Placement and removal of whole stacks, plus the stadium slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoardMutation {
    PlayFromHand { card_id: CardId, slot: StackSlot },
    /// Exchanges active and bench. With `require_active` both sides must be
    /// occupied; otherwise the bench stack may move into an empty active slot.
    SwapActiveBench {
        player: PlayerId,
        bench_index: usize,
        require_active: bool,
    },
    PromoteToActive { bench_index: usize },
    KnockOut { target: StackTarget },
    SetStadium { card_id: CardId },
    ClearStadium,
}

/// Edits inside one or two existing stacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StackMutation {
    Evolve { card_id: CardId, slot: StackSlot },
    Devolve { slot: StackSlot },
    Attach { card_id: CardId, slot: StackSlot },
    Detach { card_id: CardId, slot: StackSlot, destination: Destination },
    MoveAttachment { card_id: CardId, from: StackSlot, to: StackSlot },
    Damage { target: StackTarget, delta: i64 },
    MoveDamage { player: PlayerId, from: StackSlot, to: StackSlot, amount: u32 },
    SetCondition { target: StackTarget, condition: SpecialCondition },
    ClearCondition { target: StackTarget, condition: Option<SpecialCondition> },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnMutation {
    RecordMarker { note: String },
    ClearMarkers,
    EndTurn,
    ExtraTurn,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionDecision {
    Approve,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestMutation {
    Create {
        op_id: OperationId,
        request_type: RequestType,
        target: PlayerId,
        payload: RequestPayload,
    },
    Resolve {
        request_id: RequestId,
        decision: ResolutionDecision,
    },
}

/// Concrete instruction emitted by the resolver and executed by the applier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Random(RandomAction),
    Select(SelectionAudit),
    Zone(ZoneMutation),
    Board(BoardMutation),
    Stack(StackMutation),
    Turn(TurnMutation),
    Request(RequestMutation),
}

impl Action {
    /// Short stable name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Random(_) => "random",
            Action::Select(_) => "select",
            Action::Zone(_) => "zone",
            Action::Board(_) => "board",
            Action::Stack(_) => "stack",
            Action::Turn(_) => "turn",
            Action::Request(_) => "request",
        }
    }
}
