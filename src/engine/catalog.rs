use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// How an accepted operation reaches the documents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// The actor's own mutation, applied immediately.
    Direct,
    /// Appends a pending request addressed to the opponent.
    Request,
    /// Approves or rejects a pending request; only its target may call.
    RequestResolution,
}

impl ExecutionMode {
    pub fn touches_private_state(self) -> bool {
        !matches!(self, ExecutionMode::Request)
    }

    pub fn requires_expected_revision(self) -> bool {
        !matches!(self, ExecutionMode::Request)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationGroup {
    Randomness,
    DeckManipulation,
    BoardPlacement,
    ZoneTransfer,
    Attachment,
    DamageStatus,
    TurnMarkers,
    TurnProgression,
    OpponentRequest,
    Internal,
}

macro_rules! operations {
    ($( $variant:ident => $wire:literal, $group:ident, $mode:ident, $label:literal; )*) => {
        /// Stable operation identifiers.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum OperationId {
            $( #[serde(rename = $wire)] $variant, )*
        }

        impl OperationId {
            pub const ALL: &'static [OperationId] = &[ $( OperationId::$variant, )* ];

            pub fn as_str(self) -> &'static str {
                match self {
                    $( OperationId::$variant => $wire, )*
                }
            }

            pub fn spec(self) -> OperationSpec {
                match self {
                    $( OperationId::$variant => OperationSpec {
                        id: OperationId::$variant,
                        group: OperationGroup::$group,
                        mode: ExecutionMode::$mode,
                        label: $label,
                    }, )*
                }
            }
        }
    };
}

operations! {
    CoinFlip => "A01", Randomness, Direct, "Flip a coin";
    RollDie => "A02", Randomness, Direct, "Roll a die";
    ShuffleDeck => "A03", Randomness, Direct, "Shuffle deck";
    ShuffleHandIntoDeck => "A04", Randomness, Direct, "Shuffle hand into deck";
    RandomSelection => "A05", Randomness, Direct, "Pick random cards";
    ReorderDeckTop => "A06", Randomness, Direct, "Reorder top of deck";
    Draw => "B01", DeckManipulation, Direct, "Draw";
    MillToDiscard => "B02", DeckManipulation, Direct, "Mill to discard";
    PeekDeck => "B03", DeckManipulation, Direct, "Look at top of deck";
    ReturnPeek => "B04", DeckManipulation, Direct, "Return looked-at cards";
    SearchDeck => "B05", DeckManipulation, Direct, "Search deck to hand";
    PutOnDeck => "B06", DeckManipulation, Direct, "Put hand cards on deck";
    ReorderPeek => "B07", DeckManipulation, Direct, "Reorder looked-at cards";
    PlayToActive => "C01", BoardPlacement, Direct, "Play to active";
    DeployToBench => "C02", BoardPlacement, Direct, "Deploy to bench";
    SwapActiveBench => "C03", BoardPlacement, Direct, "Swap active and bench";
    CallOpponentBench => "C04", BoardPlacement, Direct, "Call opponent bench to active";
    KnockOut => "C05", BoardPlacement, Direct, "Knock out";
    PromoteToActive => "C06", BoardPlacement, Direct, "Promote bench to active";
    SetStadium => "C07", BoardPlacement, Direct, "Set stadium";
    ClearStadium => "C08", BoardPlacement, Direct, "Clear stadium";
    DiscardFromHand => "D01", ZoneTransfer, Direct, "Discard from hand";
    ReturnHandToDeck => "D02", ZoneTransfer, Direct, "Return hand to deck";
    ZoneTransfer => "D03", ZoneTransfer, Direct, "Move between zones";
    TakePrize => "D04", ZoneTransfer, Direct, "Take prize";
    SetPrizes => "D05", ZoneTransfer, Direct, "Set prizes";
    RevealFromHand => "D06", ZoneTransfer, Direct, "Reveal from hand";
    ReturnRevealToHand => "D07", ZoneTransfer, Direct, "Return revealed cards";
    Evolve => "E01", Attachment, Direct, "Evolve";
    Devolve => "E02", Attachment, Direct, "Devolve";
    Attach => "E03", Attachment, Direct, "Attach";
    Detach => "E04", Attachment, Direct, "Detach";
    MoveAttachment => "E05", Attachment, Direct, "Move attachment";
    ApplyDamage => "F01", DamageStatus, Direct, "Apply damage";
    Heal => "F02", DamageStatus, Direct, "Heal";
    ApplyCondition => "F03", DamageStatus, Direct, "Apply special condition";
    ClearCondition => "F04", DamageStatus, Direct, "Clear special condition";
    MoveDamage => "F05", DamageStatus, Direct, "Move damage";
    RecordTurnMarker => "G01", TurnMarkers, Direct, "Record turn marker";
    ClearTurnMarkers => "G02", TurnMarkers, Direct, "Clear turn markers";
    EndTurn => "H01", TurnProgression, Direct, "End turn";
    ExtraTurn => "H02", TurnProgression, Direct, "Take an extra turn";
    RequestRevealHand => "I01", OpponentRequest, Request, "Ask opponent to reveal hand";
    RequestDiscardRandomHand => "I02", OpponentRequest, Request,
        "Ask opponent to discard at random";
    RequestDiscardSelectedHand => "I03", OpponentRequest, Request,
        "Ask opponent to discard chosen cards";
    RequestApprove => "REQUEST_APPROVE", Internal, RequestResolution, "Approve request";
    RequestReject => "REQUEST_REJECT", Internal, RequestResolution, "Reject request";
}

/// Catalog entry for one operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OperationSpec {
    pub id: OperationId,
    pub group: OperationGroup,
    pub mode: ExecutionMode,
    pub label: &'static str,
}

static BY_WIRE_ID: Lazy<HashMap<&'static str, OperationId>> = Lazy::new(|| {
    OperationId::ALL
        .iter()
        .map(|op| (op.as_str(), *op))
        .collect()
});

static BY_GROUP: Lazy<HashMap<OperationGroup, Vec<OperationSpec>>> = Lazy::new(|| {
    let mut groups: HashMap<OperationGroup, Vec<OperationSpec>> = HashMap::new();
    for op in OperationId::ALL {
        let spec = op.spec();
        groups.entry(spec.group).or_default().push(spec);
    }
    groups
});

impl OperationId {
    pub fn mode(self) -> ExecutionMode {
        self.spec().mode
    }

    pub fn group(self) -> OperationGroup {
        self.spec().group
    }

    /// Whether the runner loads and rewrites the actor's private document.
    ///
    /// Rejecting a request only edits the shared request log.
    pub fn touches_private_state(self) -> bool {
        self != OperationId::RequestReject && self.mode().touches_private_state()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BY_WIRE_ID
            .get(s)
            .copied()
            .ok_or_else(|| format!("unsupported operation id `{s}`"))
    }
}

/// Catalog entries belonging to `group`, in catalog order.
pub fn operations_in(group: OperationGroup) -> &'static [OperationSpec] {
    BY_GROUP.get(&group).map(Vec::as_slice).unwrap_or(&[])
}
