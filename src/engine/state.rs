use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::OperationId;
use super::types::*;
use super::zones::{HasCardId, Pile};

pub const DOCUMENT_VERSION: u32 = 2;

// ---- Cards -----------------------------------------------------------------------------------

/// Identity record for one physical card. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardEntity {
    pub card_id: CardId,
    pub image_url: String,
    pub original_card_code: String,
    pub owner_player_id: PlayerId,
    pub created_at: DateTime<Utc>,
}

/// Pointer to a card plus per-placement display flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRef {
    pub card_id: CardId,
    #[serde(default)]
    pub orientation: Orientation,
    pub is_face_down: bool,
    pub visibility: Visibility,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl HasCardId for CardRef {
    fn card_id(&self) -> &CardId {
        &self.card_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSnapshot {
    pub card_id: CardId,
    pub image_url: String,
}

// ---- Board -----------------------------------------------------------------------------------

/// A physical board slot (active or one bench position).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackRef {
    pub stack_id: String,
    pub card_ids: Pile<CardId>,
    pub damage: u32,
    #[serde(default)]
    pub special_conditions: SpecialConditions,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub is_face_down: bool,
    /// Image urls of the stacked cards, copied from the owner's catalog when
    /// each card entered the stack.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub card_images: BTreeMap<CardId, String>,
}

impl StackRef {
    pub fn new(cards: Vec<CardId>) -> Self {
        let mut card_ids = Pile::new();
        card_ids.insert_top_all(cards);
        Self {
            stack_id: format!("stack_{}", uuid::Uuid::new_v4().simple()),
            card_ids,
            damage: 0,
            special_conditions: SpecialConditions::default(),
            orientation: Orientation::Vertical,
            is_face_down: false,
            card_images: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.card_ids.is_empty()
    }

    pub fn image_url(&self, id: &CardId) -> Option<&str> {
        self.card_images.get(id).map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardMarker {
    pub note: String,
    pub turn_number: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub active: Option<StackRef>,
    pub bench: Vec<Option<StackRef>>,
    pub discard: Pile<CardRef>,
    pub lost_zone: Pile<CardRef>,
    pub prize: Pile<CardRef>,
    pub reveal: Pile<CardRef>,
    #[serde(default)]
    pub markers: Vec<BoardMarker>,
}

impl Board {
    pub fn new(bench_capacity: usize) -> Self {
        Self {
            active: None,
            bench: vec![None; bench_capacity],
            discard: Pile::new(),
            lost_zone: Pile::new(),
            prize: Pile::new(),
            reveal: Pile::new(),
            markers: Vec::new(),
        }
    }

    pub fn stack(&self, slot: StackSlot) -> Option<&StackRef> {
        match slot {
            StackSlot::Active => self.active.as_ref(),
            StackSlot::Bench(index) => self.bench.get(index).and_then(Option::as_ref),
        }
    }

    pub fn stack_mut(&mut self, slot: StackSlot) -> Option<&mut StackRef> {
        match slot {
            StackSlot::Active => self.active.as_mut(),
            StackSlot::Bench(index) => self.bench.get_mut(index).and_then(Option::as_mut),
        }
    }

    /// The raw slot, `None` when the bench index is out of range.
    pub fn slot_mut(&mut self, slot: StackSlot) -> Option<&mut Option<StackRef>> {
        match slot {
            StackSlot::Active => Some(&mut self.active),
            StackSlot::Bench(index) => self.bench.get_mut(index),
        }
    }

    pub fn stacks(&self) -> impl Iterator<Item = &StackRef> {
        self.active.iter().chain(self.bench.iter().flatten())
    }
}

/// Selects a stack on one player's board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "benchIndex")]
pub enum StackSlot {
    Active,
    Bench(usize),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub deck_count: usize,
    pub hand_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPublicState {
    pub board: Board,
    pub counters: Counters,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StadiumSlot {
    pub card_id: CardId,
    pub owner_player_id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// ---- Turn context ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnFlags {
    pub retreated: bool,
    pub energy_attached: bool,
    pub stadium_played: bool,
}

/// Audit of an informational random pick. The picked cards are not moved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRecord {
    pub player_id: PlayerId,
    pub zone: ZoneKind,
    pub card_ids: Vec<CardId>,
    pub selected_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckPeekState {
    pub player_id: PlayerId,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnContext {
    pub turn_number: u32,
    pub current_player: Option<PlayerId>,
    #[serde(default)]
    pub flags: TurnFlags,
    #[serde(default)]
    pub last_coin_result: Option<CoinFace>,
    #[serde(default)]
    pub last_die_result: Option<u8>,
    #[serde(default)]
    pub last_random_selection: Option<SelectionRecord>,
    #[serde(default)]
    pub deck_peek: Option<DeckPeekState>,
}

impl Default for TurnContext {
    fn default() -> Self {
        Self {
            turn_number: 1,
            current_player: None,
            flags: TurnFlags::default(),
            last_coin_result: None,
            last_die_result: None,
            last_random_selection: None,
            deck_peek: None,
        }
    }
}

// ---- Zones -----------------------------------------------------------------------------------

/// Card piles addressable by zone name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneKind {
    Hand,
    Deck,
    DeckPeek,
    Discard,
    LostZone,
    Prize,
    Reveal,
}

impl ZoneKind {
    /// Zones held in the owner's private-state document.
    pub fn is_private(self) -> bool {
        matches!(self, ZoneKind::Hand | ZoneKind::Deck | ZoneKind::DeckPeek)
    }
}

// ---- Requests --------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestType {
    RevealHand,
    DiscardRandomHand,
    DiscardSelectedHand,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub count: u32,
    #[serde(default)]
    pub note: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub card_ids: Vec<CardId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum RequestResult {
    #[serde(rename_all = "camelCase")]
    Revealed {
        revealed_card_ids: Vec<CardId>,
        revealed_cards: Vec<CardSnapshot>,
    },
    #[serde(rename_all = "camelCase")]
    Discarded { discarded_card_ids: Vec<CardId> },
    Rejected { reason: String },
}

pub const REJECTED_BY_TARGET: &str = "rejected-by-target-player";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    pub request_id: RequestId,
    pub op_id: OperationId,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub actor_player_id: PlayerId,
    pub target_player_id: PlayerId,
    pub payload: RequestPayload,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by_player_id: Option<PlayerId>,
    pub result: Option<RequestResult>,
}

// ---- Session document ------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub uid: String,
    pub connected: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicState {
    pub turn_context: TurnContext,
    pub players: PerPlayer<PlayerPublicState>,
    pub stadium: Option<StadiumSlot>,
    pub operation_requests: Vec<OperationRequest>,
}

/// Shared document readable by both participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDoc {
    pub version: u32,
    pub status: SessionStatus,
    pub revision: u64,
    pub participants: PerPlayer<Option<Participant>>,
    pub public_state: PublicState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl SessionDoc {
    pub fn new(now: DateTime<Utc>, bench_capacity: usize) -> Self {
        let player = || PlayerPublicState {
            board: Board::new(bench_capacity),
            counters: Counters::default(),
        };
        Self {
            version: DOCUMENT_VERSION,
            status: SessionStatus::Waiting,
            revision: 0,
            participants: PerPlayer::default(),
            public_state: PublicState {
                turn_context: TurnContext::default(),
                players: PerPlayer::new(player(), player()),
                stadium: None,
                operation_requests: Vec::new(),
            },
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    pub fn board(&self, player: PlayerId) -> &Board {
        &self.public_state.players.get(player).board
    }

    pub fn board_mut(&mut self, player: PlayerId) -> &mut Board {
        &mut self.public_state.players.get_mut(player).board
    }

    pub fn counters(&self, player: PlayerId) -> Counters {
        self.public_state.players.get(player).counters
    }

    pub fn participant_uid(&self, player: PlayerId) -> Option<&str> {
        self.participants
            .get(player)
            .as_ref()
            .map(|p| p.uid.as_str())
    }

    pub fn request(&self, id: &RequestId) -> Option<&OperationRequest> {
        self.public_state
            .operation_requests
            .iter()
            .find(|r| &r.request_id == id)
    }

    pub fn request_mut(&mut self, id: &RequestId) -> Option<&mut OperationRequest> {
        self.public_state
            .operation_requests
            .iter_mut()
            .find(|r| &r.request_id == id)
    }
}

// ---- Private-state document ------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateZones {
    pub deck: Pile<CardRef>,
    pub hand: Pile<CardRef>,
    #[serde(default)]
    pub deck_peek: Pile<CardRef>,
}

/// Owner-readable document holding the zones the opponent must not see.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateStateDoc {
    pub owner_player_id: PlayerId,
    pub revision: u64,
    pub zones: PrivateZones,
    pub card_catalog: BTreeMap<CardId, CardEntity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl PrivateStateDoc {
    pub fn new(owner: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            owner_player_id: owner,
            revision: 0,
            zones: PrivateZones::default(),
            card_catalog: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    pub fn image_url(&self, id: &CardId) -> Option<&str> {
        self.card_catalog.get(id).map(|c| c.image_url.as_str())
    }

    /// Next free sequence number for a newly created card.
    pub fn next_card_sequence(&self) -> u32 {
        self.card_catalog.len() as u32 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serde::assert_round_trip_eq;

    #[test]
    fn new_session_is_waiting_with_empty_bench() {
        let doc = SessionDoc::new(Utc::now(), 5);
        assert_eq!(doc.status, SessionStatus::Waiting);
        assert_eq!(doc.revision, 0);
        assert_eq!(doc.board(PlayerId::Player2).bench.len(), 5);
        assert!(doc.board(PlayerId::Player1).active.is_none());
    }

    #[test]
    fn session_document_uses_camel_case_paths() {
        let doc = SessionDoc::new(Utc::now(), 2);
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["publicState"]["turnContext"]["turnNumber"].is_number());
        assert!(json["publicState"]["players"]["player1"]["counters"]["deckCount"].is_number());
        assert!(json["publicState"]["players"]["player2"]["board"]["active"].is_null());
        assert_round_trip_eq(&doc);
    }

    #[test]
    fn stack_slot_serializes_with_bench_index() {
        assert_eq!(
            serde_json::to_value(StackSlot::Bench(3)).unwrap(),
            serde_json::json!({"kind": "bench", "benchIndex": 3})
        );
        assert_round_trip_eq(&StackSlot::Active);
    }

    #[test]
    fn new_stack_keeps_first_card_on_top() {
        let stack = StackRef::new(vec![CardId::from("top"), CardId::from("under")]);
        assert_eq!(stack.card_ids.top(), Some(&CardId::from("top")));
        assert_eq!(stack.damage, 0);
    }

    #[test]
    fn stack_images_are_omitted_until_recorded() {
        let id = CardId::from("player1_c001");
        let mut stack = StackRef::new(vec![id.clone()]);
        assert!(serde_json::to_value(&stack).unwrap().get("cardImages").is_none());

        stack.card_images.insert(id.clone(), "https://cards.example/1.png".into());
        let json = serde_json::to_value(&stack).unwrap();
        assert_eq!(json["cardImages"]["player1_c001"], "https://cards.example/1.png");
        assert_eq!(stack.image_url(&id), Some("https://cards.example/1.png"));
        assert_round_trip_eq(&stack);
    }
}
