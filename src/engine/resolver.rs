use std::collections::HashSet;

use super::actions::*;
use super::catalog::OperationId;
use super::errors::{ErrorCode, Rejection};
use super::intent::{Intent, StackSelector};
use super::state::*;
use super::types::{CardId, PlayerId};
use super::zones::Pile;
use crate::config::EngineConfig;

/// Outcome of validating an intent against a snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Accepted(Action),
    Rejected(Rejection),
}

impl Resolution {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Resolution::Accepted(_))
    }

    pub fn into_result(self) -> Result<Action, Rejection> {
        match self {
            Resolution::Accepted(action) => Ok(action),
            Resolution::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Decides whether `intent` may run against the given snapshot.
///
/// Pure: reads the documents, never mutates them, and reports failures as
/// data. `private_state` is the actor's own document, `None` when it has not
/// been created yet (treated as empty zones).
pub fn resolve(
    intent: &Intent,
    session: &SessionDoc,
    private_state: Option<&PrivateStateDoc>,
    actor: PlayerId,
    config: &EngineConfig,
) -> Resolution {
    let snapshot = Snapshot {
        session,
        private_state: private_state.filter(|doc| doc.owner_player_id == actor),
        actor,
        config,
    };
    match snapshot.check(intent) {
        Ok(action) => Resolution::Accepted(action),
        Err(rejection) => Resolution::Rejected(rejection),
    }
}

type Checked<T> = Result<T, Rejection>;

fn reject<T>(message: impl Into<String>) -> Checked<T> {
    Err(Rejection::invalid(message))
}

fn positive(value: u64, field: &str) -> Checked<usize> {
    if value == 0 {
        return reject(format!("{field} must be a positive integer"));
    }
    Ok(usize::try_from(value).unwrap_or(usize::MAX))
}

struct Snapshot<'a> {
    session: &'a SessionDoc,
    private_state: Option<&'a PrivateStateDoc>,
    actor: PlayerId,
    config: &'a EngineConfig,
}

impl<'a> Snapshot<'a> {
    fn check(&self, intent: &Intent) -> Checked<Action> {
        if !self.session.status.accepts_actions() {
            return reject(format!("session is {:?}", self.session.status).to_lowercase());
        }

        let actor = self.actor;
        let action = match intent {
            Intent::CoinFlip => Action::Random(RandomAction::CoinFlip),
            Intent::RollDie => Action::Random(RandomAction::RollDie),
            Intent::ShuffleDeck => {
                self.require_non_empty(ZoneKind::Deck)?;
                Action::Random(RandomAction::ShuffleDeck)
            }
            Intent::ShuffleHandIntoDeck => {
                self.require_non_empty(ZoneKind::Hand)?;
                Action::Random(RandomAction::ShuffleHandIntoDeck)
            }
            Intent::RandomSelection { zone, count } => {
                let count = positive(*count, "count")?;
                self.require_non_empty(*zone)?;
                Action::Select(SelectionAudit { zone: *zone, count })
            }
            Intent::ReorderDeckTop { card_ids } => Action::Zone(ZoneMutation::ReorderTop {
                zone: ZoneKind::Deck,
                order: card_ids.clone(),
            }),

            Intent::Draw { count } => self.from_top(ZoneKind::Deck, *count, Destination::Hand)?,
            Intent::MillToDiscard { count } => {
                self.from_top(ZoneKind::Deck, *count, Destination::Discard)?
            }
            Intent::PeekDeck { count } => {
                let count = positive(*count, "count")?;
                self.require_non_empty(ZoneKind::Deck)?;
                Action::Zone(ZoneMutation::PeekDeck { count })
            }
            Intent::ReturnPeek { position } => {
                self.require_non_empty(ZoneKind::DeckPeek)?;
                transfer(
                    ZoneKind::DeckPeek,
                    CardSelection::Top(usize::MAX),
                    Destination::deck(*position),
                )
            }
            Intent::SearchDeck { card_ids } => {
                self.require_cards(ZoneKind::Deck, card_ids)?;
                transfer(ZoneKind::Deck, CardSelection::Ids(card_ids.clone()), Destination::Hand)
            }
            Intent::PutOnDeck { card_ids, position } => {
                self.require_cards(ZoneKind::Hand, card_ids)?;
                transfer(
                    ZoneKind::Hand,
                    CardSelection::Ids(card_ids.clone()),
                    Destination::deck(*position),
                )
            }
            Intent::ReorderPeek { card_ids } => Action::Zone(ZoneMutation::ReorderTop {
                zone: ZoneKind::DeckPeek,
                order: card_ids.clone(),
            }),

            Intent::PlayToActive { card_id } => {
                self.require_cards(ZoneKind::Hand, std::slice::from_ref(card_id))?;
                if self.board(actor).active.is_some() {
                    return reject("active slot is occupied");
                }
                Action::Board(BoardMutation::PlayFromHand {
                    card_id: card_id.clone(),
                    slot: StackSlot::Active,
                })
            }
            Intent::DeployToBench {
                card_id,
                bench_index,
            } => {
                self.require_cards(ZoneKind::Hand, std::slice::from_ref(card_id))?;
                let slot = StackSlot::Bench(self.bench_index(*bench_index)?);
                if self.board(actor).stack(slot).is_some() {
                    return reject(format!("bench {bench_index} is occupied"));
                }
                Action::Board(BoardMutation::PlayFromHand {
                    card_id: card_id.clone(),
                    slot,
                })
            }
            Intent::SwapActiveBench { bench_index } => {
                let index = self.bench_index(*bench_index)?;
                self.stack(actor, StackSlot::Active)?;
                self.stack(actor, StackSlot::Bench(index))?;
                Action::Board(BoardMutation::SwapActiveBench {
                    player: actor,
                    bench_index: index,
                    require_active: true,
                })
            }
            Intent::CallOpponentBench {
                target_player,
                bench_index,
            } => {
                let opponent = self.opponent(*target_player)?;
                let index = self.bench_index(*bench_index)?;
                self.stack(opponent, StackSlot::Bench(index))?;
                Action::Board(BoardMutation::SwapActiveBench {
                    player: opponent,
                    bench_index: index,
                    require_active: false,
                })
            }
            Intent::KnockOut { target } => {
                let target = self.stack_target(target)?;
                Action::Board(BoardMutation::KnockOut { target })
            }
            Intent::PromoteToActive { bench_index } => {
                let index = self.bench_index(*bench_index)?;
                if self.board(actor).active.is_some() {
                    return reject("active slot is occupied");
                }
                self.stack(actor, StackSlot::Bench(index))?;
                Action::Board(BoardMutation::PromoteToActive { bench_index: index })
            }
            Intent::SetStadium { card_id } => {
                self.require_cards(ZoneKind::Hand, std::slice::from_ref(card_id))?;
                Action::Board(BoardMutation::SetStadium {
                    card_id: card_id.clone(),
                })
            }
            Intent::ClearStadium => {
                if self.session.public_state.stadium.is_none() {
                    return reject("no stadium is in play");
                }
                Action::Board(BoardMutation::ClearStadium)
            }

            Intent::DiscardFromHand { card_ids, count } => {
                let selection = self.selection(ZoneKind::Hand, card_ids, *count)?;
                transfer(ZoneKind::Hand, selection, Destination::Discard)
            }
            Intent::ReturnHandToDeck => {
                self.require_non_empty(ZoneKind::Hand)?;
                transfer(ZoneKind::Hand, CardSelection::Top(usize::MAX), Destination::DeckBottom)
            }
            Intent::ZoneTransfer {
                source,
                destination,
                card_ids,
                count,
            } => {
                if same_zone(*source, *destination) {
                    return reject("source and target zone are the same");
                }
                let selection = self.selection(*source, card_ids, *count)?;
                transfer(*source, selection, *destination)
            }
            Intent::TakePrize { card_ids, count } => {
                let selection = self.selection(ZoneKind::Prize, card_ids, *count)?;
                transfer(ZoneKind::Prize, selection, Destination::Hand)
            }
            Intent::SetPrizes { count } => {
                let count = match count {
                    Some(count) => positive(*count, "count")?,
                    None => self.config.default_prize_count,
                };
                self.require_non_empty(ZoneKind::Deck)?;
                transfer(ZoneKind::Deck, CardSelection::Top(count), Destination::Prize)
            }
            Intent::RevealFromHand { card_ids } => {
                self.require_cards(ZoneKind::Hand, card_ids)?;
                transfer(ZoneKind::Hand, CardSelection::Ids(card_ids.clone()), Destination::Reveal)
            }
            Intent::ReturnRevealToHand => {
                self.require_non_empty(ZoneKind::Reveal)?;
                transfer(ZoneKind::Reveal, CardSelection::Top(usize::MAX), Destination::Hand)
            }

            Intent::Evolve { card_id, slot } => {
                self.require_cards(ZoneKind::Hand, std::slice::from_ref(card_id))?;
                self.stack(actor, *slot)?;
                Action::Stack(StackMutation::Evolve {
                    card_id: card_id.clone(),
                    slot: *slot,
                })
            }
            Intent::Devolve { slot } => {
                if self.stack(actor, *slot)?.card_ids.len() < 2 {
                    return reject("stack has nothing to devolve into");
                }
                Action::Stack(StackMutation::Devolve { slot: *slot })
            }
            Intent::Attach { card_id, slot } => {
                self.require_cards(ZoneKind::Hand, std::slice::from_ref(card_id))?;
                self.stack(actor, *slot)?;
                Action::Stack(StackMutation::Attach {
                    card_id: card_id.clone(),
                    slot: *slot,
                })
            }
            Intent::Detach {
                card_id,
                slot,
                destination,
            } => {
                self.require_attached(*slot, card_id)?;
                Action::Stack(StackMutation::Detach {
                    card_id: card_id.clone(),
                    slot: *slot,
                    destination: *destination,
                })
            }
            Intent::MoveAttachment { card_id, from, to } => {
                if from == to {
                    return reject("source and target stack are the same");
                }
                self.require_attached(*from, card_id)?;
                self.stack(actor, *to)?;
                Action::Stack(StackMutation::MoveAttachment {
                    card_id: card_id.clone(),
                    from: *from,
                    to: *to,
                })
            }
            Intent::ApplyDamage { value, target } | Intent::Heal { value, target } => {
                let amount = positive(*value, "value")?;
                let target = self.stack_target(target)?;
                let amount = i64::try_from(amount).unwrap_or(i64::MAX);
                let delta = if matches!(intent, Intent::Heal { .. }) {
                    -amount
                } else {
                    amount
                };
                Action::Stack(StackMutation::Damage { target, delta })
            }
            Intent::ApplyCondition { condition, target } => {
                let target = self.stack_target(target)?;
                Action::Stack(StackMutation::SetCondition {
                    target,
                    condition: *condition,
                })
            }
            Intent::ClearCondition { condition, target } => {
                let target = self.stack_target(target)?;
                Action::Stack(StackMutation::ClearCondition {
                    target,
                    condition: *condition,
                })
            }
            Intent::MoveDamage {
                value,
                target_player,
                from,
                to,
            } => {
                let amount = positive(*value, "value")?;
                if from == to {
                    return reject("source and target stack are the same");
                }
                let player = target_player.unwrap_or(actor);
                self.stack(player, *from)?;
                self.stack(player, *to)?;
                Action::Stack(StackMutation::MoveDamage {
                    player,
                    from: *from,
                    to: *to,
                    amount: u32::try_from(amount).unwrap_or(u32::MAX),
                })
            }

            Intent::RecordTurnMarker { note } => {
                if note.trim().is_empty() {
                    return reject("note must not be empty");
                }
                Action::Turn(TurnMutation::RecordMarker { note: note.clone() })
            }
            Intent::ClearTurnMarkers => Action::Turn(TurnMutation::ClearMarkers),
            Intent::EndTurn => Action::Turn(TurnMutation::EndTurn),
            Intent::ExtraTurn => Action::Turn(TurnMutation::ExtraTurn),

            Intent::RequestRevealHand {
                target_player,
                note,
            } => self.request(
                OperationId::RequestRevealHand,
                RequestType::RevealHand,
                *target_player,
                RequestPayload {
                    count: 1,
                    note: note.clone(),
                    card_ids: Vec::new(),
                },
            )?,
            Intent::RequestDiscardRandomHand {
                target_player,
                count,
                note,
            } => {
                let count = positive(count.unwrap_or(1), "count")?;
                self.request(
                    OperationId::RequestDiscardRandomHand,
                    RequestType::DiscardRandomHand,
                    *target_player,
                    RequestPayload {
                        count: u32::try_from(count).unwrap_or(u32::MAX),
                        note: note.clone(),
                        card_ids: Vec::new(),
                    },
                )?
            }
            Intent::RequestDiscardSelectedHand {
                target_player,
                card_ids,
                note,
            } => {
                let foreign = card_ids.iter().find(|id| id.owner() != Some(*target_player));
                if let Some(foreign) = foreign {
                    return reject(format!("{foreign} does not belong to {target_player}"));
                }
                self.request(
                    OperationId::RequestDiscardSelectedHand,
                    RequestType::DiscardSelectedHand,
                    *target_player,
                    RequestPayload {
                        count: u32::try_from(card_ids.len()).unwrap_or(u32::MAX),
                        note: note.clone(),
                        card_ids: card_ids.clone(),
                    },
                )?
            }
            Intent::ResolveRequest {
                opcode,
                request_id,
                action,
            } => {
                if opcode != action {
                    return reject(format!(
                        "operation {} does not match requested action {action:?}",
                        intent.op_id()
                    ));
                }
                let request = self.session.request(request_id).ok_or_else(|| {
                    Rejection::new(ErrorCode::NotFound, format!("request {request_id} not found"))
                })?;
                if request.status != RequestStatus::Pending {
                    return reject(format!("request {request_id} is already resolved"));
                }
                if request.target_player_id != actor {
                    return Err(Rejection::new(
                        ErrorCode::PermissionDenied,
                        format!(
                            "only {} may resolve request {request_id}",
                            request.target_player_id
                        ),
                    ));
                }
                if *action == ResolutionDecision::Approve
                    && request.request_type == RequestType::DiscardSelectedHand
                {
                    self.require_cards(ZoneKind::Hand, &request.payload.card_ids)?;
                }
                Action::Request(RequestMutation::Resolve {
                    request_id: request_id.clone(),
                    decision: *action,
                })
            }
        };
        Ok(action)
    }

    fn board(&self, player: PlayerId) -> &'a Board {
        self.session.board(player)
    }

    /// One of the actor's zones, `None` for a private zone whose document is absent.
    fn pile(&self, zone: ZoneKind) -> Option<&'a Pile<CardRef>> {
        let board = self.board(self.actor);
        match zone {
            ZoneKind::Hand => self.private_state.map(|doc| &doc.zones.hand),
            ZoneKind::Deck => self.private_state.map(|doc| &doc.zones.deck),
            ZoneKind::DeckPeek => self.private_state.map(|doc| &doc.zones.deck_peek),
            ZoneKind::Discard => Some(&board.discard),
            ZoneKind::LostZone => Some(&board.lost_zone),
            ZoneKind::Prize => Some(&board.prize),
            ZoneKind::Reveal => Some(&board.reveal),
        }
    }

    fn require_non_empty(&self, zone: ZoneKind) -> Checked<()> {
        match self.pile(zone) {
            Some(pile) if !pile.is_empty() => Ok(()),
            _ => reject(format!("{zone:?} is empty")),
        }
    }

    fn require_cards(&self, zone: ZoneKind, ids: &[CardId]) -> Checked<()> {
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id) {
                return reject(format!("card {id} is listed twice"));
            }
            if !self.pile(zone).is_some_and(|pile| pile.contains_id(id)) {
                return reject(format!("card {id} is not in {zone:?}"));
            }
        }
        Ok(())
    }

    fn from_top(&self, zone: ZoneKind, count: u64, destination: Destination) -> Checked<Action> {
        let count = positive(count, "count")?;
        self.require_non_empty(zone)?;
        Ok(transfer(zone, CardSelection::Top(count), destination))
    }

    /// Explicit ids win; otherwise `count` cards, taken at random from the
    /// unordered hand and from the top of every other zone.
    fn selection(
        &self,
        zone: ZoneKind,
        ids: &[CardId],
        count: Option<u64>,
    ) -> Checked<CardSelection> {
        if !ids.is_empty() {
            self.require_cards(zone, ids)?;
            return Ok(CardSelection::Ids(ids.to_vec()));
        }
        let count = positive(count.unwrap_or(0), "count")?;
        self.require_non_empty(zone)?;
        Ok(match zone {
            ZoneKind::Hand => CardSelection::Random(count),
            _ => CardSelection::Top(count),
        })
    }

    fn bench_index(&self, index: u64) -> Checked<usize> {
        let capacity = self.board(self.actor).bench.len();
        match usize::try_from(index) {
            Ok(index) if index < capacity => Ok(index),
            _ => reject(format!("bench index {index} is outside 0..{capacity}")),
        }
    }

    fn stack(&self, player: PlayerId, slot: StackSlot) -> Checked<&'a StackRef> {
        if let StackSlot::Bench(index) = slot {
            let capacity = self.board(player).bench.len();
            if index >= capacity {
                return reject(format!("bench index {index} is outside 0..{capacity}"));
            }
        }
        self.board(player)
            .stack(slot)
            .ok_or_else(|| Rejection::invalid(format!("{player} has no stack at {slot:?}")))
    }

    fn stack_target(&self, selector: &StackSelector) -> Checked<StackTarget> {
        let player = selector.player.unwrap_or(self.actor);
        self.stack(player, selector.slot)?;
        Ok(StackTarget {
            player,
            slot: selector.slot,
        })
    }

    fn require_attached(&self, slot: StackSlot, card_id: &CardId) -> Checked<()> {
        let stack = self.stack(self.actor, slot)?;
        if !stack.card_ids.contains_id(card_id) {
            return reject(format!("{card_id} is not attached to {slot:?}"));
        }
        if stack.card_ids.top() == Some(card_id) {
            return reject(format!("{card_id} is the top card of the stack"));
        }
        Ok(())
    }

    fn opponent(&self, target: PlayerId) -> Checked<PlayerId> {
        if target == self.actor {
            return reject("target player must be the opponent");
        }
        if self.session.participant_uid(target).is_none() {
            return reject(format!("{target} has not joined the session"));
        }
        Ok(target)
    }

    fn request(
        &self,
        op_id: OperationId,
        request_type: RequestType,
        target: PlayerId,
        payload: RequestPayload,
    ) -> Checked<Action> {
        let target = self.opponent(target)?;
        Ok(Action::Request(RequestMutation::Create {
            op_id,
            request_type,
            target,
            payload,
        }))
    }
}

fn transfer(source: ZoneKind, selection: CardSelection, destination: Destination) -> Action {
    Action::Zone(ZoneMutation::Transfer {
        source,
        selection,
        destination,
    })
}

fn same_zone(source: ZoneKind, destination: Destination) -> bool {
    matches!(
        (source, destination),
        (ZoneKind::Hand, Destination::Hand)
            | (ZoneKind::Deck, Destination::DeckTop | Destination::DeckBottom)
            | (ZoneKind::DeckPeek, Destination::DeckPeek)
            | (ZoneKind::Discard, Destination::Discard)
            | (ZoneKind::LostZone, Destination::LostZone)
            | (ZoneKind::Prize, Destination::Prize)
            | (ZoneKind::Reveal, Destination::Reveal)
    )
}
