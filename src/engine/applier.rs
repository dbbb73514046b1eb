use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::actions::*;
use super::context::TxnContext;
use super::errors::EngineError;
use super::state::*;
use super::types::*;
use super::zones::Pile;

const LOG_TARGET: &str = "engine::applier";

/// What an applied action produced, for the caller's receipt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEffect {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub moved_card_ids: Vec<CardId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coin: Option<CoinFace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub die: Option<u8>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selected_card_ids: Vec<CardId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_result: Option<RequestResult>,
    /// False when the action was accepted but left every zone untouched.
    pub changed: bool,
}

impl ActionEffect {
    fn changed() -> Self {
        Self {
            changed: true,
            ..Self::default()
        }
    }

    fn moved(ids: Vec<CardId>) -> Self {
        Self {
            moved_card_ids: ids,
            changed: true,
            ..Self::default()
        }
    }
}

/// Executes one resolved action against the transaction drafts.
///
/// Any error leaves the drafts half-written; the runner discards them.
pub fn apply_action(ctx: &mut TxnContext, action: &Action) -> Result<ActionEffect, EngineError> {
    debug!(target = LOG_TARGET, actor = %ctx.actor, kind = action.kind(), "applying action");

    let effect = match action {
        Action::Random(random) => apply_random(ctx, random)?,
        Action::Select(audit) => record_selection(ctx, audit)?,
        Action::Zone(mutation) => apply_zone(ctx, mutation)?,
        Action::Board(mutation) => apply_board(ctx, mutation)?,
        Action::Stack(mutation) => apply_stack(ctx, mutation)?,
        Action::Turn(mutation) => apply_turn(ctx, mutation)?,
        Action::Request(mutation) => apply_request(ctx, mutation)?,
    };

    sync_deck_peek(ctx);
    sync_counters(ctx);
    ctx.session.status.advance_to(SessionStatus::Playing);
    Ok(effect)
}

/// Mirrors the loaded private document's zone sizes into the public counters.
pub fn sync_counters(ctx: &mut TxnContext) {
    if let Some(private) = ctx.private_state.as_ref() {
        let counters = Counters {
            deck_count: private.zones.deck.len(),
            hand_count: private.zones.hand.len(),
        };
        ctx.session
            .public_state
            .players
            .get_mut(private.owner_player_id)
            .counters = counters;
    }
}

fn sync_deck_peek(ctx: &mut TxnContext) {
    let Some(private) = ctx.private_state.as_ref() else {
        return;
    };
    let owner = private.owner_player_id;
    let count = private.zones.deck_peek.len();
    let peek = &mut ctx.session.public_state.turn_context.deck_peek;
    *peek = match peek.take() {
        Some(other) if other.player_id != owner => Some(other),
        _ if count == 0 => None,
        _ => Some(DeckPeekState {
            player_id: owner,
            count,
        }),
    };
}

// ---- Zone primitives -------------------------------------------------------------------------

fn zone_mut(
    ctx: &mut TxnContext,
    owner: PlayerId,
    zone: ZoneKind,
) -> Result<&mut Pile<CardRef>, EngineError> {
    Ok(match zone {
        ZoneKind::Hand => &mut ctx.private_for(owner)?.zones.hand,
        ZoneKind::Deck => &mut ctx.private_for(owner)?.zones.deck,
        ZoneKind::DeckPeek => &mut ctx.private_for(owner)?.zones.deck_peek,
        ZoneKind::Discard => &mut ctx.session.board_mut(owner).discard,
        ZoneKind::LostZone => &mut ctx.session.board_mut(owner).lost_zone,
        ZoneKind::Prize => &mut ctx.session.board_mut(owner).prize,
        ZoneKind::Reveal => &mut ctx.session.board_mut(owner).reveal,
    })
}

/// Removes the selected cards from one of the actor's zones.
fn take_cards(
    ctx: &mut TxnContext,
    zone: ZoneKind,
    selection: &CardSelection,
) -> Result<Vec<CardId>, EngineError> {
    let owner = ctx.actor;
    let taken = match selection {
        CardSelection::Ids(ids) => {
            let pile = zone_mut(ctx, owner, zone)?;
            let mut taken = Vec::with_capacity(ids.len());
            for id in ids {
                let card = pile.take_by_id(id).ok_or_else(|| {
                    EngineError::invalid(format!("card {id} is not in {zone:?}"))
                })?;
                taken.push(card);
            }
            taken
        }
        CardSelection::Top(count) => zone_mut(ctx, owner, zone)?.take_top(*count),
        CardSelection::Random(count) => {
            let positions = random_positions(ctx, zone, *count)?;
            zone_mut(ctx, owner, zone)?.take_positions(positions)
        }
    };
    Ok(taken.into_iter().map(|card| card.card_id).collect())
}

fn random_positions(
    ctx: &mut TxnContext,
    zone: ZoneKind,
    count: usize,
) -> Result<Vec<usize>, EngineError> {
    let actor = ctx.actor;
    let len = zone_mut(ctx, actor, zone)?.len();
    let amount = count.min(len);
    Ok(rand::seq::index::sample(&mut ctx.rng, len, amount).into_vec())
}

/// Image url from `owner`'s catalog, when that catalog is loaded.
fn catalog_image(ctx: &TxnContext, owner: PlayerId, card_id: &CardId) -> Option<String> {
    ctx.private_state
        .as_ref()
        .filter(|doc| doc.owner_player_id == owner)
        .and_then(|doc| doc.image_url(card_id))
        .map(str::to_owned)
}

fn catalog_images(ctx: &TxnContext, owner: PlayerId, cards: &[CardId]) -> BTreeMap<CardId, String> {
    cards
        .iter()
        .filter_map(|id| Some((id.clone(), catalog_image(ctx, owner, id)?)))
        .collect()
}

/// Builds the placement record a card gets when it lands in `destination`.
///
/// Public placements copy the image from the owner's catalog, or from
/// `snapshot` when the catalog is not part of this transaction.
fn placement(
    ctx: &TxnContext,
    owner: PlayerId,
    card_id: CardId,
    snapshot: Option<String>,
    destination: Destination,
) -> CardRef {
    let (is_face_down, visibility) = match destination {
        Destination::Hand | Destination::DeckPeek => (false, Visibility::OwnerOnly),
        Destination::DeckTop | Destination::DeckBottom | Destination::Prize => {
            (true, Visibility::OwnerOnly)
        }
        Destination::Discard | Destination::LostZone => (false, Visibility::Public),
        Destination::Reveal => (false, Visibility::TemporarilyRevealed),
    };
    let image_url = match visibility {
        Visibility::OwnerOnly => None,
        Visibility::Public | Visibility::TemporarilyRevealed => {
            catalog_image(ctx, owner, &card_id).or(snapshot)
        }
    };
    CardRef {
        card_id,
        orientation: Orientation::Vertical,
        is_face_down,
        visibility,
        image_url,
    }
}

/// Places cards into `owner`'s zone; `cards[0]` ends up nearest the chosen end.
fn place_cards(
    ctx: &mut TxnContext,
    owner: PlayerId,
    destination: Destination,
    cards: Vec<CardId>,
) -> Result<(), EngineError> {
    let cards = cards.into_iter().map(|id| (id, None)).collect();
    place_with_images(ctx, owner, destination, cards)
}

/// [`place_cards`] for cards that carry their own image snapshot.
fn place_with_images(
    ctx: &mut TxnContext,
    owner: PlayerId,
    destination: Destination,
    cards: Vec<(CardId, Option<String>)>,
) -> Result<(), EngineError> {
    let refs: Vec<CardRef> = cards
        .into_iter()
        .map(|(id, snapshot)| placement(ctx, owner, id, snapshot, destination))
        .collect();
    match destination {
        Destination::DeckBottom => zone_mut(ctx, owner, ZoneKind::Deck)?.insert_bottom_all(refs),
        Destination::DeckTop => zone_mut(ctx, owner, ZoneKind::Deck)?.insert_top_all(refs),
        Destination::Hand => zone_mut(ctx, owner, ZoneKind::Hand)?.insert_top_all(refs),
        Destination::DeckPeek => zone_mut(ctx, owner, ZoneKind::DeckPeek)?.insert_top_all(refs),
        Destination::Discard => zone_mut(ctx, owner, ZoneKind::Discard)?.insert_top_all(refs),
        Destination::LostZone => zone_mut(ctx, owner, ZoneKind::LostZone)?.insert_top_all(refs),
        Destination::Prize => zone_mut(ctx, owner, ZoneKind::Prize)?.insert_top_all(refs),
        Destination::Reveal => zone_mut(ctx, owner, ZoneKind::Reveal)?.insert_top_all(refs),
    }
    Ok(())
}

fn stack_mut(
    ctx: &mut TxnContext,
    player: PlayerId,
    slot: StackSlot,
) -> Result<&mut StackRef, EngineError> {
    ctx.session
        .board_mut(player)
        .stack_mut(slot)
        .ok_or_else(|| EngineError::invalid(format!("{player} has no stack at {slot:?}")))
}

// ---- Randomness ------------------------------------------------------------------------------

fn apply_random(ctx: &mut TxnContext, action: &RandomAction) -> Result<ActionEffect, EngineError> {
    let actor = ctx.actor;
    let mut effect = ActionEffect::changed();
    match action {
        RandomAction::CoinFlip => {
            let face = if ctx.rng.gen_bool(0.5) {
                CoinFace::Heads
            } else {
                CoinFace::Tails
            };
            ctx.session.public_state.turn_context.last_coin_result = Some(face);
            effect.coin = Some(face);
        }
        RandomAction::RollDie => {
            let value = ctx.rng.gen_range(1..=6u8);
            ctx.session.public_state.turn_context.last_die_result = Some(value);
            effect.die = Some(value);
        }
        RandomAction::ShuffleDeck => shuffle_deck(ctx)?,
        RandomAction::ShuffleHandIntoDeck => {
            let hand = take_cards(ctx, ZoneKind::Hand, &CardSelection::Top(usize::MAX))?;
            place_cards(ctx, actor, Destination::DeckTop, hand.clone())?;
            shuffle_deck(ctx)?;
            effect.moved_card_ids = hand;
        }
    }
    Ok(effect)
}

fn shuffle_deck(ctx: &mut TxnContext) -> Result<(), EngineError> {
    let actor = ctx.actor;
    let TxnContext {
        private_state, rng, ..
    } = ctx;
    let private = private_state
        .as_mut()
        .filter(|doc| doc.owner_player_id == actor)
        .ok_or_else(|| EngineError::invalid("deck is not available in this transaction"))?;
    private.zones.deck.shuffle(rng);
    Ok(())
}

fn record_selection(
    ctx: &mut TxnContext,
    audit: &SelectionAudit,
) -> Result<ActionEffect, EngineError> {
    let actor = ctx.actor;
    let positions = random_positions(ctx, audit.zone, audit.count)?;
    let ids = zone_mut(ctx, actor, audit.zone)?.ids();
    let mut picked: Vec<CardId> = positions
        .into_iter()
        .filter_map(|pos| ids.get(pos).cloned())
        .collect();
    picked.sort();

    ctx.session.public_state.turn_context.last_random_selection = Some(SelectionRecord {
        player_id: actor,
        zone: audit.zone,
        card_ids: picked.clone(),
        selected_at: ctx.now,
    });
    Ok(ActionEffect {
        selected_card_ids: picked,
        changed: true,
        ..ActionEffect::default()
    })
}

// ---- Zones -----------------------------------------------------------------------------------

fn apply_zone(ctx: &mut TxnContext, mutation: &ZoneMutation) -> Result<ActionEffect, EngineError> {
    let actor = ctx.actor;
    match mutation {
        ZoneMutation::Transfer {
            source,
            selection,
            destination,
        } => {
            let moved = take_cards(ctx, *source, selection)?;
            place_cards(ctx, actor, *destination, moved.clone())?;
            Ok(ActionEffect::moved(moved))
        }
        ZoneMutation::ReorderTop { zone, order } => {
            let applied = zone_mut(ctx, actor, *zone)?.reorder_top(order);
            if !applied {
                debug!(
                    target = LOG_TARGET,
                    zone = ?zone,
                    "reorder ids do not match the top cards; skipped"
                );
            }
            Ok(ActionEffect {
                changed: applied,
                ..ActionEffect::default()
            })
        }
        ZoneMutation::PeekDeck { count } => {
            let peeked = take_cards(ctx, ZoneKind::Deck, &CardSelection::Top(*count))?;
            place_cards(ctx, actor, Destination::DeckPeek, peeked.clone())?;
            Ok(ActionEffect::moved(peeked))
        }
    }
}

// ---- Board -----------------------------------------------------------------------------------

fn apply_board(
    ctx: &mut TxnContext,
    mutation: &BoardMutation,
) -> Result<ActionEffect, EngineError> {
    let actor = ctx.actor;
    match mutation {
        BoardMutation::PlayFromHand { card_id, slot } => {
            let occupied = ctx
                .session
                .board_mut(actor)
                .slot_mut(*slot)
                .ok_or_else(|| EngineError::invalid(format!("slot {slot:?} does not exist")))?
                .is_some();
            if occupied {
                return Err(EngineError::invalid(format!("slot {slot:?} is occupied")));
            }
            let cards = take_from_hand(ctx, card_id)?;
            let mut stack = StackRef::new(cards.clone());
            stack.card_images = catalog_images(ctx, actor, &cards);
            if let Some(target) = ctx.session.board_mut(actor).slot_mut(*slot) {
                *target = Some(stack);
            }
            Ok(ActionEffect::moved(cards))
        }
        BoardMutation::SwapActiveBench {
            player,
            bench_index,
            require_active,
        } => {
            let board = ctx.session.board_mut(*player);
            let bench = board
                .bench
                .get_mut(*bench_index)
                .ok_or_else(|| {
                    EngineError::invalid(format!("bench {bench_index} does not exist"))
                })?;
            if bench.is_none() {
                return Err(EngineError::invalid(format!("bench {bench_index} is empty")));
            }
            if *require_active && board.active.is_none() {
                return Err(EngineError::invalid("active slot is empty"));
            }
            std::mem::swap(&mut board.active, bench);
            if *player == actor {
                ctx.session.public_state.turn_context.flags.retreated = true;
            }
            Ok(ActionEffect::changed())
        }
        BoardMutation::PromoteToActive { bench_index } => {
            let board = ctx.session.board_mut(actor);
            if board.active.is_some() {
                return Err(EngineError::invalid("active slot is occupied"));
            }
            let promoted = board
                .bench
                .get_mut(*bench_index)
                .and_then(Option::take)
                .ok_or_else(|| EngineError::invalid(format!("bench {bench_index} is empty")))?;
            board.active = Some(promoted);
            Ok(ActionEffect::changed())
        }
        BoardMutation::KnockOut { target } => {
            let stack = ctx
                .session
                .board_mut(target.player)
                .slot_mut(target.slot)
                .and_then(Option::take)
                .ok_or_else(|| EngineError::invalid(format!("no stack at {:?}", target.slot)))?;
            let StackRef {
                mut card_ids,
                mut card_images,
                ..
            } = stack;
            let cards = card_ids.take_all();
            let placed = cards
                .iter()
                .map(|id| (id.clone(), card_images.remove(id)))
                .collect();
            place_with_images(ctx, target.player, Destination::Discard, placed)?;
            Ok(ActionEffect::moved(cards))
        }
        BoardMutation::SetStadium { card_id } => {
            let cards = take_from_hand(ctx, card_id)?;
            let image_url = catalog_image(ctx, actor, card_id);
            let replaced = ctx.session.public_state.stadium.replace(StadiumSlot {
                card_id: card_id.clone(),
                owner_player_id: actor,
                image_url,
            });
            if let Some(previous) = replaced {
                discard_stadium(ctx, previous)?;
            }
            ctx.session.public_state.turn_context.flags.stadium_played = true;
            Ok(ActionEffect::moved(cards))
        }
        BoardMutation::ClearStadium => {
            let previous = ctx
                .session
                .public_state
                .stadium
                .take()
                .ok_or_else(|| EngineError::invalid("no stadium is in play"))?;
            let moved = vec![previous.card_id.clone()];
            discard_stadium(ctx, previous)?;
            Ok(ActionEffect::moved(moved))
        }
    }
}

fn take_from_hand(ctx: &mut TxnContext, card_id: &CardId) -> Result<Vec<CardId>, EngineError> {
    take_cards(ctx, ZoneKind::Hand, &CardSelection::Ids(vec![card_id.clone()]))
}

/// Sends a stadium to its owner's discard with the image it was shown with.
fn discard_stadium(ctx: &mut TxnContext, stadium: StadiumSlot) -> Result<(), EngineError> {
    let card = vec![(stadium.card_id, stadium.image_url)];
    place_with_images(ctx, stadium.owner_player_id, Destination::Discard, card)
}

// ---- Stacks ----------------------------------------------------------------------------------

fn apply_stack(
    ctx: &mut TxnContext,
    mutation: &StackMutation,
) -> Result<ActionEffect, EngineError> {
    let actor = ctx.actor;
    match mutation {
        StackMutation::Evolve { card_id, slot } => {
            stack_mut(ctx, actor, *slot)?;
            let cards = take_from_hand(ctx, card_id)?;
            let images = catalog_images(ctx, actor, &cards);
            let stack = stack_mut(ctx, actor, *slot)?;
            for id in cards.iter().cloned() {
                stack.card_ids.insert_top(id);
            }
            stack.card_images.extend(images);
            Ok(ActionEffect::moved(cards))
        }
        StackMutation::Devolve { slot } => {
            let stack = stack_mut(ctx, actor, *slot)?;
            if stack.card_ids.len() < 2 {
                return Err(EngineError::invalid("stack has nothing to devolve into"));
            }
            let removed = stack.card_ids.take_top(1);
            for id in &removed {
                stack.card_images.remove(id);
            }
            place_cards(ctx, actor, Destination::Hand, removed.clone())?;
            Ok(ActionEffect::moved(removed))
        }
        StackMutation::Attach { card_id, slot } => {
            stack_mut(ctx, actor, *slot)?;
            let cards = take_from_hand(ctx, card_id)?;
            let images = catalog_images(ctx, actor, &cards);
            let stack = stack_mut(ctx, actor, *slot)?;
            for id in cards.iter().cloned() {
                stack.card_ids.insert_bottom(id);
            }
            stack.card_images.extend(images);
            ctx.session.public_state.turn_context.flags.energy_attached = true;
            Ok(ActionEffect::moved(cards))
        }
        StackMutation::Detach {
            card_id,
            slot,
            destination,
        } => {
            let (removed, image) = detach_card(ctx, actor, *slot, card_id)?;
            place_with_images(ctx, actor, *destination, vec![(removed.clone(), image)])?;
            Ok(ActionEffect::moved(vec![removed]))
        }
        StackMutation::MoveAttachment { card_id, from, to } => {
            if from == to {
                return Err(EngineError::invalid("source and target stack are the same"));
            }
            stack_mut(ctx, actor, *to)?;
            let (removed, image) = detach_card(ctx, actor, *from, card_id)?;
            let target = stack_mut(ctx, actor, *to)?;
            target.card_ids.insert_bottom(removed.clone());
            if let Some(image) = image {
                target.card_images.insert(removed.clone(), image);
            }
            Ok(ActionEffect::moved(vec![removed]))
        }
        StackMutation::Damage { target, delta } => {
            let stack = stack_mut(ctx, target.player, target.slot)?;
            let next = i64::from(stack.damage)
                .saturating_add(*delta)
                .clamp(0, i64::from(u32::MAX));
            stack.damage = next as u32;
            Ok(ActionEffect::changed())
        }
        StackMutation::MoveDamage {
            player,
            from,
            to,
            amount,
        } => {
            if from == to {
                return Err(EngineError::invalid("source and target stack are the same"));
            }
            stack_mut(ctx, *player, *to)?;
            let source = stack_mut(ctx, *player, *from)?;
            let moved = (*amount).min(source.damage);
            source.damage -= moved;
            let target = stack_mut(ctx, *player, *to)?;
            target.damage = target.damage.saturating_add(moved);
            Ok(ActionEffect::changed())
        }
        StackMutation::SetCondition { target, condition } => {
            stack_mut(ctx, target.player, target.slot)?
                .special_conditions
                .set(*condition);
            Ok(ActionEffect::changed())
        }
        StackMutation::ClearCondition { target, condition } => {
            let conditions = &mut stack_mut(ctx, target.player, target.slot)?.special_conditions;
            match condition {
                Some(condition) => conditions.clear(*condition),
                None => conditions.clear_all(),
            }
            Ok(ActionEffect::changed())
        }
    }
}

/// Pulls a non-top card out of a stack, with its image snapshot. The top
/// card is the stack itself.
fn detach_card(
    ctx: &mut TxnContext,
    player: PlayerId,
    slot: StackSlot,
    card_id: &CardId,
) -> Result<(CardId, Option<String>), EngineError> {
    let stack = stack_mut(ctx, player, slot)?;
    if stack.card_ids.top() == Some(card_id) {
        return Err(EngineError::invalid(format!("{card_id} is the top card of the stack")));
    }
    let removed = stack
        .card_ids
        .take_by_id(card_id)
        .ok_or_else(|| EngineError::invalid(format!("{card_id} is not attached to {slot:?}")))?;
    let image = stack.card_images.remove(&removed);
    Ok((removed, image))
}

// ---- Turns -----------------------------------------------------------------------------------

fn apply_turn(ctx: &mut TxnContext, mutation: &TurnMutation) -> Result<ActionEffect, EngineError> {
    let actor = ctx.actor;
    let now = ctx.now;
    let turn = &mut ctx.session.public_state.turn_context;
    match mutation {
        TurnMutation::RecordMarker { note } => {
            let turn_number = turn.turn_number;
            ctx.session.board_mut(actor).markers.push(BoardMarker {
                note: note.clone(),
                turn_number,
                created_at: now,
            });
        }
        TurnMutation::ClearMarkers => ctx.session.board_mut(actor).markers.clear(),
        TurnMutation::EndTurn => {
            let next = turn.current_player.unwrap_or(actor).other();
            turn.current_player = Some(next);
            turn.turn_number += 1;
            turn.flags = TurnFlags::default();
        }
        TurnMutation::ExtraTurn => {
            turn.turn_number += 1;
            turn.flags = TurnFlags::default();
        }
    }
    Ok(ActionEffect::changed())
}

// ---- Requests --------------------------------------------------------------------------------

fn apply_request(
    ctx: &mut TxnContext,
    mutation: &RequestMutation,
) -> Result<ActionEffect, EngineError> {
    match mutation {
        RequestMutation::Create {
            op_id,
            request_type,
            target,
            payload,
        } => {
            let request_id = RequestId::generate();
            ctx.session.public_state.operation_requests.push(OperationRequest {
                request_id: request_id.clone(),
                op_id: *op_id,
                request_type: *request_type,
                status: RequestStatus::Pending,
                actor_player_id: ctx.actor,
                target_player_id: *target,
                payload: payload.clone(),
                created_at: ctx.now,
                resolved_at: None,
                resolved_by_player_id: None,
                result: None,
            });
            Ok(ActionEffect {
                request_id: Some(request_id),
                changed: true,
                ..ActionEffect::default()
            })
        }
        RequestMutation::Resolve {
            request_id,
            decision,
        } => resolve_request(ctx, request_id, *decision),
    }
}

fn resolve_request(
    ctx: &mut TxnContext,
    request_id: &RequestId,
    decision: ResolutionDecision,
) -> Result<ActionEffect, EngineError> {
    let request = ctx
        .session
        .request(request_id)
        .cloned()
        .ok_or_else(|| EngineError::not_found(format!("request {request_id}")))?;
    if request.status != RequestStatus::Pending {
        return Err(EngineError::invalid(format!("request {request_id} is already resolved")));
    }
    if request.target_player_id != ctx.actor {
        return Err(EngineError::permission(format!(
            "request {request_id} is addressed to {}",
            request.target_player_id
        )));
    }

    let (status, result, moved) = match decision {
        ResolutionDecision::Reject => (
            RequestStatus::Rejected,
            RequestResult::Rejected {
                reason: REJECTED_BY_TARGET.to_owned(),
            },
            Vec::new(),
        ),
        ResolutionDecision::Approve => {
            let (result, moved) = fulfil_request(ctx, &request)?;
            (RequestStatus::Completed, result, moved)
        }
    };

    let actor = ctx.actor;
    let now = ctx.now;
    if let Some(stored) = ctx.session.request_mut(request_id) {
        stored.status = status;
        stored.resolved_at = Some(now);
        stored.resolved_by_player_id = Some(actor);
        stored.result = Some(result.clone());
    }
    Ok(ActionEffect {
        moved_card_ids: moved,
        request_id: Some(request_id.clone()),
        request_result: Some(result),
        changed: true,
        ..ActionEffect::default()
    })
}

fn fulfil_request(
    ctx: &mut TxnContext,
    request: &OperationRequest,
) -> Result<(RequestResult, Vec<CardId>), EngineError> {
    let actor = ctx.actor;
    match request.request_type {
        RequestType::RevealHand => {
            let private = ctx.private_for(actor)?;
            let revealed_card_ids = private.zones.hand.ids();
            let revealed_cards = revealed_card_ids
                .iter()
                .map(|id| CardSnapshot {
                    card_id: id.clone(),
                    image_url: private.image_url(id).unwrap_or_default().to_owned(),
                })
                .collect();
            Ok((
                RequestResult::Revealed {
                    revealed_card_ids,
                    revealed_cards,
                },
                Vec::new(),
            ))
        }
        RequestType::DiscardRandomHand => {
            let count = request.payload.count as usize;
            let discarded = take_cards(ctx, ZoneKind::Hand, &CardSelection::Random(count))?;
            place_cards(ctx, actor, Destination::Discard, discarded.clone())?;
            Ok((
                RequestResult::Discarded {
                    discarded_card_ids: discarded.clone(),
                },
                discarded,
            ))
        }
        RequestType::DiscardSelectedHand => {
            let selection = CardSelection::Ids(request.payload.card_ids.clone());
            let discarded = take_cards(ctx, ZoneKind::Hand, &selection)?;
            place_cards(ctx, actor, Destination::Discard, discarded.clone())?;
            Ok((
                RequestResult::Discarded {
                    discarded_card_ids: discarded.clone(),
                },
                discarded,
            ))
        }
    }
}
