//! Common test utilities for engine and session tests

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }
}

/// Ready-made documents for two seated players.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use rand::{rngs::StdRng, SeedableRng};

    use crate::config::DEFAULT_BENCH_CAPACITY;
    use crate::engine::*;

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("fixed fixture timestamp")
    }

    pub fn uid(player: PlayerId) -> String {
        format!("uid-{player}")
    }

    pub fn image_for(id: &CardId) -> String {
        format!("https://cards.example/{id}.png")
    }

    /// A private document whose deck holds cards `1..=deck` (card 1 at the
    /// bottom) and whose hand holds the next `hand` cards.
    pub fn private_state(owner: PlayerId, deck: usize, hand: usize) -> PrivateStateDoc {
        let mut doc = PrivateStateDoc::new(owner, now());
        for seq in 1..=(deck + hand) {
            let id = CardId::new(owner, seq as u32);
            doc.card_catalog.insert(
                id.clone(),
                CardEntity {
                    card_id: id.clone(),
                    image_url: image_for(&id),
                    original_card_code: format!("SV1-{seq:03}"),
                    owner_player_id: owner,
                    created_at: now(),
                },
            );
            let in_deck = seq <= deck;
            let card = CardRef {
                card_id: id,
                orientation: Orientation::Vertical,
                is_face_down: in_deck,
                visibility: Visibility::OwnerOnly,
                image_url: None,
            };
            if in_deck {
                doc.zones.deck.insert_top(card);
            } else {
                doc.zones.hand.insert_top(card);
            }
        }
        doc
    }

    /// Session with both seats claimed plus both private documents, counters synced.
    pub fn seeded_pair(
        deck: usize,
        hand: usize,
    ) -> (SessionDoc, PerPlayer<Option<PrivateStateDoc>>) {
        let mut session = SessionDoc::new(now(), DEFAULT_BENCH_CAPACITY);
        session.status = SessionStatus::Ready;
        let mut privates = PerPlayer::<Option<PrivateStateDoc>>::default();
        for player in PlayerId::ALL {
            *session.participants.get_mut(player) = Some(Participant {
                uid: uid(player),
                connected: true,
                joined_at: now(),
            });
            let doc = private_state(player, deck, hand);
            session.public_state.players.get_mut(player).counters = Counters {
                deck_count: doc.zones.deck.len(),
                hand_count: doc.zones.hand.len(),
            };
            *privates.get_mut(player) = Some(doc);
        }
        (session, privates)
    }

    pub fn context(
        session: SessionDoc,
        private_state: Option<PrivateStateDoc>,
        actor: PlayerId,
    ) -> TxnContext {
        TxnContext::new(session, private_state, actor, now(), StdRng::seed_from_u64(7))
    }

    /// Moves hand cards of `player` into a new stack; `cards[0]` ends on top.
    pub fn place_stack(
        session: &mut SessionDoc,
        private_state: &mut PrivateStateDoc,
        slot: StackSlot,
        cards: &[CardId],
    ) {
        for id in cards {
            private_state
                .zones
                .hand
                .take_by_id(id)
                .expect("fixture card must be in hand");
        }
        let owner = private_state.owner_player_id;
        let target = session
            .board_mut(owner)
            .slot_mut(slot)
            .expect("fixture slot must exist");
        let mut stack = StackRef::new(cards.to_vec());
        for id in cards {
            if let Some(url) = private_state.image_url(id) {
                stack.card_images.insert(id.clone(), url.to_owned());
            }
        }
        *target = Some(stack);
        session.public_state.players.get_mut(owner).counters.hand_count =
            private_state.zones.hand.len();
    }

    pub fn hand_ids(doc: &PrivateStateDoc) -> Vec<CardId> {
        doc.zones.hand.ids()
    }
}
