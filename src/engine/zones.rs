use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::types::CardId;

/// Anything stored in a pile that points at a card.
pub trait HasCardId {
    fn card_id(&self) -> &CardId;
}

impl HasCardId for CardId {
    fn card_id(&self) -> &CardId {
        self
    }
}

/// Ordered zone with an explicit top and bottom.
///
/// Serialized bottom → top, so the last array element is the top card. Every
/// deck, hand, discard pile and stack in the documents goes through this type
/// instead of raw vector pushes and shifts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pile<T> {
    items: VecDeque<T>,
}

impl<T> Default for Pile<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }
}

impl<T> Pile<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Bottom → top.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }

    pub fn top(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn insert_top(&mut self, item: T) {
        self.items.push_back(item);
    }

    pub fn insert_bottom(&mut self, item: T) {
        self.items.push_front(item);
    }

    /// Places `items` on top so that `items[0]` becomes the new top card.
    pub fn insert_top_all(&mut self, items: Vec<T>) {
        for item in items.into_iter().rev() {
            self.items.push_back(item);
        }
    }

    /// Places `items` underneath so that `items[0]` sits directly below the
    /// current bottom card.
    pub fn insert_bottom_all(&mut self, items: Vec<T>) {
        for item in items {
            self.items.push_front(item);
        }
    }

    /// Removes up to `n` cards from the top, returned top-first.
    pub fn take_top(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.items.len());
        (0..n).filter_map(|_| self.items.pop_back()).collect()
    }

    /// Removes up to `n` cards from the bottom, returned bottom-first.
    pub fn take_bottom(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.items.len());
        (0..n).filter_map(|_| self.items.pop_front()).collect()
    }

    pub fn take_all(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    /// Up to `n` cards from the top, top-first, without removing them.
    pub fn peek_top(&self, n: usize) -> Vec<&T> {
        self.items.iter().rev().take(n).collect()
    }

    /// Removes the items at the given bottom-based positions.
    pub fn take_positions(&mut self, mut positions: Vec<usize>) -> Vec<T> {
        positions.sort_unstable();
        positions.dedup();
        let mut taken = Vec::with_capacity(positions.len());
        for pos in positions.into_iter().rev() {
            if let Some(item) = self.items.remove(pos) {
                taken.push(item);
            }
        }
        taken.reverse();
        taken
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.items.make_contiguous().shuffle(rng);
    }
}

impl<T: HasCardId> Pile<T> {
    pub fn contains_id(&self, id: &CardId) -> bool {
        self.items.iter().any(|item| item.card_id() == id)
    }

    pub fn find(&self, id: &CardId) -> Option<&T> {
        self.items.iter().find(|item| item.card_id() == id)
    }

    pub fn take_by_id(&mut self, id: &CardId) -> Option<T> {
        let pos = self.items.iter().position(|item| item.card_id() == id)?;
        self.items.remove(pos)
    }

    /// Card ids bottom → top.
    pub fn ids(&self) -> Vec<CardId> {
        self.items.iter().map(|item| item.card_id().clone()).collect()
    }

    /// Rewrites the top `order.len()` items so that `order[0]` becomes the top.
    ///
    /// Requested ids that are not among the current top N are ignored; if what
    /// is left does not cover the whole top N the pile is left untouched and
    /// `false` is returned.
    pub fn reorder_top(&mut self, order: &[CardId]) -> bool {
        let n = order.len();
        if n == 0 || n > self.items.len() {
            return false;
        }
        let top_ids: Vec<CardId> = self
            .peek_top(n)
            .into_iter()
            .map(|item| item.card_id().clone())
            .collect();
        let mut matched: Vec<&CardId> = Vec::with_capacity(n);
        for id in order {
            if top_ids.contains(id) && !matched.contains(&id) {
                matched.push(id);
            }
        }
        if matched.len() != n {
            return false;
        }

        let mut top = self.take_top(n);
        let mut reordered = Vec::with_capacity(n);
        for id in matched {
            if let Some(pos) = top.iter().position(|item| item.card_id() == id) {
                reordered.push(top.remove(pos));
            }
        }
        self.insert_top_all(reordered);
        true
    }
}

impl<T> FromIterator<T> for Pile<T> {
    /// Collects bottom → top.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn ids(values: &[&str]) -> Vec<CardId> {
        values.iter().map(|v| CardId::from(*v)).collect()
    }

    fn pile(bottom_to_top: &[&str]) -> Pile<CardId> {
        ids(bottom_to_top).into_iter().collect()
    }

    #[test]
    fn top_is_the_tail() {
        let mut p = pile(&["a", "b", "c"]);
        assert_eq!(p.top(), Some(&CardId::from("c")));
        assert_eq!(p.take_top(2), ids(&["c", "b"]));
        assert_eq!(p.ids(), ids(&["a"]));
    }

    #[test]
    fn take_clamps_to_available() {
        let mut p = pile(&["a"]);
        assert_eq!(p.take_top(5).len(), 1);
        assert!(p.take_bottom(3).is_empty());
    }

    #[test]
    fn insert_all_keeps_first_item_adjacent() {
        let mut p = pile(&["m"]);
        p.insert_top_all(ids(&["t1", "t2"]));
        p.insert_bottom_all(ids(&["b1", "b2"]));
        assert_eq!(p.ids(), ids(&["b2", "b1", "m", "t2", "t1"]));
    }

    #[test]
    fn take_positions_preserves_relative_order() {
        let mut p = pile(&["a", "b", "c", "d"]);
        assert_eq!(p.take_positions(vec![3, 1, 1]), ids(&["b", "d"]));
        assert_eq!(p.ids(), ids(&["a", "c"]));
    }

    #[test]
    fn reorder_top_applies_exact_match() {
        let mut p = pile(&["x", "a", "b", "c"]);
        assert!(p.reorder_top(&ids(&["a", "c", "b"])));
        assert_eq!(p.peek_top(3).into_iter().cloned().collect::<Vec<_>>(), ids(&["a", "c", "b"]));
        assert_eq!(p.take_bottom(1), ids(&["x"]));
    }

    #[test]
    fn reorder_top_skips_partial_match() {
        let mut p = pile(&["x", "a", "b", "c"]);
        let before = p.clone();
        // "x" is not among the top three, so only two of three ids match.
        assert!(!p.reorder_top(&ids(&["x", "c", "b"])));
        assert_eq!(p, before);
        assert!(!p.reorder_top(&ids(&["c", "c", "b"])));
        assert_eq!(p, before);
    }

    #[test]
    fn shuffle_keeps_membership() {
        let mut p = pile(&["a", "b", "c", "d", "e"]);
        let mut rng = StdRng::seed_from_u64(9);
        p.shuffle(&mut rng);
        let mut after = p.ids();
        after.sort();
        assert_eq!(after, ids(&["a", "b", "c", "d", "e"]));
    }

    #[test]
    fn serializes_bottom_to_top() {
        let p = pile(&["a", "b"]);
        assert_eq!(serde_json::to_value(&p).unwrap(), serde_json::json!(["a", "b"]));
    }
}
