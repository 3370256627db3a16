use crate::model::card::Card;
use crate::model::rank::Rank;
use crate::model::suit::Suit;

/// Bit-set over the 52 cards, indexed by [`Card::to_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CardSet(u64);

impl CardSet {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self((1u64 << 52) - 1);

    pub fn from_cards<I: IntoIterator<Item = Card>>(cards: I) -> Self {
        let mut set = Self::EMPTY;
        for card in cards {
            set.insert(card);
        }
        set
    }

    pub fn of_suit(suit: Suit) -> Self {
        Self::from_cards(Rank::ORDERED.iter().map(|&rank| Card::new(rank, suit)))
    }

    pub fn matching<F: Fn(Card) -> bool>(predicate: F) -> Self {
        Self::FULL.filter(predicate)
    }

    pub const fn contains(self, card: Card) -> bool {
        self.0 & (1u64 << card.to_id()) != 0
    }

    pub fn insert(&mut self, card: Card) -> bool {
        let was_present = self.contains(card);
        self.0 |= 1u64 << card.to_id();
        !was_present
    }

    pub fn remove(&mut self, card: Card) -> bool {
        let was_present = self.contains(card);
        self.0 &= !(1u64 << card.to_id());
        was_present
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn filter<F: Fn(Card) -> bool>(self, predicate: F) -> Self {
        Self::from_cards(self.iter().filter(|card| predicate(*card)))
    }

    /// Iterates in id order (suit-major, ascending rank).
    pub fn iter(self) -> impl Iterator<Item = Card> {
        let bits = self.0;
        (0..52u8)
            .filter(move |id| bits & (1u64 << id) != 0)
            .filter_map(Card::from_id)
    }

    pub fn to_vec(self) -> Vec<Card> {
        self.iter().collect()
    }
}

impl FromIterator<Card> for CardSet {
    fn from_iter<I: IntoIterator<Item = Card>>(iter: I) -> Self {
        Self::from_cards(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::CardSet;
    use crate::model::card::Card;
    use crate::model::rank::Rank;
    use crate::model::suit::Suit;

    #[test]
    fn full_set_has_52_cards() {
        assert_eq!(CardSet::FULL.len(), 52);
        assert_eq!(CardSet::FULL.iter().count(), 52);
    }

    #[test]
    fn insert_and_remove_report_membership_changes() {
        let mut set = CardSet::EMPTY;
        let card = Card::new(Rank::Queen, Suit::Hearts);
        assert!(set.insert(card));
        assert!(!set.insert(card));
        assert!(set.contains(card));
        assert!(set.remove(card));
        assert!(!set.remove(card));
        assert!(set.is_empty());
    }

    #[test]
    fn suit_sets_partition_the_deck() {
        let union = Suit::ALL
            .iter()
            .fold(CardSet::EMPTY, |acc, &suit| acc.union(CardSet::of_suit(suit)));
        assert_eq!(union, CardSet::FULL);
        assert_eq!(CardSet::of_suit(Suit::Spades).len(), 13);
    }

    #[test]
    fn matching_selects_men() {
        let men = CardSet::matching(|card| card.is_man());
        assert_eq!(men.len(), 8);
    }
}
