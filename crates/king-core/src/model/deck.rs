use crate::model::card::Card;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Every King round is dealt from the full 52-card deck.
pub const DECK_SIZE: usize = 52;
pub const HAND_SIZE: usize = 13;

#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    pub fn standard() -> Self {
        let cards = (0..DECK_SIZE as u8).filter_map(Card::from_id).collect();
        Self { cards }
    }

    pub fn shuffled<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        let mut deck = Self::standard();
        deck.cards.shuffle(rng);
        deck
    }

    /// Reproducible deal order for fixtures and replays.
    pub fn shuffled_with_seed(seed: u64) -> Self {
        Self::shuffled(&mut StdRng::seed_from_u64(seed))
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }
}

#[cfg(test)]
mod tests {
    use super::{DECK_SIZE, Deck};
    use crate::model::card_set::CardSet;

    #[test]
    fn standard_deck_has_52_unique_cards() {
        let deck = Deck::standard();
        assert_eq!(deck.cards().len(), DECK_SIZE);
        assert_eq!(CardSet::from_cards(deck.cards().iter().copied()).len(), DECK_SIZE);
    }

    #[test]
    fn shuffle_with_seed_is_deterministic() {
        let deck_a = Deck::shuffled_with_seed(42);
        let deck_b = Deck::shuffled_with_seed(42);
        assert_eq!(deck_a.cards(), deck_b.cards());
    }

    #[test]
    fn shuffle_with_different_seeds_differs() {
        let deck_a = Deck::shuffled_with_seed(1);
        let deck_b = Deck::shuffled_with_seed(2);
        assert_ne!(deck_a.cards(), deck_b.cards());
    }
}
