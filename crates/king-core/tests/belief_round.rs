use king_core::belief::{CardKnowledgeTracker, ConstraintKind, HandSampler};
use king_core::model::card::Card;
use king_core::model::card_set::CardSet;
use king_core::model::deck::Deck;
use king_core::model::player::PlayerPosition;
use king_core::model::round::RoundState;
use king_core::model::suit::Suit;
use king_core::model::variant::{RoundContext, RoundVariant};
use king_core::rules::KingRules;
use rand::SeedableRng;
use rand::rngs::SmallRng;

fn card(text: &str) -> Card {
    text.parse().unwrap()
}

fn south_hand() -> Vec<Card> {
    Deck::standard().cards().iter().copied().skip(2).step_by(4).collect()
}

#[test]
fn off_suit_discard_excludes_the_whole_suit() {
    let ctx = RoundContext::new(RoundVariant::Vazas);
    let mut tracker = CardKnowledgeTracker::new(PlayerPosition::South, &south_hand(), &ctx);
    tracker.observe(PlayerPosition::North, card("3S")).unwrap();
    tracker.observe(PlayerPosition::East, card("2D")).unwrap();

    assert!(tracker.has_void(PlayerPosition::East, Suit::Spades));
    let east = tracker.unseen_for(PlayerPosition::East);
    assert!(!east.is_empty());
    assert!(east.iter().all(|c| c.suit != Suit::Spades));
    assert!(tracker.unseen_for(PlayerPosition::West).iter().any(|c| c.suit == Suit::Spades));
}

#[test]
fn discard_obligation_in_mulheres_records_no_queens() {
    let ctx = RoundContext::new(RoundVariant::Mulheres);
    let mut tracker = CardKnowledgeTracker::new(PlayerPosition::South, &south_hand(), &ctx);
    tracker.observe(PlayerPosition::North, card("3S")).unwrap();
    tracker.observe(PlayerPosition::East, card("2D")).unwrap();
    let kinds: Vec<ConstraintKind> = tracker.constraints().iter().map(|c| c.kind).collect();
    assert_eq!(kinds, vec![ConstraintKind::Void(Suit::Spades), ConstraintKind::NoQueens]);
    assert!(tracker.unseen_for(PlayerPosition::East).iter().all(|c| !c.is_woman()));
}

/// Every seat tracks a whole seeded round. The real hands must stay consistent with
/// what each tracker believes, and sampling must stay feasible throughout.
#[test]
fn trackers_stay_sound_over_a_full_round() {
    for (seed, variant) in [(3, RoundVariant::Copas), (8, RoundVariant::Homens), (21, RoundVariant::Vazas)] {
        let ctx = RoundContext::new(variant);
        let mut round = RoundState::deal(&Deck::shuffled_with_seed(seed), PlayerPosition::West, ctx.clone());
        let mut trackers: Vec<CardKnowledgeTracker> = PlayerPosition::LOOP
            .iter()
            .map(|&seat| CardKnowledgeTracker::new(seat, round.hand(seat).cards(), &ctx))
            .collect();
        let mut rng = SmallRng::seed_from_u64(seed);

        while let Some(seat) = round.to_act() {
            let legal = round.legal_plays(&KingRules, seat);
            let choice = legal[legal.len() / 2];
            round.play_card(seat, choice).unwrap();

            for tracker in trackers.iter_mut() {
                let before = tracker.constraints().to_vec();
                tracker.observe(seat, choice).unwrap();
                assert!(tracker.constraints().starts_with(&before));

                let sizes: usize = PlayerPosition::LOOP.iter().map(|&p| tracker.hand_size(p)).sum();
                assert_eq!(sizes + tracker.discarded_count(), 52);

                let snapshot = tracker.snapshot();
                for other in PlayerPosition::LOOP {
                    let actual: CardSet = round.hand(other).iter().copied().collect();
                    assert_eq!(tracker.hand_size(other), actual.len());
                    assert_eq!(actual.difference(snapshot.candidates_for(other)), CardSet::EMPTY);
                }

                if round.is_finished() {
                    continue;
                }
                let sampler = HandSampler::new(&snapshot).unwrap();
                assert!(sampler.count_deals() >= 1);
                let deal = sampler.sample(&mut rng);
                for other in PlayerPosition::LOOP {
                    assert_eq!(deal.hand(other).len(), tracker.hand_size(other));
                    assert_eq!(deal.hand(other).intersection(snapshot.exclusions(other)), CardSet::EMPTY);
                }
            }
        }
        assert!(trackers.iter().all(|t| t.cards_played() == 52));
    }
}
