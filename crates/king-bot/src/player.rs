use crate::config::EngineConfig;
use crate::engine::{Decision, DecisionEngine};
use king_core::belief::{CardKnowledgeTracker, TrackingError};
use king_core::model::card::Card;
use king_core::model::hand::Hand;
use king_core::model::player::PlayerPosition;
use king_core::model::trick::Trick;
use king_core::model::variant::{RoundContext, RoundVariant};
use king_core::rules::{KingRules, TrickRules};

/// One seat driven by the Monte Carlo engine. Owns the seat's knowledge for the
/// current round.
pub struct MonteCarloPlayer<R: TrickRules = KingRules> {
    seat: PlayerPosition,
    tracker: CardKnowledgeTracker,
    engine: DecisionEngine<R>,
    last_decision: Option<Decision>,
}

impl MonteCarloPlayer<KingRules> {
    pub fn new(seat: PlayerPosition, config: EngineConfig) -> Self {
        Self::with_engine(seat, DecisionEngine::new(config))
    }
}

impl<R: TrickRules> MonteCarloPlayer<R> {
    pub fn with_engine(seat: PlayerPosition, engine: DecisionEngine<R>) -> Self {
        let context = RoundContext::new(RoundVariant::Vazas);
        Self {
            seat,
            tracker: CardKnowledgeTracker::new(seat, &[], &context),
            engine,
            last_decision: None,
        }
    }

    pub fn seat(&self) -> PlayerPosition {
        self.seat
    }

    pub fn tracker(&self) -> &CardKnowledgeTracker {
        &self.tracker
    }

    pub fn engine(&self) -> &DecisionEngine<R> {
        &self.engine
    }

    pub fn last_decision(&self) -> Option<&Decision> {
        self.last_decision.as_ref()
    }

    /// Starts a new round: all knowledge from the previous round is discarded.
    pub fn reset_for_new_round(&mut self, context: &RoundContext, hand: &Hand) {
        self.tracker.reset_for_new_round(self.seat, hand.cards(), context);
        self.last_decision = None;
    }

    /// Records a play by any seat, this one included.
    pub fn observe(&mut self, player: PlayerPosition, card: Card) -> Result<(), TrackingError> {
        self.tracker.observe(player, card)
    }

    /// Picks one of `legal` for the trick in progress. Panics when `legal` is empty.
    pub fn choose_card(&mut self, legal: &[Card], trick: &Trick) -> Card {
        let decision = self.engine.decide(&self.tracker, legal, trick);
        let card = decision.card;
        self.last_decision = Some(decision);
        card
    }
}
