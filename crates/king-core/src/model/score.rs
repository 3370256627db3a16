use crate::model::player::PlayerPosition;

/// Season totals accumulated across rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreBoard {
    totals: [i32; 4],
}

impl ScoreBoard {
    pub const fn new() -> Self {
        Self { totals: [0; 4] }
    }

    pub fn score(&self, seat: PlayerPosition) -> i32 {
        self.totals[seat.index()]
    }

    pub fn standings(&self) -> &[i32; 4] {
        &self.totals
    }

    pub fn apply_round(&mut self, points: [i32; 4]) {
        for (total, delta) in self.totals.iter_mut().zip(points) {
            *total += delta;
        }
    }

    /// Seat with the most points; ties go to the earliest seat in `LOOP` order.
    pub fn leading_player(&self) -> PlayerPosition {
        let mut best = PlayerPosition::North;
        for seat in PlayerPosition::LOOP {
            if self.score(seat) > self.score(best) {
                best = seat;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::ScoreBoard;
    use crate::model::player::PlayerPosition;

    #[test]
    fn rounds_accumulate_and_leader_is_highest() {
        let mut board = ScoreBoard::new();
        board.apply_round([-20, -40, 0, -200]);
        board.apply_round([25, 50, 100, 150]);
        assert_eq!(board.standings(), &[5, 10, 100, -50]);
        assert_eq!(board.leading_player(), PlayerPosition::South);
    }

    #[test]
    fn ties_resolve_to_first_seat() {
        let board = ScoreBoard::new();
        assert_eq!(board.leading_player(), PlayerPosition::North);
    }
}
