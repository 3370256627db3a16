/// Deterministic seatings of four agents. `as_slice()[p][seat]` is the agent index
/// sitting at `seat` under permutation `p`.
///
/// The four rotations come first so that a run with four permutations puts every
/// agent in every seat exactly once; the remaining orderings follow lexicographically.
pub struct SeatPermutations {
    permutations: Vec<[usize; 4]>,
}

impl SeatPermutations {
    pub const MAX: usize = 24;

    pub fn new(count: usize) -> Self {
        let limit = count.min(Self::MAX);
        let rotations = (0..4).map(|shift| std::array::from_fn(|seat| (seat + shift) % 4));
        let mut permutations: Vec<[usize; 4]> = rotations.collect();
        for candidate in lexicographic() {
            if !permutations.contains(&candidate) {
                permutations.push(candidate);
            }
        }
        permutations.truncate(limit);
        Self { permutations }
    }

    pub fn as_slice(&self) -> &[[usize; 4]] {
        &self.permutations
    }
}

fn lexicographic() -> Vec<[usize; 4]> {
    let mut out = Vec::with_capacity(SeatPermutations::MAX);
    for a in 0..4 {
        for b in (0..4).filter(|&b| b != a) {
            for c in (0..4).filter(|&c| c != a && c != b) {
                let d = 6 - a - b - c;
                out.push([a, b, c, d]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_the_identity_seating() {
        let perms = SeatPermutations::new(1);
        assert_eq!(perms.as_slice(), &[[0, 1, 2, 3]]);
    }

    #[test]
    fn four_rotations_seat_each_agent_everywhere() {
        let perms = SeatPermutations::new(4);
        for seat in 0..4 {
            let mut agents: Vec<usize> = perms.as_slice().iter().map(|p| p[seat]).collect();
            agents.sort_unstable();
            assert_eq!(agents, vec![0, 1, 2, 3]);
        }
    }

    #[test]
    fn caps_at_twenty_four_unique_orderings() {
        let perms = SeatPermutations::new(100);
        assert_eq!(perms.as_slice().len(), 24);
        let mut seen = perms.as_slice().to_vec();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 24);
    }
}
