use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PlayerPosition {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl PlayerPosition {
    pub const LOOP: [PlayerPosition; 4] = [
        PlayerPosition::North,
        PlayerPosition::East,
        PlayerPosition::South,
        PlayerPosition::West,
    ];

    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::LOOP.len() {
            Some(Self::LOOP[index])
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Single-bit mask for seat sets packed into a `u8`.
    pub const fn bit(self) -> u8 {
        1 << self as u8
    }

    /// Seat to the left, next to act.
    pub const fn next(self) -> PlayerPosition {
        Self::LOOP[(self as usize + 1) % 4]
    }

    pub const fn previous(self) -> PlayerPosition {
        Self::LOOP[(self as usize + 3) % 4]
    }

    /// Seats in play order starting from `self`.
    pub fn clockwise(self) -> [PlayerPosition; 4] {
        [self, self.next(), self.next().next(), self.previous()]
    }

    /// The other three seats, in play order after `self`.
    pub fn others(self) -> [PlayerPosition; 3] {
        [self.next(), self.next().next(), self.previous()]
    }
}

impl fmt::Display for PlayerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(["North", "East", "South", "West"][self.index()])
    }
}
