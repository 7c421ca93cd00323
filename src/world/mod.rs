pub mod generation;
pub mod occupancy;
pub mod topology;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use occupancy::OccupancyIndex;
pub use topology::{neighbors, Neighborhood};

/// Simulation turn. Initial animals may carry negative turns so that
/// breeding eligibility is staggered.
pub type Turn = i64;

/// Unique, stable identifier of an animal record.
pub type AnimalId = u64;

/// A cell on the square toroidal grid, `0 <= x, y < grid_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: u32,
    pub y: u32,
}

impl Coordinate {
    pub const fn new(x: u32, y: u32) -> Self {
        Coordinate { x, y }
    }

    pub fn in_bounds(&self, grid_size: u32) -> bool {
        self.x < grid_size && self.y < grid_size
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Species {
    Fish,
    Shark,
}

impl Species {
    pub fn all() -> &'static [Species] {
        &[Species::Fish, Species::Shark]
    }

    /// Single-character glyph used when rendering the grid.
    pub fn glyph(self) -> char {
        match self {
            Species::Fish => 'F',
            Species::Shark => 'S',
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Species::Fish => write!(f, "Fish"),
            Species::Shark => write!(f, "Shark"),
        }
    }
}

/// An animal record as held by the store.
///
/// `last_fed` is only meaningful for sharks; fish carry their spawn turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animal {
    pub id: AnimalId,
    pub species: Species,
    pub position: Coordinate,
    pub alive: bool,
    pub spawn_turn: Turn,
    pub last_breed: Turn,
    pub last_fed: Turn,
    pub breed_count: u32,
}

impl Animal {
    pub fn age(&self, turn: Turn) -> Turn {
        turn - self.spawn_turn
    }

    pub fn turns_since_breed(&self, turn: Turn) -> Turn {
        turn - self.last_breed
    }

    pub fn turns_since_fed(&self, turn: Turn) -> Turn {
        turn - self.last_fed
    }
}
