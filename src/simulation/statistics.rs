use std::fmt;

use crate::world::{Animal, Species, Turn};

/// Living animals per species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PopulationCounts {
    pub fish: usize,
    pub sharks: usize,
}

impl PopulationCounts {
    pub fn from_animals<'a>(animals: impl IntoIterator<Item = &'a Animal>) -> Self {
        let mut counts = PopulationCounts::default();
        for animal in animals.into_iter().filter(|a| a.alive) {
            match animal.species {
                Species::Fish => counts.fish += 1,
                Species::Shark => counts.sharks += 1,
            }
        }
        counts
    }
}

impl fmt::Display for PopulationCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fish, {} sharks", self.fish, self.sharks)
    }
}

/// What happened during one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnStatistics {
    /// Turn counter after the turn completed.
    pub turn: Turn,
    pub population: PopulationCounts,
    pub starved: usize,
    pub eaten: usize,
    pub fish_born: usize,
    pub sharks_born: usize,
    /// Animals that relocated during the free movement phase.
    pub moved: usize,
}

impl TurnStatistics {
    pub fn births(&self) -> usize {
        self.fish_born + self.sharks_born
    }

    pub fn deaths(&self) -> usize {
        self.starved + self.eaten
    }
}
