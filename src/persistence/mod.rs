pub mod memory;
pub mod snapshot;

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use uuid::Uuid;

use crate::config::ecosystem::EcosystemParams;
use crate::world::{Animal, AnimalId, Coordinate, Species, Turn};

pub use memory::MemoryStore;
pub use snapshot::{
    list_snapshots, load_latest_valid_snapshot, load_snapshot, prune_snapshots, save_snapshot,
    SimulationSnapshot, SnapshotError, SnapshotMetadata,
};

pub type SimulationId = Uuid;

/// Failure raised by an [`AnimalStore`]. The engine treats every store error as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown simulation {0}")]
    UnknownSimulation(SimulationId),
    #[error("unknown animal {0}")]
    UnknownAnimal(AnimalId),
    #[error("coordinate {coordinate} is outside a {grid_size}x{grid_size} grid")]
    OutOfBounds { coordinate: Coordinate, grid_size: u32 },
}

/// Stored simulation record.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRecord {
    pub id: SimulationId,
    pub params: EcosystemParams,
}

/// Request to create an animal. Unset turns default to `spawn_turn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewAnimal {
    pub species: Species,
    pub position: Coordinate,
    pub spawn_turn: Turn,
    pub last_fed: Option<Turn>,
    pub last_breed: Option<Turn>,
}

impl NewAnimal {
    pub fn new(species: Species, position: Coordinate, spawn_turn: Turn) -> Self {
        NewAnimal {
            species,
            position,
            spawn_turn,
            last_fed: None,
            last_breed: None,
        }
    }

    pub fn last_fed(mut self, turn: Turn) -> Self {
        self.last_fed = Some(turn);
        self
    }

    pub fn last_breed(mut self, turn: Turn) -> Self {
        self.last_breed = Some(turn);
        self
    }
}

/// Which records a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimalFilter {
    pub species: Option<Species>,
    pub include_dead: bool,
}

impl AnimalFilter {
    pub fn living() -> Self {
        Self::default()
    }

    pub fn living_of(species: Species) -> Self {
        AnimalFilter {
            species: Some(species),
            include_dead: false,
        }
    }

    pub fn everything() -> Self {
        AnimalFilter {
            species: None,
            include_dead: true,
        }
    }

    pub fn matches(&self, animal: &Animal) -> bool {
        (self.include_dead || animal.alive) && self.species.is_none_or(|s| s == animal.species)
    }
}

/// Field updates applied in a batch. Unset fields are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimalUpdate {
    pub last_fed: Option<Turn>,
    pub last_breed: Option<Turn>,
    pub breed_count: Option<u32>,
}

impl AnimalUpdate {
    pub fn fed(turn: Turn) -> Self {
        AnimalUpdate {
            last_fed: Some(turn),
            ..Self::default()
        }
    }

    pub fn bred(turn: Turn, breed_count: u32) -> Self {
        AnimalUpdate {
            last_breed: Some(turn),
            breed_count: Some(breed_count),
            ..Self::default()
        }
    }

    pub fn apply(&self, animal: &mut Animal) {
        if let Some(turn) = self.last_fed {
            animal.last_fed = turn;
        }
        if let Some(turn) = self.last_breed {
            animal.last_breed = turn;
        }
        if let Some(count) = self.breed_count {
            animal.breed_count = count;
        }
    }
}

/// Storage of simulation and animal records, consumed by the turn engine.
///
/// Listings return owned records: callers get a snapshot that does not
/// follow later mutations.
pub trait AnimalStore {
    fn create_simulation(&mut self, params: &EcosystemParams) -> Result<SimulationId, StoreError>;

    fn simulation(&self, sim: SimulationId) -> Result<SimulationRecord, StoreError>;

    fn create_animal(&mut self, sim: SimulationId, animal: NewAnimal)
        -> Result<AnimalId, StoreError>;

    fn animals(&self, sim: SimulationId, filter: AnimalFilter) -> Result<Vec<Animal>, StoreError>;

    /// Living fish located on any of `coordinates`, in the order the cells are given.
    fn living_fish_in(
        &self,
        sim: SimulationId,
        coordinates: &[Coordinate],
    ) -> Result<Vec<(AnimalId, Coordinate)>, StoreError>;

    /// Kill the living fish at `coordinate`. Returns false when there was none.
    fn consume_fish(&mut self, sim: SimulationId, coordinate: Coordinate)
        -> Result<bool, StoreError>;

    /// Move an animal and return the coordinate it vacated.
    fn move_animal(
        &mut self,
        sim: SimulationId,
        animal: AnimalId,
        to: Coordinate,
    ) -> Result<Coordinate, StoreError>;

    /// Mark animals dead and return the coordinates they vacated.
    fn kill_animals(
        &mut self,
        sim: SimulationId,
        animals: &[AnimalId],
    ) -> Result<HashSet<Coordinate>, StoreError>;

    fn update_animals(
        &mut self,
        sim: SimulationId,
        updates: &HashMap<AnimalId, AnimalUpdate>,
    ) -> Result<(), StoreError>;

    fn animals_at(
        &self,
        sim: SimulationId,
        coordinate: Coordinate,
        include_dead: bool,
    ) -> Result<Vec<Animal>, StoreError>;

    /// Drop the records of dead animals. Returns how many were removed.
    fn purge_dead(&mut self, sim: SimulationId) -> Result<usize, StoreError>;

    fn count_living(&self, sim: SimulationId, species: Species) -> Result<usize, StoreError> {
        Ok(self.animals(sim, AnimalFilter::living_of(species))?.len())
    }
}
