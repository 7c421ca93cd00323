pub mod phase;
pub mod statistics;

use std::time::Instant;

use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ecosystem::EcosystemParams;
use crate::persistence::{
    AnimalFilter, AnimalStore, MemoryStore, NewAnimal, SimulationId, SimulationSnapshot,
    StoreError,
};
use crate::simulation::phase::{Phase, TurnContext};
use crate::simulation::statistics::{PopulationCounts, TurnStatistics};
use crate::world::generation::spawn_initial_population;
use crate::world::{Animal, AnimalId, OccupancyIndex, Species, Turn};

/// Why a turn did not complete.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Normal termination: no shark is alive. Stop simulating.
    #[error("simulation ended at turn {turn}: no sharks left")]
    EndOfSimulation { turn: Turn },
    /// The occupancy index and the store disagree. The run must be aborted.
    #[error("impossible action: {0}")]
    ImpossibleAction(String),
    /// The store failed; propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SimulationError {
    pub fn is_end_of_simulation(&self) -> bool {
        matches!(self, SimulationError::EndOfSimulation { .. })
    }
}

/// Result of playing a single turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub statistics: TurnStatistics,
    /// Phase timings in ms: [CheckDeaths, Eat, BreedAndMove, Move]
    pub phase_timings_ms: [f32; 4],
}

/// The turn engine. Owns the store, the occupancy index, the turn counter and
/// the random source; it is the only writer of all four while a turn runs.
pub struct Simulation<S: AnimalStore> {
    store: S,
    id: SimulationId,
    params: EcosystemParams,
    turn: Turn,
    occupancy: OccupancyIndex,
    rng: ChaCha8Rng,
}

impl<S: AnimalStore> Simulation<S> {
    /// Create a simulation record in `store` and spawn the initial population.
    ///
    /// `params` must already be validated. All randomness of the run, spawn
    /// layout included, is drawn from `rng`.
    pub fn new(mut store: S, params: EcosystemParams, mut rng: ChaCha8Rng) -> Result<Self, SimulationError> {
        let id = store.create_simulation(&params)?;
        let spawned = spawn_initial_population(&mut store, id, &params, &mut rng)?;
        info!(simulation = %id, spawned, grid_size = params.grid_size, "Simulation created");
        Self::resume(store, id, 0, rng)
    }

    /// Continue an existing simulation at `turn`. The occupancy index is
    /// rebuilt from the living animals in the store.
    pub fn resume(store: S, id: SimulationId, turn: Turn, rng: ChaCha8Rng) -> Result<Self, SimulationError> {
        let params = store.simulation(id)?.params;
        let occupancy = OccupancyIndex::from_animals(&store.animals(id, AnimalFilter::living())?);
        Ok(Simulation {
            store,
            id,
            params,
            turn,
            occupancy,
            rng,
        })
    }

    pub fn id(&self) -> SimulationId {
        self.id
    }

    pub fn params(&self) -> &EcosystemParams {
        &self.params
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    /// Occupied cells, for rendering.
    pub fn occupancy(&self) -> &OccupancyIndex {
        &self.occupancy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn animals(&self, filter: AnimalFilter) -> Result<Vec<Animal>, StoreError> {
        self.store.animals(self.id, filter)
    }

    /// Place an animal by hand, keeping the occupancy index in step.
    pub fn spawn_animal(&mut self, animal: NewAnimal) -> Result<AnimalId, SimulationError> {
        if self.occupancy.is_occupied(animal.position) {
            return Err(SimulationError::ImpossibleAction(format!(
                "cannot place {} at {}: cell is occupied",
                animal.species, animal.position
            )));
        }
        let id = self.store.create_animal(self.id, animal)?;
        self.occupancy.mark_occupied(animal.position);
        Ok(id)
    }

    pub fn population_counts(&self) -> Result<PopulationCounts, StoreError> {
        Ok(PopulationCounts::from_animals(
            &self.store.animals(self.id, AnimalFilter::living())?,
        ))
    }

    /// True once no shark is alive. Never mutates state.
    pub fn is_simulation_over(&self) -> Result<bool, StoreError> {
        Ok(self.store.count_living(self.id, Species::Shark)? == 0)
    }

    /// `EndOfSimulation` once no shark is alive.
    pub fn check_simulation_ends(&self) -> Result<(), SimulationError> {
        if self.is_simulation_over()? {
            info!(turn = self.turn, "Simulation ends: no sharks left");
            return Err(SimulationError::EndOfSimulation { turn: self.turn });
        }
        Ok(())
    }

    fn context(&mut self) -> TurnContext<'_, S> {
        TurnContext {
            store: &mut self.store,
            sim: self.id,
            params: &self.params,
            turn: self.turn,
            occupancy: &mut self.occupancy,
            rng: &mut self.rng,
        }
    }

    /// Play one turn: starvation, eating, breeding, free movement.
    ///
    /// Returns `EndOfSimulation` when no sharks are left, either before the
    /// turn starts (nothing else runs) or once it has completed. Records of
    /// animals that died during the turn are dropped once it completes.
    pub fn play_turn(&mut self) -> Result<TurnResult, SimulationError> {
        let mut timings = [0.0_f32; 4];
        debug!(turn = self.turn, "Turn started");

        let mut ctx = self.context();

        // Starvation; also the pre-turn end check
        let phase_start = Instant::now();
        let starved = phase::check_deaths(&mut ctx)?;
        timings[0] = phase_start.elapsed().as_secs_f32() * 1000.0;

        // Predation: fed sharks remember the cell they left
        let phase_start = Instant::now();
        let fed = phase::eat(&mut ctx)?;
        timings[1] = phase_start.elapsed().as_secs_f32() * 1000.0;

        // Breeding, which moves parents out of the nursery cell
        let phase_start = Instant::now();
        let bred = phase::breed_and_move(&mut ctx, &fed)?;
        timings[2] = phase_start.elapsed().as_secs_f32() * 1000.0;

        // Free movement for everyone not yet moved
        let phase_start = Instant::now();
        let moved = phase::move_animals(&mut ctx, &bred.moved)?;
        timings[3] = phase_start.elapsed().as_secs_f32() * 1000.0;

        for (phase, ms) in Phase::all().iter().zip(timings) {
            debug!(turn = self.turn, phase = phase.name(), ms, "Phase timing");
        }

        // Dead animals play no further role
        let purged = self.store.purge_dead(self.id)?;
        debug!(turn = self.turn, purged, "Dead records dropped");

        self.turn += 1;
        self.check_simulation_ends()?;

        Ok(TurnResult {
            statistics: TurnStatistics {
                turn: self.turn,
                population: self.population_counts()?,
                starved,
                eaten: fed.len(),
                fish_born: bred.fish_born,
                sharks_born: bred.sharks_born,
                moved,
            },
            phase_timings_ms: timings,
        })
    }

    /// Capture the full state of the simulation. Between turns the store
    /// only holds living animals.
    pub fn snapshot(&self) -> Result<SimulationSnapshot, StoreError> {
        Ok(SimulationSnapshot {
            id: self.id,
            params: self.params.clone(),
            turn: self.turn,
            animals: self.store.animals(self.id, AnimalFilter::everything())?,
        })
    }
}

impl Simulation<MemoryStore> {
    /// Rebuild an in-memory simulation from a snapshot.
    pub fn from_snapshot(snapshot: SimulationSnapshot, rng: ChaCha8Rng) -> Result<Self, SimulationError> {
        let mut store = MemoryStore::new();
        store.import(snapshot.id, snapshot.params, snapshot.animals)?;
        Self::resume(store, snapshot.id, snapshot.turn, rng)
    }
}
