use std::collections::{HashMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::config::ecosystem::EcosystemParams;
use crate::persistence::{AnimalFilter, AnimalStore, AnimalUpdate, NewAnimal, SimulationId};
use crate::simulation::SimulationError;
use crate::world::{neighbors, Animal, AnimalId, Coordinate, OccupancyIndex, Species, Turn};

/// Species order of the free movement phase: prey moves before predators.
const MOVE_ORDER: [Species; 2] = [Species::Fish, Species::Shark];

/// Ordered phases of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    CheckDeaths,
    Eat,
    BreedAndMove,
    Move,
}

impl Phase {
    pub fn name(&self) -> &str {
        match self {
            Phase::CheckDeaths => "check_deaths",
            Phase::Eat => "eat",
            Phase::BreedAndMove => "breed_and_move",
            Phase::Move => "move",
        }
    }

    pub fn all() -> &'static [Phase] {
        &[
            Phase::CheckDeaths,
            Phase::Eat,
            Phase::BreedAndMove,
            Phase::Move,
        ]
    }
}

/// Sharks that ate this turn, mapped to the cell they left.
pub type FedSharks = HashMap<AnimalId, Coordinate>;

/// Everything a phase reads or writes during a turn.
///
/// The store and the occupancy index are mutated together: every change of
/// an animal's position or liveness updates both before the next animal acts.
pub struct TurnContext<'a, S: AnimalStore> {
    pub store: &'a mut S,
    pub sim: SimulationId,
    pub params: &'a EcosystemParams,
    pub turn: Turn,
    pub occupancy: &'a mut OccupancyIndex,
    pub rng: &'a mut ChaCha8Rng,
}

impl<S: AnimalStore> TurnContext<'_, S> {
    fn living_shuffled(&mut self, species: Species) -> Result<Vec<Animal>, SimulationError> {
        let mut animals = self.store.animals(self.sim, AnimalFilter::living_of(species))?;
        animals.shuffle(self.rng);
        Ok(animals)
    }

    fn neighbors_of(&self, coordinate: Coordinate) -> Vec<Coordinate> {
        neighbors(self.params.grid_size, coordinate, self.params.neighborhood)
    }

    /// First unoccupied neighbor in fixed topology order.
    fn first_free_neighbor(&self, coordinate: Coordinate) -> Option<Coordinate> {
        self.neighbors_of(coordinate)
            .into_iter()
            .find(|&n| !self.occupancy.is_occupied(n))
    }

    /// Move an animal in the store and the index together. Returns the vacated cell.
    fn relocate(&mut self, animal: AnimalId, to: Coordinate) -> Result<Coordinate, SimulationError> {
        let from = self.store.move_animal(self.sim, animal, to)?;
        self.occupancy.relocate(from, to);
        Ok(from)
    }

    fn spawn(&mut self, animal: NewAnimal) -> Result<AnimalId, SimulationError> {
        let id = self.store.create_animal(self.sim, animal)?;
        self.occupancy.mark_occupied(animal.position);
        Ok(id)
    }

    /// Maturity applies to both age and time since the last breeding; the
    /// probability draw happens only once both hold.
    fn ready_to_breed(&mut self, animal: &Animal) -> bool {
        let maturity = self.params.breed_maturity(animal.species);
        animal.age(self.turn) >= maturity
            && animal.turns_since_breed(self.turn) >= maturity
            && self.rng.gen_range(0..=100u32) <= self.params.breed_probability(animal.species)
    }
}

/// Kill every shark that went too long without eating.
///
/// Returns the number of starved sharks, or `EndOfSimulation` when no shark
/// is left alive afterwards.
pub fn check_deaths<S: AnimalStore>(ctx: &mut TurnContext<'_, S>) -> Result<usize, SimulationError> {
    let sharks = ctx.store.animals(ctx.sim, AnimalFilter::living_of(Species::Shark))?;
    let threshold = ctx.params.shark_starving();
    let starving: Vec<AnimalId> = sharks
        .iter()
        .filter(|s| s.turns_since_fed(ctx.turn) > threshold)
        .map(|s| s.id)
        .collect();

    if !starving.is_empty() {
        for vacated in ctx.store.kill_animals(ctx.sim, &starving)? {
            ctx.occupancy.mark_vacated(vacated);
        }
        info!(turn = ctx.turn, starved = starving.len(), "Sharks starved");
    }

    if starving.len() == sharks.len() {
        info!(turn = ctx.turn, "No sharks left alive");
        return Err(SimulationError::EndOfSimulation { turn: ctx.turn });
    }
    Ok(starving.len())
}

/// Sharks next to a fish eat it and take its cell.
///
/// Sharks act in a fresh random order and pick uniformly among adjacent fish.
/// Returns each fed shark with the cell it left, a breeding candidate for
/// the next phase.
pub fn eat<S: AnimalStore>(ctx: &mut TurnContext<'_, S>) -> Result<FedSharks, SimulationError> {
    let sharks = ctx.living_shuffled(Species::Shark)?;
    let mut fed = FedSharks::new();
    let mut updates = HashMap::new();

    for shark in sharks {
        let around = ctx.neighbors_of(shark.position);
        let prey = ctx.store.living_fish_in(ctx.sim, &around)?;
        let Some(&(fish, target)) = prey.choose(ctx.rng) else {
            debug!(turn = ctx.turn, shark = shark.id, "No fish to eat");
            continue;
        };

        if !ctx.occupancy.is_occupied(target) || !ctx.store.consume_fish(ctx.sim, target)? {
            return Err(SimulationError::ImpossibleAction(format!(
                "shark {} cannot eat fish {} at {}",
                shark.id, fish, target
            )));
        }
        let from = ctx.relocate(shark.id, target)?;
        debug!(turn = ctx.turn, shark = shark.id, fish, from = %from, to = %target, "Shark ate");

        fed.insert(shark.id, from);
        updates.insert(shark.id, AnimalUpdate::fed(ctx.turn));
    }

    ctx.store.update_animals(ctx.sim, &updates)?;
    debug!(turn = ctx.turn, fed = fed.len(), "Eat phase done");
    Ok(fed)
}

/// Result of the breeding phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreedOutcome {
    /// Animals that already relocated this turn and must not move again.
    pub moved: HashSet<AnimalId>,
    pub fish_born: usize,
    pub sharks_born: usize,
}

/// Eligible animals breed, sharks first and then fish, each in random order.
///
/// A fed shark breeds into the cell it left while eating, if still free. Any
/// other breeder steps into its first free neighbor and leaves the newborn
/// behind; with no free neighbor it neither breeds nor moves.
pub fn breed_and_move<S: AnimalStore>(
    ctx: &mut TurnContext<'_, S>,
    fed: &FedSharks,
) -> Result<BreedOutcome, SimulationError> {
    let mut outcome = BreedOutcome::default();
    let mut updates = HashMap::new();

    for shark in ctx.living_shuffled(Species::Shark)? {
        if !ctx.ready_to_breed(&shark) {
            continue;
        }
        let nursery = match fed.get(&shark.id) {
            Some(&left) => {
                outcome.moved.insert(shark.id);
                if ctx.occupancy.is_occupied(left) {
                    debug!(turn = ctx.turn, shark = shark.id, cell = %left, "Fed shark cannot breed, cell taken");
                    None
                } else {
                    Some(left)
                }
            }
            None => match ctx.first_free_neighbor(shark.position) {
                Some(to) => {
                    let from = ctx.relocate(shark.id, to)?;
                    outcome.moved.insert(shark.id);
                    Some(from)
                }
                None => None,
            },
        };

        if let Some(cell) = nursery {
            let child = ctx.spawn(
                NewAnimal::new(Species::Shark, cell, ctx.turn)
                    .last_fed(ctx.turn)
                    .last_breed(ctx.turn),
            )?;
            updates.insert(shark.id, AnimalUpdate::bred(ctx.turn, shark.breed_count + 1));
            outcome.sharks_born += 1;
            debug!(turn = ctx.turn, shark = shark.id, child, cell = %cell, "Shark bred");
        }
    }

    for fish in ctx.living_shuffled(Species::Fish)? {
        if !ctx.ready_to_breed(&fish) {
            continue;
        }
        let Some(to) = ctx.first_free_neighbor(fish.position) else {
            continue;
        };
        let from = ctx.relocate(fish.id, to)?;
        let child = ctx.spawn(NewAnimal::new(Species::Fish, from, ctx.turn))?;
        updates.insert(fish.id, AnimalUpdate::bred(ctx.turn, fish.breed_count + 1));
        outcome.moved.insert(fish.id);
        outcome.fish_born += 1;
        debug!(turn = ctx.turn, fish = fish.id, child, from = %from, to = %to, "Fish bred");
    }

    ctx.store.update_animals(ctx.sim, &updates)?;

    // Fed sharks relocated while eating, whether or not they bred.
    outcome.moved.extend(fed.keys().copied());

    debug!(
        turn = ctx.turn,
        sharks_born = outcome.sharks_born,
        fish_born = outcome.fish_born,
        "Breed phase done"
    );
    Ok(outcome)
}

/// Every animal that has not moved yet steps into its first free neighbor.
///
/// Fish go before sharks, each species in random order. Newborns stay put on
/// their birth turn. Returns the number of animals that moved.
pub fn move_animals<S: AnimalStore>(
    ctx: &mut TurnContext<'_, S>,
    already_moved: &HashSet<AnimalId>,
) -> Result<usize, SimulationError> {
    let mut moved = 0;
    for species in MOVE_ORDER {
        for animal in ctx.living_shuffled(species)? {
            if already_moved.contains(&animal.id) || animal.spawn_turn == ctx.turn {
                continue;
            }
            match ctx.first_free_neighbor(animal.position) {
                Some(to) => {
                    ctx.relocate(animal.id, to)?;
                    moved += 1;
                }
                None => {
                    debug!(turn = ctx.turn, animal = animal.id, %species, "No space to move");
                }
            }
        }
    }
    debug!(turn = ctx.turn, moved, "Move phase done");
    Ok(moved)
}
