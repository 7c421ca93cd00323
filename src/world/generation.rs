use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::config::ecosystem::EcosystemParams;
use crate::persistence::{AnimalStore, NewAnimal, SimulationId, StoreError};
use crate::world::{Coordinate, Species};

/// Populate a fresh simulation with its initial fish and sharks.
///
/// Cells are shuffled and filled in order, fish first. Each animal gets a
/// spawn and last-breed turn of `-k`, `k` uniform in `0..=maturity`, so
/// initial animals become breed-eligible at staggered turns. Sharks start
/// fed at turn 0. Returns the number of animals created.
pub fn spawn_initial_population<S: AnimalStore>(
    store: &mut S,
    sim: SimulationId,
    params: &EcosystemParams,
    rng: &mut impl Rng,
) -> Result<usize, StoreError> {
    let grid_size = params.grid_size;
    let mut cells: Vec<Coordinate> = (0..grid_size)
        .flat_map(|x| (0..grid_size).map(move |y| Coordinate::new(x, y)))
        .collect();
    cells.shuffle(rng);

    let mut cells = cells.into_iter();
    let mut created = 0;
    for &species in Species::all() {
        let maturity = params.breed_maturity(species);
        for _ in 0..params.initial_count(species) {
            let Some(position) = cells.next() else {
                return Ok(created);
            };
            let spawn_turn = -rng.gen_range(0..=maturity);
            let mut animal = NewAnimal::new(species, position, spawn_turn).last_breed(spawn_turn);
            if species == Species::Shark {
                animal = animal.last_fed(0);
            }
            store.create_animal(sim, animal)?;
            created += 1;
        }
    }

    debug!(
        fish = params.init_nb_fish,
        sharks = params.init_nb_shark,
        grid_size,
        "Initial population spawned"
    );
    Ok(created)
}
