use std::collections::{BTreeMap, HashMap, HashSet};

use uuid::Uuid;

use crate::config::ecosystem::EcosystemParams;
use crate::persistence::{
    AnimalFilter, AnimalStore, AnimalUpdate, NewAnimal, SimulationId, SimulationRecord, StoreError,
};
use crate::world::{Animal, AnimalId, Coordinate, Species};

#[derive(Debug, Clone)]
struct SimulationTable {
    params: EcosystemParams,
    animals: BTreeMap<AnimalId, Animal>,
}

impl SimulationTable {
    fn check_bounds(&self, coordinate: Coordinate) -> Result<(), StoreError> {
        if coordinate.in_bounds(self.params.grid_size) {
            Ok(())
        } else {
            Err(StoreError::OutOfBounds {
                coordinate,
                grid_size: self.params.grid_size,
            })
        }
    }

    fn animal_mut(&mut self, id: AnimalId) -> Result<&mut Animal, StoreError> {
        self.animals.get_mut(&id).ok_or(StoreError::UnknownAnimal(id))
    }
}

/// In-memory [`AnimalStore`]. Animals are kept ordered by id so listings are
/// deterministic, which keeps seeded runs reproducible.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    simulations: HashMap<SimulationId, SimulationTable>,
    next_animal_id: AnimalId,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a simulation with pre-existing records, as when restoring a snapshot.
    pub fn import(
        &mut self,
        id: SimulationId,
        params: EcosystemParams,
        animals: impl IntoIterator<Item = Animal>,
    ) -> Result<(), StoreError> {
        let mut table = SimulationTable {
            params,
            animals: BTreeMap::new(),
        };
        for animal in animals {
            table.check_bounds(animal.position)?;
            self.next_animal_id = self.next_animal_id.max(animal.id + 1);
            table.animals.insert(animal.id, animal);
        }
        self.simulations.insert(id, table);
        Ok(())
    }

    fn table(&self, sim: SimulationId) -> Result<&SimulationTable, StoreError> {
        self.simulations
            .get(&sim)
            .ok_or(StoreError::UnknownSimulation(sim))
    }

    fn table_mut(&mut self, sim: SimulationId) -> Result<&mut SimulationTable, StoreError> {
        self.simulations
            .get_mut(&sim)
            .ok_or(StoreError::UnknownSimulation(sim))
    }
}

impl AnimalStore for MemoryStore {
    fn create_simulation(&mut self, params: &EcosystemParams) -> Result<SimulationId, StoreError> {
        let id = Uuid::new_v4();
        self.simulations.insert(
            id,
            SimulationTable {
                params: params.clone(),
                animals: BTreeMap::new(),
            },
        );
        Ok(id)
    }

    fn simulation(&self, sim: SimulationId) -> Result<SimulationRecord, StoreError> {
        let table = self.table(sim)?;
        Ok(SimulationRecord {
            id: sim,
            params: table.params.clone(),
        })
    }

    fn create_animal(
        &mut self,
        sim: SimulationId,
        animal: NewAnimal,
    ) -> Result<AnimalId, StoreError> {
        let id = self.next_animal_id;
        let table = self.table_mut(sim)?;
        table.check_bounds(animal.position)?;
        table.animals.insert(
            id,
            Animal {
                id,
                species: animal.species,
                position: animal.position,
                alive: true,
                spawn_turn: animal.spawn_turn,
                last_breed: animal.last_breed.unwrap_or(animal.spawn_turn),
                last_fed: animal.last_fed.unwrap_or(animal.spawn_turn),
                breed_count: 0,
            },
        );
        self.next_animal_id += 1;
        Ok(id)
    }

    fn animals(&self, sim: SimulationId, filter: AnimalFilter) -> Result<Vec<Animal>, StoreError> {
        Ok(self
            .table(sim)?
            .animals
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect())
    }

    fn living_fish_in(
        &self,
        sim: SimulationId,
        coordinates: &[Coordinate],
    ) -> Result<Vec<(AnimalId, Coordinate)>, StoreError> {
        let fish: HashMap<Coordinate, AnimalId> = self
            .table(sim)?
            .animals
            .values()
            .filter(|a| a.alive && a.species == Species::Fish)
            .map(|a| (a.position, a.id))
            .collect();
        let mut seen = HashSet::new();
        Ok(coordinates
            .iter()
            .filter(|c| seen.insert(**c))
            .filter_map(|c| fish.get(c).map(|&id| (id, *c)))
            .collect())
    }

    fn consume_fish(
        &mut self,
        sim: SimulationId,
        coordinate: Coordinate,
    ) -> Result<bool, StoreError> {
        let table = self.table_mut(sim)?;
        match table
            .animals
            .values_mut()
            .find(|a| a.alive && a.species == Species::Fish && a.position == coordinate)
        {
            Some(fish) => {
                fish.alive = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn move_animal(
        &mut self,
        sim: SimulationId,
        animal: AnimalId,
        to: Coordinate,
    ) -> Result<Coordinate, StoreError> {
        let table = self.table_mut(sim)?;
        table.check_bounds(to)?;
        let record = table.animal_mut(animal)?;
        let from = record.position;
        record.position = to;
        Ok(from)
    }

    fn kill_animals(
        &mut self,
        sim: SimulationId,
        animals: &[AnimalId],
    ) -> Result<HashSet<Coordinate>, StoreError> {
        let table = self.table_mut(sim)?;
        let mut vacated = HashSet::with_capacity(animals.len());
        for &id in animals {
            let record = table.animal_mut(id)?;
            if record.alive {
                record.alive = false;
                vacated.insert(record.position);
            }
        }
        Ok(vacated)
    }

    fn update_animals(
        &mut self,
        sim: SimulationId,
        updates: &HashMap<AnimalId, AnimalUpdate>,
    ) -> Result<(), StoreError> {
        let table = self.table_mut(sim)?;
        for (&id, update) in updates {
            update.apply(table.animal_mut(id)?);
        }
        Ok(())
    }

    fn purge_dead(&mut self, sim: SimulationId) -> Result<usize, StoreError> {
        let table = self.table_mut(sim)?;
        let before = table.animals.len();
        table.animals.retain(|_, a| a.alive);
        Ok(before - table.animals.len())
    }

    fn animals_at(
        &self,
        sim: SimulationId,
        coordinate: Coordinate,
        include_dead: bool,
    ) -> Result<Vec<Animal>, StoreError> {
        Ok(self
            .table(sim)?
            .animals
            .values()
            .filter(|a| a.position == coordinate && (include_dead || a.alive))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_sim(grid_size: u32) -> (MemoryStore, SimulationId) {
        let mut store = MemoryStore::new();
        let params = EcosystemParams {
            grid_size,
            ..EcosystemParams::empty()
        };
        let sim = store.create_simulation(&params).unwrap();
        (store, sim)
    }

    fn spawn(store: &mut MemoryStore, sim: SimulationId, species: Species, x: u32, y: u32) -> AnimalId {
        store
            .create_animal(sim, NewAnimal::new(species, Coordinate::new(x, y), 0))
            .unwrap()
    }

    #[test]
    fn create_animal_defaults_turns_to_spawn_turn() {
        let (mut store, sim) = store_with_sim(10);
        let id = store
            .create_animal(
                sim,
                NewAnimal::new(Species::Shark, Coordinate::new(1, 1), -3).last_fed(0),
            )
            .unwrap();
        let animals = store.animals(sim, AnimalFilter::everything()).unwrap();
        let shark = animals.iter().find(|a| a.id == id).unwrap();
        assert_eq!(shark.spawn_turn, -3);
        assert_eq!(shark.last_breed, -3);
        assert_eq!(shark.last_fed, 0);
        assert!(shark.alive);
    }

    #[test]
    fn out_of_bounds_creation_rejected() {
        let (mut store, sim) = store_with_sim(5);
        let err = store
            .create_animal(sim, NewAnimal::new(Species::Fish, Coordinate::new(5, 0), 0))
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfBounds { grid_size: 5, .. }));
    }

    #[test]
    fn unknown_simulation_reported() {
        let store = MemoryStore::new();
        let sim = Uuid::new_v4();
        assert_eq!(
            store.animals(sim, AnimalFilter::living()).unwrap_err(),
            StoreError::UnknownSimulation(sim)
        );
    }

    #[test]
    fn ids_are_unique_across_simulations() {
        let (mut store, a) = store_with_sim(5);
        let b = store.create_simulation(&EcosystemParams::empty()).unwrap();
        let first = spawn(&mut store, a, Species::Fish, 0, 0);
        let second = spawn(&mut store, b, Species::Fish, 0, 0);
        assert_ne!(first, second);
        assert_eq!(store.animals(a, AnimalFilter::living()).unwrap().len(), 1);
    }

    #[test]
    fn living_fish_in_ignores_sharks_dead_and_other_cells() {
        let (mut store, sim) = store_with_sim(10);
        let live = spawn(&mut store, sim, Species::Fish, 1, 1);
        let dead = spawn(&mut store, sim, Species::Fish, 2, 1);
        spawn(&mut store, sim, Species::Shark, 3, 1);
        spawn(&mut store, sim, Species::Fish, 8, 8);
        store.kill_animals(sim, &[dead]).unwrap();

        let found = store
            .living_fish_in(
                sim,
                &[Coordinate::new(1, 1), Coordinate::new(2, 1), Coordinate::new(3, 1)],
            )
            .unwrap();
        assert_eq!(found, vec![(live, Coordinate::new(1, 1))]);
    }

    #[test]
    fn consume_fish_kills_in_place() {
        let (mut store, sim) = store_with_sim(10);
        spawn(&mut store, sim, Species::Fish, 4, 4);
        assert!(store.consume_fish(sim, Coordinate::new(4, 4)).unwrap());
        assert!(!store.consume_fish(sim, Coordinate::new(4, 4)).unwrap());
        let here = store.animals_at(sim, Coordinate::new(4, 4), true).unwrap();
        assert_eq!(here.len(), 1);
        assert!(!here[0].alive);
        assert!(store.animals_at(sim, Coordinate::new(4, 4), false).unwrap().is_empty());
    }

    #[test]
    fn purge_removes_only_dead_records() {
        let (mut store, sim) = store_with_sim(10);
        let eaten = spawn(&mut store, sim, Species::Fish, 1, 1);
        let starved = spawn(&mut store, sim, Species::Shark, 2, 2);
        let survivor = spawn(&mut store, sim, Species::Shark, 3, 3);
        store.consume_fish(sim, Coordinate::new(1, 1)).unwrap();
        store.kill_animals(sim, &[starved]).unwrap();

        assert_eq!(store.purge_dead(sim).unwrap(), 2);
        let left: Vec<AnimalId> = store
            .animals(sim, AnimalFilter::everything())
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(left, [survivor]);
        assert!(matches!(store.move_animal(sim, eaten, Coordinate::new(0, 0)), Err(StoreError::UnknownAnimal(_))));
        assert_eq!(store.purge_dead(sim).unwrap(), 0);

        let next = spawn(&mut store, sim, Species::Fish, 1, 1);
        assert!(next > survivor, "ids are never reused after a purge");
    }

    #[test]
    fn consume_fish_never_eats_sharks() {
        let (mut store, sim) = store_with_sim(10);
        spawn(&mut store, sim, Species::Shark, 4, 4);
        assert!(!store.consume_fish(sim, Coordinate::new(4, 4)).unwrap());
    }

    #[test]
    fn move_returns_vacated_coordinate() {
        let (mut store, sim) = store_with_sim(10);
        let id = spawn(&mut store, sim, Species::Fish, 4, 4);
        let from = store.move_animal(sim, id, Coordinate::new(4, 5)).unwrap();
        assert_eq!(from, Coordinate::new(4, 4));
        assert_eq!(store.animals_at(sim, Coordinate::new(4, 5), false).unwrap()[0].id, id);
    }

    #[test]
    fn kill_returns_vacated_cells_once() {
        let (mut store, sim) = store_with_sim(10);
        let a = spawn(&mut store, sim, Species::Shark, 1, 1);
        let b = spawn(&mut store, sim, Species::Shark, 2, 2);
        let vacated = store.kill_animals(sim, &[a, b]).unwrap();
        assert_eq!(vacated.len(), 2);
        assert!(vacated.contains(&Coordinate::new(1, 1)));
        assert!(store.kill_animals(sim, &[a]).unwrap().is_empty());
        assert_eq!(store.count_living(sim, Species::Shark).unwrap(), 0);
    }

    #[test]
    fn update_unknown_animal_fails() {
        let (mut store, sim) = store_with_sim(10);
        let mut updates = HashMap::new();
        updates.insert(99, AnimalUpdate::fed(1));
        assert_eq!(
            store.update_animals(sim, &updates).unwrap_err(),
            StoreError::UnknownAnimal(99)
        );
    }

    #[test]
    fn import_continues_id_sequence() {
        let mut store = MemoryStore::new();
        let sim = Uuid::new_v4();
        let existing = Animal {
            id: 41,
            species: Species::Fish,
            position: Coordinate::new(0, 0),
            alive: true,
            spawn_turn: 0,
            last_breed: 0,
            last_fed: 0,
            breed_count: 0,
        };
        store
            .import(sim, EcosystemParams { grid_size: 3, ..EcosystemParams::empty() }, vec![existing])
            .unwrap();
        let next = spawn(&mut store, sim, Species::Fish, 1, 1);
        assert_eq!(next, 42);
    }
}
