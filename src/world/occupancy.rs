use std::collections::HashSet;

use crate::world::{Animal, Coordinate};

/// Set of cells currently holding a living animal.
///
/// The engine keeps this in lockstep with the store so that "is this cell
/// free" never needs a store query. None of the operations can fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OccupancyIndex {
    cells: HashSet<Coordinate>,
}

impl OccupancyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from the living animals in `animals`.
    pub fn from_animals<'a>(animals: impl IntoIterator<Item = &'a Animal>) -> Self {
        OccupancyIndex {
            cells: animals
                .into_iter()
                .filter(|a| a.alive)
                .map(|a| a.position)
                .collect(),
        }
    }

    pub fn is_occupied(&self, coordinate: Coordinate) -> bool {
        self.cells.contains(&coordinate)
    }

    pub fn mark_occupied(&mut self, coordinate: Coordinate) {
        self.cells.insert(coordinate);
    }

    /// No-op when the cell is not marked.
    pub fn mark_vacated(&mut self, coordinate: Coordinate) {
        self.cells.remove(&coordinate);
    }

    /// Vacate `from`, then occupy `to`. A move onto the same cell leaves it occupied.
    pub fn relocate(&mut self, from: Coordinate, to: Coordinate) {
        self.mark_vacated(from);
        self.mark_occupied(to);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn as_set(&self) -> &HashSet<Coordinate> {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Species;

    fn animal(id: u64, x: u32, y: u32, alive: bool) -> Animal {
        Animal {
            id,
            species: Species::Fish,
            position: Coordinate::new(x, y),
            alive,
            spawn_turn: 0,
            last_breed: 0,
            last_fed: 0,
            breed_count: 0,
        }
    }

    #[test]
    fn built_from_living_animals_only() {
        let animals = vec![animal(1, 1, 1, true), animal(2, 2, 2, true), animal(3, 3, 3, false)];
        let index = OccupancyIndex::from_animals(&animals);
        assert!(index.is_occupied(Coordinate::new(1, 1)));
        assert!(index.is_occupied(Coordinate::new(2, 2)));
        assert!(!index.is_occupied(Coordinate::new(3, 3)));
        assert!(!index.is_occupied(Coordinate::new(1, 2)));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn vacating_unmarked_cell_is_noop() {
        let mut index = OccupancyIndex::new();
        index.mark_vacated(Coordinate::new(4, 4));
        assert!(index.is_empty());
    }

    #[test]
    fn relocate_moves_the_mark() {
        let mut index = OccupancyIndex::new();
        index.mark_occupied(Coordinate::new(0, 0));
        index.relocate(Coordinate::new(0, 0), Coordinate::new(0, 1));
        assert!(!index.is_occupied(Coordinate::new(0, 0)));
        assert!(index.is_occupied(Coordinate::new(0, 1)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn relocate_onto_same_cell_keeps_it_occupied() {
        let mut index = OccupancyIndex::new();
        let c = Coordinate::new(5, 5);
        index.mark_occupied(c);
        index.relocate(c, c);
        assert!(index.is_occupied(c));
    }

    #[test]
    fn marking_twice_does_not_duplicate() {
        let mut index = OccupancyIndex::new();
        index.mark_occupied(Coordinate::new(1, 1));
        index.mark_occupied(Coordinate::new(1, 1));
        assert_eq!(index.len(), 1);
    }
}
