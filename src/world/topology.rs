use serde::{Deserialize, Serialize};

use crate::world::Coordinate;

/// Orthogonal offsets in fixed order: up, down, left, right.
static ORTHOGONAL_OFFSETS: [(i64, i64); 4] = [
    (0, -1), // Up
    (0, 1),  // Down
    (-1, 0), // Left
    (1, 0),  // Right
];

/// Diagonal offsets, appended after the orthogonal ones for Moore neighborhoods.
static DIAGONAL_OFFSETS: [(i64, i64); 4] = [
    (-1, -1), // Up-left
    (1, -1),  // Up-right
    (-1, 1),  // Down-left
    (1, 1),   // Down-right
];

/// Which cells count as adjacent on the square grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighborhood {
    /// The four orthogonal neighbors.
    #[default]
    VonNeumann,
    /// The four orthogonal neighbors followed by the four diagonals.
    Moore,
}

impl Neighborhood {
    fn offsets(self) -> impl Iterator<Item = &'static (i64, i64)> {
        let diagonals: &'static [(i64, i64)] = match self {
            Neighborhood::VonNeumann => &[],
            Neighborhood::Moore => &DIAGONAL_OFFSETS,
        };
        ORTHOGONAL_OFFSETS.iter().chain(diagonals.iter())
    }
}

/// Neighbors of `coordinate` on a toroidal `grid_size` x `grid_size` grid.
///
/// Edges wrap to the opposite edge. The order is fixed: callers wanting a
/// randomized preference must shuffle the result themselves.
pub fn neighbors(
    grid_size: u32,
    coordinate: Coordinate,
    neighborhood: Neighborhood,
) -> Vec<Coordinate> {
    let size = grid_size as i64;
    neighborhood
        .offsets()
        .map(|&(dx, dy)| {
            Coordinate::new(
                (coordinate.x as i64 + dx).rem_euclid(size) as u32,
                (coordinate.y as i64 + dy).rem_euclid(size) as u32,
            )
        })
        .collect()
}
