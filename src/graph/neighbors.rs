//! Spatial indexing for cutoff-radius neighbor search.
//!
//! Atoms are binned into a uniform cubic grid whose cell edge equals the
//! cutoff, so every neighbor of a point lies in the 27 cells around it. For
//! periodic structures, the grid is filled with the periodic images of every
//! atom that can reach the home cell within the cutoff.

use std::collections::HashMap;

use crate::model::structure::Lattice;

/// Separations below this length are treated as coincident atoms and never
/// produce an edge.
pub const NUMERICAL_TOLERANCE: f64 = 1e-8;

/// A directed neighbor pair found by the search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborPair {
    /// Index of the central atom.
    pub center: usize,
    /// Index of the neighboring atom in the home cell.
    pub neighbor: usize,
    /// Periodic image of `neighbor` (zero for molecules).
    pub image: [i32; 3],
    /// Cartesian distance between the center and the neighbor image.
    pub distance: f64,
}

/// Grid-based spatial index over a set of points.
///
/// Stores point ids per cubic cell and answers radius queries by scanning
/// the neighboring cells.
#[derive(Debug)]
pub struct SpatialGrid {
    inv_cell_size: f64,
    cells: HashMap<(i32, i32, i32), Vec<usize>>,
}

impl SpatialGrid {
    /// Creates an empty grid.
    ///
    /// # Arguments
    ///
    /// * `cell_size` - Edge length of each cubic cell, normally the cutoff.
    ///   Callers validate it as a positive finite number beforehand.
    pub fn new(cell_size: f64) -> Self {
        Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
        }
    }

    /// Creates a grid populated with `points`, using slice positions as ids.
    pub fn from_points(points: &[[f64; 3]], cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (id, p) in points.iter().enumerate() {
            grid.insert(id, *p);
        }
        grid
    }

    fn cell_coords(&self, pos: [f64; 3]) -> (i32, i32, i32) {
        (
            (pos[0] * self.inv_cell_size).floor() as i32,
            (pos[1] * self.inv_cell_size).floor() as i32,
            (pos[2] * self.inv_cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, id: usize, pos: [f64; 3]) {
        let cell = self.cell_coords(pos);
        self.cells.entry(cell).or_default().push(id);
    }

    /// Returns `(id, distance)` for every stored point within `cutoff` of
    /// `query` (inclusive), in ascending id order.
    ///
    /// # Arguments
    ///
    /// * `query` - Query position
    /// * `points` - The positions the stored ids refer to
    /// * `cutoff` - Search radius; must not exceed the cell size
    pub fn query_radius(
        &self,
        query: [f64; 3],
        points: &[[f64; 3]],
        cutoff: f64,
    ) -> Vec<(usize, f64)> {
        let cutoff_sq = cutoff * cutoff;
        let (cx, cy, cz) = self.cell_coords(query);

        let mut results = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(ids) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) else {
                        continue;
                    };
                    for &id in ids {
                        let p = points[id];
                        let d = [p[0] - query[0], p[1] - query[1], p[2] - query[2]];
                        let dist_sq = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
                        if dist_sq <= cutoff_sq {
                            results.push((id, dist_sq.sqrt()));
                        }
                    }
                }
            }
        }

        results.sort_unstable_by_key(|&(id, _)| id);
        results
    }
}

/// Finds every directed pair of atoms within `cutoff` of each other.
///
/// With a lattice, neighbors are searched across periodic images; an atom
/// may bond to its own images and to several images of the same atom. The
/// pair of an atom with itself in the home cell is never returned, nor is
/// any pair closer than [`NUMERICAL_TOLERANCE`].
///
/// Pairs are sorted by center, then neighbor, then image, so the edge order
/// is reproducible for identical inputs.
///
/// # Arguments
///
/// * `positions` - Cartesian atom positions
/// * `lattice` - The periodic cell, or `None` for a molecule
/// * `cutoff` - Inclusive search radius; callers validate it beforehand
pub fn find_neighbor_pairs(
    positions: &[[f64; 3]],
    lattice: Option<&Lattice>,
    cutoff: f64,
) -> Vec<NeighborPair> {
    let (wrapped, offsets) = match lattice {
        Some(lattice) => wrap_into_cell(positions, lattice),
        None => (positions.to_vec(), vec![[0; 3]; positions.len()]),
    };
    let images = match lattice {
        Some(lattice) => image_offsets(lattice, cutoff),
        None => vec![[0; 3]],
    };

    let mut points = Vec::with_capacity(images.len() * wrapped.len());
    let mut owners = Vec::with_capacity(points.capacity());
    for &image in &images {
        let shift = lattice.map_or([0.0; 3], |l| l.image_shift(image));
        for (atom, p) in wrapped.iter().enumerate() {
            points.push([p[0] + shift[0], p[1] + shift[1], p[2] + shift[2]]);
            owners.push((atom, image));
        }
    }

    let grid = SpatialGrid::from_points(&points, cutoff);

    let mut pairs = Vec::new();
    for (center, &query) in wrapped.iter().enumerate() {
        for (id, distance) in grid.query_radius(query, &points, cutoff) {
            let (neighbor, image) = owners[id];
            if distance < NUMERICAL_TOLERANCE {
                continue;
            }
            // Express the image relative to the caller's unwrapped positions.
            let (from, to) = (offsets[center], offsets[neighbor]);
            let image = [
                image[0] - to[0] + from[0],
                image[1] - to[1] + from[1],
                image[2] - to[2] + from[2],
            ];
            pairs.push(NeighborPair {
                center,
                neighbor,
                image,
                distance,
            });
        }
    }

    pairs.sort_by(|a, b| {
        (a.center, a.neighbor, a.image).cmp(&(b.center, b.neighbor, b.image))
    });
    pairs
}

/// Wraps every position into the home cell, returning the wrapped
/// positions and the integer cell each original position sat in.
///
/// Positions that cannot be converted to fractional coordinates are kept
/// as they are.
fn wrap_into_cell(
    positions: &[[f64; 3]],
    lattice: &Lattice,
) -> (Vec<[f64; 3]>, Vec<[i32; 3]>) {
    positions
        .iter()
        .map(|&p| match lattice.to_fractional(p) {
            Some(f) => {
                let cell = [
                    f[0].floor() as i32,
                    f[1].floor() as i32,
                    f[2].floor() as i32,
                ];
                let shift = lattice.image_shift(cell);
                ([p[0] - shift[0], p[1] - shift[1], p[2] - shift[2]], cell)
            }
            None => (p, [0; 3]),
        })
        .unzip()
}

/// Periodic images whose atoms can come within `cutoff` of an atom in the
/// home cell, for positions already wrapped into that cell.
fn image_offsets(lattice: &Lattice, cutoff: f64) -> Vec<[i32; 3]> {
    let spacings = lattice.plane_spacings();
    let reach: Vec<i32> = spacings
        .iter()
        .map(|&spacing| (cutoff / spacing).ceil() as i32 + 1)
        .collect();

    let mut images = Vec::new();
    for a in -reach[0]..=reach[0] {
        for b in -reach[1]..=reach[1] {
            for c in -reach[2]..=reach[2] {
                images.push([a, b, c]);
            }
        }
    }
    images
}
