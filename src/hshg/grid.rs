//! One fixed-resolution tier of the hierarchy
//!
//! A square, power-of-two, toroidal hash grid. Positions outside the nominal
//! `row_column_count * cell_size` span wrap around (negative coordinates are
//! mirrored), so hashing never fails; distant objects may alias onto the same
//! bucket and are filtered out by the overlap test.
//!
//! Removal is O(1) everywhere: the cell bucket, the occupied-cell list and
//! the flat object list are all swap-removed, and the element moved into the
//! vacated slot gets its stored index patched.

use std::collections::TryReserveError;

use serde::Serialize;
use tracing::{debug, warn};

use crate::hshg::cell::{Cell, NeighborOffsets};
use crate::hshg::constants::grid::HALF_NEIGHBORHOOD;
use crate::hshg::registry::{GridId, ObjectHandle, Registry};

/// Hash grid for a single cell-size tier
#[derive(Debug)]
pub struct Grid {
    /// Stable id (creation order within the hierarchy)
    id: GridId,
    /// Cell edge length in world units
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inverse_cell_size: f32,
    /// Cells per row and per column (power of two)
    row_column_count: usize,
    /// `row_column_count - 1`
    xy_hash_mask: usize,
    /// Objects per cell above which the grid expands
    max_object_cell_density: f32,
    /// Offsets shared by every interior cell
    interior_offsets: NeighborOffsets,
    /// `row_column_count²` cells, row-major
    cells: Vec<Cell>,
    /// Indices of non-empty cells (unordered)
    occupied_cells: Vec<usize>,
    /// Every object hashed into this grid (unordered)
    objects: Vec<ObjectHandle>,
    /// Number of completed `expand_grid` passes
    expansions: u32,
}

impl Grid {
    /// Create a tier with `initial_grid_length` cells
    ///
    /// `initial_grid_length` must be a power of four (validated by
    /// `HshgConfig::validate`), giving a power-of-two row/column count.
    pub(crate) fn new(
        id: GridId,
        cell_size: f32,
        initial_grid_length: usize,
        max_object_cell_density: f32,
    ) -> Self {
        let row_column_count = 1usize << (initial_grid_length.trailing_zeros() / 2);
        let cells = match build_cells(row_column_count) {
            Ok(cells) => cells,
            Err(e) => panic!("failed to allocate {initial_grid_length} cells: {e}"),
        };

        Self {
            id,
            cell_size,
            inverse_cell_size: 1.0 / cell_size,
            row_column_count,
            xy_hash_mask: row_column_count - 1,
            max_object_cell_density,
            interior_offsets: interior_offsets(row_column_count),
            cells,
            occupied_cells: Vec::new(),
            objects: Vec::new(),
            expansions: 0,
        }
    }

    /// Map a world position to a cell index in `[0, cell_count)`
    ///
    /// Each axis is reduced independently: `floor(|c| / cell_size)` masked to
    /// the row/column range, mirrored for negative coordinates. NaN and
    /// infinite inputs fold into range as well.
    #[inline]
    pub fn to_hash(&self, x: f32, y: f32) -> usize {
        let column = self.axis_hash(x);
        let row = self.axis_hash(y);
        column + row * self.row_column_count
    }

    #[inline]
    fn axis_hash(&self, coord: f32) -> usize {
        // `as` saturates (and maps NaN to 0), so the mask always applies
        let scaled = (coord.abs() * self.inverse_cell_size) as u64;
        let masked = (scaled & self.xy_hash_mask as u64) as usize;
        if coord < 0.0 {
            self.row_column_count - 1 - masked
        } else {
            masked
        }
    }

    /// Place an object, then expand while the density threshold is exceeded
    ///
    /// `hash` is computed from the object's cached AABB min corner when `None`.
    pub(crate) fn add_object<T>(
        &mut self,
        handle: ObjectHandle,
        hash: Option<usize>,
        registry: &mut Registry<T>,
    ) {
        self.insert_object(handle, hash, registry);

        while self.density() > self.max_object_cell_density {
            if !self.expand_grid(registry) {
                break;
            }
        }
    }

    fn insert_object<T>(
        &mut self,
        handle: ObjectHandle,
        hash: Option<usize>,
        registry: &mut Registry<T>,
    ) {
        let hash = hash.unwrap_or_else(|| {
            let min = registry.entry(handle).aabb.min();
            self.to_hash(min.x, min.y)
        });

        let cell = &mut self.cells[hash];
        if cell.objects.is_empty() {
            cell.occupied_index = Some(self.occupied_cells.len());
            self.occupied_cells.push(hash);
        }
        let bucket_index = cell.objects.len();
        cell.objects.push(handle);

        let grid_index = self.objects.len();
        self.objects.push(handle);

        let membership = registry.membership_mut(handle);
        membership.grid = self.id;
        membership.hash = hash;
        membership.bucket_index = bucket_index;
        membership.grid_index = grid_index;
    }

    /// Remove an object using the indices stored in its membership
    pub(crate) fn remove_object<T>(&mut self, handle: ObjectHandle, registry: &mut Registry<T>) {
        let membership = registry.entry(handle).membership;
        debug_assert_eq!(membership.grid, self.id, "object removed from a grid that does not own it");

        let cell = &mut self.cells[membership.hash];
        cell.objects.swap_remove(membership.bucket_index);
        if let Some(&moved) = cell.objects.get(membership.bucket_index) {
            registry.membership_mut(moved).bucket_index = membership.bucket_index;
        }

        if cell.objects.is_empty() {
            if let Some(occupied_index) = cell.occupied_index.take() {
                self.occupied_cells.swap_remove(occupied_index);
                if let Some(&moved_cell) = self.occupied_cells.get(occupied_index) {
                    self.cells[moved_cell].occupied_index = Some(occupied_index);
                }
            }
        }

        self.objects.swap_remove(membership.grid_index);
        if let Some(&moved) = self.objects.get(membership.grid_index) {
            registry.membership_mut(moved).grid_index = membership.grid_index;
        }
    }

    /// Re-hash an object after its AABB moved; returns true if its cell changed
    pub(crate) fn rehash<T>(&mut self, handle: ObjectHandle, registry: &mut Registry<T>) -> bool {
        let entry = registry.entry(handle);
        let min = entry.aabb.min();
        let hash = self.to_hash(min.x, min.y);
        if hash == entry.membership.hash {
            return false;
        }

        self.remove_object(handle, registry);
        self.insert_object(handle, Some(hash), registry);
        true
    }

    /// Double the linear resolution and re-insert every object
    ///
    /// The new cell array is allocated before anything is touched; if that
    /// fails the grid is left as it was and `false` is returned.
    fn expand_grid<T>(&mut self, registry: &mut Registry<T>) -> bool {
        let row_column_count = match self.row_column_count.checked_mul(2) {
            Some(n) if n.checked_mul(n).is_some() => n,
            _ => {
                warn!(cell_size = self.cell_size, "grid cannot grow past {} cells", self.cells.len());
                return false;
            }
        };
        let cells = match build_cells(row_column_count) {
            Ok(cells) => cells,
            Err(e) => {
                warn!(cell_size = self.cell_size, "grid expansion skipped: {}", e);
                return false;
            }
        };

        let previous_cell_count = self.cells.len();
        let objects = std::mem::take(&mut self.objects);

        self.cells = cells;
        self.occupied_cells.clear();
        self.row_column_count = row_column_count;
        self.xy_hash_mask = row_column_count - 1;
        self.interior_offsets = interior_offsets(row_column_count);
        self.objects.reserve(objects.len());

        for handle in objects {
            self.insert_object(handle, None, registry);
        }
        self.expansions += 1;

        debug!(
            cell_size = self.cell_size,
            objects = self.objects.len(),
            "expanded grid from {} to {} cells",
            previous_cell_count,
            self.cells.len()
        );
        true
    }

    /// Neighborhood offsets of the cell at `hash`
    #[inline]
    pub(crate) fn offsets(&self, hash: usize) -> &NeighborOffsets {
        self.cells[hash].offsets(&self.interior_offsets)
    }

    #[inline]
    fn neighbor(&self, hash: usize, offset: isize) -> &Cell {
        &self.cells[hash.wrapping_add_signed(offset)]
    }

    /// Cells of the 3x3 neighborhood around `hash`, the cell itself included
    pub fn neighborhood(&self, hash: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.offsets(hash)
            .iter()
            .map(move |&offset| self.neighbor(hash, offset))
    }

    /// The 4 neighbors scanned for same-tier adjacent pairs
    pub fn half_neighborhood(&self, hash: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.offsets(hash)[..HALF_NEIGHBORHOOD]
            .iter()
            .map(move |&offset| self.neighbor(hash, offset))
    }

    #[inline]
    pub fn id(&self) -> GridId {
        self.id
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn row_column_count(&self) -> usize {
        self.row_column_count
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn cell(&self, hash: usize) -> &Cell {
        &self.cells[hash]
    }

    #[inline]
    pub fn occupied_cells(&self) -> &[usize] {
        &self.occupied_cells
    }

    #[inline]
    pub fn objects(&self) -> &[ObjectHandle] {
        &self.objects
    }

    #[inline]
    pub fn expansions(&self) -> u32 {
        self.expansions
    }

    /// Objects per cell
    #[inline]
    pub fn density(&self) -> f32 {
        self.objects.len() as f32 / self.cells.len() as f32
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            cell_size: self.cell_size,
            row_column_count: self.row_column_count,
            cell_count: self.cells.len(),
            object_count: self.objects.len(),
            occupied_cells: self.occupied_cells.len(),
            max_per_cell: self
                .occupied_cells
                .iter()
                .map(|&hash| self.cells[hash].len())
                .max()
                .unwrap_or(0),
            expansions: self.expansions,
        }
    }
}

/// Statistics about one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub cell_size: f32,
    pub row_column_count: usize,
    pub cell_count: usize,
    pub object_count: usize,
    pub occupied_cells: usize,
    pub max_per_cell: usize,
    pub expansions: u32,
}

fn interior_offsets(row_column_count: usize) -> NeighborOffsets {
    let w = row_column_count as isize;
    [w - 1, w, w + 1, -1, 0, 1, -w - 1, -w, -w + 1]
}

/// Allocate the cell array; edge cells get offsets wrapped to the far side
fn build_cells(row_column_count: usize) -> Result<Vec<Cell>, TryReserveError> {
    let w = row_column_count as isize;
    let len = w * w;

    let mut cells = Vec::new();
    cells.try_reserve_exact(len as usize)?;

    for i in 0..len {
        let y = i / w;
        let x = i % w;

        let on_right = x == w - 1;
        let on_left = x == 0;
        let on_top = y == w - 1;
        let on_bottom = y == 0;

        if on_right || on_left || on_top || on_bottom {
            let right = if on_right { -w + 1 } else { 1 };
            let left = if on_left { w - 1 } else { -1 };
            let top = if on_top { -len + w } else { w };
            let bottom = if on_bottom { len - w } else { -w };

            cells.push(Cell::edge([
                left + top,
                top,
                right + top,
                left,
                0,
                right,
                left + bottom,
                bottom,
                right + bottom,
            ]));
        } else {
            cells.push(Cell::interior());
        }
    }

    Ok(cells)
}
