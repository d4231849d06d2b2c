use smallvec::SmallVec;

use crate::hshg::constants::grid::{CELL_INLINE_CAPACITY, NEIGHBORHOOD_SIZE};
use crate::hshg::registry::ObjectHandle;

/// Signed deltas from a cell's own index to its 3x3 neighborhood
///
/// Order (rows top to bottom, `w` = row/column count):
/// `[+w-1, +w, +w+1, -1, 0, +1, -w-1, -w, -w+1]`.
pub type NeighborOffsets = [isize; NEIGHBORHOOD_SIZE];

/// One bucket of a grid
#[derive(Debug, Clone, Default)]
pub struct Cell {
    /// Objects currently hashed here
    pub(crate) objects: SmallVec<[ObjectHandle; CELL_INLINE_CAPACITY]>,
    /// Wrapped offsets for edge cells; interior cells use the grid's shared array
    pub(crate) edge_offsets: Option<Box<NeighborOffsets>>,
    /// Position in the grid's occupied-cell list while non-empty
    pub(crate) occupied_index: Option<usize>,
}

impl Cell {
    pub(crate) fn interior() -> Self {
        Self::default()
    }

    pub(crate) fn edge(offsets: NeighborOffsets) -> Self {
        Self {
            edge_offsets: Some(Box::new(offsets)),
            ..Self::default()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn is_edge(&self) -> bool {
        self.edge_offsets.is_some()
    }

    #[inline]
    pub fn objects(&self) -> &[ObjectHandle] {
        &self.objects
    }

    /// This cell's offsets, falling back to the shared interior array
    #[inline]
    pub(crate) fn offsets<'a>(&'a self, interior: &'a NeighborOffsets) -> &'a NeighborOffsets {
        self.edge_offsets.as_deref().unwrap_or(interior)
    }
}
