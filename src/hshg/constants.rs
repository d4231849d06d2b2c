/// Per-tier grid constants
pub mod grid {
    /// Objects per cell above which a tier doubles its linear resolution
    pub const MAX_OBJECT_CELL_DENSITY: f32 = 1.0 / 8.0;
    /// Cell count of a freshly created tier (16 x 16)
    pub const INITIAL_GRID_LENGTH: usize = 256;
    /// Smallest row/column count a tier may have.
    /// Below 4, wrapped left/right (or up/down) neighbors are the same cell
    /// and neighborhood scans would report pairs twice.
    pub const MIN_ROW_COLUMN_COUNT: usize = 4;
    /// Number of neighborhood offsets per cell (self + 8 neighbors)
    pub const NEIGHBORHOOD_SIZE: usize = 9;
    /// Offsets `0..HALF_NEIGHBORHOOD` form the half-neighborhood scanned
    /// between same-tier cells. No offset in it is the negation of another.
    pub const HALF_NEIGHBORHOOD: usize = 4;
    /// Inline capacity of a cell bucket before it spills to the heap
    pub const CELL_INLINE_CAPACITY: usize = 4;
}

/// Tier hierarchy constants
pub mod hierarchy {
    /// Ratio between consecutive tier cell sizes
    pub const HIERARCHY_FACTOR: f32 = 2.0;
    /// Longest-edge floor used for tiering, so point-sized boxes still land
    /// in a tier with a finite cell size
    pub const MIN_OBJECT_EXTENT: f32 = 1.0e-3;
    /// Initial capacity of the global object list
    pub const INITIAL_OBJECT_CAPACITY: usize = 256;
}

/// Candidate pair buffer sizing
pub mod query {
    /// Initial capacity for the returned pair list
    pub const PAIR_BUFFER_INITIAL_CAPACITY: usize = 1024;
}
