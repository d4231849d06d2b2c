//! Hierarchical spatial hash grid
//!
//! A broad-phase index over axis-aligned boxes. Objects are bucketed into
//! toroidal hash grids ("tiers") whose cell size tracks object size, so each
//! query only compares objects in the same or adjacent cells, plus each
//! object against the neighborhood it falls in on every larger tier.

pub mod cell;
pub mod collider;
pub mod constants;
pub mod grid;
pub mod hierarchy;
pub mod query;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_support;

pub use cell::Cell;
pub use collider::Collider;
pub use grid::{Grid, TierStats};
pub use hierarchy::{Hshg, HshgStats};
pub use query::aabb_overlap_test;
pub use registry::{GridId, Membership, ObjectHandle};
