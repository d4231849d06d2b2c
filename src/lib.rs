//! Hierarchical Spatial Hash Grid
//!
//! A broad-phase collision index for 2D axis-aligned bounding boxes of
//! mixed sizes.
//!
//! # Modules
//!
//! - `hshg` - The index: tiers, grids, and the pair query
//! - `geom` - AABB type and overlap test
//! - `config` - Index and demo driver configuration, loaded from the environment
//! - `metrics` - Gauges and tick timing in Prometheus or JSON form

pub mod config;
pub mod geom;
pub mod hshg;
pub mod metrics;
pub mod util;

pub use config::{ConfigError, HshgConfig};
pub use geom::Aabb;
pub use hshg::{Collider, Hshg, ObjectHandle};
