//! Geometry primitives used by the broad phase

pub mod aabb;

pub use aabb::Aabb;
