//! Shared fixtures for the hierarchy and query tests

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use hashbrown::HashSet;

use crate::geom::Aabb;
use crate::hshg::collider::Collider;
use crate::util::vec2::Vec2;

/// A box whose AABB can be moved from outside the index
#[derive(Debug)]
pub(crate) struct Body {
    pub(crate) id: u32,
    pub(crate) aabb: Cell<Aabb>,
    pub(crate) is_static: bool,
    /// Ids this body was reported against, in notification order
    pub(crate) hits: RefCell<Vec<u32>>,
}

impl Collider for Body {
    fn aabb(&self) -> Aabb {
        self.aabb.get()
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn collided(&self, other: &Self) {
        self.hits.borrow_mut().push(other.id);
    }
}

pub(crate) fn body(id: u32, x: f32, y: f32, width: f32, height: f32) -> Rc<Body> {
    Rc::new(Body {
        id,
        aabb: Cell::new(Aabb::from_min_size(Vec2::new(x, y), Vec2::new(width, height))),
        is_static: false,
        hits: RefCell::new(Vec::new()),
    })
}

pub(crate) fn static_body(id: u32, x: f32, y: f32, size: f32) -> Rc<Body> {
    Rc::new(Body {
        id,
        aabb: Cell::new(Aabb::from_min_size(Vec2::new(x, y), Vec2::splat(size))),
        is_static: true,
        hits: RefCell::new(Vec::new()),
    })
}

pub(crate) fn resize(body: &Body, width: f32, height: f32) {
    let min = body.aabb.get().min();
    body.aabb.set(Aabb::from_min_size(min, Vec2::new(width, height)));
}

/// Order-independent pair set
pub(crate) fn ids(pairs: impl IntoIterator<Item = (u32, u32)>) -> HashSet<(u32, u32)> {
    pairs.into_iter().map(|(a, b)| (a.min(b), a.max(b))).collect()
}

/// Brute-force pairs under the default test, on live AABBs
pub(crate) fn reference_pairs(bodies: &[Rc<Body>]) -> HashSet<(u32, u32)> {
    let mut pairs = Vec::new();
    for (k, a) in bodies.iter().enumerate() {
        for b in &bodies[k + 1..] {
            if a.is_static && b.is_static {
                continue;
            }
            if a.aabb.get().overlaps(&b.aabb.get()) {
                pairs.push((a.id, b.id));
            }
        }
    }
    ids(pairs)
}
