//! The capability set the index requires from every object it holds

use std::rc::Rc;
use std::sync::Arc;

use crate::geom::Aabb;

/// An object that can be placed in the hierarchy
///
/// The index stores whatever value the caller hands to `Hshg::add_object`.
/// For game entities this is usually a cheap handle (`Rc<RefCell<_>>`,
/// `Arc<_>`, an id into the caller's own storage) so `aabb()` can read live
/// state and `collided()` can record hits through interior mutability.
pub trait Collider {
    /// Current bounding box.
    ///
    /// Called on insertion, on every `update()` for non-static objects, and
    /// by the default overlap test through the index's cached copy.
    fn aabb(&self) -> Aabb;

    /// Static objects keep the AABB computed at insertion, are skipped by
    /// `update()`, and are never paired with other static objects by the
    /// default overlap test.
    fn is_static(&self) -> bool {
        false
    }

    /// Called once per discovered pair on each side, with the other object.
    fn collided(&self, _other: &Self) {}
}

impl<T: Collider> Collider for Rc<T> {
    fn aabb(&self) -> Aabb {
        (**self).aabb()
    }

    fn is_static(&self) -> bool {
        (**self).is_static()
    }

    fn collided(&self, other: &Self) {
        (**self).collided(&**other)
    }
}

impl<T: Collider> Collider for Arc<T> {
    fn aabb(&self) -> Aabb {
        (**self).aabb()
    }

    fn is_static(&self) -> bool {
        (**self).is_static()
    }

    fn collided(&self, other: &Self) {
        (**self).collided(&**other)
    }
}

impl<T: Collider> Collider for Box<T> {
    fn aabb(&self) -> Aabb {
        (**self).aabb()
    }

    fn is_static(&self) -> bool {
        (**self).is_static()
    }

    fn collided(&self, other: &Self) {
        (**self).collided(&**other)
    }
}

/// A bare AABB is its own collider (dynamic, no callback)
impl Collider for Aabb {
    fn aabb(&self) -> Aabb {
        *self
    }
}
