//! Side table of per-object bookkeeping
//!
//! Every indexed object lives in a slot addressed by an [`ObjectHandle`].
//! The slot holds the caller's value, the cached AABB, and the
//! [`Membership`] record with the four container indices that make
//! insert/remove O(1).

use serde::{Deserialize, Serialize};

use crate::geom::Aabb;

/// Stable handle to an indexed object
///
/// Slot indices are recycled after removal; the generation is bumped each
/// time, so a handle kept past `remove_object` never resolves to a newer
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Identifier of a grid within the hierarchy (creation order, never reused)
pub type GridId = usize;

/// Where an object currently sits in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Membership {
    /// Owning grid (tier)
    pub(crate) grid: GridId,
    /// Cell index within the owning grid
    pub(crate) hash: usize,
    /// Position within the cell bucket
    pub(crate) bucket_index: usize,
    /// Position within the grid's flat object list
    pub(crate) grid_index: usize,
    /// Position within the hierarchy's global object list
    pub(crate) global_index: usize,
}

impl Membership {
    fn unplaced(global_index: usize) -> Self {
        Self {
            grid: 0,
            hash: 0,
            bucket_index: 0,
            grid_index: 0,
            global_index,
        }
    }

    pub fn grid(&self) -> GridId {
        self.grid
    }

    pub fn hash(&self) -> usize {
        self.hash
    }

    pub fn bucket_index(&self) -> usize {
        self.bucket_index
    }

    pub fn grid_index(&self) -> usize {
        self.grid_index
    }

    pub fn global_index(&self) -> usize {
        self.global_index
    }
}

/// A live object and its bookkeeping
#[derive(Debug)]
pub(crate) struct Entry<T> {
    pub(crate) object: T,
    /// Last AABB read from the object (frozen for static objects)
    pub(crate) aabb: Aabb,
    pub(crate) is_static: bool,
    pub(crate) membership: Membership,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// Generational arena of entries
#[derive(Debug)]
pub(crate) struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Registry<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Store a new entry; its membership is filled in by the grid that takes it
    pub(crate) fn insert(
        &mut self,
        object: T,
        aabb: Aabb,
        is_static: bool,
        global_index: usize,
    ) -> ObjectHandle {
        let entry = Entry {
            object,
            aabb,
            is_static,
            membership: Membership::unplaced(global_index),
        };

        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = Some(entry);
            ObjectHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len())
                .unwrap_or_else(|_| panic!("object registry exceeded u32::MAX slots"));
            self.slots.push(Slot {
                generation: 0,
                entry: Some(entry),
            });
            ObjectHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Take an entry out; `None` for stale or unknown handles
    pub(crate) fn remove(&mut self, handle: ObjectHandle) -> Option<Entry<T>> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let entry = slot.entry.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(entry)
    }

    #[inline]
    pub(crate) fn get(&self, handle: ObjectHandle) -> Option<&Entry<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut Entry<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    /// Entry for a handle held by the index itself (always live)
    #[inline]
    pub(crate) fn entry(&self, handle: ObjectHandle) -> &Entry<T> {
        match self.get(handle) {
            Some(entry) => entry,
            None => unreachable!("index holds a dead object handle {handle:?}"),
        }
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self, handle: ObjectHandle) -> &mut Entry<T> {
        match self.get_mut(handle) {
            Some(entry) => entry,
            None => unreachable!("index holds a dead object handle {handle:?}"),
        }
    }

    #[inline]
    pub(crate) fn membership_mut(&mut self, handle: ObjectHandle) -> &mut Membership {
        &mut self.entry_mut(handle).membership
    }
}
