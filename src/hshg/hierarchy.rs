//! The tier hierarchy and global object registry
//!
//! Objects are routed to the grid whose cell size matches their longest
//! edge: larger than the edge, and at most `hierarchy_factor` times the next
//! smaller tier. Tiers are created lazily and kept sorted by cell size.

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{ConfigError, HshgConfig};
use crate::geom::Aabb;
use crate::hshg::collider::Collider;
use crate::hshg::constants::hierarchy::{INITIAL_OBJECT_CAPACITY, MIN_OBJECT_EXTENT};
use crate::hshg::grid::{Grid, TierStats};
use crate::hshg::registry::{GridId, Membership, ObjectHandle, Registry};

/// Hierarchical spatial hash grid
///
/// Not thread-safe; intended to be driven once per tick with
/// [`Hshg::update`] followed by [`Hshg::query_for_collision_pairs`].
#[derive(Debug)]
pub struct Hshg<T> {
    pub(crate) config: HshgConfig,
    /// Grids in creation order; a `GridId` indexes this and is never reused
    pub(crate) grids: Vec<Grid>,
    /// Grid ids sorted by ascending cell size
    pub(crate) tiers: Vec<GridId>,
    /// Every indexed object
    pub(crate) objects: Vec<ObjectHandle>,
    pub(crate) registry: Registry<T>,
}

impl<T: Collider> Hshg<T> {
    /// Create an empty hierarchy with default settings
    pub fn new() -> Self {
        Self::build(HshgConfig::default())
    }

    /// Create an empty hierarchy after validating `config`
    pub fn with_config(config: HshgConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: HshgConfig) -> Self {
        Self {
            config,
            grids: Vec::new(),
            tiers: Vec::new(),
            objects: Vec::with_capacity(INITIAL_OBJECT_CAPACITY),
            registry: Registry::with_capacity(INITIAL_OBJECT_CAPACITY),
        }
    }

    /// Index an object and return its handle
    ///
    /// # Panics
    /// Panics if the object reports an invalid AABB (see [`Aabb::new`]).
    pub fn add_object(&mut self, object: T) -> ObjectHandle {
        let aabb = object.aabb();
        let is_static = object.is_static();

        let global_index = self.objects.len();
        let handle = self.registry.insert(object, aabb, is_static, global_index);
        self.objects.push(handle);

        let grid = self.select_grid(tier_extent(&aabb));
        self.grids[grid].add_object(handle, None, &mut self.registry);
        handle
    }

    /// Remove an object; `None` if the handle is not (or no longer) indexed
    pub fn remove_object(&mut self, handle: ObjectHandle) -> Option<T> {
        let membership = self.registry.get(handle)?.membership;

        self.objects.swap_remove(membership.global_index);
        if let Some(&moved) = self.objects.get(membership.global_index) {
            self.registry.membership_mut(moved).global_index = membership.global_index;
        }

        self.grids[membership.grid].remove_object(handle, &mut self.registry);
        let entry = self.registry.remove(handle);
        debug_assert_eq!(self.objects.len(), self.registry.len());
        entry.map(|entry| entry.object)
    }

    /// Refresh AABBs and re-hash objects whose cell changed
    ///
    /// Static objects are skipped. Objects stay in their tier even if their
    /// size changed, unless `retier_on_update` is set. Returns the number of
    /// objects that moved cell or tier.
    pub fn update(&mut self) -> usize {
        let mut moved = 0;
        let mut retiered = 0;

        for global_index in 0..self.objects.len() {
            let handle = self.objects[global_index];
            let entry = self.registry.entry_mut(handle);
            if entry.is_static {
                continue;
            }
            let aabb = entry.object.aabb();
            entry.aabb = aabb;
            let current = entry.membership.grid;

            if self.config.retier_on_update {
                let target = self.fitting_grid(tier_extent(&aabb));
                if target != Some(current) {
                    self.grids[current].remove_object(handle, &mut self.registry);
                    let grid = match target {
                        Some(grid) => grid,
                        None => self.select_grid(tier_extent(&aabb)),
                    };
                    self.grids[grid].add_object(handle, None, &mut self.registry);
                    moved += 1;
                    retiered += 1;
                    continue;
                }
            }

            if self.grids[current].rehash(handle, &mut self.registry) {
                moved += 1;
            }
        }

        trace!(objects = self.objects.len(), moved, retiered, "update pass");
        moved
    }

    /// Existing tier that `extent` belongs to, if there is one
    ///
    /// Mirrors the routing in `select_grid`: the first tier larger than
    /// `extent`, provided `extent` is not below its cell size / factor.
    fn fitting_grid(&self, extent: f32) -> Option<GridId> {
        let &id = self
            .tiers
            .iter()
            .find(|&&id| extent < self.grids[id].cell_size())?;
        (extent >= self.grids[id].cell_size() / self.config.hierarchy_factor).then_some(id)
    }

    /// Tier for an object of longest edge `extent`, created if none fits
    fn select_grid(&mut self, extent: f32) -> GridId {
        let factor = self.config.hierarchy_factor;

        if self.tiers.is_empty() {
            return self.create_grid(extent * factor.sqrt(), 0);
        }

        let mut x = 0.0;
        for position in 0..self.tiers.len() {
            let id = self.tiers[position];
            x = self.grids[id].cell_size();
            if extent < x {
                x /= factor;
                if extent < x {
                    while extent < x {
                        x /= factor;
                    }
                    return self.create_grid(x * factor, position);
                }
                return id;
            }
        }

        while extent >= x {
            x *= factor;
        }
        let position = self.tiers.len();
        self.create_grid(x, position)
    }

    fn create_grid(&mut self, cell_size: f32, position: usize) -> GridId {
        let id = self.grids.len();
        self.grids.push(Grid::new(
            id,
            cell_size,
            self.config.initial_grid_length,
            self.config.max_object_cell_density,
        ));
        self.tiers.insert(position, id);

        debug!(cell_size, tier = position, tiers = self.tiers.len(), "created grid tier");
        id
    }

    /// Number of indexed objects
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.registry.get(handle).is_some()
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<&T> {
        self.registry.get(handle).map(|entry| &entry.object)
    }

    /// AABB the index currently hashes the object by
    pub fn aabb(&self, handle: ObjectHandle) -> Option<Aabb> {
        self.registry.get(handle).map(|entry| entry.aabb)
    }

    pub fn membership(&self, handle: ObjectHandle) -> Option<&Membership> {
        self.registry.get(handle).map(|entry| &entry.membership)
    }

    /// Cell size of the tier that owns the object
    pub fn cell_size_of(&self, handle: ObjectHandle) -> Option<f32> {
        self.membership(handle)
            .map(|membership| self.grids[membership.grid].cell_size())
    }

    /// Handles and objects, in global-list order
    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &T)> + '_ {
        self.objects
            .iter()
            .map(move |&handle| (handle, &self.registry.entry(handle).object))
    }

    #[inline]
    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Grids from smallest to largest cell size
    pub fn tiers(&self) -> impl Iterator<Item = &Grid> + '_ {
        self.tiers.iter().map(move |&id| &self.grids[id])
    }

    pub fn tier_cell_sizes(&self) -> Vec<f32> {
        self.tiers().map(Grid::cell_size).collect()
    }

    /// Total `expand_grid` passes across all tiers
    pub fn grid_expansions(&self) -> u64 {
        self.grids.iter().map(|grid| u64::from(grid.expansions())).sum()
    }

    #[inline]
    pub fn config(&self) -> &HshgConfig {
        &self.config
    }

    pub fn stats(&self) -> HshgStats {
        let tiers: Vec<TierStats> = self.tiers().map(Grid::stats).collect();
        HshgStats {
            object_count: self.objects.len(),
            tier_count: tiers.len(),
            occupied_cells: tiers.iter().map(|t| t.occupied_cells).sum(),
            grid_expansions: self.grid_expansions(),
            tiers,
        }
    }
}

impl<T: Collider> Default for Hshg<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the whole hierarchy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HshgStats {
    pub object_count: usize,
    pub tier_count: usize,
    pub occupied_cells: usize,
    pub grid_expansions: u64,
    /// Per tier, smallest cell size first
    pub tiers: Vec<TierStats>,
}

/// Longest edge used for tiering, floored so point boxes get a finite tier
#[inline]
fn tier_extent(aabb: &Aabb) -> f32 {
    aabb.longest_edge().max(MIN_OBJECT_EXTENT)
}
