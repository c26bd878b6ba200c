//! # Entity Filters
//!
//! Persistent, caller-maintained subsets of entities, kept per group.
//!
//! ```text
//! EntityFilters
//!   (context 1, filter 7) ─► FilterCollection
//!                              group 3 ─► [ (12, 0), (40, 1), (9, 2) ]
//!                              group 5 ─► [ (1, 0) ]
//!   (context 2, filter 7) ─► FilterCollection ...
//! ```
//!
//! Contexts keep independent subsystems from colliding on filter ids.
//! Membership is never synchronized with storage: removing an entity does
//! not remove it from filters.
//!
//! ## Visibility
//!
//! A collection is visible to every lookup as soon as `get_or_create`
//! returns, and every `add` is visible as soon as it returns, including
//! collections created and filled from worker threads during a build phase.

mod collection;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

pub use collection::{FilterCollection, GroupFilter};

use crate::error::{EcsError, EcsResult};

/// Namespace of filter ids, issued by [`EntityFilters::new_context_id`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterContextId(u32);

impl FilterContextId {
    /// Returns the raw context value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Key of one filter collection: a context plus a caller-chosen filter id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CombinedFilterId {
    /// Owning context.
    pub context: FilterContextId,
    /// Filter id inside the context.
    pub filter: u32,
}

impl CombinedFilterId {
    /// Combines a context and a filter id.
    #[inline]
    #[must_use]
    pub const fn new(context: FilterContextId, filter: u32) -> Self {
        Self { context, filter }
    }
}

impl fmt::Display for CombinedFilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "filter {} in context {}", self.filter, self.context.0)
    }
}

/// Shared handle to a collection. Every holder sees the same membership.
pub type FilterHandle = Arc<FilterCollection>;

/// All filter collections of one world.
#[derive(Debug)]
pub struct EntityFilters {
    collections: RwLock<HashMap<CombinedFilterId, FilterHandle>>,
    next_context: AtomicU32,
}

impl EntityFilters {
    /// Creates an empty filter table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            next_context: AtomicU32::new(0),
        }
    }

    /// Issues a context id unique within this table.
    pub fn new_context_id(&self) -> FilterContextId {
        FilterContextId(self.next_context.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the collection for `(context, filter)`, creating it on first
    /// use. Every call with the same key returns the same collection.
    pub fn get_or_create(&self, context: FilterContextId, filter: u32) -> FilterHandle {
        let key = CombinedFilterId::new(context, filter);

        if let Some(existing) = self.collections.read().get(&key) {
            return Arc::clone(existing);
        }

        let mut collections = self.collections.write();
        Arc::clone(collections.entry(key).or_insert_with(|| {
            tracing::debug!("created {}", key);
            Arc::new(FilterCollection::new(key))
        }))
    }

    /// Returns an existing collection.
    ///
    /// # Errors
    ///
    /// [`EcsError::FilterNotFound`] if the key was never created.
    pub fn get_existing(&self, context: FilterContextId, filter: u32) -> EcsResult<FilterHandle> {
        let key = CombinedFilterId::new(context, filter);
        self.collections
            .read()
            .get(&key)
            .map(Arc::clone)
            .ok_or(EcsError::FilterNotFound(key))
    }

    /// Checks if a collection exists for the key.
    #[must_use]
    pub fn contains(&self, context: FilterContextId, filter: u32) -> bool {
        self.collections
            .read()
            .contains_key(&CombinedFilterId::new(context, filter))
    }

    /// Number of collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.read().len()
    }

    /// Checks if no collection was ever created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.read().is_empty()
    }
}

impl Default for EntityFilters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Egid, GroupRegistry};

    #[test]
    fn test_get_or_create_shares_one_collection() {
        let filters = EntityFilters::new();
        let context = filters.new_context_id();
        let group = GroupRegistry::new().new_group();

        let first = filters.get_or_create(context, 7);
        first.add(Egid::new(1, group), 0);

        let second = filters.get_or_create(context, 7);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.count(group), 1);
        assert_eq!(filters.len(), 1);
    }

    #[test]
    fn test_missing_filter() {
        let filters = EntityFilters::new();
        let context = filters.new_context_id();

        assert_eq!(
            filters.get_existing(context, 3).unwrap_err(),
            EcsError::FilterNotFound(CombinedFilterId::new(context, 3))
        );
        assert!(!filters.contains(context, 3));
    }

    #[test]
    fn test_contexts_do_not_collide() {
        let filters = EntityFilters::new();
        let (a, b) = (filters.new_context_id(), filters.new_context_id());
        assert_ne!(a, b);

        let group = GroupRegistry::new().new_group();
        filters.get_or_create(a, 1).add(Egid::new(4, group), 0);

        assert_eq!(filters.get_or_create(b, 1).count(group), 0);
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn test_created_on_worker_is_visible() {
        let filters = EntityFilters::new();
        let context = filters.new_context_id();
        let group = GroupRegistry::new().new_group();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let filter = filters.get_or_create(context, 2);
                for id in 0..10 {
                    filter.add(Egid::new(id, group), id);
                }
            });
        });

        let filter = filters.get_existing(context, 2).unwrap();
        assert_eq!(filter.count(group), 10);
    }
}
