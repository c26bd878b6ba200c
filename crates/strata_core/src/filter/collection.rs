//! Filter collections and their per-group member sets.
//!
//! Each group's members are spread over `SHARD_COUNT` locked shards keyed
//! by entity id range, so workers adding to different groups, or to
//! different id ranges of one group, do not contend. The group table itself
//! is only write-locked when a group is seen for the first time or cleared.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use super::CombinedFilterId;
use crate::ecs::{Egid, EntityId, GroupId};

/// Member shards per group.
const SHARD_COUNT: usize = 16;

/// Consecutive entity ids sharing a shard, as a power of two.
const SHARD_SPAN_BITS: u32 = 6;

#[inline]
const fn shard_index(entity_id: EntityId) -> usize {
    (entity_id >> SHARD_SPAN_BITS) as usize % SHARD_COUNT
}
/// Dense member set of one group.
///
/// Members are packed in insertion order; removal swaps the last member
/// into the hole.
#[derive(Clone, Debug, Default)]
pub struct GroupFilter {
    index: HashMap<EntityId, usize>,
    entries: Vec<(EntityId, u32)>,
}

impl GroupFilter {
    /// Adds or updates a member. Returns `true` if it was not present.
    pub fn add(&mut self, entity_id: EntityId, dense_value: u32) -> bool {
        if let Some(&at) = self.index.get(&entity_id) {
            self.entries[at].1 = dense_value;
            return false;
        }
        self.index.insert(entity_id, self.entries.len());
        self.entries.push((entity_id, dense_value));
        true
    }

    /// Removes a member. Returns `false` if it was not present.
    pub fn remove(&mut self, entity_id: EntityId) -> bool {
        let Some(at) = self.index.remove(&entity_id) else {
            return false;
        };
        self.entries.swap_remove(at);
        if let Some(&(moved, _)) = self.entries.get(at) {
            self.index.insert(moved, at);
        }
        true
    }

    /// Checks membership.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.index.contains_key(&entity_id)
    }

    /// Dense value stored for a member.
    #[inline]
    #[must_use]
    pub fn dense_value(&self, entity_id: EntityId) -> Option<u32> {
        self.index.get(&entity_id).map(|&at| self.entries[at].1)
    }

    /// Members as `(entity id, dense value)`, packed.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[(EntityId, u32)] {
        &self.entries
    }

    /// Number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the set is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
struct Member {
    dense_value: u32,
    /// Insertion order across all shards of the group.
    seq: u64,
}

#[derive(Debug, Default)]
struct GroupShards {
    next_seq: AtomicU64,
    shards: [Mutex<HashMap<EntityId, Member>>; SHARD_COUNT],
}

impl GroupShards {
    fn shard(&self, entity_id: EntityId) -> &Mutex<HashMap<EntityId, Member>> {
        &self.shards[shard_index(entity_id)]
    }

    fn add(&self, entity_id: EntityId, dense_value: u32) -> bool {
        match self.shard(entity_id).lock().entry(entity_id) {
            Entry::Occupied(mut member) => {
                member.get_mut().dense_value = dense_value;
                false
            }
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Member { dense_value, seq });
                true
            }
        }
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    fn snapshot(&self) -> GroupFilter {
        let mut members: Vec<(EntityId, Member)> = Vec::new();
        for shard in &self.shards {
            members.extend(shard.lock().iter().map(|(&id, &member)| (id, member)));
        }
        members.sort_unstable_by_key(|(_, member)| member.seq);

        let mut filter = GroupFilter::default();
        for (entity_id, member) in members {
            filter.add(entity_id, member.dense_value);
        }
        filter
    }
}

/// One persistent filter: a member set per group.
///
/// Shared through [`FilterHandle`](super::FilterHandle); every method takes
/// `&self` and is safe to call from any thread.
#[derive(Debug)]
pub struct FilterCollection {
    id: CombinedFilterId,
    groups: RwLock<HashMap<GroupId, GroupShards>>,
}

impl FilterCollection {
    pub(crate) fn new(id: CombinedFilterId) -> Self {
        Self {
            id,
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Key this collection was created under.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> CombinedFilterId {
        self.id
    }

    /// Adds an entity, or updates its dense value if it is already a member.
    ///
    /// Returns `true` if the entity was not a member before.
    pub fn add(&self, egid: Egid, dense_value: u32) -> bool {
        if let Some(shards) = self.groups.read().get(&egid.group) {
            return shards.add(egid.entity_id, dense_value);
        }
        self.groups
            .write()
            .entry(egid.group)
            .or_default()
            .add(egid.entity_id, dense_value)
    }

    /// Removes an entity. Returns `false` if it was not a member.
    pub fn remove(&self, egid: Egid) -> bool {
        self.groups
            .read()
            .get(&egid.group)
            .is_some_and(|shards| {
                shards
                    .shard(egid.entity_id)
                    .lock()
                    .remove(&egid.entity_id)
                    .is_some()
            })
    }

    /// Checks membership.
    #[must_use]
    pub fn contains(&self, egid: Egid) -> bool {
        self.groups
            .read()
            .get(&egid.group)
            .is_some_and(|shards| {
                shards
                    .shard(egid.entity_id)
                    .lock()
                    .contains_key(&egid.entity_id)
            })
    }

    /// Number of members in `group`.
    #[must_use]
    pub fn count(&self, group: GroupId) -> usize {
        self.groups.read().get(&group).map_or(0, GroupShards::len)
    }

    /// Snapshot of the members of `group`, in insertion order.
    #[must_use]
    pub fn group_filter(&self, group: GroupId) -> GroupFilter {
        self.groups
            .read()
            .get(&group)
            .map(GroupShards::snapshot)
            .unwrap_or_default()
    }

    /// Drops every member of `group`. Returns how many were dropped.
    pub fn clear_group(&self, group: GroupId) -> usize {
        self.groups.write().remove(&group).map_or(0, |shards| shards.len())
    }

    /// Groups with at least one member.
    #[must_use]
    pub fn groups(&self) -> Vec<GroupId> {
        self.groups
            .read()
            .iter()
            .filter(|(_, shards)| shards.len() > 0)
            .map(|(&group, _)| group)
            .collect()
    }
}
