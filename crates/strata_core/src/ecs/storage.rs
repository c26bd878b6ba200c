//! # Group Storage
//!
//! Packed, per-group component storage.
//!
//! The submission engine only talks to storage through [`EntityStorage`], so
//! a host engine can plug in its own tables. [`PackedStorage`] is the default:
//!
//! ```text
//! Group 3 (shape "Soldier" = EgidComponent + Health):
//!   entity_ids: [ 10,  11,  12 ]
//!   EgidComponent column: [E10][E11][E12]   <- contiguous bytes
//!   Health column:        [H10][H11][H12]   <- contiguous bytes
//! ```
//!
//! Removal swaps the last row into the hole, so columns stay dense.

use std::collections::HashMap;

use super::component::ComponentTypeId;
use super::entity::{Egid, EntityId, GroupId};
use super::shape::{Shape, ShapeId};
use crate::error::{EcsError, EcsResult};

/// Storage collaborator used by the submission engine and the world.
///
/// All mutating methods are only ever called from the submission point or
/// from `&mut World` operations.
pub trait EntityStorage {
    /// Shape the group is bound to, if the group holds any table.
    fn group_shape(&self, group: GroupId) -> Option<ShapeId>;

    /// Checks if an entity lives at `egid`.
    fn contains(&self, egid: Egid) -> bool;

    /// Appends a zeroed row for `egid`, creating the group table on first use.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateEntityId`] if the row exists,
    /// [`EcsError::GroupShapeMismatch`] if the group holds another shape.
    fn allocate_slot(&mut self, egid: Egid, shape: &Shape) -> EcsResult<usize>;

    /// Copies `payload` into one component of a row.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityNotFound`] for a missing row or column.
    fn write_component(
        &mut self,
        group: GroupId,
        local_index: usize,
        component: ComponentTypeId,
        payload: &[u8],
    ) -> EcsResult<()>;

    /// Raw bytes of one component of one entity.
    fn component_bytes(&self, egid: Egid, component: ComponentTypeId) -> Option<&[u8]>;

    /// Raw bytes of a whole component column, row order.
    fn column_bytes(&self, group: GroupId, component: ComponentTypeId) -> Option<&[u8]>;

    /// Entity ids of a group, row order.
    fn entity_ids(&self, group: GroupId) -> &[EntityId];

    /// Removes one entity. Returns `false` if it did not exist.
    fn remove_entity(&mut self, egid: Egid) -> bool;

    /// Removes every entity of a group and returns their locations.
    fn remove_entities(&mut self, group: GroupId) -> Vec<Egid>;
}

/// One packed component column.
#[derive(Debug)]
struct ByteColumn {
    component: ComponentTypeId,
    item_size: usize,
    data: Vec<u8>,
}

impl ByteColumn {
    fn row(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.item_size)?;
        self.data.get(start..start + self.item_size)
    }

    fn row_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let start = index.checked_mul(self.item_size)?;
        self.data.get_mut(start..start + self.item_size)
    }

    /// Moves the last row into `index` and shrinks by one row.
    fn swap_remove(&mut self, index: usize) {
        let last = self.data.len() / self.item_size - 1;
        if index != last {
            let src = last * self.item_size;
            self.data
                .copy_within(src..src + self.item_size, index * self.item_size);
        }
        self.data.truncate(last * self.item_size);
    }
}

/// Table of one group.
#[derive(Debug)]
pub struct GroupTable {
    shape: ShapeId,
    entity_ids: Vec<EntityId>,
    rows: HashMap<EntityId, usize>,
    columns: Vec<ByteColumn>,
}

impl GroupTable {
    fn new(shape: &Shape) -> Self {
        Self {
            shape: shape.id(),
            entity_ids: Vec::new(),
            rows: HashMap::new(),
            columns: shape
                .components()
                .iter()
                .map(|c| ByteColumn {
                    component: c.component,
                    item_size: c.size,
                    data: Vec::new(),
                })
                .collect(),
        }
    }

    /// Shape of every row.
    #[inline]
    #[must_use]
    pub const fn shape(&self) -> ShapeId {
        self.shape
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entity_ids.len()
    }

    /// Checks if the table holds no rows.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entity_ids.is_empty()
    }

    /// Row of `entity_id`.
    #[inline]
    #[must_use]
    pub fn row_of(&self, entity_id: EntityId) -> Option<usize> {
        self.rows.get(&entity_id).copied()
    }

    fn column(&self, component: ComponentTypeId) -> Option<&ByteColumn> {
        self.columns.iter().find(|c| c.component == component)
    }

    fn column_mut(&mut self, component: ComponentTypeId) -> Option<&mut ByteColumn> {
        self.columns.iter_mut().find(|c| c.component == component)
    }

    fn push_row(&mut self, entity_id: EntityId) -> usize {
        let row = self.entity_ids.len();
        self.entity_ids.push(entity_id);
        self.rows.insert(entity_id, row);
        for column in &mut self.columns {
            column.data.resize(column.data.len() + column.item_size, 0);
        }
        row
    }

    fn remove_row(&mut self, entity_id: EntityId) -> bool {
        let Some(row) = self.rows.remove(&entity_id) else {
            return false;
        };

        self.entity_ids.swap_remove(row);
        for column in &mut self.columns {
            column.swap_remove(row);
        }
        if let Some(&moved) = self.entity_ids.get(row) {
            self.rows.insert(moved, row);
        }
        true
    }
}

/// Default [`EntityStorage`]: one [`GroupTable`] per group.
#[derive(Debug, Default)]
pub struct PackedStorage {
    groups: HashMap<GroupId, GroupTable>,
}

impl PackedStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table of a group.
    #[inline]
    #[must_use]
    pub fn table(&self, group: GroupId) -> Option<&GroupTable> {
        self.groups.get(&group)
    }

    /// Total number of stored entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.groups.values().map(GroupTable::len).sum()
    }
}

impl EntityStorage for PackedStorage {
    fn group_shape(&self, group: GroupId) -> Option<ShapeId> {
        self.groups.get(&group).map(GroupTable::shape)
    }

    fn contains(&self, egid: Egid) -> bool {
        self.groups
            .get(&egid.group)
            .is_some_and(|t| t.rows.contains_key(&egid.entity_id))
    }

    fn allocate_slot(&mut self, egid: Egid, shape: &Shape) -> EcsResult<usize> {
        let table = self
            .groups
            .entry(egid.group)
            .or_insert_with(|| GroupTable::new(shape));

        if table.shape != shape.id() {
            return Err(EcsError::GroupShapeMismatch {
                group: egid.group,
                expected: table.shape,
                found: shape.id(),
            });
        }
        if table.rows.contains_key(&egid.entity_id) {
            return Err(EcsError::DuplicateEntityId(egid));
        }

        Ok(table.push_row(egid.entity_id))
    }

    fn write_component(
        &mut self,
        group: GroupId,
        local_index: usize,
        component: ComponentTypeId,
        payload: &[u8],
    ) -> EcsResult<()> {
        let missing = EcsError::EntityNotFound(Egid::new(EntityId::MAX, group));
        let Some(table) = self.groups.get_mut(&group) else {
            return Err(missing);
        };
        let Some(&entity_id) = table.entity_ids.get(local_index) else {
            return Err(missing);
        };

        match table
            .column_mut(component)
            .and_then(|column| column.row_mut(local_index))
        {
            Some(row) if row.len() == payload.len() => {
                row.copy_from_slice(payload);
                Ok(())
            }
            _ => Err(EcsError::EntityNotFound(Egid::new(entity_id, group))),
        }
    }

    fn component_bytes(&self, egid: Egid, component: ComponentTypeId) -> Option<&[u8]> {
        let table = self.groups.get(&egid.group)?;
        let row = table.row_of(egid.entity_id)?;
        table.column(component)?.row(row)
    }

    fn column_bytes(&self, group: GroupId, component: ComponentTypeId) -> Option<&[u8]> {
        let column = self.groups.get(&group)?.column(component)?;
        Some(&column.data)
    }

    fn entity_ids(&self, group: GroupId) -> &[EntityId] {
        self.groups.get(&group).map_or(&[], |t| &t.entity_ids)
    }

    fn remove_entity(&mut self, egid: Egid) -> bool {
        self.groups
            .get_mut(&egid.group)
            .is_some_and(|t| t.remove_row(egid.entity_id))
    }

    fn remove_entities(&mut self, group: GroupId) -> Vec<Egid> {
        let Some(table) = self.groups.get_mut(&group) else {
            return Vec::new();
        };

        let removed = table
            .entity_ids
            .drain(..)
            .map(|id| Egid::new(id, group))
            .collect();
        table.rows.clear();
        for column in &mut table.columns {
            column.data.clear();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Component, ComponentRegistry};
    use crate::ecs::entity::GroupRegistry;
    use crate::ecs::shape::{ShapeBuilder, ShapeRegistry};
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Health(u32);

    impl Component for Health {}

    fn fixture() -> (ComponentRegistry, ShapeRegistry, ShapeId, ComponentTypeId) {
        let mut components = ComponentRegistry::new();
        let mut shapes = ShapeRegistry::new();
        let shape = shapes
            .register(ShapeBuilder::new("Unit").with::<Health>(), &mut components)
            .unwrap();
        let health = components.id_of::<Health>().unwrap();
        (components, shapes, shape, health)
    }

    #[test]
    fn test_allocate_and_write() {
        let (_, shapes, shape, health) = fixture();
        let group = GroupRegistry::new().new_group();
        let mut storage = PackedStorage::new();

        let row = storage
            .allocate_slot(Egid::new(7, group), shapes.get(shape).unwrap())
            .unwrap();
        assert_eq!(row, 0);
        assert_eq!(storage.component_bytes(Egid::new(7, group), health), Some(&[0u8; 4][..]));

        storage
            .write_component(group, row, health, bytemuck::bytes_of(&Health(90)))
            .unwrap();
        assert_eq!(
            storage.component_bytes(Egid::new(7, group), health),
            Some(bytemuck::bytes_of(&Health(90)))
        );
        assert_eq!(storage.group_shape(group), Some(shape));
    }

    #[test]
    fn test_duplicate_row_rejected() {
        let (_, shapes, shape, _) = fixture();
        let group = GroupRegistry::new().new_group();
        let mut storage = PackedStorage::new();
        let shape = shapes.get(shape).unwrap();

        storage.allocate_slot(Egid::new(1, group), shape).unwrap();
        assert_eq!(
            storage.allocate_slot(Egid::new(1, group), shape).unwrap_err(),
            EcsError::DuplicateEntityId(Egid::new(1, group))
        );
    }

    #[test]
    fn test_swap_remove_keeps_rows_packed() {
        let (_, shapes, shape, health) = fixture();
        let group = GroupRegistry::new().new_group();
        let mut storage = PackedStorage::new();
        let shape = shapes.get(shape).unwrap();

        for id in 0..3u32 {
            let row = storage.allocate_slot(Egid::new(id, group), shape).unwrap();
            storage
                .write_component(group, row, health, bytemuck::bytes_of(&Health(id * 10)))
                .unwrap();
        }

        assert!(storage.remove_entity(Egid::new(0, group)));
        assert!(!storage.remove_entity(Egid::new(0, group)));
        assert_eq!(storage.entity_ids(group), &[2, 1]);
        assert_eq!(
            storage.component_bytes(Egid::new(2, group), health),
            Some(bytemuck::bytes_of(&Health(20)))
        );
        assert_eq!(storage.column_bytes(group, health).unwrap().len(), 8);
    }

    #[test]
    fn test_remove_entities_of_group() {
        let (_, shapes, shape, _) = fixture();
        let group = GroupRegistry::new().new_group();
        let mut storage = PackedStorage::new();
        let shape = shapes.get(shape).unwrap();

        storage.allocate_slot(Egid::new(4, group), shape).unwrap();
        storage.allocate_slot(Egid::new(5, group), shape).unwrap();

        let removed = storage.remove_entities(group);
        assert_eq!(removed, vec![Egid::new(4, group), Egid::new(5, group)]);
        assert!(storage.entity_ids(group).is_empty());
        assert_eq!(storage.entity_count(), 0);
    }
}
