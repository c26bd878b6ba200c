//! Integration tests for persistent entity filters.

use std::sync::Arc;
use std::thread;

use bytemuck::{Pod, Zeroable};
use strata_core::{Component, EcsError, Egid, ShapeBuilder, ShapeId, World, WorldConfig};

const FILTER_ID: u32 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Marker(u32);

impl Component for Marker {}

fn world() -> (World, ShapeId) {
    let mut world = World::new(WorldConfig::with_worker_slots(2)).unwrap();
    let shape = world
        .register_shape(ShapeBuilder::new("Marked").with::<Marker>())
        .unwrap();
    (world, shape)
}

#[test]
fn test_filter_created_inside_worker_is_visible() {
    let (mut world, shape) = world();
    let group = world.new_group();
    let context = world.filters().new_context_id();

    let factory = world.factory();
    let filters = world.filters();
    thread::scope(|scope| {
        scope.spawn(move || {
            let filter = filters.get_or_create(context, FILTER_ID);
            for id in 0..10 {
                let egid = Egid::new(id, group);
                factory.build_entity(shape, egid, 1).unwrap();
                filter.add(egid, id);
            }
        });
    });

    world.submit().unwrap();

    let filter = world.filters().get_existing(context, FILTER_ID).unwrap();
    assert_eq!(filter.count(group), 10);
    for (position, &(entity_id, dense)) in filter.group_filter(group).entries().iter().enumerate() {
        assert_eq!(entity_id as usize, position);
        assert_eq!(dense, entity_id);
        assert!(world.contains(Egid::new(entity_id, group)));
    }
}

#[test]
fn test_existing_filter_modified_from_workers() {
    let (world, _) = world();
    let group = world.new_group();
    let context = world.filters().new_context_id();
    let filter = world.filters().get_or_create(context, FILTER_ID);

    thread::scope(|scope| {
        for worker in 0..4u32 {
            let filter = Arc::clone(&filter);
            scope.spawn(move || {
                for n in 0..25 {
                    filter.add(Egid::new(worker * 25 + n, group), n);
                }
            });
        }
    });

    assert_eq!(filter.count(group), 100);
    let again = world.filters().get_or_create(context, FILTER_ID);
    assert!(Arc::ptr_eq(&filter, &again));
}

#[test]
fn test_re_adding_is_idempotent() {
    let (world, _) = world();
    let group = world.new_group();
    let context = world.filters().new_context_id();
    let filter = world.filters().get_or_create(context, FILTER_ID);

    for id in 0..10 {
        filter.add(Egid::new(id, group), 0);
    }
    for id in 0..10 {
        assert!(!filter.add(Egid::new(id, group), 1));
    }

    assert_eq!(filter.count(group), 10);
    assert_eq!(filter.group_filter(group).dense_value(0), Some(1));
}

#[test]
fn test_unknown_filter() {
    let (world, _) = world();
    let context = world.filters().new_context_id();

    assert!(matches!(
        world.filters().get_existing(context, 99),
        Err(EcsError::FilterNotFound(key)) if key.filter == 99 && key.context == context
    ));
}

#[test]
fn test_membership_survives_entity_removal() {
    let (mut world, shape) = world();
    let group = world.new_group();
    let context = world.filters().new_context_id();
    let egid = Egid::new(5, group);

    world.factory().build_entity(shape, egid, 0).unwrap();
    world.filters().get_or_create(context, FILTER_ID).add(egid, 0);
    world.submit().unwrap();

    world.remove_entity(egid).unwrap();

    let filter = world.filters().get_existing(context, FILTER_ID).unwrap();
    assert!(filter.contains(egid));
    assert!(!world.contains(egid));
    assert!(filter.remove(egid));
    assert_eq!(filter.count(group), 0);
}
