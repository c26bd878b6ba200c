//! Integration tests for threaded entity building and submission.

use std::thread;

use bytemuck::{Pod, Zeroable};
use strata_core::{
    Component, EcsError, Egid, EgidComponent, EntityHandle, NeedsEgid, ShapeBuilder, ShapeId,
    SubmitReport, World, WorldConfig,
};

const THREADS: usize = 8;
const PER_THREAD: usize = 1250;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
struct Link {
    target: EntityHandle,
}

impl Component for Link {}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
struct Tracked {
    egid: Egid,
    hits: u32,
}

impl Component for Tracked {}

impl NeedsEgid for Tracked {
    fn set_egid(&mut self, egid: Egid) {
        self.egid = egid;
    }
}

fn linked_world(slots: usize) -> (World, ShapeId) {
    let mut world = World::new(WorldConfig::with_worker_slots(slots)).unwrap();
    let shape = world
        .register_shape(
            ShapeBuilder::new("Linked")
                .with_identity::<EgidComponent>()
                .with::<Link>(),
        )
        .unwrap();
    (world, shape)
}

#[test]
fn test_parallel_build_resolves_every_reference() {
    let (mut world, shape) = linked_world(THREADS);
    let group = world.new_group();

    let factory = world.factory();
    thread::scope(|scope| {
        for slot in 0..THREADS {
            scope.spawn(move || {
                let mut previous = EntityHandle::NULL;
                for n in 0..PER_THREAD {
                    let id = u32::try_from(slot * PER_THREAD + n).unwrap();
                    let mut init = factory.build_entity(shape, Egid::new(id, group), slot).unwrap();
                    init.init(Link { target: previous }).unwrap();
                    previous = init.handle();
                }
            });
        }
    });

    assert_eq!(world.pending_entities(), THREADS * PER_THREAD);
    let report = world.submit().unwrap();
    assert_eq!(report.entities_created, THREADS * PER_THREAD);
    assert_eq!(world.entity_count(group), THREADS * PER_THREAD);

    for &id in world.entity_ids(group) {
        let egid = Egid::new(id, group);
        assert_eq!(world.component::<EgidComponent>(egid).unwrap().egid, egid);

        let link = world.component::<Link>(egid).unwrap();
        if id as usize % PER_THREAD == 0 {
            assert!(link.target.is_null());
            continue;
        }

        let target = world.resolve(link.target).unwrap();
        assert_eq!(target, Egid::new(id - 1, group));
        assert_eq!(world.component::<EgidComponent>(target).unwrap().egid, target);
    }
}

#[test]
fn test_forward_reference_through_reserved_handle() {
    let (mut world, shape) = linked_world(1);
    let group = world.new_group();

    let (a, b) = {
        let factory = world.factory();
        let b = factory.reserve_handle();

        let mut init = factory.build_entity(shape, Egid::new(0, group), 0).unwrap();
        init.init(Link { target: b }).unwrap();
        let a = init.handle();
        drop(init);

        let mut init = factory
            .build_entity_with_handle(shape, Egid::new(1, group), b, 0)
            .unwrap();
        init.init(Link { target: a }).unwrap();
        (a, b)
    };

    world.submit().unwrap();

    let a_egid = world.resolve(a).unwrap();
    let b_egid = world.resolve(b).unwrap();
    assert_eq!(world.resolve(world.component::<Link>(a_egid).unwrap().target), Ok(b_egid));
    assert_eq!(world.resolve(world.component::<Link>(b_egid).unwrap().target), Ok(a_egid));
}

#[test]
fn test_forward_reference_through_held_view() {
    let (mut world, shape) = linked_world(2);
    let group = world.new_group();

    let a = {
        let factory = world.factory();

        let mut first = factory.build_entity(shape, Egid::new(0, group), 0).unwrap();
        let a = first.handle();
        let mut link = first.init(Link::default()).unwrap();

        let second = factory.build_entity(shape, Egid::new(1, group), 1).unwrap();
        link.target = second.handle();
        a
    };

    world.submit().unwrap();

    let target = world.component::<Link>(world.resolve(a).unwrap()).unwrap().target;
    assert_eq!(world.resolve(target), Ok(Egid::new(1, group)));
}

#[test]
fn test_custom_identity_component() {
    let mut world = World::new(WorldConfig::single_threaded()).unwrap();
    let shape = world
        .register_shape(ShapeBuilder::new("Tracked").with_identity::<Tracked>())
        .unwrap();
    let (from, to) = (world.new_group(), world.new_group());

    {
        let factory = world.factory();
        let mut init = factory.build_entity(shape, Egid::new(3, from), 0).unwrap();
        init.init(Tracked { egid: Egid::default(), hits: 9 }).unwrap();
        assert!(matches!(
            factory.build_entity(shape, Egid::new(4, from), 0),
            Err(EcsError::QueueInUse(0))
        ));
    }
    world.submit().unwrap();

    let tracked = world.component::<Tracked>(Egid::new(3, from)).unwrap();
    assert_eq!(tracked, Tracked { egid: Egid::new(3, from), hits: 9 });

    let moved = world.swap_entity_group(Egid::new(3, from), to).unwrap();
    assert_eq!(world.component::<Tracked>(moved).unwrap().egid, moved);
}

#[test]
fn test_duplicate_against_storage_aborts_whole_batch() {
    let (mut world, shape) = linked_world(2);
    let group = world.new_group();

    world.factory().build_entity(shape, Egid::new(0, group), 0).unwrap();
    world.submit().unwrap();

    let (fresh, clash) = {
        let factory = world.factory();
        let fresh = factory.build_entity(shape, Egid::new(1, group), 0).unwrap().handle();
        let clash = factory.build_entity(shape, Egid::new(0, group), 1).unwrap().handle();
        (fresh, clash)
    };

    assert_eq!(
        world.submit(),
        Err(EcsError::DuplicateEntityId(Egid::new(0, group)))
    );
    assert_eq!(world.entity_count(group), 1);
    assert_eq!(world.try_resolve(fresh), None);
    assert_eq!(world.try_resolve(clash), None);
    assert_eq!(world.pending_entities(), 0);
    assert_eq!(world.submissions(), 1);

    // The world keeps working after an aborted batch.
    let retry = world.factory().build_entity(shape, Egid::new(1, group), 0).unwrap().handle();
    world.submit().unwrap();
    assert_eq!(world.resolve(retry), Ok(Egid::new(1, group)));
}

#[test]
fn test_empty_submission() {
    let (mut world, _) = linked_world(1);
    assert_eq!(world.submit(), Ok(SubmitReport::default()));
    assert_eq!(world.submissions(), 1);
}

#[test]
fn test_reuse_after_remove_group() {
    let (mut world, shape) = linked_world(1);
    let group = world.new_group();

    let old: Vec<EntityHandle> = {
        let factory = world.factory();
        (0..10)
            .map(|id| factory.build_entity(shape, Egid::new(id, group), 0).unwrap().handle())
            .collect()
    };
    world.submit().unwrap();
    world.remove_group(group);

    let new: Vec<EntityHandle> = {
        let factory = world.factory();
        (0..10)
            .map(|id| factory.build_entity(shape, Egid::new(id, group), 0).unwrap().handle())
            .collect()
    };
    world.submit().unwrap();

    for handle in &old {
        assert_eq!(world.try_resolve(*handle), None);
    }
    for (id, handle) in new.iter().enumerate() {
        assert_eq!(world.resolve(*handle), Ok(Egid::new(u32::try_from(id).unwrap(), group)));
    }
    assert_eq!(world.directory().live_count(), 10);
}

#[test]
fn test_remove_entity_between_build_and_submit() {
    let (mut world, shape) = linked_world(1);
    let group = world.new_group();

    let first = world.factory().build_entity(shape, Egid::new(1, group), 0).unwrap().handle();
    world.submit().unwrap();

    let second = {
        let factory = world.factory();
        let mut init = factory.build_entity(shape, Egid::new(2, group), 0).unwrap();
        init.init(Link { target: first }).unwrap();
        init.handle()
    };
    world.remove_entity(Egid::new(1, group)).unwrap();
    world.submit().unwrap();

    assert_eq!(world.try_resolve(first), None);
    assert_eq!(world.resolve(second), Ok(Egid::new(2, group)));
    assert_eq!(world.component::<Link>(Egid::new(2, group)).unwrap().target, first);

    // The removed slot is recycled only after the pending claim went through.
    let third = world.factory().build_entity(shape, Egid::new(3, group), 0).unwrap().handle();
    assert_eq!(third.index(), first.index());
    world.submit().unwrap();
    assert_eq!(world.resolve(third), Ok(Egid::new(3, group)));
    assert_eq!(world.resolve(second), Ok(Egid::new(2, group)));
    assert_eq!(world.directory().live_count(), 2);
}

#[test]
fn test_remove_group_between_build_and_submit() {
    let (mut world, shape) = linked_world(2);
    let (emptied, filled) = (world.new_group(), world.new_group());

    let old: Vec<EntityHandle> = {
        let factory = world.factory();
        (0..4)
            .map(|id| factory.build_entity(shape, Egid::new(id, emptied), 0).unwrap().handle())
            .collect()
    };
    world.submit().unwrap();

    let new: Vec<EntityHandle> = {
        let factory = world.factory();
        (0..3)
            .map(|id| factory.build_entity(shape, Egid::new(id, filled), 1).unwrap().handle())
            .collect()
    };
    assert_eq!(world.remove_group(emptied), 4);
    world.submit().unwrap();

    for handle in &old {
        assert_eq!(world.try_resolve(*handle), None);
    }
    for (id, handle) in new.iter().enumerate() {
        assert_eq!(world.resolve(*handle), Ok(Egid::new(u32::try_from(id).unwrap(), filled)));
    }
    assert_eq!(world.directory().live_count(), 3);

    let refill: Vec<EntityHandle> = {
        let factory = world.factory();
        (0..4)
            .map(|id| factory.build_entity(shape, Egid::new(id, emptied), 0).unwrap().handle())
            .collect()
    };
    world.submit().unwrap();

    for (id, handle) in refill.iter().enumerate() {
        assert_eq!(world.resolve(*handle), Ok(Egid::new(u32::try_from(id).unwrap(), emptied)));
    }
    assert_eq!(world.directory().live_count(), 7);
}

#[test]
fn test_swap_group_between_build_and_submit() {
    let (mut world, shape) = linked_world(1);
    let (from, to) = (world.new_group(), world.new_group());

    let moved = world.factory().build_entity(shape, Egid::new(1, from), 0).unwrap().handle();
    world.submit().unwrap();

    // Egid (1, from) is still occupied while the build is queued; the swap
    // frees it before the batch is validated.
    let (replacement, sibling) = {
        let factory = world.factory();
        let replacement = factory.build_entity(shape, Egid::new(1, from), 0).unwrap().handle();
        let sibling = factory.build_entity(shape, Egid::new(2, from), 0).unwrap().handle();
        (replacement, sibling)
    };
    assert_eq!(world.swap_entity_group(Egid::new(1, from), to), Ok(Egid::new(1, to)));
    world.submit().unwrap();

    assert_eq!(world.resolve(moved), Ok(Egid::new(1, to)));
    assert_eq!(world.resolve(replacement), Ok(Egid::new(1, from)));
    assert_eq!(world.resolve(sibling), Ok(Egid::new(2, from)));
    assert_eq!(world.component::<EgidComponent>(Egid::new(1, to)).unwrap().egid, Egid::new(1, to));
    assert_eq!(world.entity_count(from), 2);
    assert_eq!(world.entity_count(to), 1);
}
