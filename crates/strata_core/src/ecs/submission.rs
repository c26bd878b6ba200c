//! # Submission Engine
//!
//! Applies everything producers queued since the last submission.
//!
//! ```text
//! 1. sync_claims      materialize handles claimed during the build phase
//! 2. decode           queue 0, 1, ..., N  ->  plan
//! 3. validate         whole plan against storage + directory
//!        │ any error ─► log all, apply nothing, retire claims, clear queues
//!        ▼
//! 4. apply            allocate row, write components, inject identity, publish
//! 5. retire           reservations nobody built
//! 6. clear queues     capacity kept for the next cycle
//! ```
//!
//! Runs under `&mut World`, so no producer can be appending concurrently.

use std::collections::{HashMap, HashSet};

use super::component::{ComponentInfo, ComponentRegistry, ComponentTypeId};
use super::directory::EntityDirectory;
use super::entity::{Egid, EntityHandle, GroupId};
use super::shape::{Shape, ShapeId, ShapeRegistry};
use super::storage::EntityStorage;
use crate::error::{EcsError, EcsResult};
use crate::memory::CommandReader;
use crate::sync::{BuildQueue, BuildQueues, CreateRecord, InitRecord};

/// Outcome of a successful submission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmitReport {
    /// Entities placed in storage.
    pub entities_created: usize,
    /// Component values copied from the queues.
    pub components_written: usize,
    /// Reserved handles retired because nothing was built under them.
    pub reservations_retired: usize,
}

/// One queued component value.
#[derive(Debug)]
struct PendingInit<'q> {
    component: ComponentTypeId,
    payload: &'q [u8],
}

/// One queued entity with its initializations.
#[derive(Debug)]
struct PendingEntity<'q> {
    thread_index: usize,
    handle: EntityHandle,
    egid: Egid,
    shape: ShapeId,
    inits: Vec<PendingInit<'q>>,
}

impl PendingEntity<'_> {
    /// Last value queued for `component`.
    fn payload_of(&self, component: ComponentTypeId) -> Option<&[u8]> {
        self.inits
            .iter()
            .rev()
            .find(|init| init.component == component)
            .map(|init| init.payload)
    }
}

/// Borrowed parts of a world needed for one submission.
pub(crate) struct Submission<'a, S: EntityStorage> {
    pub queues: &'a mut BuildQueues,
    pub directory: &'a mut EntityDirectory,
    pub components: &'a ComponentRegistry,
    pub shapes: &'a ShapeRegistry,
    pub storage: &'a mut S,
}

impl<S: EntityStorage> Submission<'_, S> {
    /// Runs one full submission.
    ///
    /// # Errors
    ///
    /// The first validation error of an aborted batch, or a storage failure
    /// while applying.
    pub(crate) fn run(self) -> EcsResult<SubmitReport> {
        let Self {
            queues,
            directory,
            components,
            shapes,
            storage,
        } = self;

        let claimed = directory.sync_claims();

        let outcome = {
            let queued: Vec<&BuildQueue> = queues.iter_mut().map(|queue| &*queue).collect();
            let (plan, mut diagnostics) = decode(&queued);
            diagnostics.extend(validate(&plan, directory, components, shapes, &*storage));

            if diagnostics.is_empty() {
                apply(&plan, directory, components, shapes, storage)
            } else {
                for diagnostic in &diagnostics {
                    tracing::error!("submission aborted: {}", diagnostic);
                }
                Err(diagnostics.swap_remove(0))
            }
        };

        let retired = directory.release_pending(&claimed);
        queues.reset_all();

        match outcome {
            Ok(mut report) => {
                report.reservations_retired = retired;
                if retired > 0 {
                    tracing::warn!("{} reserved handles were never built and have been retired", retired);
                }
                tracing::debug!(
                    "submission applied: {} entities, {} components",
                    report.entities_created,
                    report.components_written
                );
                Ok(report)
            }
            Err(error) => {
                tracing::debug!("submission failed, {} claimed handles retired", retired);
                Err(error)
            }
        }
    }
}

/// Decodes every queue in slot order. Undecodable queues yield a
/// [`EcsError::CorruptQueue`] diagnostic and contribute no entities.
fn decode<'q>(queues: &[&'q BuildQueue]) -> (Vec<PendingEntity<'q>>, Vec<EcsError>) {
    let mut plan = Vec::new();
    let mut diagnostics = Vec::new();

    for (thread_index, &queue) in queues.iter().enumerate() {
        match decode_queue(thread_index, queue.as_bytes()) {
            Some(mut entities) => plan.append(&mut entities),
            None => diagnostics.push(EcsError::CorruptQueue { thread_index }),
        }
    }

    (plan, diagnostics)
}

fn decode_queue(thread_index: usize, bytes: &[u8]) -> Option<Vec<PendingEntity<'_>>> {
    let mut reader = CommandReader::new(bytes);
    let mut entities = Vec::new();

    while !reader.is_exhausted() {
        let create: CreateRecord = reader.next_record()?;
        let mut inits = Vec::with_capacity(create.init_count as usize);

        for _ in 0..create.init_count {
            let init: InitRecord = reader.next_record()?;
            let payload = reader.take(init.size as usize)?;
            inits.push(PendingInit {
                component: ComponentTypeId::from_raw(init.component),
                payload,
            });
        }

        entities.push(PendingEntity {
            thread_index,
            handle: create.handle(),
            egid: create.egid,
            shape: create.shape(),
            inits,
        });
    }

    Some(entities)
}

/// Collects every reason the plan cannot be applied.
fn validate<S: EntityStorage>(
    plan: &[PendingEntity<'_>],
    directory: &EntityDirectory,
    components: &ComponentRegistry,
    shapes: &ShapeRegistry,
    storage: &S,
) -> Vec<EcsError> {
    let mut diagnostics = Vec::new();
    let mut placed: HashSet<Egid> = HashSet::with_capacity(plan.len());
    let mut used: HashSet<EntityHandle> = HashSet::with_capacity(plan.len());
    let mut bound: HashMap<GroupId, ShapeId> = HashMap::new();

    for entity in plan {
        let egid = entity.egid;

        let Some(shape) = shapes.get(entity.shape) else {
            diagnostics.push(EcsError::UnknownShape(entity.shape));
            continue;
        };

        for init in &entity.inits {
            if shape.size_of(init.component) != Some(init.payload.len()) {
                diagnostics.push(EcsError::ShapeMismatch {
                    egid,
                    shape: shape.id(),
                    component: components.name_of(init.component),
                });
            }
        }

        let expected = storage
            .group_shape(egid.group)
            .unwrap_or_else(|| *bound.entry(egid.group).or_insert(shape.id()));
        if expected != shape.id() {
            diagnostics.push(EcsError::GroupShapeMismatch {
                group: egid.group,
                expected,
                found: shape.id(),
            });
        }

        if storage.contains(egid) || !placed.insert(egid) {
            diagnostics.push(EcsError::DuplicateEntityId(egid));
        }

        if !used.insert(entity.handle) {
            diagnostics.push(EcsError::HandleReused(entity.handle));
        } else if !directory.is_pending(entity.handle) {
            diagnostics.push(EcsError::StaleHandle(entity.handle));
        }

        tracing::trace!("validated {} from queue {}", egid, entity.thread_index);
    }

    diagnostics
}

/// Places every planned entity. Only called on a validated plan.
fn apply<S: EntityStorage>(
    plan: &[PendingEntity<'_>],
    directory: &mut EntityDirectory,
    components: &ComponentRegistry,
    shapes: &ShapeRegistry,
    storage: &mut S,
) -> EcsResult<SubmitReport> {
    let mut report = SubmitReport::default();
    let mut scratch: Vec<u8> = Vec::new();

    for entity in plan {
        let shape = shapes.require(entity.shape)?;
        let local = storage.allocate_slot(entity.egid, shape)?;

        report.components_written +=
            write_row(entity, shape, local, components, storage, &mut scratch)?;

        directory.publish(entity.handle, entity.egid);
        report.entities_created += 1;
    }

    Ok(report)
}

/// Writes all components of one freshly allocated row. Components nobody
/// initialized stay zeroed unless they carry the entity's identity.
fn write_row<S: EntityStorage>(
    entity: &PendingEntity<'_>,
    shape: &Shape,
    local: usize,
    components: &ComponentRegistry,
    storage: &mut S,
    scratch: &mut Vec<u8>,
) -> EcsResult<usize> {
    let mut written = 0;

    for slot in shape.components() {
        let payload = entity.payload_of(slot.component);
        let identity = components
            .info(slot.component)
            .and_then(ComponentInfo::identity_writer);

        match (payload, identity) {
            (payload, Some(write_identity)) => {
                scratch.clear();
                match payload {
                    Some(bytes) => scratch.extend_from_slice(bytes),
                    None => scratch.resize(slot.size, 0),
                }
                write_identity(scratch.as_mut_slice(), entity.egid);
                storage.write_component(entity.egid.group, local, slot.component, scratch.as_slice())?;
            }
            (Some(bytes), None) => {
                storage.write_component(entity.egid.group, local, slot.component, bytes)?;
            }
            (None, None) => continue,
        }

        if payload.is_some() {
            written += 1;
        }
    }

    Ok(written)
}
