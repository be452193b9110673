//! Immutable, versioned entity snapshots and the diffs between them.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fnv::FnvHashMap;

use super::{EntityId, EntityPointer, EntityType, WorkspaceEntity};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Immutable view of the configuration entities.
///
/// Cloning is cheap relative to the entities themselves: only the maps are
/// copied, entities are shared.
#[derive(Debug, Clone, Default)]
pub struct EntitySnapshot {
    version: u64,
    next_id: u64,
    entities: FnvHashMap<EntityPointer, Arc<dyn WorkspaceEntity>>,
    by_type: FnvHashMap<EntityType, BTreeSet<EntityPointer>>,
    /// Unique per built snapshot and shared by its clones; 0 when never built.
    generation: u64,
    origin: Option<SnapshotOrigin>,
}

/// The snapshot a build started from and the pointers the build touched.
#[derive(Debug, Clone)]
struct SnapshotOrigin {
    generation: u64,
    touched: Arc<BTreeSet<EntityPointer>>,
}

impl EntitySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, pointer: &EntityPointer) -> Option<&Arc<dyn WorkspaceEntity>> {
        self.entities.get(pointer)
    }

    pub fn contains(&self, pointer: &EntityPointer) -> bool {
        self.entities.contains_key(pointer)
    }

    /// Pointers of every entity of `entity_type`, in id order.
    pub fn entities_of_type(&self, entity_type: EntityType) -> impl Iterator<Item = EntityPointer> + '_ {
        self.by_type
            .get(&entity_type)
            .into_iter()
            .flat_map(|pointers| pointers.iter().copied())
    }

    /// Starts the next version of this snapshot.
    pub fn to_builder(&self) -> SnapshotBuilder {
        SnapshotBuilder {
            base_version: self.version,
            next_id: self.next_id,
            entities: self.entities.clone(),
            by_type: self.by_type.clone(),
            parent_generation: self.generation,
            touched: BTreeSet::new(),
        }
    }

    /// Describes how to get from `self` to `after`.
    ///
    /// An entity present in both whose value is a different allocation is
    /// reported as replaced. When `after` was built directly from `self` only
    /// the entities its builder touched are compared; any other pair costs a
    /// pass over both snapshots.
    pub fn diff(&self, after: &EntitySnapshot) -> SnapshotDiff {
        if self.generation == after.generation {
            return SnapshotDiff::default();
        }
        match &after.origin {
            Some(origin) if origin.generation == self.generation => {
                self.diff_pointers(after, origin.touched.iter().copied())
            }
            _ => self.full_diff(after),
        }
    }

    fn full_diff(&self, after: &EntitySnapshot) -> SnapshotDiff {
        let added = after
            .entities
            .keys()
            .filter(|pointer| !self.entities.contains_key(*pointer));
        self.diff_pointers(after, self.entities.keys().chain(added).copied())
    }

    fn diff_pointers(
        &self,
        after: &EntitySnapshot,
        pointers: impl Iterator<Item = EntityPointer>,
    ) -> SnapshotDiff {
        let mut changes: Vec<EntityChange> = pointers
            .filter_map(|pointer| match (self.entities.get(&pointer), after.entities.get(&pointer)) {
                (Some(_), None) => Some(EntityChange::Removed(pointer)),
                (None, Some(_)) => Some(EntityChange::Added(pointer)),
                (Some(old), Some(new)) if !Arc::ptr_eq(old, new) => Some(EntityChange::Replaced(pointer)),
                _ => None,
            })
            .collect();
        changes.sort_unstable_by_key(|change| change.pointer());
        SnapshotDiff { changes }
    }
}

#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    base_version: u64,
    next_id: u64,
    entities: FnvHashMap<EntityPointer, Arc<dyn WorkspaceEntity>>,
    by_type: FnvHashMap<EntityType, BTreeSet<EntityPointer>>,
    parent_generation: u64,
    touched: BTreeSet<EntityPointer>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: impl WorkspaceEntity + 'static) -> EntityPointer {
        self.add_arc(Arc::new(entity))
    }

    pub fn add_arc(&mut self, entity: Arc<dyn WorkspaceEntity>) -> EntityPointer {
        let pointer = EntityPointer::new(entity.entity_type(), EntityId::new(self.next_id));
        self.next_id += 1;
        self.by_type
            .entry(pointer.entity_type())
            .or_default()
            .insert(pointer);
        self.entities.insert(pointer, entity);
        self.touched.insert(pointer);
        pointer
    }

    /// Replaces the value behind `pointer`; returns false if it is unknown or
    /// the new value has a different type.
    pub fn replace(&mut self, pointer: EntityPointer, entity: impl WorkspaceEntity + 'static) -> bool {
        if entity.entity_type() != pointer.entity_type() {
            return false;
        }
        match self.entities.get_mut(&pointer) {
            Some(slot) => {
                *slot = Arc::new(entity);
                self.touched.insert(pointer);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, pointer: EntityPointer) -> Option<Arc<dyn WorkspaceEntity>> {
        let removed = self.entities.remove(&pointer)?;
        self.touched.insert(pointer);
        if let Some(pointers) = self.by_type.get_mut(&pointer.entity_type()) {
            pointers.remove(&pointer);
            if pointers.is_empty() {
                self.by_type.remove(&pointer.entity_type());
            }
        }
        Some(removed)
    }

    pub fn get(&self, pointer: &EntityPointer) -> Option<&Arc<dyn WorkspaceEntity>> {
        self.entities.get(pointer)
    }

    pub fn build(self) -> EntitySnapshot {
        EntitySnapshot {
            version: self.base_version + 1,
            next_id: self.next_id,
            entities: self.entities,
            by_type: self.by_type,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            origin: Some(SnapshotOrigin {
                generation: self.parent_generation,
                touched: Arc::new(self.touched),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityChange {
    Added(EntityPointer),
    Removed(EntityPointer),
    Replaced(EntityPointer),
}

impl EntityChange {
    pub fn pointer(&self) -> EntityPointer {
        match self {
            Self::Added(pointer) | Self::Removed(pointer) | Self::Replaced(pointer) => *pointer,
        }
    }

    /// True if the entity existed before the change.
    pub fn has_old(&self) -> bool {
        matches!(self, Self::Removed(_) | Self::Replaced(_))
    }

    /// True if the entity exists after the change.
    pub fn has_new(&self) -> bool {
        matches!(self, Self::Added(_) | Self::Replaced(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    changes: Vec<EntityChange>,
}

impl SnapshotDiff {
    pub fn changes(&self) -> &[EntityChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn changes_of_type(&self, entity_type: EntityType) -> impl Iterator<Item = &EntityChange> {
        self.changes
            .iter()
            .filter(move |change| change.pointer().entity_type() == entity_type)
    }
}
