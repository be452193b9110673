//! Configuration entities and the snapshots holding them.
//!
//! Entities (modules, content roots, libraries, ...) are owned by an immutable
//! [`EntitySnapshot`]. The index never keeps a strong reference into a
//! snapshot: file sets remember an [`EntityPointer`], a plain `{type, id}` key
//! that is re-resolved against whichever snapshot is current.

mod snapshot;

pub use snapshot::{EntityChange, EntitySnapshot, SnapshotBuilder, SnapshotDiff};

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Stable tag naming an entity type, e.g. `EntityType::new("module")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityType(&'static str);

impl EntityType {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Snapshot-independent key of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityPointer {
    entity_type: EntityType,
    id: EntityId,
}

impl EntityPointer {
    pub const fn new(entity_type: EntityType, id: EntityId) -> Self {
        Self { entity_type, id }
    }

    #[inline]
    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Looks the entity up in `snapshot`; `None` once it has been removed.
    pub fn resolve<'s>(&self, snapshot: &'s EntitySnapshot) -> Option<&'s Arc<dyn WorkspaceEntity>> {
        snapshot.get(self)
    }

    /// Resolves and downcasts in one step.
    pub fn resolve_as<'s, T: WorkspaceEntity + 'static>(&self, snapshot: &'s EntitySnapshot) -> Option<&'s T> {
        let entity: &dyn WorkspaceEntity = &**self.resolve(snapshot)?;
        entity.downcast_ref::<T>()
    }
}

impl fmt::Display for EntityPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id.0)
    }
}

/// Upcast to `Any`, implemented for every sized `'static` type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An entity stored in a snapshot.
pub trait WorkspaceEntity: AsAny + Send + Sync + fmt::Debug {
    fn entity_type(&self) -> EntityType;
}

impl dyn WorkspaceEntity + '_ {
    pub fn downcast_ref<T: WorkspaceEntity + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
