//! Contributors translating entities into file set registrations.
//!
//! Each entity type that affects file classification has one contributor.
//! The set of contributors is fixed when the index is built and frozen into a
//! [`ContributorRegistry`], a lookup table keyed by entity type tags.

use std::fmt;
use std::sync::Arc;

use fnv::FnvHashMap;

use crate::entity::{EntityPointer, EntitySnapshot, EntityType, WorkspaceEntity};
use crate::kind::EntityStorageKind;
use crate::registrar::WorkspaceFileSetRegistrar;

/// An entity resolved from a snapshot, together with its pointer.
#[derive(Debug, Clone, Copy)]
pub struct EntityRef<'a> {
    pub pointer: EntityPointer,
    pub entity: &'a dyn WorkspaceEntity,
}

impl<'a> EntityRef<'a> {
    pub fn resolve(pointer: EntityPointer, snapshot: &'a EntitySnapshot) -> Option<Self> {
        let entity = pointer.resolve(snapshot)?;
        Some(Self {
            pointer,
            entity: &**entity,
        })
    }

    pub fn downcast<T: WorkspaceEntity + 'static>(&self) -> Option<&'a T> {
        self.entity.downcast_ref::<T>()
    }
}

/// Computes the children to re-register when a parent entity changes.
pub type ChildrenAccessor =
    Arc<dyn Fn(EntityRef<'_>, &EntitySnapshot) -> Vec<EntityPointer> + Send + Sync>;

/// Computes the parent to re-register when a child entity changes.
pub type ParentAccessor =
    Arc<dyn Fn(EntityRef<'_>, &EntitySnapshot) -> Option<EntityPointer> + Send + Sync>;

/// A declared dependency of a contributor's registrations on other entities.
#[derive(Clone)]
pub enum DependencyDescription {
    /// When an entity of `parent_type` changes, the entities returned by
    /// `children` (of the contributor's type) are re-registered.
    OnParent {
        parent_type: EntityType,
        children: ChildrenAccessor,
    },
    /// When an entity of `child_type` changes, the entity returned by
    /// `parent` (of the contributor's type) is re-registered.
    OnChild {
        child_type: EntityType,
        parent: ParentAccessor,
    },
}

impl DependencyDescription {
    /// The entity type whose changes trigger this dependency.
    pub fn trigger_type(&self) -> EntityType {
        match self {
            Self::OnParent { parent_type, .. } => *parent_type,
            Self::OnChild { child_type, .. } => *child_type,
        }
    }

    /// Entities to re-register because `changed` changed.
    pub fn affected(&self, changed: EntityRef<'_>, snapshot: &EntitySnapshot) -> Vec<EntityPointer> {
        match self {
            Self::OnParent { children, .. } => children(changed, snapshot),
            Self::OnChild { parent, .. } => parent(changed, snapshot).into_iter().collect(),
        }
    }
}

impl fmt::Debug for DependencyDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnParent { parent_type, .. } => {
                f.debug_struct("OnParent").field("parent_type", parent_type).finish()
            }
            Self::OnChild { child_type, .. } => {
                f.debug_struct("OnChild").field("child_type", child_type).finish()
            }
        }
    }
}

/// Registers the file sets of one entity type.
pub trait WorkspaceFileIndexContributor: Send + Sync {
    fn entity_type(&self) -> EntityType;

    /// The snapshot whose entities this contributor handles.
    fn storage_kind(&self) -> EntityStorageKind {
        EntityStorageKind::Main
    }

    /// Describes every registration of `entity`.
    ///
    /// Must be deterministic for a given entity and snapshot: removal replays
    /// this call against the snapshot the entity was added with.
    fn register_file_sets(
        &self,
        entity: EntityRef<'_>,
        registrar: &mut dyn WorkspaceFileSetRegistrar,
        snapshot: &EntitySnapshot,
    );

    fn dependencies_on_other_entities(&self) -> Vec<DependencyDescription> {
        Vec::new()
    }
}

/// Notified after file system changes touched entities of its type.
///
/// Lets components that track roots themselves, outside of this index,
/// refresh after the index has reconciled.
pub trait LegacyRootsChangeListener: Send + Sync {
    fn entity_type(&self) -> EntityType;

    fn roots_changed(&self, entities: &[EntityPointer]);
}

/// A contributor without per-entity diffs; it re-registers everything at once.
pub trait NonIncrementalContributor: Send + Sync {
    fn name(&self) -> &str;

    /// Registers every file set the contributor currently knows about.
    fn register_file_sets(&self, registrar: &mut dyn WorkspaceFileSetRegistrar, snapshot: &EntitySnapshot);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContributorId(usize);

impl ContributorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A dependency rule owned by a contributor, indexed by its trigger type.
#[derive(Debug, Clone)]
pub struct DependencyRule {
    pub contributor: ContributorId,
    pub dependency: DependencyDescription,
}

/// Contributors and their dependency rules, indexed by entity type.
#[derive(Default)]
pub struct ContributorRegistry {
    contributors: Vec<Arc<dyn WorkspaceFileIndexContributor>>,
    by_entity_type: FnvHashMap<EntityType, Vec<ContributorId>>,
    rules_by_trigger: FnvHashMap<EntityType, Vec<DependencyRule>>,
}

impl ContributorRegistry {
    pub fn new(contributors: Vec<Arc<dyn WorkspaceFileIndexContributor>>) -> Self {
        let mut by_entity_type: FnvHashMap<EntityType, Vec<ContributorId>> = FnvHashMap::default();
        let mut rules_by_trigger: FnvHashMap<EntityType, Vec<DependencyRule>> =
            FnvHashMap::default();

        for (index, contributor) in contributors.iter().enumerate() {
            let id = ContributorId(index);
            by_entity_type
                .entry(contributor.entity_type())
                .or_default()
                .push(id);
            for dependency in contributor.dependencies_on_other_entities() {
                rules_by_trigger
                    .entry(dependency.trigger_type())
                    .or_default()
                    .push(DependencyRule {
                        contributor: id,
                        dependency,
                    });
            }
        }

        Self {
            contributors,
            by_entity_type,
            rules_by_trigger,
        }
    }

    pub fn len(&self) -> usize {
        self.contributors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    pub fn get(&self, id: ContributorId) -> &dyn WorkspaceFileIndexContributor {
        &*self.contributors[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ContributorId> {
        (0..self.contributors.len()).map(ContributorId)
    }

    /// Contributors registering entities of `entity_type`.
    pub fn for_entity_type(&self, entity_type: EntityType) -> &[ContributorId] {
        self.by_entity_type
            .get(&entity_type)
            .map_or(&[][..], Vec::as_slice)
    }

    /// Dependency rules triggered by changes of `entity_type`.
    pub fn rules_triggered_by(&self, entity_type: EntityType) -> &[DependencyRule] {
        self.rules_by_trigger
            .get(&entity_type)
            .map_or(&[][..], Vec::as_slice)
    }
}

impl fmt::Debug for ContributorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let types: Vec<EntityType> = self
            .contributors
            .iter()
            .map(|contributor| contributor.entity_type())
            .collect();
        f.debug_struct("ContributorRegistry")
            .field("contributors", &types)
            .field("rules", &self.rules_by_trigger.len())
            .finish()
    }
}
