//! The registration surface handed to contributors.

use std::sync::Arc;

use crate::entity::EntityPointer;
use crate::file_set::{ExclusionCondition, WorkspaceFileSetData};
use crate::kind::{KindMask, WorkspaceFileKind};
use crate::vfs::VirtualFileUrl;

/// Receives the file sets of one entity.
///
/// The same contributor code drives both addition and removal: the engine
/// passes a storing registrar when an entity appears and a removing one when
/// it goes away, so a contributor only ever describes what its entity
/// registers.
pub trait WorkspaceFileSetRegistrar {
    /// Registers a recursive file set at `root`.
    fn register_file_set(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    );

    /// Registers a file set classifying `root` only, not its children.
    fn register_non_recursive_file_set(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    );

    /// Excludes `root` and everything below it from the kinds in `excluded_from`.
    fn register_excluded_root(
        &mut self,
        root: &VirtualFileUrl,
        excluded_from: KindMask,
        owner: EntityPointer,
    );

    /// Excludes files below `root` whose name matches one of `patterns`.
    fn register_exclusion_patterns(
        &mut self,
        root: &VirtualFileUrl,
        patterns: &[String],
        owner: EntityPointer,
    );

    /// Excludes files below `root` for which `condition` holds.
    fn register_exclusion_condition(
        &mut self,
        root: &VirtualFileUrl,
        condition: ExclusionCondition,
        owner: EntityPointer,
    );

    /// Registers every archive inside the directory `container` (its direct
    /// children, or its whole subtree if `recursive`) as a file set of `kind`.
    /// Archives added to or removed from the directory later re-register the
    /// owner.
    fn register_archive_container(
        &mut self,
        container: &VirtualFileUrl,
        recursive: bool,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    );
}
