//! Incremental classification of workspace files.
//!
//! This crate answers, for any file of a workspace, which file sets (content
//! roots, source roots, library roots, exclusions) apply to it and which
//! configuration entity contributed them:
//! - Per-file storage of inclusion and exclusion registrations
//! - Incremental re-registration driven by snapshot diffs and file system events
//! - Ancestor-walk queries with exclusion composition and package lookups

pub mod bitset;
pub mod config;
pub mod contributor;
pub mod entity;
pub mod error;
pub mod file_set;
pub mod index;
pub mod kind;
pub mod non_existing;
pub mod package_index;
pub mod registrar;
pub mod storage;
pub mod throttle;
pub mod vfs;

// Re-export main types
pub use config::IndexConfig;
pub use contributor::{
    DependencyDescription, EntityRef, LegacyRootsChangeListener, NonIncrementalContributor,
    WorkspaceFileIndexContributor,
};
pub use entity::{
    EntityChange, EntityId, EntityPointer, EntitySnapshot, EntityType, SnapshotBuilder, SnapshotDiff,
    WorkspaceEntity,
};
pub use error::{Result, WorkspaceIndexError};
pub use file_set::{
    LibraryRootData, ModuleContentRootData, ModuleSourceRootData, NoFileSetData, WorkspaceFileSet,
    WorkspaceFileSetData,
};
pub use index::{
    IndexReader, ThreeState, WorkspaceFileIndex, WorkspaceFileIndexBuilder, WorkspaceFileInternalInfo,
    WorkspaceModel, WriteAction,
};
pub use kind::{EntityStorageKind, KindMask, WorkspaceFileKind};
pub use non_existing::NonExistingFileSetKind;
pub use registrar::WorkspaceFileSetRegistrar;
pub use vfs::{FileId, VfsEvent, VirtualFileSystem, VirtualFileUrl};
