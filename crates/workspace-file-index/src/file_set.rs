//! File sets and their per-file storage.
//!
//! ## Module Structure
//!
//! - `data` - metadata attached to file sets (package prefixes, module attribution)
//! - `model` - `WorkspaceFileSet`, `ExcludedFileSet` and the stored entry enum
//! - `collection` - size-specialized per-file collection and mask computation
//! - `store` - `FileId` keyed map of collections

mod collection;
mod data;
mod model;
mod store;

pub use collection::{FileSetMasks, Iter, StoredFileSetCollection};
pub use data::{
    LibraryRootData, ModuleContentRootData, ModuleSourceRootData, NoFileSetData,
    WorkspaceFileSetData,
};
pub use model::{
    ExcludedFileSet, ExclusionCondition, ExclusionPatterns, ExclusionScope, StoredFileSet,
    WorkspaceFileSet, PATTERN_EXCLUDED_MASK,
};
pub use store::FileSetStore;
