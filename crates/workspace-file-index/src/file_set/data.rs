//! Per-kind metadata attached to file sets.

use std::fmt;

use crate::entity::{AsAny, EntityPointer};

/// Opaque metadata a contributor attaches to a file set.
///
/// Queries downcast it (see `find_file_set_with_custom_data`) to tell sets of
/// the same kind apart; sets whose data carries a package prefix feed package
/// name computation.
pub trait WorkspaceFileSetData: AsAny + Send + Sync + fmt::Debug {
    /// Package of the file set root, if the set is a package root.
    fn package_prefix(&self) -> Option<&str> {
        None
    }

    /// Module the set's files belong to, when it differs from the owner.
    fn module(&self) -> Option<EntityPointer> {
        None
    }
}

impl dyn WorkspaceFileSetData + '_ {
    pub fn downcast_ref<T: WorkspaceFileSetData + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: WorkspaceFileSetData + 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Content root of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleContentRootData {
    pub module: EntityPointer,
}

impl WorkspaceFileSetData for ModuleContentRootData {
    fn module(&self) -> Option<EntityPointer> {
        Some(self.module)
    }
}

/// Source or resource root inside a module's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSourceRootData {
    pub module: EntityPointer,
    pub package_prefix: String,
    pub root_type: String,
}

impl WorkspaceFileSetData for ModuleSourceRootData {
    fn package_prefix(&self) -> Option<&str> {
        Some(&self.package_prefix)
    }

    fn module(&self) -> Option<EntityPointer> {
        Some(self.module)
    }
}

/// Class or source root of a library or SDK; always a package root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryRootData;

impl WorkspaceFileSetData for LibraryRootData {
    fn package_prefix(&self) -> Option<&str> {
        Some("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoFileSetData;

impl WorkspaceFileSetData for NoFileSetData {}
