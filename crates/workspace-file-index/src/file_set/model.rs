//! Inclusion and exclusion registrations stored per root file.

use std::fmt;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};

use super::data::WorkspaceFileSetData;
use crate::entity::EntityPointer;
use crate::error::{Result, WorkspaceIndexError};
use crate::kind::{EntityStorageKind, KindMask, WorkspaceFileKind};
use crate::vfs::{FileId, VirtualFileRef, VirtualFileSystem};

/// Predicate deciding whether a file under an exclusion root is excluded.
pub type ExclusionCondition = Arc<dyn Fn(VirtualFileRef<'_>) -> bool + Send + Sync>;

/// Kinds vetoed by pattern and condition exclusions.
pub const PATTERN_EXCLUDED_MASK: KindMask =
    KindMask::CONTENT.union(KindMask::CONTENT_NON_INDEXABLE);

/// A (root, kind, owner) registration classifying the files under `root`.
#[derive(Debug)]
pub struct WorkspaceFileSet {
    root: FileId,
    kind: WorkspaceFileKind,
    recursive: bool,
    owner: EntityPointer,
    storage_kind: EntityStorageKind,
    data: Arc<dyn WorkspaceFileSetData>,
}

impl WorkspaceFileSet {
    pub fn new(
        root: FileId,
        kind: WorkspaceFileKind,
        recursive: bool,
        owner: EntityPointer,
        storage_kind: EntityStorageKind,
        data: Arc<dyn WorkspaceFileSetData>,
    ) -> Self {
        Self {
            root,
            kind,
            recursive,
            owner,
            storage_kind,
            data,
        }
    }

    #[inline]
    pub fn root(&self) -> FileId {
        self.root
    }

    #[inline]
    pub fn kind(&self) -> WorkspaceFileKind {
        self.kind
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn owner(&self) -> EntityPointer {
        self.owner
    }

    pub fn storage_kind(&self) -> EntityStorageKind {
        self.storage_kind
    }

    pub fn data(&self) -> &dyn WorkspaceFileSetData {
        &*self.data
    }

    pub fn data_as<D: WorkspaceFileSetData + 'static>(&self) -> Option<&D> {
        self.data().downcast_ref::<D>()
    }

    /// True if this set classifies `queried` when stored at `current`.
    #[inline]
    pub(crate) fn applies_to(&self, current: FileId, queried: FileId) -> bool {
        self.recursive || current == queried
    }
}

/// Compiled file name globs of a pattern exclusion.
#[derive(Clone)]
pub struct ExclusionPatterns {
    patterns: Vec<String>,
    matcher: GlobSet,
}

impl ExclusionPatterns {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| WorkspaceIndexError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let matcher = builder
            .build()
            .map_err(|source| WorkspaceIndexError::InvalidPattern {
                pattern: patterns.join(";"),
                source,
            })?;
        Ok(Self {
            patterns: patterns.to_vec(),
            matcher,
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn matches(&self, name: &str) -> bool {
        self.matcher.is_match(name)
    }
}

impl fmt::Debug for ExclusionPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExclusionPatterns")
            .field(&self.patterns)
            .finish()
    }
}

#[derive(Clone)]
pub enum ExclusionScope {
    /// The root and everything below it.
    WholeRoot,
    /// Files below the root whose own name or an ancestor's name (up to the
    /// root) matches one of the globs.
    Patterns(ExclusionPatterns),
    /// Files for which the condition holds on themselves or any ancestor up to
    /// and including the root.
    Condition(ExclusionCondition),
}

impl fmt::Debug for ExclusionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WholeRoot => f.write_str("WholeRoot"),
            Self::Patterns(patterns) => f.debug_tuple("Patterns").field(patterns).finish(),
            Self::Condition(_) => f.write_str("Condition(..)"),
        }
    }
}

/// A registration vetoing some kinds under its root. It never grants kinds.
#[derive(Debug)]
pub struct ExcludedFileSet {
    root: FileId,
    owner: EntityPointer,
    storage_kind: EntityStorageKind,
    excluded_mask: KindMask,
    scope: ExclusionScope,
}

impl ExcludedFileSet {
    pub fn whole_root(
        root: FileId,
        excluded_mask: KindMask,
        owner: EntityPointer,
        storage_kind: EntityStorageKind,
    ) -> Self {
        Self {
            root,
            owner,
            storage_kind,
            excluded_mask,
            scope: ExclusionScope::WholeRoot,
        }
    }

    pub fn by_patterns(
        root: FileId,
        patterns: ExclusionPatterns,
        owner: EntityPointer,
        storage_kind: EntityStorageKind,
    ) -> Self {
        Self {
            root,
            owner,
            storage_kind,
            excluded_mask: PATTERN_EXCLUDED_MASK,
            scope: ExclusionScope::Patterns(patterns),
        }
    }

    pub fn by_condition(
        root: FileId,
        condition: ExclusionCondition,
        owner: EntityPointer,
        storage_kind: EntityStorageKind,
    ) -> Self {
        Self {
            root,
            owner,
            storage_kind,
            excluded_mask: PATTERN_EXCLUDED_MASK,
            scope: ExclusionScope::Condition(condition),
        }
    }

    pub fn root(&self) -> FileId {
        self.root
    }

    pub fn owner(&self) -> EntityPointer {
        self.owner
    }

    pub fn storage_kind(&self) -> EntityStorageKind {
        self.storage_kind
    }

    pub fn excluded_mask(&self) -> KindMask {
        self.excluded_mask
    }

    pub fn scope(&self) -> &ExclusionScope {
        &self.scope
    }

    /// Returns true if this exclusion applies to `queried`, a file at or below
    /// the exclusion root.
    pub fn is_excluded(&self, vfs: &VirtualFileSystem, queried: FileId) -> bool {
        match &self.scope {
            ExclusionScope::WholeRoot => true,
            ExclusionScope::Patterns(patterns) => {
                self.any_on_path(vfs, queried, false, |file| {
                    patterns.matches(file.name())
                })
            }
            ExclusionScope::Condition(condition) => {
                self.any_on_path(vfs, queried, true, |file| condition(file))
            }
        }
    }

    /// Tests files from `queried` up to the root, never walking further than
    /// the depth difference between the two.
    fn any_on_path(
        &self,
        vfs: &VirtualFileSystem,
        queried: FileId,
        include_root: bool,
        mut test: impl FnMut(VirtualFileRef<'_>) -> bool,
    ) -> bool {
        let root_depth = vfs.depth(self.root);
        let mut remaining = vfs.depth(queried).saturating_sub(root_depth);
        let mut current = Some(queried);
        while let Some(file) = current {
            if file == self.root {
                return include_root && test(vfs.file(file));
            }
            if remaining == 0 {
                return false;
            }
            if test(vfs.file(file)) {
                return true;
            }
            remaining -= 1;
            current = vfs.parent(file);
        }
        false
    }
}

/// One entry of a root's stored collection.
#[derive(Debug, Clone)]
pub enum StoredFileSet {
    Included(Arc<WorkspaceFileSet>),
    Excluded(Arc<ExcludedFileSet>),
}

impl StoredFileSet {
    pub fn owner(&self) -> EntityPointer {
        match self {
            Self::Included(set) => set.owner(),
            Self::Excluded(set) => set.owner(),
        }
    }

    pub fn storage_kind(&self) -> EntityStorageKind {
        match self {
            Self::Included(set) => set.storage_kind(),
            Self::Excluded(set) => set.storage_kind(),
        }
    }

    pub fn root(&self) -> FileId {
        match self {
            Self::Included(set) => set.root(),
            Self::Excluded(set) => set.root(),
        }
    }

    #[inline]
    pub fn is_excluded(&self) -> bool {
        matches!(self, Self::Excluded(_))
    }

    pub fn as_included(&self) -> Option<&Arc<WorkspaceFileSet>> {
        match self {
            Self::Included(set) => Some(set),
            Self::Excluded(_) => None,
        }
    }

    /// True if both entries are the same allocation.
    pub fn ptr_eq(&self, other: &StoredFileSet) -> bool {
        match (self, other) {
            (Self::Included(a), Self::Included(b)) => Arc::ptr_eq(a, b),
            (Self::Excluded(a), Self::Excluded(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
