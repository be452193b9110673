//! State of one live index instance.

use std::sync::Arc;

use globset::GlobSet;

use super::dirty::DirtyEntities;
use super::non_incremental::NonIncrementalContributors;
use super::package_cache::PackageDirectoryCache;
use crate::bitset::ConcurrentBitSet;
use crate::config::IndexConfig;
use crate::contributor::ContributorRegistry;
use crate::storage::IndexStorage;
use crate::vfs::{FileId, VirtualFileSystem};

/// Registrations plus the caches derived from them.
///
/// Mutated only under the host write lock. The derived caches use interior
/// mutability because queries fill them under the shared read lock.
#[derive(Debug)]
pub struct WorkspaceFileIndexData {
    pub(crate) storage: IndexStorage,
    pub(crate) contributors: Arc<ContributorRegistry>,
    pub(crate) non_incremental: NonIncrementalContributors,
    pub(crate) dirty: DirtyEntities,
    /// Files known to carry no registration in either store.
    pub(crate) no_registration: ConcurrentBitSet,
    pub(crate) package_cache: PackageDirectoryCache,
    pub(crate) config: Arc<IndexConfig>,
    ignored: GlobSet,
}

impl WorkspaceFileIndexData {
    pub(crate) fn new(
        config: Arc<IndexConfig>,
        ignored: GlobSet,
        contributors: Arc<ContributorRegistry>,
        non_incremental: NonIncrementalContributors,
    ) -> Self {
        Self {
            storage: IndexStorage::new(),
            contributors,
            non_incremental,
            dirty: DirtyEntities::default(),
            no_registration: ConcurrentBitSet::new(),
            package_cache: PackageDirectoryCache::new(),
            config,
            ignored,
        }
    }

    pub fn storage(&self) -> &IndexStorage {
        &self.storage
    }

    /// Drops every cache derived from the registrations.
    ///
    /// Called after any change to the set of registrations or to the shape of
    /// the file tree. Recomputing per file would cost as much as the lookups
    /// the caches save, so invalidation is wholesale.
    pub(crate) fn structure_changed(&self) {
        self.no_registration.clear();
        self.package_cache.clear();
        self.non_incremental.reset_cache();
    }

    /// True if the file's name matches an ignored pattern.
    ///
    /// Archive roots are named after their archive and never ignored.
    pub(crate) fn is_ignored(&self, vfs: &VirtualFileSystem, file: FileId) -> bool {
        if vfs.is_archive_root(file) {
            return false;
        }
        vfs.name(file)
            .is_some_and(|name| !name.is_empty() && self.ignored.is_match(name))
    }
}
