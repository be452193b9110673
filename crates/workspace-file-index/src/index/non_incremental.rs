//! File sets from contributors that cannot report per-entity changes.
//!
//! Their registrations live in a separate store that is rebuilt in full on
//! first use after any structural change, instead of being patched
//! incrementally like the main store.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;

use crate::contributor::NonIncrementalContributor;
use crate::entity::{EntityPointer, EntitySnapshot};
use crate::file_set::{
    ExcludedFileSet, ExclusionCondition, ExclusionPatterns, FileSetStore, StoredFileSet,
    WorkspaceFileSet, WorkspaceFileSetData,
};
use crate::kind::{EntityStorageKind, KindMask, WorkspaceFileKind};
use crate::package_index::PackagePrefixIndex;
use crate::registrar::WorkspaceFileSetRegistrar;
use crate::vfs::{VirtualFileSystem, VirtualFileUrl};

/// One computed generation of non-incremental registrations.
#[derive(Debug, Default)]
pub struct NonIncrementalData {
    pub file_sets: FileSetStore,
    pub package_prefixes: PackagePrefixIndex,
}

pub struct NonIncrementalContributors {
    contributors: Vec<Arc<dyn NonIncrementalContributor>>,
    compute_lock: Mutex<()>,
    data: ArcSwapOption<NonIncrementalData>,
}

impl NonIncrementalContributors {
    pub fn new(contributors: Vec<Arc<dyn NonIncrementalContributor>>) -> Self {
        Self {
            contributors,
            compute_lock: Mutex::new(()),
            data: ArcSwapOption::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contributors.is_empty()
    }

    /// Returns the current generation, computing it if the cache was reset.
    ///
    /// Readers racing on a reset cache compute it once: the first takes the
    /// lock and publishes, the rest find the published value after waiting.
    pub fn get(&self, vfs: &VirtualFileSystem, snapshot: &EntitySnapshot) -> Arc<NonIncrementalData> {
        if let Some(data) = self.data.load_full() {
            return data;
        }
        let _guard = self.compute_lock.lock();
        if let Some(data) = self.data.load_full() {
            return data;
        }
        let data = Arc::new(self.compute(vfs, snapshot));
        self.data.store(Some(Arc::clone(&data)));
        data
    }

    /// Drops the computed generation; the next [`get`](Self::get) recomputes.
    pub fn reset_cache(&self) {
        self.data.store(None);
    }

    fn compute(&self, vfs: &VirtualFileSystem, snapshot: &EntitySnapshot) -> NonIncrementalData {
        let mut registrar = CollectingRegistrar {
            data: NonIncrementalData::default(),
            vfs,
        };
        for contributor in &self.contributors {
            contributor.register_file_sets(&mut registrar, snapshot);
        }
        log::debug!(
            "Computed non-incremental file sets of {} contributors: {} roots",
            self.contributors.len(),
            registrar.data.file_sets.len()
        );
        registrar.data
    }
}

impl fmt::Debug for NonIncrementalContributors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.contributors.iter().map(|c| c.name()).collect();
        f.debug_struct("NonIncrementalContributors")
            .field("contributors", &names)
            .field("computed", &self.data.load().is_some())
            .finish()
    }
}

/// Records registrations into a fresh store, skipping roots that do not exist.
struct CollectingRegistrar<'a> {
    data: NonIncrementalData,
    vfs: &'a VirtualFileSystem,
}

impl CollectingRegistrar<'_> {
    fn include(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
        recursive: bool,
    ) {
        let Some(file) = self.vfs.find_file_by_url(root) else {
            log::trace!("Skipping missing root {root} of {owner}");
            return;
        };
        let set = Arc::new(WorkspaceFileSet::new(
            file,
            kind,
            recursive,
            owner,
            EntityStorageKind::Main,
            data,
        ));
        for replaced in self.data.file_sets.add(StoredFileSet::Included(Arc::clone(&set))) {
            if let StoredFileSet::Included(replaced) = replaced {
                self.data.package_prefixes.remove(&replaced);
            }
        }
        self.data.package_prefixes.add(&set);
    }

    fn exclude(&mut self, root: &VirtualFileUrl, build: impl FnOnce(crate::vfs::FileId) -> ExcludedFileSet) {
        match self.vfs.find_file_by_url(root) {
            Some(file) => {
                self.data
                    .file_sets
                    .add(StoredFileSet::Excluded(Arc::new(build(file))));
            }
            None => log::trace!("Skipping missing excluded root {root}"),
        }
    }
}

impl WorkspaceFileSetRegistrar for CollectingRegistrar<'_> {
    fn register_file_set(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    ) {
        self.include(root, kind, owner, data, true);
    }

    fn register_non_recursive_file_set(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    ) {
        self.include(root, kind, owner, data, false);
    }

    fn register_excluded_root(
        &mut self,
        root: &VirtualFileUrl,
        excluded_from: KindMask,
        owner: EntityPointer,
    ) {
        self.exclude(root, |file| {
            ExcludedFileSet::whole_root(file, excluded_from, owner, EntityStorageKind::Main)
        });
    }

    fn register_exclusion_patterns(
        &mut self,
        root: &VirtualFileUrl,
        patterns: &[String],
        owner: EntityPointer,
    ) {
        match ExclusionPatterns::new(patterns) {
            Ok(patterns) => self.exclude(root, |file| {
                ExcludedFileSet::by_patterns(file, patterns, owner, EntityStorageKind::Main)
            }),
            Err(err) => log::warn!("Ignoring exclusion patterns of {owner} at {root}: {err}"),
        }
    }

    fn register_exclusion_condition(
        &mut self,
        root: &VirtualFileUrl,
        condition: ExclusionCondition,
        owner: EntityPointer,
    ) {
        self.exclude(root, |file| {
            ExcludedFileSet::by_condition(file, condition, owner, EntityStorageKind::Main)
        });
    }

    fn register_archive_container(
        &mut self,
        container: &VirtualFileUrl,
        recursive: bool,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    ) {
        let Some(dir) = self.vfs.find_file_by_url(container) else {
            log::trace!("Skipping missing archive container {container} of {owner}");
            return;
        };
        let roots: Vec<VirtualFileUrl> = self
            .vfs
            .archives_in(dir, recursive)
            .into_iter()
            .filter_map(|root| self.vfs.url_of(root))
            .collect();
        for root in &roots {
            self.include(root, kind, owner, Arc::clone(&data), true);
        }
    }
}
