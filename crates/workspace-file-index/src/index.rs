//! The workspace file index and its lifecycle.
//!
//! ## Module Structure
//!
//! - `data` - Registrations and derived caches of a live index
//! - `dirty` - Entities awaiting recomputation within a write action
//! - `registration` - Store/remove registrars and the entity diff engine
//! - `vfs_changes` - File system events to entity invalidations
//! - `query` - Ancestor-walk classification and package queries
//! - `package_cache` - Memoized package directory lookups
//! - `non_incremental` - Wholesale recompute for contributors without diffs
//!
//! The host state ([`WorkspaceModel`]) sits behind a reader/writer lock.
//! Queries run under the shared lock through [`IndexReader`]; every mutation
//! runs inside [`WorkspaceFileIndex::write_action`], which recomputes dirty
//! entities before releasing the exclusive lock.

mod data;
mod dirty;
mod non_incremental;
mod package_cache;
mod query;
mod registration;
mod vfs_changes;

use std::collections::BTreeSet;
use std::mem;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use globset::GlobSet;
use parking_lot::RwLock;

pub use data::WorkspaceFileIndexData;
pub use non_incremental::NonIncrementalData;
pub use query::{ThreeState, WorkspaceFileInternalInfo};
pub use vfs_changes::VfsChangeApplier;

use self::non_incremental::NonIncrementalContributors;
use crate::config::IndexConfig;
use crate::contributor::{
    ContributorRegistry, LegacyRootsChangeListener, NonIncrementalContributor,
    WorkspaceFileIndexContributor,
};
use crate::entity::{EntityPointer, EntitySnapshot};
use crate::error::Result;
use crate::file_set::WorkspaceFileSet;
use crate::kind::{EntityStorageKind, KindMask};
use crate::non_existing::NonExistingFileSetKind;
use crate::storage::IndexStorage;
use crate::throttle::LogThrottle;
use crate::vfs::{FileId, VfsEvent, VirtualFileSystem, VirtualFileUrl};

/// The host state the index is derived from.
#[derive(Debug, Default)]
pub struct WorkspaceModel {
    vfs: VirtualFileSystem,
    main: EntitySnapshot,
    unloaded: EntitySnapshot,
}

impl WorkspaceModel {
    pub fn new(vfs: VirtualFileSystem) -> Self {
        Self {
            vfs,
            ..Self::default()
        }
    }

    pub fn with_snapshot(mut self, storage_kind: EntityStorageKind, snapshot: EntitySnapshot) -> Self {
        *self.snapshot_mut(storage_kind) = snapshot;
        self
    }

    pub fn vfs(&self) -> &VirtualFileSystem {
        &self.vfs
    }

    /// Direct access for setting up the tree before the index is built.
    pub fn vfs_mut(&mut self) -> &mut VirtualFileSystem {
        &mut self.vfs
    }

    pub fn snapshot(&self, storage_kind: EntityStorageKind) -> &EntitySnapshot {
        match storage_kind {
            EntityStorageKind::Main => &self.main,
            EntityStorageKind::Unloaded => &self.unloaded,
        }
    }

    fn snapshot_mut(&mut self, storage_kind: EntityStorageKind) -> &mut EntitySnapshot {
        match storage_kind {
            EntityStorageKind::Main => &mut self.main,
            EntityStorageKind::Unloaded => &mut self.unloaded,
        }
    }
}

#[derive(Debug)]
enum IndexState {
    NotInitialized,
    /// Dropped; rebuilt on the next read.
    Reset,
    Active(Arc<RwLock<WorkspaceFileIndexData>>),
}

impl IndexState {
    fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not-initialized",
            Self::Reset => "reset",
            Self::Active(_) => "active",
        }
    }
}

/// Configures and builds a [`WorkspaceFileIndex`].
#[derive(Default)]
pub struct WorkspaceFileIndexBuilder {
    config: IndexConfig,
    contributors: Vec<Arc<dyn WorkspaceFileIndexContributor>>,
    non_incremental: Vec<Arc<dyn NonIncrementalContributor>>,
    listeners: Vec<Arc<dyn LegacyRootsChangeListener>>,
}

impl WorkspaceFileIndexBuilder {
    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds a contributor. Several may share an entity type.
    pub fn contributor(mut self, contributor: Arc<dyn WorkspaceFileIndexContributor>) -> Self {
        self.contributors.push(contributor);
        self
    }

    /// Adds a contributor whose registrations are recomputed in full after
    /// every structural change.
    pub fn non_incremental_contributor(mut self, contributor: Arc<dyn NonIncrementalContributor>) -> Self {
        self.non_incremental.push(contributor);
        self
    }

    /// Notified with the entities whose roots the file tree changed.
    pub fn legacy_listener(mut self, listener: Arc<dyn LegacyRootsChangeListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validates the configuration and wraps `model`. The index starts out
    /// not initialized.
    pub fn build(self, model: WorkspaceModel) -> Result<WorkspaceFileIndex> {
        self.config.validate()?;
        let ignored = self.config.ignored_matcher()?;
        let interval = Duration::from_millis(self.config.not_initialized_log_interval_ms);
        Ok(WorkspaceFileIndex {
            config: Arc::new(self.config),
            ignored,
            contributors: Arc::new(ContributorRegistry::new(self.contributors)),
            non_incremental: self.non_incremental,
            listeners: self.listeners,
            model: RwLock::new(model),
            state: ArcSwap::from_pointee(IndexState::NotInitialized),
            not_initialized_log: LogThrottle::new(interval),
        })
    }
}

/// Incrementally maintained classification of workspace files.
pub struct WorkspaceFileIndex {
    config: Arc<IndexConfig>,
    ignored: GlobSet,
    contributors: Arc<ContributorRegistry>,
    non_incremental: Vec<Arc<dyn NonIncrementalContributor>>,
    listeners: Vec<Arc<dyn LegacyRootsChangeListener>>,
    model: RwLock<WorkspaceModel>,
    state: ArcSwap<IndexState>,
    not_initialized_log: LogThrottle,
}

impl WorkspaceFileIndex {
    pub fn builder() -> WorkspaceFileIndexBuilder {
        WorkspaceFileIndexBuilder::default()
    }

    /// `"not-initialized"`, `"active"` or `"reset"`.
    pub fn state_name(&self) -> &'static str {
        self.state.load().as_str()
    }

    /// Registers every entity and activates the index.
    pub fn initialize(&self) {
        let model = self.model.write();
        let data = self.build_data(&model);
        self.state
            .store(Arc::new(IndexState::Active(Arc::new(RwLock::new(data)))));
        log::info!("Workspace file index initialized");
    }

    /// Drops the registrations; the next read rebuilds them.
    pub fn reset(&self) {
        let _model = self.model.write();
        self.state.store(Arc::new(IndexState::Reset));
        log::info!("Workspace file index reset");
    }

    /// Runs `f` under the shared lock.
    pub fn read<R>(&self, f: impl FnOnce(&IndexReader<'_>) -> R) -> R {
        let model = self.model.read();
        let state = self.current_state(&model);
        match &*state {
            IndexState::Active(data) => {
                let data = data.read();
                f(&IndexReader {
                    model: &*model,
                    data: Some(&*data),
                    not_initialized_log: &self.not_initialized_log,
                })
            }
            IndexState::NotInitialized | IndexState::Reset => f(&IndexReader {
                model: &*model,
                data: None,
                not_initialized_log: &self.not_initialized_log,
            }),
        }
    }

    /// Runs `f` under the exclusive lock, then recomputes whatever it left
    /// dirty so no reader observes the index in between.
    pub fn write_action<R>(&self, f: impl FnOnce(&mut WriteAction<'_>) -> R) -> R {
        let mut model = self.model.write();
        let state = self.state.load_full();
        let mut data = match &*state {
            IndexState::Active(data) => Some(data.write()),
            IndexState::NotInitialized | IndexState::Reset => None,
        };
        let mut action = WriteAction {
            model: &mut *model,
            data: data.as_deref_mut(),
            listeners: &self.listeners,
        };
        let result = f(&mut action);
        action.update_dirty_entities();
        result
    }

    /// Prunes memoized lookups.
    pub fn on_low_memory(&self) {
        if let IndexState::Active(data) = &**self.state.load() {
            data.read().package_cache.on_low_memory();
        }
    }

    fn build_data(&self, model: &WorkspaceModel) -> WorkspaceFileIndexData {
        let mut data = WorkspaceFileIndexData::new(
            Arc::clone(&self.config),
            self.ignored.clone(),
            Arc::clone(&self.contributors),
            NonIncrementalContributors::new(self.non_incremental.clone()),
        );
        data.register_all(model);
        data
    }

    /// Loads the state, building and installing a fresh index if it was reset.
    ///
    /// Racing readers may each build a candidate; the first to swap it in
    /// wins and the others drop theirs.
    fn current_state(&self, model: &WorkspaceModel) -> Arc<IndexState> {
        let current = self.state.load_full();
        if !matches!(*current, IndexState::Reset) {
            return current;
        }
        let candidate = Arc::new(IndexState::Active(Arc::new(RwLock::new(self.build_data(model)))));
        let previous = self.state.compare_and_swap(&current, Arc::clone(&candidate));
        if Arc::ptr_eq(&previous, &current) {
            log::info!("Workspace file index rebuilt after reset");
            candidate
        } else {
            log::debug!("Another reader rebuilt the workspace file index first; dropping candidate");
            self.state.load_full()
        }
    }
}

/// Mutations available inside [`WorkspaceFileIndex::write_action`].
pub struct WriteAction<'a> {
    model: &'a mut WorkspaceModel,
    data: Option<&'a mut WorkspaceFileIndexData>,
    listeners: &'a [Arc<dyn LegacyRootsChangeListener>],
}

impl WriteAction<'_> {
    /// The model as of this point in the write action.
    pub fn model(&self) -> &WorkspaceModel {
        &*self.model
    }

    /// False before initialization; mutations then only touch the model.
    pub fn is_active(&self) -> bool {
        self.data.is_some()
    }

    /// Schedules entities and file identities for recomputation.
    pub fn mark_dirty(
        &mut self,
        entities: impl IntoIterator<Item = EntityPointer>,
        files: impl IntoIterator<Item = VirtualFileUrl>,
    ) {
        if let Some(data) = self.data.as_deref_mut() {
            data.mark_dirty(entities, files);
        }
    }

    /// Installs a new snapshot and applies its diff against the old one.
    pub fn replace_snapshot(&mut self, storage_kind: EntityStorageKind, snapshot: EntitySnapshot) {
        let before = mem::replace(self.model.snapshot_mut(storage_kind), snapshot);
        if let Some(data) = self.data.as_deref_mut() {
            let after = self.model.snapshot(storage_kind);
            let diff = before.diff(after);
            data.on_entities_changed(&before, after, &diff, storage_kind, &self.model.vfs);
        }
    }

    /// Applies `events` to the file tree, reconciling registrations around it.
    ///
    /// Events applied before a failing one stay applied and are reconciled.
    pub fn apply_vfs_events(&mut self, events: &[VfsEvent]) -> Result<()> {
        let applier = self
            .data
            .as_deref()
            .map(|data| vfs_changes::analyze_vfs_changes(data, &self.model.vfs, events));
        if let (Some(applier), Some(data)) = (&applier, self.data.as_deref_mut()) {
            applier.before_vfs_change(data);
        }
        let result = self.model.vfs.apply_events(events);
        if let (Some(applier), Some(data)) = (applier, self.data.as_deref_mut()) {
            applier.after_vfs_change(data, &*self.model, self.listeners);
        }
        result
    }

    /// Recomputes dirty entities now. Returns false if nothing was dirty.
    pub fn update_dirty_entities(&mut self) -> bool {
        match self.data.as_deref_mut() {
            Some(data) => data.update_dirty_entities(&*self.model),
            None => false,
        }
    }
}

/// Queries available inside [`WorkspaceFileIndex::read`].
///
/// Before initialization every query answers as if nothing were registered
/// and logs a throttled warning.
pub struct IndexReader<'a> {
    model: &'a WorkspaceModel,
    data: Option<&'a WorkspaceFileIndexData>,
    not_initialized_log: &'a LogThrottle,
}

impl<'a> IndexReader<'a> {
    pub fn model(&self) -> &'a WorkspaceModel {
        self.model
    }

    pub fn vfs(&self) -> &'a VirtualFileSystem {
        &self.model.vfs
    }

    pub fn is_initialized(&self) -> bool {
        self.data.is_some()
    }

    /// Raw registrations, for diagnostics. `None` before initialization.
    pub fn storage(&self) -> Option<&'a IndexStorage> {
        self.data.map(WorkspaceFileIndexData::storage)
    }

    fn active(&self) -> Option<&'a WorkspaceFileIndexData> {
        if self.data.is_none() {
            if let Some(suppressed) = self.not_initialized_log.try_acquire() {
                log::warn!(
                    "Workspace file index queried before initialization ({suppressed} similar queries suppressed)"
                );
            }
        }
        self.data
    }

    /// Classifies `file` by the nearest registration granting a kind in
    /// `accepted_kind_mask`.
    ///
    /// With `honor_exclusion` unset, excluded roots and patterns are ignored
    /// and the file is classified as if they were never registered. Ignored
    /// names shadow every registration either way.
    pub fn get_file_info(
        &self,
        file: FileId,
        accepted_kind_mask: KindMask,
        honor_exclusion: bool,
    ) -> WorkspaceFileInternalInfo {
        match self.active() {
            Some(data) => data.get_file_info(self.model, file, accepted_kind_mask, honor_exclusion),
            None => WorkspaceFileInternalInfo::NotUnderRoots,
        }
    }

    /// Like [`get_file_info`](Self::get_file_info) for a URL; missing files are invalid.
    pub fn get_file_info_by_url(
        &self,
        url: &VirtualFileUrl,
        accepted_kind_mask: KindMask,
        honor_exclusion: bool,
    ) -> WorkspaceFileInternalInfo {
        match self.model.vfs.find_file_by_url(url) {
            Some(file) => self.get_file_info(file, accepted_kind_mask, honor_exclusion),
            None => WorkspaceFileInternalInfo::Invalid,
        }
    }

    /// Every file set `file` belongs to, exclusions honored.
    pub fn find_containing_file_sets(&self, file: FileId) -> Vec<Arc<WorkspaceFileSet>> {
        self.active()
            .map(|data| data.find_containing_file_sets(self.model, file))
            .unwrap_or_default()
    }

    /// Owners of the sets containing `file` and the modules those sets
    /// attribute it to, deduplicated and sorted.
    pub fn find_containing_entities(&self, file: FileId, honor_exclusion: bool) -> Vec<EntityPointer> {
        self.active()
            .map(|data| data.find_containing_entities(self.model, file, honor_exclusion))
            .unwrap_or_default()
    }

    /// Package of a directory, or of a file's directory, relative to the
    /// nearest package root containing it.
    pub fn get_package_name(&self, file: FileId) -> Option<String> {
        self.active()?.get_package_name(self.model, file)
    }

    /// Directories whose package is `package_name`, across all package
    /// roots. Library source roots only count when asked for.
    ///
    /// Results are cached until the next structural change.
    pub fn get_directories_by_package_name(
        &self,
        package_name: &str,
        include_library_sources: bool,
    ) -> Arc<[FileId]> {
        match self.active() {
            Some(data) => data.get_directories_by_package_name(self.model, package_name, include_library_sources),
            None => Arc::from(Vec::new()),
        }
    }

    /// Included files directly inside the package's directories, library
    /// sources left out.
    pub fn get_files_by_package_name(&self, package_name: &str) -> Arc<[FileId]> {
        match self.active() {
            Some(data) => data.get_files_by_package_name(self.model, package_name),
            None => Arc::from(Vec::new()),
        }
    }

    /// Kinds registered at `url` while nothing exists there.
    pub fn get_non_existent_file_set_kinds(&self, url: &VirtualFileUrl) -> BTreeSet<NonExistingFileSetKind> {
        self.active()
            .map(|data| data.get_non_existent_file_set_kinds(url))
            .unwrap_or_default()
    }

    /// Whether `url` is content, answered for files that may not exist yet.
    ///
    /// `Unsure` when neither an existing ancestor nor a placeholder decides
    /// it, and always before initialization.
    pub fn is_url_in_content(&self, url: &VirtualFileUrl) -> ThreeState {
        match self.active() {
            Some(data) => data.is_url_in_content(self.model, url),
            None => ThreeState::Unsure,
        }
    }

    /// Visits every registered inclusion. Touches the whole index.
    pub fn visit_file_sets(&self, visitor: impl FnMut(&Arc<WorkspaceFileSet>)) {
        if let Some(data) = self.active() {
            data.visit_file_sets(self.model, visitor);
        }
    }

    /// Visits files under `root` included with an accepted kind; stops when
    /// `visitor` returns false. Returns false if the traversal was cut short.
    pub fn process_content_files(
        &self,
        root: FileId,
        accepted_kind_mask: KindMask,
        visitor: impl FnMut(FileId) -> bool,
    ) -> bool {
        match self.active() {
            Some(data) => data.process_content_files(self.model, root, accepted_kind_mask, visitor),
            None => true,
        }
    }
}
