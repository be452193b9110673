//! Applying entity registrations to the store.
//!
//! Contributors describe their entity's file sets through a
//! [`WorkspaceFileSetRegistrar`]. Adding an entity replays that description
//! into a [`StoreFileSetsRegistrar`]; removing it replays the same
//! description, against the snapshot the entity came from, into a
//! [`RemoveFileSetsRegistrar`] that deletes the matching (root, owner,
//! storage kind) entries instead.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::data::WorkspaceFileIndexData;
use super::WorkspaceModel;
use crate::contributor::{ContributorId, EntityRef};
use crate::entity::{EntityPointer, EntitySnapshot, SnapshotDiff};
use crate::file_set::{
    ExcludedFileSet, ExclusionCondition, ExclusionPatterns, ExclusionScope, StoredFileSet,
    WorkspaceFileSet, WorkspaceFileSetData,
};
use crate::kind::{EntityStorageKind, KindMask, WorkspaceFileKind};
use crate::non_existing::NonExistingFileSetKind;
use crate::registrar::WorkspaceFileSetRegistrar;
use crate::storage::{ArchiveContainer, IndexStorage};
use crate::vfs::{FileId, VirtualFileSystem, VirtualFileUrl};

pub(crate) fn non_existing_kind_for(kind: WorkspaceFileKind) -> NonExistingFileSetKind {
    if kind.is_content() {
        NonExistingFileSetKind::IncludedContent
    } else {
        NonExistingFileSetKind::IncludedOther
    }
}

pub(crate) struct StoreFileSetsRegistrar<'a> {
    storage: &'a mut IndexStorage,
    vfs: &'a VirtualFileSystem,
    storage_kind: EntityStorageKind,
}

impl<'a> StoreFileSetsRegistrar<'a> {
    pub(crate) fn new(
        storage: &'a mut IndexStorage,
        vfs: &'a VirtualFileSystem,
        storage_kind: EntityStorageKind,
    ) -> Self {
        Self {
            storage,
            vfs,
            storage_kind,
        }
    }

    fn store_file_set(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
        recursive: bool,
    ) {
        let Some(file) = self.storage.url_cache.resolve(self.vfs, root) else {
            self.storage.non_existing.register_url(
                root.clone(),
                owner,
                self.storage_kind,
                non_existing_kind_for(kind),
            );
            return;
        };
        let set = Arc::new(WorkspaceFileSet::new(
            file,
            kind,
            recursive,
            owner,
            self.storage_kind,
            data,
        ));
        for replaced in self.storage.file_sets.add(StoredFileSet::Included(Arc::clone(&set))) {
            if let StoredFileSet::Included(replaced) = replaced {
                log::debug!("{owner} registered {root} twice; keeping the latest file set");
                self.storage.package_prefixes.remove(&replaced);
            }
        }
        self.storage.package_prefixes.add(&set);
    }

    fn store_exclusion(
        &mut self,
        root: &VirtualFileUrl,
        owner: EntityPointer,
        non_existing: NonExistingFileSetKind,
        build: impl FnOnce(FileId) -> ExcludedFileSet,
    ) {
        match self.storage.url_cache.resolve(self.vfs, root) {
            Some(file) => {
                self.storage
                    .file_sets
                    .add(StoredFileSet::Excluded(Arc::new(build(file))));
            }
            None => {
                self.storage
                    .non_existing
                    .register_url(root.clone(), owner, self.storage_kind, non_existing);
            }
        }
    }
}

impl WorkspaceFileSetRegistrar for StoreFileSetsRegistrar<'_> {
    fn register_file_set(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    ) {
        self.store_file_set(root, kind, owner, data, true);
    }

    fn register_non_recursive_file_set(
        &mut self,
        root: &VirtualFileUrl,
        kind: WorkspaceFileKind,
        owner: EntityPointer,
        data: Arc<dyn WorkspaceFileSetData>,
    ) {
        self.store_file_set(root, kind, owner, data, false);
    }

    fn register_excluded_root(
        &mut self,
        root: &VirtualFileUrl,
        excluded_from: KindMask,
        owner: EntityPointer,
    ) {
        let non_existing = if excluded_from.intersects(KindMask::CONTENT) {
            NonExistingFileSetKind::ExcludedFromContent
        } else {
            NonExistingFileSetKind::ExcludedOther
        };
        let storage_kind = self.storage_kind;
        self.store_exclusion(root, owner, non_existing, |file| {
            ExcludedFileSet::whole_root(file, excluded_from, owner, storage_kind)
        });
    }

    fn register_exclusion_patterns(
        &mut self,
        root: &VirtualFileUrl,
        patterns: &[String],
        owner: EntityPointer,
    ) {
        let patterns = match ExclusionPatterns::new(patterns) {
            Ok(patterns) => patterns,
            Err(err) => {
                log::warn!("Ignoring exclusion patterns of {owner} at {root}: {err}");
                return;
            }
        };
        let storage_kind = self.storage_kind;
        self.store_exclusion(root, owner, NonExistingFileSetKind::ExcludedOther, |file| {
            ExcludedFileSet::by_patterns(file, patterns, owner, storage_kind)
        });
    }

    fn register_exclusion_condition(
        &mut self,
        root: &VirtualFileUrl,
        condition: ExclusionCondition,
        owner: EntityPointer,
    ) {
        let storage_kind = self.storage_kind;
        self.store_exclusion(root, owner, NonExistingFileSetKind::ExcludedOther, |file| {
            ExcludedFileSet::by_condition(file, condition, owner, storage_kind)
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
        let archive_roots: Vec<VirtualFileUrl> =
            match self.storage.url_cache.resolve(self.vfs, container) {
                Some(dir) if self.vfs.is_directory(dir) => self
                    .vfs
                    .archives_in(dir, recursive)
                    .into_iter()
                    .filter_map(|root| self.vfs.url_of(root))
                    .collect(),
                Some(_) => {
                    log::warn!("Archive container {container} of {owner} is not a directory");
                    Vec::new()
                }
                None => {
                    self.storage.non_existing.register_url(
                        container.clone(),
                        owner,
                        self.storage_kind,
                        non_existing_kind_for(kind),
                    );
                    Vec::new()
                }
            };
        for root in &archive_roots {
            self.store_file_set(root, kind, owner, Arc::clone(&data), true);
        }
        self.storage.archive_containers.register(
            container.clone(),
            ArchiveContainer {
                owner,
                storage_kind: self.storage_kind,
                recursive,
                archive_roots,
            },
        );
    }
}

/// Which exclusion registrations a removal call targets.
#[derive(Clone, Copy)]
enum ExclusionShape {
    WholeRoot,
    Patterns,
    Condition,
}

impl ExclusionShape {
    fn matches(self, scope: &ExclusionScope) -> bool {
        matches!(
            (self, scope),
            (Self::WholeRoot, ExclusionScope::WholeRoot)
                | (Self::Patterns, ExclusionScope::Patterns(_))
                | (Self::Condition, ExclusionScope::Condition(_))
        )
    }
}

pub(crate) struct RemoveFileSetsRegistrar<'a> {
    storage: &'a mut IndexStorage,
    vfs: &'a VirtualFileSystem,
    storage_kind: EntityStorageKind,
}

impl<'a> RemoveFileSetsRegistrar<'a> {
    pub(crate) fn new(
        storage: &'a mut IndexStorage,
        vfs: &'a VirtualFileSystem,
        storage_kind: EntityStorageKind,
    ) -> Self {
        Self {
            storage,
            vfs,
            storage_kind,
        }
    }

    fn remove_included(&mut self, root: &VirtualFileUrl, owner: EntityPointer) {
        let storage_kind = self.storage_kind;
        if let Some(file) = self.storage.url_cache.resolve_for_removal(self.vfs, root) {
            let removed = self.storage.file_sets.remove_matching(file, |stored| {
                !stored.is_excluded() && stored.owner() == owner && stored.storage_kind() == storage_kind
            });
            for set in removed {
                if let StoredFileSet::Included(set) = set {
                    self.storage.package_prefixes.remove(&set);
                }
            }
            self.forget_if_unused(root, file);
        }
        self.storage
            .non_existing
            .unregister_url(root, owner, storage_kind);
    }

    fn remove_excluded(&mut self, root: &VirtualFileUrl, owner: EntityPointer, shape: ExclusionShape) {
        let storage_kind = self.storage_kind;
        if let Some(file) = self.storage.url_cache.resolve_for_removal(self.vfs, root) {
            self.storage.file_sets.remove_matching(file, |stored| match stored {
                StoredFileSet::Excluded(excluded) => {
                    excluded.owner() == owner
                        && excluded.storage_kind() == storage_kind
                        && shape.matches(excluded.scope())
                }
                StoredFileSet::Included(_) => false,
            });
            self.forget_if_unused(root, file);
        }
        self.storage
            .non_existing
            .unregister_url(root, owner, storage_kind);
    }

    /// Drops the cached identity of a root nothing is registered at anymore.
    fn forget_if_unused(&mut self, root: &VirtualFileUrl, file: FileId) {
        if !self.storage.file_sets.contains(file) {
            self.storage.url_cache.forget(root);
        }
    }
}

impl WorkspaceFileSetRegistrar for RemoveFileSetsRegistrar<'_> {
    fn register_file_set(
        &mut self,
        root: &VirtualFileUrl,
        _kind: WorkspaceFileKind,
        owner: EntityPointer,
        _data: Arc<dyn WorkspaceFileSetData>,
    ) {
        self.remove_included(root, owner);
    }

    fn register_non_recursive_file_set(
        &mut self,
        root: &VirtualFileUrl,
        _kind: WorkspaceFileKind,
        owner: EntityPointer,
        _data: Arc<dyn WorkspaceFileSetData>,
    ) {
        self.remove_included(root, owner);
    }

    fn register_excluded_root(
        &mut self,
        root: &VirtualFileUrl,
        _excluded_from: KindMask,
        owner: EntityPointer,
    ) {
        self.remove_excluded(root, owner, ExclusionShape::WholeRoot);
    }

    fn register_exclusion_patterns(
        &mut self,
        root: &VirtualFileUrl,
        _patterns: &[String],
        owner: EntityPointer,
    ) {
        self.remove_excluded(root, owner, ExclusionShape::Patterns);
    }

    fn register_exclusion_condition(
        &mut self,
        root: &VirtualFileUrl,
        _condition: ExclusionCondition,
        owner: EntityPointer,
    ) {
        self.remove_excluded(root, owner, ExclusionShape::Condition);
    }

    fn register_archive_container(
        &mut self,
        container: &VirtualFileUrl,
        _recursive: bool,
        _kind: WorkspaceFileKind,
        owner: EntityPointer,
        _data: Arc<dyn WorkspaceFileSetData>,
    ) {
        let removed = self
            .storage
            .archive_containers
            .unregister(container, owner, self.storage_kind);
        for registration in removed {
            for root in &registration.archive_roots {
                self.remove_included(root, owner);
            }
        }
        if let Some(dir) = self.storage.url_cache.resolve_for_removal(self.vfs, container) {
            self.forget_if_unused(container, dir);
        }
        self.storage
            .non_existing
            .unregister_url(container, owner, self.storage_kind);
    }
}

impl WorkspaceFileIndexData {
    /// Registers every entity of every contributor from scratch.
    pub(crate) fn register_all(&mut self, model: &WorkspaceModel) {
        let contributors = Arc::clone(&self.contributors);
        let mut registered = 0usize;
        for id in contributors.ids() {
            let contributor = contributors.get(id);
            let snapshot = model.snapshot(contributor.storage_kind());
            let mut registrar =
                StoreFileSetsRegistrar::new(&mut self.storage, model.vfs(), contributor.storage_kind());
            for pointer in snapshot.entities_of_type(contributor.entity_type()) {
                if let Some(entity) = EntityRef::resolve(pointer, snapshot) {
                    contributor.register_file_sets(entity, &mut registrar, snapshot);
                    registered += 1;
                }
            }
        }
        log::info!(
            "Registered file sets of {registered} entities ({} roots, {} non-existing)",
            self.storage.file_sets.len(),
            self.storage.non_existing.len()
        );
        self.structure_changed();
    }

    /// Applies a snapshot diff of `storage_kind` entities.
    ///
    /// Changed entities are expanded through the contributors' declared
    /// dependencies. Every removal runs, against `before`, before any
    /// addition runs against `after`, so an entity moving between owners in
    /// one transaction never has its new registrations removed.
    pub(crate) fn on_entities_changed(
        &mut self,
        before: &EntitySnapshot,
        after: &EntitySnapshot,
        diff: &SnapshotDiff,
        storage_kind: EntityStorageKind,
        vfs: &VirtualFileSystem,
    ) {
        if diff.is_empty() {
            return;
        }
        let contributors = Arc::clone(&self.contributors);
        let mut removals: BTreeSet<(ContributorId, EntityPointer)> = BTreeSet::new();
        let mut additions: BTreeSet<(ContributorId, EntityPointer)> = BTreeSet::new();

        for change in diff.changes() {
            let pointer = change.pointer();
            for &id in contributors.for_entity_type(pointer.entity_type()) {
                if contributors.get(id).storage_kind() != storage_kind {
                    continue;
                }
                if change.has_old() {
                    removals.insert((id, pointer));
                }
                if change.has_new() {
                    additions.insert((id, pointer));
                }
            }

            for rule in contributors.rules_triggered_by(pointer.entity_type()) {
                if contributors.get(rule.contributor).storage_kind() != storage_kind {
                    continue;
                }
                let mut affected = Vec::new();
                if change.has_old() {
                    if let Some(old) = EntityRef::resolve(pointer, before) {
                        affected.extend(rule.dependency.affected(old, before));
                    }
                }
                if change.has_new() {
                    if let Some(new) = EntityRef::resolve(pointer, after) {
                        affected.extend(rule.dependency.affected(new, after));
                    }
                }
                for dependent in affected {
                    removals.insert((rule.contributor, dependent));
                    additions.insert((rule.contributor, dependent));
                }
            }
        }

        log::debug!(
            "Entities changed: {} removals, {} additions",
            removals.len(),
            additions.len()
        );

        let mut remover = RemoveFileSetsRegistrar::new(&mut self.storage, vfs, storage_kind);
        for (id, pointer) in &removals {
            if let Some(entity) = EntityRef::resolve(*pointer, before) {
                contributors
                    .get(*id)
                    .register_file_sets(entity, &mut remover, before);
            }
        }
        let mut storer = StoreFileSetsRegistrar::new(&mut self.storage, vfs, storage_kind);
        for (id, pointer) in &additions {
            if let Some(entity) = EntityRef::resolve(*pointer, after) {
                contributors
                    .get(*id)
                    .register_file_sets(entity, &mut storer, after);
            }
        }
        self.structure_changed();
    }

    /// Buffers entities and file identities to recompute before the write
    /// action ends.
    pub(crate) fn mark_dirty(
        &mut self,
        entities: impl IntoIterator<Item = EntityPointer>,
        files: impl IntoIterator<Item = VirtualFileUrl>,
    ) {
        self.dirty.mark(entities, files);
    }

    /// Re-registers every dirty entity against the current snapshot.
    ///
    /// Returns false, touching nothing, when nothing is dirty.
    pub(crate) fn update_dirty_entities(&mut self, model: &WorkspaceModel) -> bool {
        if self.dirty.is_empty() {
            return false;
        }
        let (entities, files) = self.dirty.take();
        let contributors = Arc::clone(&self.contributors);
        let vfs = model.vfs();

        let mut targets = Vec::new();
        for pointer in &entities {
            let ids = contributors.for_entity_type(pointer.entity_type());
            if ids.is_empty() {
                log::debug!("No contributor for dirty entity {pointer}");
            }
            for &id in ids {
                let storage_kind = contributors.get(id).storage_kind();
                if model.snapshot(storage_kind).contains(pointer) {
                    targets.push((id, *pointer, storage_kind));
                } else {
                    log::debug!("Dirty entity {pointer} no longer exists; skipping");
                }
            }
        }

        for &(id, pointer, storage_kind) in &targets {
            let snapshot = model.snapshot(storage_kind);
            if let Some(entity) = EntityRef::resolve(pointer, snapshot) {
                let mut remover = RemoveFileSetsRegistrar::new(&mut self.storage, vfs, storage_kind);
                contributors
                    .get(id)
                    .register_file_sets(entity, &mut remover, snapshot);
            }
        }
        for url in &files {
            self.storage.url_cache.invalidate(url);
        }
        for &(id, pointer, storage_kind) in &targets {
            let snapshot = model.snapshot(storage_kind);
            if let Some(entity) = EntityRef::resolve(pointer, snapshot) {
                let mut storer = StoreFileSetsRegistrar::new(&mut self.storage, vfs, storage_kind);
                contributors
                    .get(id)
                    .register_file_sets(entity, &mut storer, snapshot);
            }
        }

        log::debug!(
            "Updated {} dirty entities, invalidated {} file identities",
            targets.len(),
            files.len()
        );
        self.structure_changed();
        true
    }
}
