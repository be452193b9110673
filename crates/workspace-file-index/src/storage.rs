//! Mutable registration state of the index.
//!
//! `IndexStorage` groups everything the registrars write to, so a registrar
//! can borrow it mutably while the engine keeps shared access to contributors
//! and configuration.

use std::collections::BTreeMap;
use std::ops::Bound;

use thin_vec::ThinVec;

use crate::entity::EntityPointer;
use crate::file_set::FileSetStore;
use crate::kind::EntityStorageKind;
use crate::non_existing::NonExistingRootsRegistry;
use crate::package_index::PackagePrefixIndex;
use crate::vfs::{FileId, VirtualFileSystem, VirtualFileUrl, FILE_SCHEME};

#[derive(Debug, Default)]
pub struct IndexStorage {
    pub file_sets: FileSetStore,
    pub non_existing: NonExistingRootsRegistry,
    pub package_prefixes: PackagePrefixIndex,
    pub archive_containers: ArchiveContainerRegistry,
    pub url_cache: FileUrlCache,
}

impl IndexStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.file_sets.clear();
        self.non_existing.clear();
        self.package_prefixes.clear();
        self.archive_containers.clear();
        self.url_cache.clear();
    }
}

/// URL -> file identity cache used when registering and removing roots.
///
/// Removal must find the file a root was registered at even after that file
/// was deleted or moved, so a cached id is used as-is for removals and only
/// re-validated for additions. The reconciler invalidates entries of URLs
/// whose identity changed once their owners have been removed, and removing
/// the last registration at a root forgets that root's entry.
#[derive(Debug, Default)]
pub struct FileUrlCache {
    files: BTreeMap<VirtualFileUrl, FileId>,
}

impl FileUrlCache {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolves `url` to a live file, refreshing the cached identity.
    pub fn resolve(&mut self, vfs: &VirtualFileSystem, url: &VirtualFileUrl) -> Option<FileId> {
        if let Some(&cached) = self.files.get(url) {
            if vfs.is_valid(cached) {
                return Some(cached);
            }
        }
        match vfs.find_file_by_url(url) {
            Some(file) => {
                self.files.insert(url.clone(), file);
                Some(file)
            }
            None => {
                self.files.remove(url);
                None
            }
        }
    }

    /// Returns the file `url` was last resolved to, live or not, falling back
    /// to a fresh lookup.
    pub fn resolve_for_removal(&self, vfs: &VirtualFileSystem, url: &VirtualFileUrl) -> Option<FileId> {
        self.files
            .get(url)
            .copied()
            .or_else(|| vfs.find_file_by_url(url))
    }

    /// Forgets `url` and every URL below it.
    pub fn invalidate(&mut self, url: &VirtualFileUrl) {
        let stale: Vec<VirtualFileUrl> = self
            .files
            .range((Bound::Included(url), Bound::Unbounded))
            .take_while(|(candidate, _)| candidate.as_str().starts_with(url.as_str()))
            .filter(|(candidate, _)| url.is_equal_or_ancestor_of(candidate))
            .map(|(candidate, _)| candidate.clone())
            .collect();
        for candidate in stale {
            self.files.remove(&candidate);
        }
    }

    /// Forgets `url` alone, leaving URLs below it cached.
    pub fn forget(&mut self, url: &VirtualFileUrl) {
        self.files.remove(url);
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }
}

/// A directory whose archives were registered as roots on behalf of `owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveContainer {
    pub owner: EntityPointer,
    pub storage_kind: EntityStorageKind,
    pub recursive: bool,
    /// Archive root URLs registered for this container at registration time.
    pub archive_roots: Vec<VirtualFileUrl>,
}

/// Directories holding archives that belong to an entity ("jar directories").
///
/// Adding or removing an archive inside such a directory changes the owner's
/// roots without any registered root being touched, so the reconciler asks
/// this registry which owners absorb a changed URL.
#[derive(Debug, Default)]
pub struct ArchiveContainerRegistry {
    containers: BTreeMap<VirtualFileUrl, ThinVec<ArchiveContainer>>,
}

impl ArchiveContainerRegistry {
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    pub fn register(&mut self, url: VirtualFileUrl, container: ArchiveContainer) {
        let containers = self.containers.entry(url).or_default();
        containers.retain(|existing| {
            existing.owner != container.owner || existing.storage_kind != container.storage_kind
        });
        containers.push(container);
    }

    /// Removes the containers of `owner` at `url`, returning them.
    pub fn unregister(
        &mut self,
        url: &VirtualFileUrl,
        owner: EntityPointer,
        storage_kind: EntityStorageKind,
    ) -> Vec<ArchiveContainer> {
        let Some(containers) = self.containers.get_mut(url) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        containers.retain(|existing| {
            let matches = existing.owner == owner && existing.storage_kind == storage_kind;
            if matches {
                removed.push(existing.clone());
            }
            !matches
        });
        if containers.is_empty() {
            self.containers.remove(url);
        }
        removed
    }

    /// Owners whose archive containers are affected by a change at `url`.
    ///
    /// A change inside an archive is attributed to the local archive file. A
    /// URL is absorbed by a container at the URL itself, at its parent, at any
    /// recursive container above it, or by any container below it.
    pub fn owners_affected_by(&self, url: &VirtualFileUrl) -> Vec<EntityPointer> {
        let mut owners = Vec::new();
        if self.containers.is_empty() {
            return owners;
        }
        let local = match url.archive_split() {
            Some((archive, _)) => VirtualFileUrl::from_path(archive),
            None if url.as_str().starts_with(FILE_SCHEME) => url.clone(),
            None => return owners,
        };

        let mut depth = 0;
        let mut current = Some(local.clone());
        while let Some(candidate) = current {
            if let Some(containers) = self.containers.get(&candidate) {
                owners.extend(
                    containers
                        .iter()
                        .filter(|container| depth <= 1 || container.recursive)
                        .map(|container| container.owner),
                );
            }
            depth += 1;
            current = candidate.parent();
        }

        owners.extend(
            self.containers
                .range((Bound::Excluded(&local), Bound::Unbounded))
                .take_while(|(candidate, _)| candidate.as_str().starts_with(local.as_str()))
                .filter(|(candidate, _)| local.is_equal_or_ancestor_of(candidate))
                .flat_map(|(_, containers)| containers.iter().map(|container| container.owner)),
        );
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    pub fn clear(&mut self) {
        self.containers.clear();
    }
}
