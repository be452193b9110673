//! Classification queries.
//!
//! Every query walks from the file up through its parents, consulting both
//! the incremental store and the current non-incremental generation at each
//! step. Exclusions met along the way narrow the accepted kinds; the nearest
//! inclusion still accepted answers the query.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::data::WorkspaceFileIndexData;
use super::non_incremental::NonIncrementalData;
use super::WorkspaceModel;
use crate::entity::EntityPointer;
use crate::file_set::{StoredFileSetCollection, WorkspaceFileSet, WorkspaceFileSetData};
use crate::kind::{EntityStorageKind, KindMask, WorkspaceFileKind};
use crate::non_existing::NonExistingFileSetKind;
use crate::vfs::{FileId, VirtualFileSystem, VirtualFileUrl};

const VERSIONS_DIR: &str = "META-INF/versions";

/// Result of classifying a file.
#[derive(Debug, Clone)]
pub enum WorkspaceFileInternalInfo {
    /// No registration reaches the file.
    NotUnderRoots,
    /// Every accepted kind was vetoed by an exclusion.
    Excluded,
    /// The file or an ancestor has an ignored name.
    Ignored,
    /// The file no longer exists.
    Invalid,
    Single(Arc<WorkspaceFileSet>),
    Multiple(Vec<Arc<WorkspaceFileSet>>),
}

impl WorkspaceFileInternalInfo {
    fn from_sets(mut sets: Vec<Arc<WorkspaceFileSet>>) -> Self {
        match sets.len() {
            0 => Self::NotUnderRoots,
            1 => sets.pop().map_or(Self::NotUnderRoots, Self::Single),
            _ => Self::Multiple(sets),
        }
    }

    /// The file sets the file belongs to; empty unless included.
    pub fn file_sets(&self) -> &[Arc<WorkspaceFileSet>] {
        match self {
            Self::Single(set) => std::slice::from_ref(set),
            Self::Multiple(sets) => sets,
            _ => &[],
        }
    }

    pub fn is_included(&self) -> bool {
        matches!(self, Self::Single(_) | Self::Multiple(_))
    }

    pub fn find_file_set(
        &self,
        mut predicate: impl FnMut(&WorkspaceFileSet) -> bool,
    ) -> Option<&Arc<WorkspaceFileSet>> {
        self.file_sets().iter().find(|set| predicate(set))
    }

    /// The first file set whose data is a `D`.
    pub fn find_file_set_with_custom_data<D: WorkspaceFileSetData + 'static>(&self) -> Option<&Arc<WorkspaceFileSet>> {
        self.find_file_set(|set| set.data().is::<D>())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreeState {
    Yes,
    No,
    Unsure,
}

impl WorkspaceFileIndexData {
    fn non_incremental_data(&self, model: &WorkspaceModel) -> Option<Arc<NonIncrementalData>> {
        if self.non_incremental.is_empty() {
            return None;
        }
        Some(
            self.non_incremental
                .get(model.vfs(), model.snapshot(EntityStorageKind::Main)),
        )
    }

    pub(crate) fn get_file_info(
        &self,
        model: &WorkspaceModel,
        file: FileId,
        accepted_kind_mask: KindMask,
        honor_exclusion: bool,
    ) -> WorkspaceFileInternalInfo {
        let vfs = model.vfs();
        if !vfs.is_valid(file) {
            return WorkspaceFileInternalInfo::Invalid;
        }
        let extra = self.non_incremental_data(model);
        let extra_sets = extra.as_deref().map(|data| &data.file_sets);

        let mut accepted = accepted_kind_mask;
        let mut narrowed = false;
        let mut current = Some(file);
        while let Some(dir) = current {
            current = vfs.parent(dir);
            if self.is_ignored(vfs, dir) {
                return WorkspaceFileInternalInfo::Ignored;
            }
            if self.no_registration.get(dir.index()) {
                continue;
            }
            let own = self.storage.file_sets.get(dir);
            let other = extra_sets.and_then(|sets| sets.get(dir));
            if own.is_none() && other.is_none() {
                self.no_registration.set(dir.index());
                continue;
            }
            let collections: [Option<&StoredFileSetCollection>; 2] = [own, other];

            let mut result = KindMask::empty();
            for sets in collections.iter().flatten() {
                let masks = sets.compute_masks(accepted, honor_exclusion, vfs, dir, file);
                if masks.accepted_kind_mask != accepted {
                    narrowed = true;
                    accepted = masks.accepted_kind_mask;
                }
                result |= masks.result_kind_mask;
            }
            if accepted.is_empty() {
                return WorkspaceFileInternalInfo::Excluded;
            }
            // A later collection may veto kinds an earlier one granted.
            if !result.intersects(accepted) {
                continue;
            }

            let found: Vec<Arc<WorkspaceFileSet>> = collections
                .iter()
                .flatten()
                .flat_map(|sets| sets.matching_inclusions(accepted, dir, file))
                .cloned()
                .collect();
            if !found.is_empty() {
                return WorkspaceFileInternalInfo::from_sets(found);
            }
        }

        if narrowed {
            WorkspaceFileInternalInfo::Excluded
        } else {
            WorkspaceFileInternalInfo::NotUnderRoots
        }
    }

    /// Every file set the file belongs to, exclusions honored.
    pub(crate) fn find_containing_file_sets(
        &self,
        model: &WorkspaceModel,
        file: FileId,
    ) -> Vec<Arc<WorkspaceFileSet>> {
        self.get_file_info(model, file, KindMask::ALL, true)
            .file_sets()
            .to_vec()
    }

    /// Owners of the sets containing `file`, plus the modules those sets
    /// attribute their files to.
    pub(crate) fn find_containing_entities(
        &self,
        model: &WorkspaceModel,
        file: FileId,
        honor_exclusion: bool,
    ) -> Vec<EntityPointer> {
        let info = self.get_file_info(model, file, KindMask::ALL, honor_exclusion);
        let entities: BTreeSet<EntityPointer> = info
            .file_sets()
            .iter()
            .flat_map(|set| std::iter::once(set.owner()).chain(set.data().module()))
            .collect();
        entities.into_iter().collect()
    }

    pub(crate) fn get_package_name(&self, model: &WorkspaceModel, file: FileId) -> Option<String> {
        let vfs = model.vfs();
        let dir = if vfs.is_directory(file) {
            file
        } else {
            vfs.parent(file)?
        };
        let info = self.get_file_info(model, dir, KindMask::ALL, true);
        info.file_sets().iter().find_map(|set| {
            let prefix = set.data().package_prefix()?;
            let segments = vfs.relative_path(set.root(), dir)?;
            Some(self.package_name(vfs, set, prefix, &segments))
        })
    }

    fn package_name(
        &self,
        vfs: &VirtualFileSystem,
        set: &WorkspaceFileSet,
        prefix: &str,
        segments: &[&str],
    ) -> String {
        let segments = if vfs.is_archive_root(set.root()) {
            self.strip_version_directory(segments)
        } else {
            segments
        };
        let mut name = prefix.to_owned();
        for segment in segments {
            if !name.is_empty() {
                name.push('.');
            }
            name.push_str(segment);
        }
        name
    }

    /// Drops the `META-INF/versions/N` part of paths inside multi-release archives.
    fn strip_version_directory<'s>(&self, segments: &'s [&'s str]) -> &'s [&'s str] {
        match segments {
            ["META-INF", "versions", version, rest @ ..] if self.is_release_version(version) => rest,
            _ => segments,
        }
    }

    fn is_release_version(&self, name: &str) -> bool {
        name.parse::<u32>()
            .is_ok_and(|version| version >= self.config.multi_release_min_version)
    }

    /// Version roots of a multi-release archive: `META-INF/versions/N` for every
    /// supported N.
    fn version_roots(&self, vfs: &VirtualFileSystem, archive_root: FileId) -> Vec<FileId> {
        let Some(versions) = vfs.find_relative(archive_root, VERSIONS_DIR) else {
            return Vec::new();
        };
        vfs.children(versions)
            .iter()
            .copied()
            .filter(|&child| {
                vfs.is_directory(child) && vfs.name(child).is_some_and(|name| self.is_release_version(name))
            })
            .collect()
    }

    fn compute_package_directories(
        &self,
        model: &WorkspaceModel,
        package_name: &str,
        include_library_sources: bool,
    ) -> Vec<FileId> {
        let vfs = model.vfs();
        let extra = self.non_incremental_data(model);
        let indexes = std::iter::once(&self.storage.package_prefixes)
            .chain(extra.as_deref().map(|data| &data.package_prefixes));

        let mut directories = Vec::new();
        for index in indexes {
            for (set, rest) in index.sets_for_package(package_name) {
                if set.kind() == WorkspaceFileKind::ExternalSource && !include_library_sources {
                    continue;
                }
                let mut roots = vec![set.root()];
                if vfs.is_archive_root(set.root()) {
                    roots.extend(self.version_roots(vfs, set.root()));
                }
                let relative = rest.replace('.', "/");
                for root in roots {
                    let Some(dir) = vfs.find_relative(root, &relative) else {
                        continue;
                    };
                    if vfs.is_directory(dir)
                        && !directories.contains(&dir)
                        && self.get_package_name(model, dir).as_deref() == Some(package_name)
                    {
                        directories.push(dir);
                    }
                }
            }
        }
        directories
    }

    pub(crate) fn get_directories_by_package_name(
        &self,
        model: &WorkspaceModel,
        package_name: &str,
        include_library_sources: bool,
    ) -> Arc<[FileId]> {
        self.package_cache
            .directories(package_name, include_library_sources, || {
                self.compute_package_directories(model, package_name, include_library_sources)
            })
    }

    /// Non-directory files directly inside the package's directories.
    ///
    /// Files vetoed by an exclusion are skipped even though their directory
    /// belongs to the package.
    pub(crate) fn get_files_by_package_name(&self, model: &WorkspaceModel, package_name: &str) -> Arc<[FileId]> {
        let accepted = KindMask::ALL.difference(KindMask::EXTERNAL_SOURCE);
        self.package_cache.files(package_name, || {
            let vfs = model.vfs();
            self.get_directories_by_package_name(model, package_name, false)
                .iter()
                .flat_map(|&dir| vfs.children(dir).iter().copied())
                .filter(|&child| !vfs.is_directory(child))
                .filter(|&child| self.get_file_info(model, child, accepted, true).is_included())
                .collect()
        })
    }

    pub(crate) fn get_non_existent_file_set_kinds(&self, url: &VirtualFileUrl) -> BTreeSet<NonExistingFileSetKind> {
        self.storage.non_existing.get_file_set_kinds_for(url)
    }

    /// Answers whether `url`, existing or not, lies in content.
    ///
    /// Walks up the URL, deciding at the first existing file or the first
    /// placeholder registration met.
    pub(crate) fn is_url_in_content(&self, model: &WorkspaceModel, url: &VirtualFileUrl) -> ThreeState {
        let vfs = model.vfs();
        let mut current = Some(url.clone());
        while let Some(candidate) = current {
            if let Some(file) = vfs.find_file_by_url(&candidate) {
                let info = self.get_file_info(model, file, KindMask::CONTENT, true);
                return if info.is_included() {
                    ThreeState::Yes
                } else {
                    ThreeState::No
                };
            }
            let kinds = self.storage.non_existing.get_file_set_kinds_for(&candidate);
            if kinds.contains(&NonExistingFileSetKind::ExcludedFromContent) {
                return ThreeState::No;
            }
            if kinds.contains(&NonExistingFileSetKind::IncludedContent) {
                return ThreeState::Yes;
            }
            if kinds.contains(&NonExistingFileSetKind::IncludedOther) {
                return ThreeState::No;
            }
            current = candidate.parent();
        }
        ThreeState::Unsure
    }

    /// Calls `visitor` for every registered inclusion, incremental or not.
    pub(crate) fn visit_file_sets(
        &self,
        model: &WorkspaceModel,
        mut visitor: impl FnMut(&Arc<WorkspaceFileSet>),
    ) {
        for (_, sets) in self.storage.file_sets.iter() {
            sets.included().for_each(&mut visitor);
        }
        if let Some(extra) = self.non_incremental_data(model) {
            for (_, sets) in extra.file_sets.iter() {
                sets.included().for_each(&mut visitor);
            }
        }
    }

    /// Visits the files under `root` that belong to a set of an accepted kind.
    ///
    /// Descends through excluded and unregistered directories too, since
    /// inclusions may be nested below them. Returns false if the visitor or
    /// the alternation guard stopped the traversal.
    pub(crate) fn process_content_files(
        &self,
        model: &WorkspaceModel,
        root: FileId,
        accepted_kind_mask: KindMask,
        mut visitor: impl FnMut(FileId) -> bool,
    ) -> bool {
        let vfs = model.vfs();
        let limit = self.config.max_exclusion_alternations;
        let mut stack: Vec<(FileId, Option<bool>, usize)> = vec![(root, None, 0)];

        while let Some((file, parent_included, alternations)) = stack.pop() {
            let info = self.get_file_info(model, file, accepted_kind_mask, true);
            let included = match info {
                WorkspaceFileInternalInfo::Ignored | WorkspaceFileInternalInfo::Invalid => continue,
                ref info => info.is_included(),
            };
            let alternations = match parent_included {
                Some(parent) if parent != included => alternations + 1,
                _ => alternations,
            };
            if alternations > limit {
                log::error!(
                    "Too many excluded/included alternations ({alternations}) at {}; ancestors: {:?}",
                    vfs.url_of(file)
                        .map_or_else(|| format!("{file:?}"), |url| url.to_string()),
                    ancestor_chain(vfs, root, file)
                );
                return false;
            }
            if included && !visitor(file) {
                return false;
            }
            if vfs.is_directory(file) {
                for &child in vfs.children(file).iter().rev() {
                    stack.push((child, Some(included), alternations));
                }
            }
        }
        true
    }
}

fn ancestor_chain<'v>(vfs: &'v VirtualFileSystem, root: FileId, file: FileId) -> Vec<&'v str> {
    let mut chain = Vec::new();
    let mut current = Some(file);
    while let Some(id) = current {
        chain.push(vfs.name(id).unwrap_or("?"));
        if id == root {
            break;
        }
        current = vfs.parent(id);
    }
    chain.reverse();
    chain
}
