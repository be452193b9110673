//! File id keyed storage of stored-set collections.

use std::mem;

use fnv::FnvHashMap;

use super::collection::StoredFileSetCollection;
use super::model::StoredFileSet;
use crate::vfs::FileId;

#[derive(Debug, Default)]
pub struct FileSetStore {
    sets: FnvHashMap<FileId, StoredFileSetCollection>,
}

impl FileSetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files with at least one registration.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    #[inline]
    pub fn get(&self, file: FileId) -> Option<&StoredFileSetCollection> {
        self.sets.get(&file)
    }

    pub fn contains(&self, file: FileId) -> bool {
        self.sets.contains_key(&file)
    }

    /// Stores `set` at its root.
    ///
    /// An inclusion replaces any inclusion already stored there for the same
    /// (owner, storage kind); the replaced sets are returned.
    pub fn add(&mut self, set: StoredFileSet) -> Vec<StoredFileSet> {
        let root = set.root();
        let mut replaced = Vec::new();
        let current = self.sets.remove(&root).unwrap_or_default();
        let current = if set.is_excluded() {
            Some(current)
        } else {
            let owner = set.owner();
            let storage_kind = set.storage_kind();
            current.remove_if(|stored| {
                let duplicate = !stored.is_excluded()
                    && stored.owner() == owner
                    && stored.storage_kind() == storage_kind;
                if duplicate {
                    replaced.push(stored.clone());
                }
                duplicate
            })
        };
        self.sets
            .insert(root, current.unwrap_or_default().add(set));
        replaced
    }

    /// Removes the sets stored at `file` matching `predicate`, deleting the
    /// mapping when nothing is left. Returns the removed sets.
    pub fn remove_matching(
        &mut self,
        file: FileId,
        mut predicate: impl FnMut(&StoredFileSet) -> bool,
    ) -> Vec<StoredFileSet> {
        let Some(current) = self.sets.remove(&file) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        let remaining = current.remove_if(|stored| {
            let matches = predicate(stored);
            if matches {
                removed.push(stored.clone());
            }
            matches
        });
        if let Some(remaining) = remaining {
            self.sets.insert(file, remaining);
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &StoredFileSetCollection)> {
        self.sets.iter().map(|(file, sets)| (*file, sets))
    }

    /// Takes every registration out, leaving the store empty.
    pub fn take(&mut self) -> FnvHashMap<FileId, StoredFileSetCollection> {
        mem::take(&mut self.sets)
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}
