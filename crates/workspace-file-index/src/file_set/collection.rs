//! Size-specialized per-file collection of stored file sets.
//!
//! Almost every registered file carries one set, a few carry two, and only
//! shared roots carry more. The collection is therefore a tagged variant that
//! is promoted and demoted between `Empty`, `Single`, `Pair` and `Many` as sets
//! come and go, keeping the common case allocation-free beyond the set itself.
//!
//! Exclusions always come before inclusions. `compute_masks` relies on this:
//! by the time an inclusion is tested, every exclusion stored at the same file
//! has already narrowed the accepted mask.

use std::sync::Arc;

use thin_vec::ThinVec;

use super::model::{StoredFileSet, WorkspaceFileSet};
use crate::kind::KindMask;
use crate::vfs::{FileId, VirtualFileSystem};

/// Result of folding one file's collection into a running query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSetMasks {
    /// Accepted kinds after this file's exclusions were applied.
    pub accepted_kind_mask: KindMask,
    /// Kinds of the inclusions at this file that classify the queried file.
    pub result_kind_mask: KindMask,
}

#[derive(Debug, Clone, Default)]
pub enum StoredFileSetCollection {
    #[default]
    Empty,
    Single(StoredFileSet),
    Pair(StoredFileSet, StoredFileSet),
    Many(ThinVec<StoredFileSet>),
}

impl StoredFileSetCollection {
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Single(_) => 1,
            Self::Pair(..) => 2,
            Self::Many(sets) => sets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the collection with `set` added in exclusion-first order.
    pub fn add(self, set: StoredFileSet) -> Self {
        match self {
            Self::Empty => Self::Single(set),
            Self::Single(first) => {
                if set.is_excluded() && !first.is_excluded() {
                    Self::Pair(set, first)
                } else {
                    Self::Pair(first, set)
                }
            }
            Self::Pair(first, second) => {
                let mut sets = ThinVec::with_capacity(3);
                sets.push(first);
                sets.push(second);
                insert_ordered(&mut sets, set);
                Self::Many(sets)
            }
            Self::Many(mut sets) => {
                insert_ordered(&mut sets, set);
                Self::Many(sets)
            }
        }
    }

    /// Drops every set matching `predicate`.
    ///
    /// Returns `None` when nothing is left, meaning the file's mapping should
    /// be deleted.
    pub fn remove_if(self, mut predicate: impl FnMut(&StoredFileSet) -> bool) -> Option<Self> {
        let remaining: ThinVec<StoredFileSet> = match self {
            Self::Empty => return None,
            Self::Single(set) => {
                return if predicate(&set) {
                    None
                } else {
                    Some(Self::Single(set))
                };
            }
            Self::Pair(first, second) => {
                return match (predicate(&first), predicate(&second)) {
                    (true, true) => None,
                    (true, false) => Some(Self::Single(second)),
                    (false, true) => Some(Self::Single(first)),
                    (false, false) => Some(Self::Pair(first, second)),
                };
            }
            Self::Many(sets) => sets.into_iter().filter(|set| !predicate(set)).collect(),
        };
        Self::from_ordered(remaining)
    }

    fn from_ordered(mut sets: ThinVec<StoredFileSet>) -> Option<Self> {
        match sets.len() {
            0 => None,
            1 => sets.pop().map(Self::Single),
            2 => {
                let second = sets.pop()?;
                let first = sets.pop()?;
                Some(Self::Pair(first, second))
            }
            _ => Some(Self::Many(sets)),
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        match self {
            Self::Empty => Iter::new([None, None], &[]),
            Self::Single(set) => Iter::new([Some(set), None], &[]),
            Self::Pair(first, second) => Iter::new([Some(first), Some(second)], &[]),
            Self::Many(sets) => Iter::new([None, None], sets.as_slice()),
        }
    }

    pub fn for_each(&self, mut visitor: impl FnMut(&StoredFileSet)) {
        for set in self.iter() {
            visitor(set);
        }
    }

    /// Inclusions stored here, exclusions skipped.
    pub fn included(&self) -> impl Iterator<Item = &Arc<WorkspaceFileSet>> {
        self.iter().filter_map(StoredFileSet::as_included)
    }

    /// Folds the stored sets, in order, into the running query masks.
    ///
    /// `current` is the file this collection is stored at and `queried` the
    /// file the query started from. Exclusions only clear bits of the
    /// accepted mask and are skipped entirely unless `honor_exclusion` is set;
    /// an inclusion contributes its kind if that kind is still accepted and
    /// the set is recursive or stored at the queried file itself.
    pub fn compute_masks(
        &self,
        accepted_kind_mask: KindMask,
        honor_exclusion: bool,
        vfs: &VirtualFileSystem,
        current: FileId,
        queried: FileId,
    ) -> FileSetMasks {
        let mut accepted = accepted_kind_mask;
        let mut result = KindMask::empty();
        for set in self.iter() {
            match set {
                StoredFileSet::Excluded(excluded) => {
                    if honor_exclusion
                        && accepted.intersects(excluded.excluded_mask())
                        && excluded.is_excluded(vfs, queried)
                    {
                        accepted.remove(excluded.excluded_mask());
                    }
                }
                StoredFileSet::Included(included) => {
                    let kind = included.kind().mask();
                    if accepted.contains(kind) && included.applies_to(current, queried) {
                        result.insert(kind);
                    }
                }
            }
        }
        FileSetMasks {
            accepted_kind_mask: accepted,
            result_kind_mask: result,
        }
    }

    /// Inclusions that classify `queried` under the narrowed `accepted` mask.
    pub fn matching_inclusions(
        &self,
        accepted: KindMask,
        current: FileId,
        queried: FileId,
    ) -> impl Iterator<Item = &Arc<WorkspaceFileSet>> {
        self.included().filter(move |set| {
            accepted.contains(set.kind().mask()) && set.applies_to(current, queried)
        })
    }
}

fn insert_ordered(sets: &mut ThinVec<StoredFileSet>, set: StoredFileSet) {
    if set.is_excluded() {
        let position = sets.iter().take_while(|stored| stored.is_excluded()).count();
        sets.insert(position, set);
    } else {
        sets.push(set);
    }
}

/// Borrowing iterator over a collection's sets, in stored order.
pub struct Iter<'a> {
    inline: [Option<&'a StoredFileSet>; 2],
    rest: std::slice::Iter<'a, StoredFileSet>,
}

impl<'a> Iter<'a> {
    fn new(inline: [Option<&'a StoredFileSet>; 2], rest: &'a [StoredFileSet]) -> Self {
        Self {
            inline,
            rest: rest.iter(),
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a StoredFileSet;

    fn next(&mut self) -> Option<Self::Item> {
        for slot in &mut self.inline {
            if let Some(set) = slot.take() {
                return Some(set);
            }
        }
        self.rest.next()
    }
}
