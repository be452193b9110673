//! Append-only node storage addressed by `FileId`.

use std::ops::Index;

/// A compact 32-bit file identifier.
///
/// Ids are handed out in increasing order and never reused, so an id kept
/// after its file was deleted stays invalid instead of aliasing a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FileId(u32);

impl FileId {
    /// Creates a new FileId from a usize.
    ///
    /// # Panics
    /// Panics if `index >= u32::MAX`.
    #[inline]
    pub fn new(index: usize) -> Self {
        assert!(index < u32::MAX as usize, "file id must be less than u32::MAX");
        Self(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Slot storage whose removed slots are tombstoned, not recycled.
#[derive(Debug)]
pub struct FileSlab<T> {
    entries: Vec<Option<T>>,
    len: usize,
}

impl<T> Default for FileSlab<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FileSlab<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            len: 0,
        }
    }

    /// Inserts a value, returning its id.
    pub fn insert(&mut self, value: T) -> FileId {
        let id = FileId::new(self.entries.len());
        self.entries.push(Some(value));
        self.len += 1;
        id
    }

    pub fn get(&self, id: FileId) -> Option<&T> {
        self.entries.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: FileId) -> Option<&mut T> {
        self.entries.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.get(id).is_some()
    }

    /// Removes the value at `id`, returning it if present.
    pub fn try_remove(&mut self, id: FileId) -> Option<T> {
        let removed = self.entries.get_mut(id.index())?.take();
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns one past the highest id ever handed out.
    pub fn id_bound(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, &T)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| entry.as_ref().map(|value| (FileId::new(index), value)))
    }
}

impl<T> Index<FileId> for FileSlab<T> {
    type Output = T;

    fn index(&self, id: FileId) -> &Self::Output {
        self.get(id).expect("no live entry for file id")
    }
}
