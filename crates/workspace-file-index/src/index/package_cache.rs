//! Memoized package directory lookups.

use std::sync::Arc;

use fnv::FnvHashMap;
use parking_lot::Mutex;

use crate::vfs::FileId;

/// Caches package name to directory and package name to file lookups.
///
/// Filled lazily by queries under the host read lock and dropped whenever the
/// registrations or the file tree change. Computation runs outside the lock;
/// concurrent misses may compute the same entry twice, and the later insert
/// wins with an equal value.
#[derive(Debug, Default)]
pub struct PackageDirectoryCache {
    directories: Mutex<FnvHashMap<(String, bool), Arc<[FileId]>>>,
    files: Mutex<FnvHashMap<String, Arc<[FileId]>>>,
}

impl PackageDirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directories(
        &self,
        package_name: &str,
        include_library_sources: bool,
        compute: impl FnOnce() -> Vec<FileId>,
    ) -> Arc<[FileId]> {
        let key = (package_name.to_owned(), include_library_sources);
        if let Some(cached) = self.directories.lock().get(&key) {
            return Arc::clone(cached);
        }
        let computed: Arc<[FileId]> = compute().into();
        self.directories.lock().insert(key, Arc::clone(&computed));
        computed
    }

    pub fn files(&self, package_name: &str, compute: impl FnOnce() -> Vec<FileId>) -> Arc<[FileId]> {
        if let Some(cached) = self.files.lock().get(package_name) {
            return Arc::clone(cached);
        }
        let computed: Arc<[FileId]> = compute().into();
        self.files
            .lock()
            .insert(package_name.to_owned(), Arc::clone(&computed));
        computed
    }

    pub fn clear(&self) {
        self.directories.lock().clear();
        self.files.lock().clear();
    }

    pub fn on_low_memory(&self) {
        let dropped = self.directories.lock().len() + self.files.lock().len();
        self.clear();
        log::debug!("Dropped {dropped} cached package lookups on low memory");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_once_until_cleared() {
        let cache = PackageDirectoryCache::new();
        let mut calls = 0;
        let first = cache.directories("a.b", false, || {
            calls += 1;
            vec![FileId::new(3)]
        });
        let second = cache.directories("a.b", false, || {
            calls += 1;
            Vec::new()
        });
        assert_eq!(calls, 1);
        assert_eq!(&*first, &*second);

        cache.directories("a.b", true, || {
            calls += 1;
            Vec::new()
        });
        assert_eq!(calls, 2);

        cache.clear();
        let recomputed = cache.directories("a.b", false, || {
            calls += 1;
            Vec::new()
        });
        assert_eq!(calls, 3);
        assert!(recomputed.is_empty());
    }

    #[test]
    fn file_lookups_are_cached_separately() {
        let cache = PackageDirectoryCache::new();
        cache.directories("p", false, || vec![FileId::new(1)]);
        let files = cache.files("p", || vec![FileId::new(2), FileId::new(4)]);
        assert_eq!(files.len(), 2);

        cache.on_low_memory();
        let files = cache.files("p", Vec::new);
        assert!(files.is_empty());
    }
}
