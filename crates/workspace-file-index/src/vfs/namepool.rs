//! Interning pool for file names.
//!
//! Workspaces repeat the same handful of names thousands of times
//! (`src`, `main`, `META-INF`, `module-info.class`); each distinct name is
//! stored once and shared by every node carrying it.

use std::sync::Arc;

use fnv::FnvHashSet;

#[derive(Debug, Default)]
pub struct NamePool {
    names: FnvHashSet<Arc<str>>,
}

impl NamePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared copy of `name`, storing it on first use.
    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(existing) = self.names.get(name) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(name);
        self.names.insert(Arc::clone(&interned));
        interned
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
