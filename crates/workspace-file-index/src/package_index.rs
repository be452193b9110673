//! Package prefix -> owner -> file sets, for sets that are package roots.

use std::sync::Arc;

use fnv::FnvHashMap;
use thin_vec::ThinVec;

use crate::entity::EntityPointer;
use crate::file_set::WorkspaceFileSet;

#[derive(Debug, Default)]
pub struct PackagePrefixIndex {
    prefixes: FnvHashMap<String, FnvHashMap<EntityPointer, ThinVec<Arc<WorkspaceFileSet>>>>,
}

impl PackagePrefixIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Indexes `set` if its data carries a package prefix.
    pub fn add(&mut self, set: &Arc<WorkspaceFileSet>) {
        let Some(prefix) = set.data().package_prefix() else {
            return;
        };
        self.prefixes
            .entry(prefix.to_string())
            .or_default()
            .entry(set.owner())
            .or_default()
            .push(Arc::clone(set));
    }

    pub fn remove(&mut self, set: &Arc<WorkspaceFileSet>) {
        let Some(prefix) = set.data().package_prefix() else {
            return;
        };
        let Some(owners) = self.prefixes.get_mut(prefix) else {
            return;
        };
        if let Some(sets) = owners.get_mut(&set.owner()) {
            sets.retain(|stored| !Arc::ptr_eq(stored, set));
            if sets.is_empty() {
                owners.remove(&set.owner());
            }
        }
        if owners.is_empty() {
            self.prefixes.remove(prefix);
        }
    }

    /// File sets registered with exactly `prefix`.
    pub fn sets_with_prefix<'a>(&'a self, prefix: &str) -> impl Iterator<Item = &'a Arc<WorkspaceFileSet>> + 'a {
        self.prefixes
            .get(prefix)
            .into_iter()
            .flat_map(|owners| owners.values().flat_map(|sets| sets.iter()))
    }

    /// File sets whose prefix is `package_name` or one of its dotted parents,
    /// paired with the part of the name below the prefix.
    pub fn sets_for_package<'a>(
        &'a self,
        package_name: &'a str,
    ) -> impl Iterator<Item = (&'a Arc<WorkspaceFileSet>, &'a str)> + 'a {
        package_prefixes(package_name).flat_map(move |(prefix, rest)| {
            self.sets_with_prefix(prefix).map(move |set| (set, rest))
        })
    }

    pub fn clear(&mut self) {
        self.prefixes.clear();
    }
}

/// Splits `name` at every dot: `a.b` yields `("", "a.b")`, `("a", "b")`, `("a.b", "")`.
fn package_prefixes(name: &str) -> impl Iterator<Item = (&str, &str)> {
    let dots = name
        .char_indices()
        .filter(|(_, c)| *c == '.')
        .map(|(index, _)| (&name[..index], &name[index + 1..]));
    let whole = (!name.is_empty()).then_some((name, ""));
    std::iter::once(("", name)).chain(dots).chain(whole)
}
