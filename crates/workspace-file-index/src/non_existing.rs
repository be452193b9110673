//! Placeholders for registrations whose root does not exist yet.
//!
//! Contributors routinely register roots that are not on disk (a source root
//! that has not been created, a library jar that is still downloading). Such
//! registrations are kept here keyed by URL so that the VFS reconciler can find
//! their owners when the file appears, and so `is_url_in_content` can answer
//! for paths that do not exist.
//!
//! URLs are kept in a `BTreeMap`: every descendant of a URL sorts directly
//! after it, which turns "everything registered under this directory" into a
//! range scan.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use thin_vec::ThinVec;

use crate::entity::EntityPointer;
use crate::kind::EntityStorageKind;
use crate::vfs::VirtualFileUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NonExistingFileSetKind {
    IncludedContent,
    IncludedOther,
    ExcludedFromContent,
    ExcludedOther,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonExistingRegistration {
    pub owner: EntityPointer,
    pub storage_kind: EntityStorageKind,
    pub kind: NonExistingFileSetKind,
}

#[derive(Debug, Default)]
pub struct NonExistingRootsRegistry {
    roots: BTreeMap<VirtualFileUrl, ThinVec<NonExistingRegistration>>,
}

impl NonExistingRootsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct URLs with registrations.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Records a registration; registering the same one twice is a no-op.
    pub fn register_url(
        &mut self,
        url: VirtualFileUrl,
        owner: EntityPointer,
        storage_kind: EntityStorageKind,
        kind: NonExistingFileSetKind,
    ) {
        let registration = NonExistingRegistration {
            owner,
            storage_kind,
            kind,
        };
        let registrations = self.roots.entry(url).or_default();
        if !registrations.contains(&registration) {
            registrations.push(registration);
        }
    }

    /// Removes every registration of `owner` at `url`.
    pub fn unregister_url(
        &mut self,
        url: &VirtualFileUrl,
        owner: EntityPointer,
        storage_kind: EntityStorageKind,
    ) {
        let Some(registrations) = self.roots.get_mut(url) else {
            return;
        };
        registrations
            .retain(|registration| registration.owner != owner || registration.storage_kind != storage_kind);
        if registrations.is_empty() {
            self.roots.remove(url);
        }
    }

    pub fn get(&self, url: &VirtualFileUrl) -> &[NonExistingRegistration] {
        self.roots.get(url).map_or(&[][..], |registrations| registrations.as_slice())
    }

    /// Kinds registered exactly at `url`.
    pub fn get_file_set_kinds_for(&self, url: &VirtualFileUrl) -> BTreeSet<NonExistingFileSetKind> {
        self.get(url)
            .iter()
            .map(|registration| registration.kind)
            .collect()
    }

    /// Registrations at `url` or at any URL below it.
    pub fn registrations_under<'a>(
        &'a self,
        url: &'a VirtualFileUrl,
    ) -> impl Iterator<Item = (&'a VirtualFileUrl, &'a NonExistingRegistration)> + 'a {
        self.roots
            .range((Bound::Included(url), Bound::Unbounded))
            .take_while(move |(candidate, _)| candidate.as_str().starts_with(url.as_str()))
            .filter(move |(candidate, _)| url.is_equal_or_ancestor_of(candidate))
            .flat_map(|(candidate, registrations)| {
                registrations
                    .iter()
                    .map(move |registration| (candidate, registration))
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VirtualFileUrl, &NonExistingRegistration)> {
        self.roots.iter().flat_map(|(url, registrations)| {
            registrations
                .iter()
                .map(move |registration| (url, registration))
        })
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }
}
