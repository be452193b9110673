//! Turning file system events into entity invalidations.
//!
//! Analysis runs against the tree as it is before the events are applied, so
//! the sets rooted in a deleted or moved subtree can still be found. The
//! resulting [`VfsChangeApplier`] is applied in two phases around the actual
//! tree mutation.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::data::WorkspaceFileIndexData;
use super::WorkspaceModel;
use crate::contributor::LegacyRootsChangeListener;
use crate::entity::{EntityPointer, EntityType};
use crate::non_existing::NonExistingRegistration;
use crate::vfs::{coalesce_urls, VfsEvent, VirtualFileSystem, VirtualFileUrl};

/// Invalidations computed from one batch of events.
#[derive(Debug, Default)]
pub struct VfsChangeApplier {
    entities: BTreeSet<EntityPointer>,
    urls_to_invalidate: Vec<VirtualFileUrl>,
    non_existing_to_clean: Vec<(VirtualFileUrl, NonExistingRegistration)>,
}

impl VfsChangeApplier {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.urls_to_invalidate.is_empty()
            && self.non_existing_to_clean.is_empty()
    }

    /// Entities whose registrations the batch may change.
    pub fn affected_entities(&self) -> impl Iterator<Item = EntityPointer> + '_ {
        self.entities.iter().copied()
    }

    /// Marks the affected entities dirty. Readers keep seeing the previous,
    /// consistent registrations until [`after_vfs_change`](Self::after_vfs_change).
    pub(crate) fn before_vfs_change(&self, data: &mut WorkspaceFileIndexData) {
        data.mark_dirty(
            self.entities.iter().copied(),
            self.urls_to_invalidate.iter().cloned(),
        );
    }

    /// Drops stale placeholders, re-registers the dirty entities against the
    /// changed tree and notifies the listeners of affected entity types.
    pub(crate) fn after_vfs_change(
        self,
        data: &mut WorkspaceFileIndexData,
        model: &WorkspaceModel,
        listeners: &[Arc<dyn LegacyRootsChangeListener>],
    ) {
        for (url, registration) in &self.non_existing_to_clean {
            data.storage
                .non_existing
                .unregister_url(url, registration.owner, registration.storage_kind);
        }
        data.update_dirty_entities(model);
        data.structure_changed();

        if listeners.is_empty() || self.entities.is_empty() {
            return;
        }
        let mut by_type: Vec<(EntityType, Vec<EntityPointer>)> = Vec::new();
        for pointer in &self.entities {
            match by_type.last_mut() {
                Some((entity_type, pointers)) if *entity_type == pointer.entity_type() => {
                    pointers.push(*pointer);
                }
                _ => by_type.push((pointer.entity_type(), vec![*pointer])),
            }
        }
        for listener in listeners {
            for (entity_type, pointers) in &by_type {
                if listener.entity_type() == *entity_type {
                    log::debug!(
                        "Notifying {entity_type} roots listener of {} changed entities",
                        pointers.len()
                    );
                    listener.roots_changed(pointers);
                }
            }
        }
    }
}

/// Computes what a batch of events invalidates.
pub(crate) fn analyze_vfs_changes(
    data: &WorkspaceFileIndexData,
    vfs: &VirtualFileSystem,
    events: &[VfsEvent],
) -> VfsChangeApplier {
    let storage = &data.storage;
    let mut applier = VfsChangeApplier::default();

    let mut urls = Vec::new();
    for event in events {
        let source_is_directory = event.creates_directory()
            || vfs
                .find_file_by_url(event.url())
                .is_some_and(|file| vfs.is_directory(file));
        let old = event.old_url();
        let new = event.new_url().filter(|new| Some(new) != old);
        for url in old.cloned().into_iter().chain(new) {
            if source_is_directory || url.has_archive_extension() {
                urls.extend(url.to_archive_url());
            }
            urls.push(url);
        }
    }

    for url in &urls {
        applier
            .entities
            .extend(storage.archive_containers.owners_affected_by(url));
    }

    for root in coalesce_urls(urls) {
        if let Some(file) = vfs.find_file_by_url(&root) {
            vfs.visit_subtree(file, |current| {
                if let Some(sets) = storage.file_sets.get(current) {
                    sets.for_each(|set| {
                        applier.entities.insert(set.owner());
                    });
                }
            });
        }
        for (url, registration) in storage.non_existing.registrations_under(&root) {
            applier.entities.insert(registration.owner);
            applier
                .non_existing_to_clean
                .push((url.clone(), *registration));
        }
        applier.urls_to_invalidate.push(root);
    }

    log::debug!(
        "{} file system events affect {} entities and {} placeholders",
        events.len(),
        applier.entities.len(),
        applier.non_existing_to_clean.len()
    );
    applier
}
