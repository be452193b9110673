//! Entities and file identities awaiting recomputation within a write action.

use std::collections::BTreeSet;
use std::mem;

use crate::entity::EntityPointer;
use crate::vfs::VirtualFileUrl;

#[derive(Debug, Default)]
pub struct DirtyEntities {
    entities: BTreeSet<EntityPointer>,
    files: BTreeSet<VirtualFileUrl>,
}

impl DirtyEntities {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.files.is_empty()
    }

    pub fn mark(
        &mut self,
        entities: impl IntoIterator<Item = EntityPointer>,
        files: impl IntoIterator<Item = VirtualFileUrl>,
    ) {
        self.entities.extend(entities);
        self.files.extend(files);
    }

    /// Empties the buffer, returning what was in it.
    pub fn take(&mut self) -> (BTreeSet<EntityPointer>, BTreeSet<VirtualFileUrl>) {
        (mem::take(&mut self.entities), mem::take(&mut self.files))
    }
}
