//! In-memory virtual file system the index resolves roots against.
//!
//! Every question the index asks about files (existence, parent, name, depth)
//! is answered from this tree without touching the disk. The host mirrors the
//! real file system into it and reports every change as a batch of
//! [`VfsEvent`]s, so the index can reconcile before and after the batch lands.
//!
//! ## Module Structure
//!
//! - `url` - `VirtualFileUrl`, the snapshot-independent file address
//! - `slab` - append-only node storage and `FileId`
//! - `namepool` - file name interning
//! - `events` - `VfsEvent` and batch coalescing

mod events;
mod namepool;
mod slab;
mod url;

pub use events::{coalesce_urls, VfsEvent};
pub use namepool::NamePool;
pub use slab::{FileId, FileSlab};
pub use url::{
    is_archive_name, VirtualFileUrl, ARCHIVE_EXTENSIONS, ARCHIVE_SCHEME, ARCHIVE_SEPARATOR,
    FILE_SCHEME,
};

use std::fmt;
use std::sync::Arc;

use fnv::FnvHashMap;
use thin_vec::ThinVec;

use crate::error::{Result, WorkspaceIndexError};

#[derive(Debug)]
struct VfsNode {
    name: Arc<str>,
    parent: Option<FileId>,
    is_directory: bool,
    children: ThinVec<FileId>,
    /// For archive roots: the local archive file the root was opened from.
    archive_file: Option<FileId>,
}

#[derive(Debug)]
pub struct VirtualFileSystem {
    nodes: FileSlab<VfsNode>,
    local_root: FileId,
    /// Local archive file -> root node of its contents.
    archive_roots: FnvHashMap<FileId, FileId>,
    names: NamePool,
    modification_count: u64,
}

impl Default for VirtualFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        let mut names = NamePool::new();
        let mut nodes = FileSlab::new();
        let local_root = nodes.insert(VfsNode {
            name: names.intern(""),
            parent: None,
            is_directory: true,
            children: ThinVec::new(),
            archive_file: None,
        });
        Self {
            nodes,
            local_root,
            archive_roots: FnvHashMap::default(),
            names,
            modification_count: 0,
        }
    }

    #[inline]
    pub fn local_root(&self) -> FileId {
        self.local_root
    }

    /// Number of live files, archive roots included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// One past the highest file id ever handed out.
    pub fn id_bound(&self) -> usize {
        self.nodes.id_bound()
    }

    pub fn modification_count(&self) -> u64 {
        self.modification_count
    }

    #[inline]
    pub fn is_valid(&self, id: FileId) -> bool {
        self.nodes.contains(id)
    }

    pub fn name(&self, id: FileId) -> Option<&str> {
        self.nodes.get(id).map(|node| &*node.name)
    }

    #[inline]
    pub fn parent(&self, id: FileId) -> Option<FileId> {
        self.nodes.get(id)?.parent
    }

    pub fn is_directory(&self, id: FileId) -> bool {
        self.nodes.get(id).is_some_and(|node| node.is_directory)
    }

    pub fn children(&self, id: FileId) -> &[FileId] {
        self.nodes
            .get(id)
            .map_or(&[][..], |node| node.children.as_slice())
    }

    pub fn find_child(&self, id: FileId, name: &str) -> Option<FileId> {
        self.nodes
            .get(id)?
            .children
            .iter()
            .copied()
            .find(|&child| self.name(child) == Some(name))
    }

    /// Number of ancestors of `id`; roots have depth 0.
    pub fn depth(&self, id: FileId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    pub fn is_archive_root(&self, id: FileId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| node.archive_file.is_some())
    }

    /// Returns the root of the contents of the local archive `archive_file`.
    pub fn archive_root_for(&self, archive_file: FileId) -> Option<FileId> {
        self.archive_roots.get(&archive_file).copied()
    }

    /// Returns the local archive an archive root was opened from.
    pub fn archive_file_for(&self, archive_root: FileId) -> Option<FileId> {
        self.nodes.get(archive_root)?.archive_file
    }

    /// Returns the parentless ancestor of `id` (the local root or an archive root).
    pub fn top_root(&self, id: FileId) -> Option<FileId> {
        let mut current = id;
        self.nodes.get(current)?;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        Some(current)
    }

    pub fn is_in_archive(&self, id: FileId) -> bool {
        self.top_root(id)
            .is_some_and(|root| self.is_archive_root(root))
    }

    /// Returns true if `ancestor` is `file` or one of its parents.
    pub fn is_ancestor_or_self(&self, ancestor: FileId, file: FileId) -> bool {
        let mut current = Some(file);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Returns the names leading from `ancestor` (exclusive) down to `file`.
    pub fn relative_path(&self, ancestor: FileId, file: FileId) -> Option<Vec<&str>> {
        let mut names = Vec::new();
        let mut current = file;
        while current != ancestor {
            names.push(self.name(current)?);
            current = self.parent(current)?;
        }
        names.reverse();
        Some(names)
    }

    pub fn find_file_by_url(&self, url: &VirtualFileUrl) -> Option<FileId> {
        match url.archive_split() {
            Some((archive_path, inner)) => {
                let archive = self.find_relative(self.local_root, archive_path)?;
                let root = self.archive_root_for(archive)?;
                self.find_relative(root, inner)
            }
            None if url.is_archive() => None,
            None => self.find_relative(self.local_root, url.path()),
        }
    }

    pub fn find_file_by_path(&self, path: &str) -> Option<FileId> {
        self.find_relative(self.local_root, path)
    }

    /// Follows the slash separated `relative` path down from `from`.
    pub fn find_relative(&self, from: FileId, relative: &str) -> Option<FileId> {
        relative
            .split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(from, |current, segment| self.find_child(current, segment))
    }

    /// Computes the URL of a live file.
    pub fn url_of(&self, id: FileId) -> Option<VirtualFileUrl> {
        let mut names = Vec::new();
        let mut current = id;
        loop {
            let node = self.nodes.get(current)?;
            match node.parent {
                Some(parent) => {
                    names.push(&*node.name);
                    current = parent;
                }
                None => break,
            }
        }
        names.reverse();
        let relative = names.join("/");

        let top = self.nodes.get(current)?;
        match top.archive_file {
            Some(archive) => {
                let archive_url = self.url_of(archive)?;
                Some(VirtualFileUrl::archive_root(archive_url.path()).join(&relative))
            }
            None if current == self.local_root => Some(VirtualFileUrl::from_path(&relative)),
            None => None,
        }
    }

    /// Archive roots of the archives in `dir` (its whole subtree if `recursive`).
    pub fn archives_in(&self, dir: FileId, recursive: bool) -> Vec<FileId> {
        let mut roots = Vec::new();
        if !recursive {
            roots.extend(
                self.children(dir)
                    .iter()
                    .filter_map(|&child| self.archive_root_for(child)),
            );
            return roots;
        }
        let mut stack = vec![dir];
        while let Some(current) = stack.pop() {
            for &child in self.children(current) {
                if let Some(root) = self.archive_root_for(child) {
                    roots.push(root);
                } else if self.is_directory(child) {
                    stack.push(child);
                }
            }
        }
        roots
    }

    pub fn file(&self, id: FileId) -> VirtualFileRef<'_> {
        VirtualFileRef { vfs: self, id }
    }

    /// Calls `visitor` for `id` and every file below it, archive contents included.
    pub fn visit_subtree(&self, id: FileId, mut visitor: impl FnMut(FileId)) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.is_valid(current) {
                continue;
            }
            visitor(current);
            stack.extend(self.children(current).iter().rev().copied());
            if let Some(root) = self.archive_root_for(current) {
                stack.push(root);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Setup helpers
    // -------------------------------------------------------------------------

    /// Creates a directory and any missing parents; existing directories are reused.
    pub fn create_directory(&mut self, url: &VirtualFileUrl) -> Result<FileId> {
        if let Some(existing) = self.find_file_by_url(url) {
            return if self.is_directory(existing) {
                Ok(existing)
            } else {
                Err(WorkspaceIndexError::NotADirectory(url.clone()))
            };
        }
        let parent_url = url
            .parent()
            .ok_or_else(|| WorkspaceIndexError::FileNotFound(url.clone()))?;
        let parent = self.create_directory(&parent_url)?;
        self.create_child(parent, url.file_name(), true)
    }

    /// Creates a regular file, creating missing parent directories.
    pub fn create_file(&mut self, url: &VirtualFileUrl) -> Result<FileId> {
        let parent_url = url
            .parent()
            .ok_or_else(|| WorkspaceIndexError::FileExists(url.clone()))?;
        let parent = self.create_directory(&parent_url)?;
        self.create_child(parent, url.file_name(), false)
    }

    // -------------------------------------------------------------------------
    // Event application
    // -------------------------------------------------------------------------

    pub fn apply_events(&mut self, events: &[VfsEvent]) -> Result<()> {
        for event in events {
            self.apply_event(event)?;
        }
        Ok(())
    }

    pub fn apply_event(&mut self, event: &VfsEvent) -> Result<()> {
        match event {
            VfsEvent::Create { url, is_directory } => {
                let parent_url = url
                    .parent()
                    .ok_or_else(|| WorkspaceIndexError::FileExists(url.clone()))?;
                let parent = self.require(&parent_url)?;
                self.create_child(parent, url.file_name(), *is_directory)?;
            }
            VfsEvent::Delete { url } => {
                let id = self.require(url)?;
                if self.parent(id).is_none() {
                    return Err(WorkspaceIndexError::Internal(format!(
                        "cannot delete root {url}"
                    )));
                }
                self.remove_subtree(id);
            }
            VfsEvent::Rename { url, new_name } => {
                let id = self.require(url)?;
                self.rename(id, url, new_name)?;
            }
            VfsEvent::Move { url, new_parent } => {
                let id = self.require(url)?;
                let target = self.require_directory(new_parent)?;
                self.move_file(id, url, target)?;
            }
            VfsEvent::Copy {
                url,
                new_parent,
                new_name,
            } => {
                let id = self.require(url)?;
                let target = self.require_directory(new_parent)?;
                if self.is_ancestor_or_self(id, target) {
                    return Err(WorkspaceIndexError::Internal(format!(
                        "cannot copy {url} into itself"
                    )));
                }
                self.copy_subtree(id, target, new_name)?;
            }
        }
        self.modification_count += 1;
        Ok(())
    }

    fn require(&self, url: &VirtualFileUrl) -> Result<FileId> {
        self.find_file_by_url(url)
            .ok_or_else(|| WorkspaceIndexError::FileNotFound(url.clone()))
    }

    fn require_directory(&self, url: &VirtualFileUrl) -> Result<FileId> {
        let id = self.require(url)?;
        if !self.is_directory(id) {
            return Err(WorkspaceIndexError::NotADirectory(url.clone()));
        }
        Ok(id)
    }

    fn child_url(&self, parent: FileId, name: &str) -> VirtualFileUrl {
        self.url_of(parent)
            .map(|url| url.join(name))
            .unwrap_or_else(|| VirtualFileUrl::from_path(name))
    }

    fn create_child(&mut self, parent: FileId, name: &str, is_directory: bool) -> Result<FileId> {
        if !self.is_directory(parent) {
            let url = self.child_url(parent, name);
            return Err(WorkspaceIndexError::NotADirectory(
                url.parent().unwrap_or(url),
            ));
        }
        if name.is_empty() || name.contains('/') {
            return Err(WorkspaceIndexError::InvalidUrl(name.to_string()));
        }
        if self.find_child(parent, name).is_some() {
            return Err(WorkspaceIndexError::FileExists(self.child_url(parent, name)));
        }

        let interned = self.names.intern(name);
        let id = self.nodes.insert(VfsNode {
            name: Arc::clone(&interned),
            parent: Some(parent),
            is_directory,
            children: ThinVec::new(),
            archive_file: None,
        });
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(id);
        }

        if !is_directory && is_archive_name(name) && !self.is_in_archive(parent) {
            self.open_archive(id, interned);
        }
        self.modification_count += 1;
        Ok(id)
    }

    fn open_archive(&mut self, archive_file: FileId, name: Arc<str>) {
        let root = self.nodes.insert(VfsNode {
            name,
            parent: None,
            is_directory: true,
            children: ThinVec::new(),
            archive_file: Some(archive_file),
        });
        self.archive_roots.insert(archive_file, root);
    }

    fn remove_subtree(&mut self, id: FileId) {
        let Some(node) = self.nodes.try_remove(id) else {
            return;
        };
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|child| *child != id);
            }
        }
        if let Some(archive) = node.archive_file {
            self.archive_roots.remove(&archive);
        }
        if let Some(root) = self.archive_roots.remove(&id) {
            self.remove_subtree(root);
        }
        for child in node.children {
            self.remove_subtree(child);
        }
    }

    fn rename(&mut self, id: FileId, url: &VirtualFileUrl, new_name: &str) -> Result<()> {
        let parent = self
            .parent(id)
            .ok_or_else(|| WorkspaceIndexError::Internal(format!("cannot rename root {url}")))?;
        if new_name.is_empty() || new_name.contains('/') {
            return Err(WorkspaceIndexError::InvalidUrl(new_name.to_string()));
        }
        if self.find_child(parent, new_name).is_some() {
            return Err(WorkspaceIndexError::FileExists(self.child_url(parent, new_name)));
        }

        let interned = self.names.intern(new_name);
        let was_archive = self.archive_roots.contains_key(&id);
        let becomes_archive =
            !self.is_directory(id) && is_archive_name(new_name) && !self.is_in_archive(parent);
        if let Some(node) = self.nodes.get_mut(id) {
            node.name = Arc::clone(&interned);
        }
        match (was_archive, becomes_archive) {
            (true, false) => {
                if let Some(root) = self.archive_roots.remove(&id) {
                    self.remove_subtree(root);
                }
            }
            (false, true) => self.open_archive(id, interned),
            (true, true) => {
                if let Some(root) = self.archive_roots.get(&id).copied() {
                    if let Some(root_node) = self.nodes.get_mut(root) {
                        root_node.name = interned;
                    }
                }
            }
            (false, false) => {}
        }
        Ok(())
    }

    fn move_file(&mut self, id: FileId, url: &VirtualFileUrl, target: FileId) -> Result<()> {
        let old_parent = self
            .parent(id)
            .ok_or_else(|| WorkspaceIndexError::Internal(format!("cannot move root {url}")))?;
        if self.is_ancestor_or_self(id, target) {
            return Err(WorkspaceIndexError::Internal(format!(
                "cannot move {url} into itself"
            )));
        }
        if self.top_root(old_parent) != self.top_root(target) {
            return Err(WorkspaceIndexError::Internal(format!(
                "cannot move {url} across archive boundaries"
            )));
        }
        let name = url.file_name();
        if self.find_child(target, name).is_some() {
            return Err(WorkspaceIndexError::FileExists(self.child_url(target, name)));
        }

        if let Some(parent_node) = self.nodes.get_mut(old_parent) {
            parent_node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.parent = Some(target);
        }
        if let Some(target_node) = self.nodes.get_mut(target) {
            target_node.children.push(id);
        }
        Ok(())
    }

    fn copy_subtree(&mut self, source: FileId, new_parent: FileId, name: &str) -> Result<FileId> {
        let copy = self.create_child(new_parent, name, self.is_directory(source))?;

        let children: Vec<(FileId, Arc<str>)> = self
            .children(source)
            .iter()
            .filter_map(|&child| Some((child, Arc::clone(&self.nodes.get(child)?.name))))
            .collect();
        for (child, child_name) in children {
            self.copy_subtree(child, copy, &child_name)?;
        }

        if let (Some(source_root), Some(copy_root)) =
            (self.archive_root_for(source), self.archive_root_for(copy))
        {
            let entries: Vec<(FileId, Arc<str>)> = self
                .children(source_root)
                .iter()
                .filter_map(|&child| Some((child, Arc::clone(&self.nodes.get(child)?.name))))
                .collect();
            for (entry, entry_name) in entries {
                self.copy_subtree(entry, copy_root, &entry_name)?;
            }
        }
        Ok(copy)
    }
}

/// A borrowed handle to one file of the virtual file system.
#[derive(Clone, Copy)]
pub struct VirtualFileRef<'a> {
    vfs: &'a VirtualFileSystem,
    id: FileId,
}

impl<'a> VirtualFileRef<'a> {
    #[inline]
    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.vfs.name(self.id).unwrap_or("")
    }

    pub fn is_directory(&self) -> bool {
        self.vfs.is_directory(self.id)
    }

    pub fn is_valid(&self) -> bool {
        self.vfs.is_valid(self.id)
    }

    pub fn parent(&self) -> Option<VirtualFileRef<'a>> {
        self.vfs.parent(self.id).map(|id| self.vfs.file(id))
    }

    pub fn url(&self) -> Option<VirtualFileUrl> {
        self.vfs.url_of(self.id)
    }

    pub fn vfs(&self) -> &'a VirtualFileSystem {
        self.vfs
    }
}

impl fmt::Debug for VirtualFileRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFileRef")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}
