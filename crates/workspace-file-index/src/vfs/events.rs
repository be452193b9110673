//! File system change events and batch helpers.

use std::collections::HashSet;

use super::url::VirtualFileUrl;

/// A single change to the virtual file system, described before it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VfsEvent {
    Create {
        url: VirtualFileUrl,
        is_directory: bool,
    },
    Delete {
        url: VirtualFileUrl,
    },
    Rename {
        url: VirtualFileUrl,
        new_name: String,
    },
    Move {
        url: VirtualFileUrl,
        new_parent: VirtualFileUrl,
    },
    Copy {
        url: VirtualFileUrl,
        new_parent: VirtualFileUrl,
        new_name: String,
    },
}

impl VfsEvent {
    pub fn create_file(url: VirtualFileUrl) -> Self {
        Self::Create {
            url,
            is_directory: false,
        }
    }

    pub fn create_directory(url: VirtualFileUrl) -> Self {
        Self::Create {
            url,
            is_directory: true,
        }
    }

    pub fn delete(url: VirtualFileUrl) -> Self {
        Self::Delete { url }
    }

    /// The file the event acts on, as it is named before the event.
    pub fn url(&self) -> &VirtualFileUrl {
        match self {
            Self::Create { url, .. }
            | Self::Delete { url }
            | Self::Rename { url, .. }
            | Self::Move { url, .. }
            | Self::Copy { url, .. } => url,
        }
    }

    /// Returns the URL a file disappears from, if the event removes one.
    pub fn old_url(&self) -> Option<&VirtualFileUrl> {
        match self {
            Self::Delete { url } | Self::Rename { url, .. } | Self::Move { url, .. } => Some(url),
            Self::Create { .. } | Self::Copy { .. } => None,
        }
    }

    /// Returns the URL a file appears at, if the event creates one.
    pub fn new_url(&self) -> Option<VirtualFileUrl> {
        match self {
            Self::Create { url, .. } => Some(url.clone()),
            Self::Delete { .. } => None,
            Self::Rename { url, new_name } => url.parent().map(|parent| parent.join(new_name)),
            Self::Move { url, new_parent } => Some(new_parent.join(url.file_name())),
            Self::Copy {
                new_parent,
                new_name,
                ..
            } => Some(new_parent.join(new_name)),
        }
    }

    /// Returns true when the created file is known to be a directory.
    pub fn creates_directory(&self) -> bool {
        matches!(
            self,
            Self::Create {
                is_directory: true,
                ..
            }
        )
    }
}

/// Computes the minimal set of URLs whose subtrees cover every URL of the batch.
///
/// URLs are sorted by depth (shallowest first) so that an ancestor is always
/// selected before its descendants; each candidate then walks its own parent
/// chain against the selected set, which is O(depth) per URL instead of a
/// scan of everything selected so far.
///
/// ```text
/// Input:  [file:///a/b/c, file:///a/b, file:///a/b/d, file:///x/y]
/// Output: [file:///a/b, file:///x/y]
/// ```
pub fn coalesce_urls(urls: Vec<VirtualFileUrl>) -> Vec<VirtualFileUrl> {
    if urls.len() <= 1 {
        return urls;
    }

    let mut candidates: Vec<(VirtualFileUrl, usize)> = urls
        .into_iter()
        .map(|url| {
            let depth = url_depth(&url);
            (url, depth)
        })
        .collect();

    candidates.sort_unstable_by(|(url_a, depth_a), (url_b, depth_b)| {
        depth_a.cmp(depth_b).then_with(|| url_a.cmp(url_b))
    });
    candidates.dedup_by(|(url_a, _), (url_b, _)| url_a == url_b);

    let mut selected = Vec::with_capacity(candidates.len());
    let mut selected_set = HashSet::with_capacity(candidates.len());

    for (url, _depth) in candidates {
        if has_selected_ancestor(&url, &selected_set) {
            continue;
        }
        selected_set.insert(url.clone());
        selected.push(url);
    }

    selected
}

fn url_depth(url: &VirtualFileUrl) -> usize {
    let mut depth = 0;
    let mut current = url.parent();
    while let Some(parent) = current {
        depth += 1;
        current = parent.parent();
    }
    depth
}

fn has_selected_ancestor(url: &VirtualFileUrl, selected: &HashSet<VirtualFileUrl>) -> bool {
    if selected.is_empty() {
        return false;
    }
    if selected.contains(url) {
        return true;
    }
    let mut current = url.parent();
    while let Some(ancestor) = current {
        if selected.contains(&ancestor) {
            return true;
        }
        current = ancestor.parent();
    }
    false
}
