//! Snapshot-independent file addresses.
//!
//! A `VirtualFileUrl` names a file whether or not it currently exists, which is
//! what lets registrations outlive the files they point at. Two schemes are
//! understood:
//!
//! - `file:///abs/path` for files of the local file system
//! - `jar:///abs/archive.jar!/inner/path` for entries inside an archive
//!
//! URLs are normalized on construction (no duplicate or trailing separators), so
//! string equality is URL equality and string ordering keeps every descendant
//! of a URL in one contiguous range after it.

use std::fmt;
use std::sync::Arc;

use memchr::memmem;

use crate::error::{Result, WorkspaceIndexError};

pub const FILE_SCHEME: &str = "file://";
pub const ARCHIVE_SCHEME: &str = "jar://";
pub const ARCHIVE_SEPARATOR: &str = "!/";

/// File extensions opened as archives by the virtual file system.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualFileUrl(Arc<str>);

impl VirtualFileUrl {
    /// Creates a `file://` URL for an absolute local path.
    pub fn from_path(path: &str) -> Self {
        Self(format!("{FILE_SCHEME}{}", normalize_path(path)).into())
    }

    /// Creates the URL of the root inside the archive at `archive_path`.
    pub fn archive_root(archive_path: &str) -> Self {
        Self(
            format!(
                "{ARCHIVE_SCHEME}{}{ARCHIVE_SEPARATOR}",
                normalize_path(archive_path)
            )
            .into(),
        )
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if let Some(path) = raw.strip_prefix(FILE_SCHEME) {
            if !path.starts_with('/') {
                return Err(WorkspaceIndexError::InvalidUrl(raw.to_string()));
            }
            return Ok(Self::from_path(path));
        }

        if let Some(rest) = raw.strip_prefix(ARCHIVE_SCHEME) {
            let Some(pos) = memmem::find(rest.as_bytes(), ARCHIVE_SEPARATOR.as_bytes()) else {
                return Err(WorkspaceIndexError::InvalidUrl(raw.to_string()));
            };
            let archive = &rest[..pos];
            if !archive.starts_with('/') || archive.len() < 2 {
                return Err(WorkspaceIndexError::InvalidUrl(raw.to_string()));
            }
            let inner = &rest[pos + ARCHIVE_SEPARATOR.len()..];
            return Ok(Self::archive_root(archive).join(inner));
        }

        Err(WorkspaceIndexError::InvalidUrl(raw.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for `jar://` URLs.
    #[inline]
    pub fn is_archive(&self) -> bool {
        self.0.starts_with(ARCHIVE_SCHEME)
    }

    /// Returns the URL without its scheme.
    pub fn path(&self) -> &str {
        self.0
            .strip_prefix(FILE_SCHEME)
            .or_else(|| self.0.strip_prefix(ARCHIVE_SCHEME))
            .unwrap_or(&self.0)
    }

    /// Splits an archive URL into the archive's local path and the path inside it.
    pub fn archive_split(&self) -> Option<(&str, &str)> {
        let rest = self.0.strip_prefix(ARCHIVE_SCHEME)?;
        let pos = memmem::find(rest.as_bytes(), ARCHIVE_SEPARATOR.as_bytes())?;
        Some((&rest[..pos], &rest[pos + ARCHIVE_SEPARATOR.len()..]))
    }

    pub fn is_archive_root(&self) -> bool {
        self.archive_split()
            .is_some_and(|(_, inner)| inner.is_empty())
    }

    /// Returns the URL of the containing directory.
    ///
    /// Archive roots and the local root have no parent.
    pub fn parent(&self) -> Option<Self> {
        if let Some((archive, inner)) = self.archive_split() {
            if inner.is_empty() {
                return None;
            }
            return Some(match inner.rfind('/') {
                Some(pos) => Self(
                    format!(
                        "{ARCHIVE_SCHEME}{archive}{ARCHIVE_SEPARATOR}{}",
                        &inner[..pos]
                    )
                    .into(),
                ),
                None => Self::archive_root(archive),
            });
        }

        let scheme = self.scheme();
        let path = self.path();
        if path == "/" {
            return None;
        }
        let pos = path.rfind('/')?;
        let parent = if pos == 0 { "/" } else { &path[..pos] };
        Some(Self(format!("{scheme}{parent}").into()))
    }

    /// Returns the last path segment; for an archive root, the archive's name.
    pub fn file_name(&self) -> &str {
        let path = match self.archive_split() {
            Some((archive, "")) => archive,
            Some((_, inner)) => inner,
            None => self.path(),
        };
        path.rsplit('/').next().unwrap_or("")
    }

    /// Appends `relative` (slash separated) to this URL.
    pub fn join(&self, relative: &str) -> Self {
        let mut joined = String::from(&*self.0);
        for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
            if !joined.ends_with('/') {
                joined.push('/');
            }
            joined.push_str(segment);
        }
        Self(joined.into())
    }

    /// Returns true if `other` is this URL or lies under it.
    pub fn is_equal_or_ancestor_of(&self, other: &VirtualFileUrl) -> bool {
        let this = self.as_str();
        let Some(rest) = other.as_str().strip_prefix(this) else {
            return false;
        };
        rest.is_empty()
            || this.ends_with('/')
            || rest.starts_with('/')
            || rest.starts_with(ARCHIVE_SEPARATOR)
    }

    pub fn has_archive_extension(&self) -> bool {
        if self.is_archive() {
            return false;
        }
        is_archive_name(self.file_name())
    }

    /// Returns the `jar://` counterpart of a local URL.
    ///
    /// For an archive this is the archive root. For any other file it is a
    /// prefix URL under which every archive root nested in that directory
    /// sorts, so descendant lookups find archives created along with it.
    pub fn to_archive_url(&self) -> Option<Self> {
        if self.is_archive() {
            return None;
        }
        if self.has_archive_extension() {
            return Some(Self::archive_root(self.path()));
        }
        Some(Self(format!("{ARCHIVE_SCHEME}{}", self.path()).into()))
    }

    fn scheme(&self) -> &'static str {
        if self.is_archive() {
            ARCHIVE_SCHEME
        } else {
            FILE_SCHEME
        }
    }
}

impl fmt::Display for VirtualFileUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns true if a file called `name` is opened as an archive.
pub fn is_archive_name(name: &str) -> bool {
    name.rsplit_once('.').is_some_and(|(_, extension)| {
        ARCHIVE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(extension))
    })
}

fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        normalized.push('/');
        normalized.push_str(segment);
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}
