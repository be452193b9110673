use crate::vfs::VirtualFileUrl;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceIndexError {
    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("File not found: {0}")]
    FileNotFound(VirtualFileUrl),

    #[error("File already exists: {0}")]
    FileExists(VirtualFileUrl),

    #[error("Not a directory: {0}")]
    NotADirectory(VirtualFileUrl),

    #[error("Invalid exclusion pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WorkspaceIndexError>;
