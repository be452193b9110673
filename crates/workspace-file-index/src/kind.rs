//! File set kinds and the kind masks queries are filtered by.

use bitflags::bitflags;

bitflags! {
    /// Set of accepted file set kinds.
    ///
    /// `TEST_CONTENT` shares the `CONTENT` bit: queries ask for "content" and
    /// inspect the returned set to tell production and test content apart.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KindMask: u8 {
        const CONTENT               = 0b0000_0001;
        const EXTERNAL_BINARY       = 0b0000_0010;
        const EXTERNAL_SOURCE       = 0b0000_0100;
        const CUSTOM                = 0b0000_1000;
        const CONTENT_NON_INDEXABLE = 0b0001_0000;

        const EXTERNAL  = Self::EXTERNAL_BINARY.bits() | Self::EXTERNAL_SOURCE.bits();
        const INDEXABLE = Self::CONTENT.bits() | Self::EXTERNAL.bits() | Self::CUSTOM.bits();
        const ALL       = Self::INDEXABLE.bits() | Self::CONTENT_NON_INDEXABLE.bits();
    }
}

/// Classification a file set assigns to the files under its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkspaceFileKind {
    Content,
    TestContent,
    External,
    ExternalSource,
    Custom,
    ContentNonIndexable,
}

impl WorkspaceFileKind {
    /// Returns the single mask bit this kind is accepted under.
    #[inline]
    pub fn mask(self) -> KindMask {
        match self {
            Self::Content | Self::TestContent => KindMask::CONTENT,
            Self::External => KindMask::EXTERNAL_BINARY,
            Self::ExternalSource => KindMask::EXTERNAL_SOURCE,
            Self::Custom => KindMask::CUSTOM,
            Self::ContentNonIndexable => KindMask::CONTENT_NON_INDEXABLE,
        }
    }

    pub fn is_content(self) -> bool {
        matches!(
            self,
            Self::Content | Self::TestContent | Self::ContentNonIndexable
        )
    }

    pub fn is_indexable(self) -> bool {
        KindMask::INDEXABLE.contains(self.mask())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::TestContent => "test_content",
            Self::External => "external",
            Self::ExternalSource => "external_source",
            Self::Custom => "custom",
            Self::ContentNonIndexable => "content_non_indexable",
        }
    }
}

/// Which entity storage a registration belongs to.
///
/// Entities of unloaded modules live in a separate snapshot; their file sets
/// are kept apart so that loading or unloading never collides with the main
/// registrations at the same root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EntityStorageKind {
    #[default]
    Main,
    Unloaded,
}
