//! Shared data model produced by extraction and stored in the index cache.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of an opened archive; selects the index store namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArchiveId(pub String);

impl ArchiveId {
    /// Create a new archive ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned to an accepted message during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out message ids that never repeat within one worker.
#[derive(Debug, Default)]
pub struct MessageIdGenerator {
    next: AtomicU64,
}

impl MessageIdGenerator {
    /// Creates a generator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Returns a fresh id.
    pub fn next_id(&self) -> MessageId {
        MessageId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Position of a message in the archive hierarchy.
///
/// Folder slots from the root down, followed by the message's sequence
/// number inside its folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuralPath(pub Vec<u32>);

impl StructuralPath {
    /// Builds a path from a folder prefix and an intra-folder sequence number.
    #[must_use]
    pub fn new(prefix: &[u32], sequence: u32) -> Self {
        let mut segments = Vec::with_capacity(prefix.len() + 1);
        segments.extend_from_slice(prefix);
        segments.push(sequence);
        Self(segments)
    }
}

/// Metadata of one attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    /// Display filename.
    pub filename: String,
    /// Size in bytes.
    pub filesize: u64,
    /// MIME tag.
    pub mime_type: String,
}

/// Named grouping strategy, e.g. `year`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewType(pub String);

impl ViewType {
    /// Create a new view type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the view type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Criterion value → message ids in discovery order.
pub type Grouping = BTreeMap<String, Vec<MessageId>>;

/// Message id → structural path.
pub type MailIndexes = BTreeMap<MessageId, StructuralPath>;

/// Message id → attachments in native order.
pub type AttachmentMap = BTreeMap<MessageId, Vec<AttachmentRecord>>;

/// Kinds of auxiliary data stored next to the indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuxiliaryKind {
    /// Folders that hold mail, in traversal order.
    #[serde(rename = "folderList")]
    FolderList,
}

impl AuxiliaryKind {
    /// Parse from the stored key.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "folderList" => Some(Self::FolderList),
            _ => None,
        }
    }

    /// Convert to the stored key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FolderList => "folderList",
        }
    }
}

/// One entry of an auxiliary list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalDataItem {
    /// Item id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Counters reported while an extraction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    /// Attachments collected so far.
    pub count_attachment: u64,
    /// Messages indexed so far.
    pub count_email: u64,
    /// Subfolders discovered so far.
    pub count_folder: u64,
    /// Sum of the three counters above.
    pub count_total: u64,
    /// Milliseconds since the traversal started.
    pub elapsed: u64,
    /// Whether the extraction is still running.
    pub progress: bool,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            count_attachment: 0,
            count_email: 0,
            count_folder: 0,
            count_total: 0,
            elapsed: 0,
            progress: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_path_appends_sequence() {
        assert_eq!(StructuralPath::new(&[0, 2], 5).0, vec![0, 2, 5]);
        assert_eq!(StructuralPath::new(&[], 3).0, vec![3]);
    }

    #[test]
    fn test_id_generator_never_repeats() {
        let ids = MessageIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn test_progress_serializes_camel_case() {
        let json = serde_json::to_value(ProgressState::default()).unwrap();
        assert_eq!(json["countEmail"], 0);
        assert_eq!(json["countTotal"], 0);
        assert_eq!(json["progress"], true);
    }

    #[test]
    fn test_auxiliary_kind_round_trip() {
        let kind = AuxiliaryKind::FolderList;
        assert_eq!(AuxiliaryKind::parse(kind.as_str()), Some(kind));
        assert_eq!(AuxiliaryKind::parse("contacts"), None);
    }
}
