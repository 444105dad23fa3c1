//! Archive access.
//!
//! The container parser is an external collaborator. Extraction only talks to
//! it through the traits below:
//!
//! - [`ArchiveOpener`] turns a file path into an [`Archive`]
//! - [`Archive`] exposes the root folder and the archive identity
//! - [`FolderNode`] and [`MessageNode`] expose the native node properties
//!   needed for classification and grouping
//!
//! [`DumpOpener`] is the bundled backend; it reads a JSON dump of an
//! archive's folder tree.

mod dump;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

pub use dump::{DumpArchive, DumpAttachment, DumpFolder, DumpMessage, DumpOpener};

use crate::model::{ArchiveId, AttachmentRecord};

/// Errors raised by the archive layer.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The archive file could not be opened.
    #[error("Cannot open archive {}: {source}", path.display())]
    Open {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The archive structure could not be decoded.
    #[error("Malformed archive: {0}")]
    Format(String),

    /// A message declared more attachments than it stores.
    #[error("Attachment {index} is missing (message declares {declared})")]
    MissingAttachment {
        /// Requested attachment index.
        index: usize,
        /// Attachment count declared by the message.
        declared: usize,
    },
}

/// Opens archive files.
pub trait ArchiveOpener: Send + Sync + 'static {
    /// The archive type produced by this opener.
    type Archive: Archive + 'static;

    /// Opens the archive stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid archive.
    fn open(&self, path: &Path) -> Result<Self::Archive, ArchiveError>;
}

/// One opened archive.
pub trait Archive: Send + Sync {
    /// Folder handle type, possibly borrowing from the archive.
    type Folder<'a>: FolderNode
    where
        Self: 'a;

    /// Identity used to namespace the index store.
    fn identity(&self) -> ArchiveId;

    /// Returns the root folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the root node cannot be read.
    fn root_folder(&self) -> Result<Self::Folder<'_>, ArchiveError>;
}

/// Messages of a folder in native order.
pub type MessageIter<'a, M> = Box<dyn Iterator<Item = Result<M, ArchiveError>> + 'a>;

/// Archive-native folder node.
pub trait FolderNode: Sized {
    /// Message handle type.
    type Message: MessageNode;

    /// Folder display name.
    fn display_name(&self) -> &str;

    /// Container classification tag (`""` for root/system folders,
    /// `"IPF.Note"` for mail folders).
    fn container_class(&self) -> &str;

    /// Whether the folder has any subfolders.
    fn has_subfolders(&self) -> bool;

    /// Number of messages stored directly in this folder.
    fn content_count(&self) -> usize;

    /// Reads the direct subfolders in native order.
    ///
    /// # Errors
    ///
    /// Returns an error if the subfolder table cannot be read.
    fn subfolders(&self) -> Result<Vec<Self>, ArchiveError>;

    /// Iterates the messages of this folder in native order.
    fn messages(&self) -> MessageIter<'_, Self::Message>;
}

/// Archive-native message node.
///
/// Only the properties needed for classification and grouping are exposed.
pub trait MessageNode {
    /// Message class tag (`"IPM.Note"` for standard mail).
    fn message_class(&self) -> &str;

    /// Sender display name.
    fn sender_name(&self) -> &str;

    /// Sender email address.
    fn sender_email(&self) -> &str;

    /// Recipient display string.
    fn display_to(&self) -> &str;

    /// Delivery time, if the message carries one.
    fn delivery_time(&self) -> Option<DateTime<Utc>>;

    /// Number of attachments declared by the message.
    fn attachment_count(&self) -> usize;

    /// Whether the message declares attachments.
    fn has_attachments(&self) -> bool {
        self.attachment_count() > 0
    }

    /// Reads one attachment's metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment cannot be read.
    fn attachment(&self, index: usize) -> Result<AttachmentRecord, ArchiveError>;
}

impl<T: MessageNode + ?Sized> MessageNode for &T {
    fn message_class(&self) -> &str {
        (**self).message_class()
    }

    fn sender_name(&self) -> &str {
        (**self).sender_name()
    }

    fn sender_email(&self) -> &str {
        (**self).sender_email()
    }

    fn display_to(&self) -> &str {
        (**self).display_to()
    }

    fn delivery_time(&self) -> Option<DateTime<Utc>> {
        (**self).delivery_time()
    }

    fn attachment_count(&self) -> usize {
        (**self).attachment_count()
    }

    fn has_attachments(&self) -> bool {
        (**self).has_attachments()
    }

    fn attachment(&self, index: usize) -> Result<AttachmentRecord, ArchiveError> {
        (**self).attachment(index)
    }
}
