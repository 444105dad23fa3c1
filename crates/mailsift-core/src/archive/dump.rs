//! JSON dump backend.
//!
//! A dump is a serialized copy of an archive's folder tree, with the native
//! node properties kept under their archive names:
//!
//! ```json
//! {
//!   "root": {
//!     "displayName": "",
//!     "containerClass": "",
//!     "subfolders": [
//!       {
//!         "displayName": "Inbox",
//!         "containerClass": "IPF.Note",
//!         "messages": [
//!           {
//!             "messageClass": "IPM.Note",
//!             "senderEmailAddress": "alice@example.org",
//!             "messageDeliveryTime": "2019-03-01T10:00:00Z",
//!             "attachments": [{ "filename": "a.pdf", "filesize": 10, "mimeType": "application/pdf" }]
//!           }
//!         ]
//!       }
//!     ]
//!   }
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Archive, ArchiveError, ArchiveOpener, FolderNode, MessageIter, MessageNode};
use crate::model::{ArchiveId, AttachmentRecord};

/// Opens JSON dump files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOpener;

impl ArchiveOpener for DumpOpener {
    type Archive = DumpArchive;

    fn open(&self, path: &Path) -> Result<DumpArchive, ArchiveError> {
        let canonical = std::fs::canonicalize(path).map_err(|source| ArchiveError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let contents =
            std::fs::read_to_string(&canonical).map_err(|source| ArchiveError::Open {
                path: canonical.clone(),
                source,
            })?;
        let dump: DumpFile =
            serde_json::from_str(&contents).map_err(|e| ArchiveError::Format(e.to_string()))?;

        debug!("Opened archive dump {}", canonical.display());
        Ok(DumpArchive::new(
            ArchiveId::new(canonical.to_string_lossy()),
            dump.root,
        ))
    }
}

#[derive(Deserialize)]
struct DumpFile {
    root: DumpFolder,
}

/// An archive loaded from a dump.
#[derive(Debug, Clone)]
pub struct DumpArchive {
    identity: ArchiveId,
    root: DumpFolder,
}

impl DumpArchive {
    /// Creates an archive from an already built folder tree.
    #[must_use]
    pub const fn new(identity: ArchiveId, root: DumpFolder) -> Self {
        Self { identity, root }
    }
}

impl Archive for DumpArchive {
    type Folder<'a> = &'a DumpFolder;

    fn identity(&self) -> ArchiveId {
        self.identity.clone()
    }

    fn root_folder(&self) -> Result<Self::Folder<'_>, ArchiveError> {
        Ok(&self.root)
    }
}

/// A folder node of a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DumpFolder {
    /// Folder display name.
    pub display_name: String,
    /// Container classification tag.
    pub container_class: String,
    /// Direct subfolders.
    pub subfolders: Vec<DumpFolder>,
    /// Messages stored in this folder.
    pub messages: Vec<DumpMessage>,
}

impl DumpFolder {
    /// Creates an empty folder.
    #[must_use]
    pub fn new(display_name: impl Into<String>, container_class: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            container_class: container_class.into(),
            ..Self::default()
        }
    }

    /// Appends a subfolder.
    #[must_use]
    pub fn with_subfolder(mut self, folder: Self) -> Self {
        self.subfolders.push(folder);
        self
    }

    /// Appends a message.
    #[must_use]
    pub fn with_message(mut self, message: DumpMessage) -> Self {
        self.messages.push(message);
        self
    }
}

impl<'a> FolderNode for &'a DumpFolder {
    type Message = &'a DumpMessage;

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn container_class(&self) -> &str {
        &self.container_class
    }

    fn has_subfolders(&self) -> bool {
        !self.subfolders.is_empty()
    }

    fn content_count(&self) -> usize {
        self.messages.len()
    }

    fn subfolders(&self) -> Result<Vec<Self>, ArchiveError> {
        let folder: &'a DumpFolder = *self;
        Ok(folder.subfolders.iter().collect())
    }

    fn messages(&self) -> MessageIter<'_, &'a DumpMessage> {
        let folder: &'a DumpFolder = *self;
        Box::new(folder.messages.iter().map(Ok))
    }
}

/// A message node of a dump.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DumpMessage {
    /// Message class tag.
    pub message_class: String,
    /// Sender display name.
    pub sender_name: String,
    /// Sender email address.
    pub sender_email_address: String,
    /// Recipient display string.
    pub display_to: String,
    /// Delivery time.
    pub message_delivery_time: Option<DateTime<Utc>>,
    /// Attachment count declared by the message, if it differs from the
    /// stored list.
    pub number_of_attachments: Option<usize>,
    /// Stored attachments.
    pub attachments: Vec<DumpAttachment>,
}

impl DumpMessage {
    /// Creates a message of the given class.
    #[must_use]
    pub fn new(message_class: impl Into<String>) -> Self {
        Self {
            message_class: message_class.into(),
            ..Self::default()
        }
    }

    /// Sets the sender.
    #[must_use]
    pub fn sent_by(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.sender_name = name.into();
        self.sender_email_address = email.into();
        self
    }

    /// Sets the delivery time.
    #[must_use]
    pub fn delivered_at(mut self, time: DateTime<Utc>) -> Self {
        self.message_delivery_time = Some(time);
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn with_attachment(mut self, attachment: DumpAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

impl MessageNode for DumpMessage {
    fn message_class(&self) -> &str {
        &self.message_class
    }

    fn sender_name(&self) -> &str {
        &self.sender_name
    }

    fn sender_email(&self) -> &str {
        &self.sender_email_address
    }

    fn display_to(&self) -> &str {
        &self.display_to
    }

    fn delivery_time(&self) -> Option<DateTime<Utc>> {
        self.message_delivery_time
    }

    fn attachment_count(&self) -> usize {
        self.number_of_attachments.unwrap_or(self.attachments.len())
    }

    fn attachment(&self, index: usize) -> Result<AttachmentRecord, ArchiveError> {
        self.attachments
            .get(index)
            .map(|a| AttachmentRecord {
                filename: a.filename.clone(),
                filesize: a.filesize,
                mime_type: a.mime_type.clone(),
            })
            .ok_or_else(|| ArchiveError::MissingAttachment {
                index,
                declared: self.attachment_count(),
            })
    }
}

/// An attachment of a dump message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DumpAttachment {
    /// Display filename.
    pub filename: String,
    /// Size in bytes.
    pub filesize: u64,
    /// MIME tag.
    pub mime_type: String,
}

impl DumpAttachment {
    /// Creates an attachment record.
    #[must_use]
    pub fn new(filename: impl Into<String>, filesize: u64, mime_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            filesize,
            mime_type: mime_type.into(),
        }
    }
}
