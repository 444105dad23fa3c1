//! Archive traversal.
//!
//! Walks the folder tree of an archive once, depth-first, and derives every
//! structure the index store keeps:
//!
//! - the structural path of each accepted message
//! - attachment metadata per message
//! - one grouping per resolved view
//! - the list of mail folders
//!
//! The walk uses an explicit frame stack so pathologically nested archives
//! cannot exhaust the native call stack. A folder's messages are indexed once
//! all of its subfolders have been walked.

mod progress;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

pub use progress::{DEFAULT_PROGRESS_INTERVAL, ProgressTracker, interval_from_millis, millis};

use crate::archive::{ArchiveError, FolderNode, MessageNode};
use crate::model::{
    AdditionalDataItem, AttachmentMap, Grouping, MailIndexes, MessageIdGenerator, ProgressState,
    StructuralPath, ViewType,
};
use crate::views::ResolvedView;
use crate::{Error, Result};

/// Container class of folders holding mail.
pub const MAIL_FOLDER_CLASS: &str = "IPF.Note";

/// Message class of standard mail.
pub const NOTE_MESSAGE_CLASS: &str = "IPM.Note";

/// Returns true if a folder of this container class is walked.
///
/// Root and system folders carry an empty class.
#[must_use]
pub fn is_mail_container(container_class: &str) -> bool {
    container_class.is_empty() || container_class == MAIL_FOLDER_CLASS
}

/// Cooperative cancellation flag, checked once per visited folder.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a cleared flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clears a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one traversal produced.
#[derive(Debug, Clone)]
pub struct TraversalOutput {
    /// Structural path of every accepted message.
    pub mail_indexes: MailIndexes,
    /// Attachments of messages that have any.
    pub attachments: AttachmentMap,
    /// One grouping per resolved view, empty groupings included.
    pub groups: BTreeMap<ViewType, Grouping>,
    /// Mail folders in traversal order.
    pub folder_list: Vec<AdditionalDataItem>,
    /// Final progress snapshot; the running flag is left set.
    pub progress: ProgressState,
    /// When the traversal started.
    pub started: Instant,
}

/// Traversal settings for one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct Traversal<'a> {
    views: &'a [ResolvedView],
    ids: &'a MessageIdGenerator,
    interval: Duration,
    cancel: Option<&'a CancelFlag>,
}

impl<'a> Traversal<'a> {
    /// Creates a traversal applying `views` and drawing ids from `ids`.
    #[must_use]
    pub const fn new(views: &'a [ResolvedView], ids: &'a MessageIdGenerator) -> Self {
        Self {
            views,
            ids,
            interval: DEFAULT_PROGRESS_INTERVAL,
            cancel: None,
        }
    }

    /// Sets the minimum gap between two progress snapshots.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Makes the traversal stop when `cancel` is set.
    #[must_use]
    pub const fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Walks the tree below `root`.
    ///
    /// `on_progress` receives the initial zero snapshot immediately, then at
    /// most one snapshot per interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if the archive cannot be read and
    /// [`Error::Cancelled`] if cancellation was requested.
    pub fn run<F, P>(&self, root: F, on_progress: P) -> Result<TraversalOutput>
    where
        F: FolderNode,
        P: FnMut(&ProgressState),
    {
        let mut context = TraversalContext::new(self, on_progress);
        context.walk(root)?;
        Ok(context.finish())
    }
}

/// A folder being walked.
struct Frame<F> {
    folder: F,
    prefix: Vec<u32>,
    children: std::vec::IntoIter<F>,
    next_slot: u32,
}

impl<F: FolderNode> Frame<F> {
    fn enter(folder: F, prefix: Vec<u32>) -> Result<Self> {
        let children = if folder.has_subfolders() {
            folder.subfolders()?
        } else {
            Vec::new()
        };
        Ok(Self {
            folder,
            prefix,
            children: children.into_iter(),
            next_slot: 0,
        })
    }
}

/// Returns the current value of a path counter and advances it.
///
/// Path segments are `u32`; a folder with more entries than that is rejected.
fn take_index(counter: &mut u32, what: &str) -> Result<u32> {
    let index = *counter;
    *counter = index
        .checked_add(1)
        .ok_or_else(|| ArchiveError::Format(format!("folder holds too many {what}")))?;
    Ok(index)
}

/// Mutable state of one traversal.
struct TraversalContext<'a, P> {
    settings: &'a Traversal<'a>,
    tracker: ProgressTracker<P>,
    mail_indexes: MailIndexes,
    attachments: AttachmentMap,
    groups: BTreeMap<ViewType, Grouping>,
    folder_list: Vec<AdditionalDataItem>,
}

impl<'a, P: FnMut(&ProgressState)> TraversalContext<'a, P> {
    fn new(settings: &'a Traversal<'a>, on_progress: P) -> Self {
        let groups = settings
            .views
            .iter()
            .map(|view| (view.view_type().clone(), Grouping::new()))
            .collect();
        Self {
            settings,
            tracker: ProgressTracker::start(settings.interval, on_progress),
            mail_indexes: MailIndexes::new(),
            attachments: AttachmentMap::new(),
            groups,
            folder_list: Vec::new(),
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.settings.cancel {
            Some(flag) if flag.is_cancelled() => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    fn walk<F: FolderNode>(&mut self, root: F) -> Result<()> {
        self.check_cancelled()?;
        let mut stack = vec![Frame::enter(root, Vec::new())?];

        while let Some(frame) = stack.last_mut() {
            let Some(child) = frame.children.next() else {
                if let Some(done) = stack.pop() {
                    self.index_messages(&done.folder, &done.prefix)?;
                }
                continue;
            };

            self.tracker.folder_found();
            if !is_mail_container(child.container_class()) {
                continue;
            }

            let mut prefix = frame.prefix.clone();
            prefix.push(take_index(&mut frame.next_slot, "subfolders")?);

            self.folder_list.push(AdditionalDataItem {
                id: self.folder_list.len().to_string(),
                name: child.display_name().to_string(),
            });

            self.check_cancelled()?;
            stack.push(Frame::enter(child, prefix)?);
        }

        Ok(())
    }

    fn index_messages<F: FolderNode>(&mut self, folder: &F, prefix: &[u32]) -> Result<()> {
        if folder.content_count() == 0 {
            return Ok(());
        }

        let mut next_sequence = 0;
        for message in folder.messages() {
            let message = message?;
            if message.message_class() != NOTE_MESSAGE_CLASS {
                continue;
            }

            let id = self.settings.ids.next_id();
            let node: &dyn MessageNode = &message;

            for view in self.settings.views {
                let criterion = view.group(node);
                self.groups
                    .entry(view.view_type().clone())
                    .or_default()
                    .entry(criterion)
                    .or_default()
                    .push(id);
            }

            if message.has_attachments() {
                for index in 0..message.attachment_count() {
                    let attachment = message.attachment(index)?;
                    self.tracker.attachment_found();
                    self.attachments.entry(id).or_default().push(attachment);
                }
            }

            let sequence = take_index(&mut next_sequence, "messages")?;
            self.mail_indexes
                .insert(id, StructuralPath::new(prefix, sequence));

            self.tracker.email_found();
            self.tracker.tick();
        }

        Ok(())
    }

    fn finish(self) -> TraversalOutput {
        let (progress, started) = self.tracker.finish();
        debug!(
            emails = progress.count_email,
            folders = progress.count_folder,
            attachments = progress.count_attachment,
            elapsed_ms = progress.elapsed,
            "Traversal finished"
        );
        TraversalOutput {
            mail_indexes: self.mail_indexes,
            attachments: self.attachments,
            groups: self.groups,
            folder_list: self.folder_list,
            progress,
            started,
        }
    }
}
