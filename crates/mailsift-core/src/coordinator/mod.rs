//! Extraction coordinator.
//!
//! Owns everything one worker process needs: the archive opener, the
//! currently open archive, the index store and the event channel back to the
//! host. A coordinator is either idle or bound to one archive.

mod serve;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub use serve::serve;

use crate::archive::{Archive, ArchiveOpener};
use crate::model::{ArchiveId, AuxiliaryKind, MessageIdGenerator, ProgressState};
use crate::protocol::{Command, WorkerEvent};
use crate::store::IndexStore;
use crate::traversal::{
    CancelFlag, DEFAULT_PROGRESS_INTERVAL, Traversal, TraversalOutput, interval_from_millis,
    millis,
};
use crate::views::{ViewConfiguration, builtin_view_configs, resolve_all};
use crate::{Error, Result};

/// Which archive, if any, the coordinator works on.
enum State<A> {
    Idle,
    Bound { archive: Arc<A>, identity: ArchiveId },
}

/// Drives `open` and `extract` for one worker.
pub struct Coordinator<O: ArchiveOpener> {
    opener: Arc<O>,
    store: IndexStore,
    state: State<O::Archive>,
    ids: Arc<MessageIdGenerator>,
    cancel: CancelFlag,
    events: mpsc::UnboundedSender<WorkerEvent>,
    default_interval: Duration,
}

impl<O: ArchiveOpener> Coordinator<O> {
    /// Creates an idle coordinator.
    ///
    /// Returns the receiving end of the event channel next to it.
    pub fn new(opener: O, store: IndexStore) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let coordinator = Self {
            opener: Arc::new(opener),
            store,
            state: State::Idle,
            ids: Arc::new(MessageIdGenerator::new()),
            cancel: CancelFlag::new(),
            events,
            default_interval: DEFAULT_PROGRESS_INTERVAL,
        };
        (coordinator, receiver)
    }

    /// Sets the progress interval used when `extract` carries none.
    #[must_use]
    pub const fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    /// Identity of the bound archive.
    #[must_use]
    pub const fn bound_archive(&self) -> Option<&ArchiveId> {
        match &self.state {
            State::Idle => None,
            State::Bound { identity, .. } => Some(identity),
        }
    }

    /// The index store results are written to.
    #[must_use]
    pub const fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Handle that stops a running extraction from another task.
    ///
    /// Every extraction clears the flag when it starts, so a cancellation
    /// requested while nothing runs has no effect.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Executes one protocol command.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation.
    pub async fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Open { pst_file_path } => self.open(&pst_file_path).await.map(|_| ()),
            Command::Extract {
                progress_interval,
                view_configs,
            } => self
                .extract(progress_interval, view_configs)
                .await
                .map(|_| ()),
            Command::Cancel => {
                self.cancel.cancel();
                Ok(())
            }
        }
    }

    /// Opens the archive at `path` and binds the store to its identity.
    ///
    /// A previously bound archive is released. On failure the coordinator
    /// keeps its current binding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Archive`] if the archive cannot be opened and
    /// [`Error::Join`] if the blocking open task fails.
    pub async fn open(&mut self, path: &Path) -> Result<ArchiveId> {
        let opener = Arc::clone(&self.opener);
        let target = path.to_path_buf();
        let archive = tokio::task::spawn_blocking(move || opener.open(&target))
            .await?
            .inspect_err(|e| {
                warn!(path = %path.display(), error = %e, "Failed to open archive");
            })?;
        let identity = archive.identity();

        self.store.open_for_archive(identity.clone());
        self.state = State::Bound {
            archive: Arc::new(archive),
            identity: identity.clone(),
        };

        info!(archive = %identity, "Archive opened");
        Ok(identity)
    }

    /// Indexes the bound archive and persists the results.
    ///
    /// Progress snapshots go to the event channel while the traversal runs;
    /// the terminal snapshot follows once every structure is stored.
    ///
    /// # Errors
    ///
    /// - [`Error::NoArchiveOpen`] if no archive is bound
    /// - [`Error::View`] if a view configuration is invalid
    /// - [`Error::Archive`] if the archive cannot be read
    /// - [`Error::Cancelled`] if the extraction was cancelled
    /// - [`Error::Persistence`] if storing the results failed
    pub async fn extract(
        &mut self,
        progress_interval: Option<i64>,
        view_configs: Option<Vec<ViewConfiguration>>,
    ) -> Result<ProgressState> {
        let State::Bound { archive, identity } = &self.state else {
            return Err(Error::NoArchiveOpen);
        };
        let archive = Arc::clone(archive);
        let identity = identity.clone();

        let configs = view_configs.unwrap_or_else(builtin_view_configs);
        let views = resolve_all(&configs)?;
        let interval = progress_interval.map_or(self.default_interval, |ms| {
            interval_from_millis(Some(ms))
        });

        info!(archive = %identity, views = views.len(), "Extraction started");

        self.cancel.reset();
        let ids = Arc::clone(&self.ids);
        let cancel = self.cancel.clone();
        let events = self.events.clone();
        let traversal = tokio::task::spawn_blocking(move || -> Result<TraversalOutput> {
            let root = archive.root_folder()?;
            Traversal::new(&views, &ids)
                .with_interval(interval)
                .with_cancel(&cancel)
                .run(root, |state| {
                    // The host may already be gone; nothing left to report to.
                    let _ = events.send(WorkerEvent::Progress(*state));
                })
        })
        .await;
        self.cancel.reset();

        let output = traversal?.inspect_err(|e| {
            warn!(archive = %identity, error = %e, "Extraction failed");
        })?;

        if let Err(e) = self.persist(&output).await {
            error!(archive = %identity, error = %e, "Failed to persist extraction results");
            return Err(Error::Persistence(Box::new(e)));
        }

        let mut done = output.progress;
        done.elapsed = millis(output.started.elapsed());
        done.progress = false;
        let _ = self.events.send(WorkerEvent::Done(done));

        info!(
            archive = %identity,
            emails = done.count_email,
            folders = done.count_folder,
            attachments = done.count_attachment,
            elapsed_ms = done.elapsed,
            "Extraction finished"
        );
        Ok(done)
    }

    async fn persist(&self, output: &TraversalOutput) -> Result<()> {
        self.store.set_mail_indexes(&output.mail_indexes).await?;
        self.store.set_attachments(&output.attachments).await?;
        for (view_type, group) in &output.groups {
            self.store.set_group(view_type, group).await?;
        }
        self.store
            .set_auxiliary(AuxiliaryKind::FolderList, &output.folder_list)
            .await
    }
}
