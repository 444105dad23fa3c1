//! # mailsift-core
//!
//! Extraction core of the mailsift worker.
//!
//! This crate provides:
//! - Archive abstraction with a JSON dump backend
//! - View resolution (grouping messages by domain, year, correspondent, ...)
//! - Traversal of an archive's folder tree into mail indexes, attachment
//!   metadata and groupings
//! - A persistent index cache (`SQLite`), namespaced per archive
//! - The extraction coordinator and its line protocol
//! - Worker configuration

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod config;
pub mod coordinator;
mod error;
pub mod model;
pub mod protocol;
pub mod store;
pub mod traversal;
pub mod views;

pub use archive::{Archive, ArchiveError, ArchiveOpener, DumpOpener, FolderNode, MessageNode};
pub use config::WorkerConfig;
pub use coordinator::{Coordinator, serve};
pub use error::{Error, Result};
pub use model::{
    AdditionalDataItem, ArchiveId, AttachmentRecord, AuxiliaryKind, MessageId, ProgressState,
    StructuralPath, ViewType,
};
pub use protocol::{Command, Reply, Request, WorkerEvent};
pub use store::IndexStore;
pub use traversal::{CancelFlag, Traversal, TraversalOutput};
pub use views::{ResolvedView, ViewConfiguration, ViewError};
