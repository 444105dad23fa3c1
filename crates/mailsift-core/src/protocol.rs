//! Wire types of the worker protocol.
//!
//! The host and the worker exchange newline-delimited JSON documents:
//!
//! ```text
//! host   → {"id":1,"command":"open","pstFilePath":"/mail/archive.pst"}
//! worker ← {"id":1,"ok":true}
//! host   → {"id":2,"command":"extract","progressInterval":500}
//! worker ← {"event":"progress","payload":{"countEmail":0,...}}
//! worker ← {"event":"done","payload":{"countEmail":42,...,"progress":false}}
//! worker ← {"id":2,"ok":true}
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ProgressState;
use crate::views::ViewConfiguration;

/// A command sent by the host, tagged with the id its reply will carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id echoed in the reply.
    pub id: u64,
    /// The command itself.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands understood by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Command {
    /// Open an archive and bind the index store to it.
    #[serde(rename_all = "camelCase")]
    Open {
        /// Archive file to open.
        pst_file_path: PathBuf,
    },
    /// Index the open archive.
    #[serde(rename_all = "camelCase")]
    Extract {
        /// Minimum gap between progress events in milliseconds; the sign is
        /// ignored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress_interval: Option<i64>,
        /// Views to group by; the built-in views when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view_configs: Option<Vec<ViewConfiguration>>,
    },
    /// Stop the running extraction at the next folder boundary.
    Cancel,
}

impl Command {
    /// Protocol name of the command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Extract { .. } => "extract",
            Self::Cancel => "cancel",
        }
    }
}

/// Outcome of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Id of the request this answers.
    pub id: u64,
    /// Whether the command succeeded.
    pub ok: bool,
    /// Failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    /// A successful reply.
    #[must_use]
    pub const fn success(id: u64) -> Self {
        Self {
            id,
            ok: true,
            error: None,
        }
    }

    /// A rejected command.
    #[must_use]
    pub fn failure(id: u64, error: impl ToString) -> Self {
        Self {
            id,
            ok: false,
            error: Some(error.to_string()),
        }
    }
}

/// Events pushed to the host while an extraction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum WorkerEvent {
    /// Throttled progress snapshot.
    Progress(ProgressState),
    /// Terminal snapshot, sent once the results are persisted.
    Done(ProgressState),
}

/// Any document the worker writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    /// A pushed event.
    Event(WorkerEvent),
    /// A reply to a request.
    Reply(Reply),
}

impl From<WorkerEvent> for Outbound {
    fn from(event: WorkerEvent) -> Self {
        Self::Event(event)
    }
}

impl From<Reply> for Outbound {
    fn from(reply: Reply) -> Self {
        Self::Reply(reply)
    }
}

/// Parses one request line.
///
/// # Errors
///
/// Returns the rejection to send back. Its id is the one found in the line,
/// or 0 if none can be read.
pub fn parse_request(line: &str) -> Result<Request, Reply> {
    serde_json::from_str(line).map_err(|e| {
        let id = serde_json::from_str::<Value>(line)
            .ok()
            .and_then(|value| value.get("id").and_then(Value::as_u64))
            .unwrap_or(0);
        Reply::failure(id, format!("Malformed request: {e}"))
    })
}
