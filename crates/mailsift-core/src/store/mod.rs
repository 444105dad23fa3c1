//! Persistent index store.
//!
//! Key/value storage for extraction results, namespaced per archive. Each
//! archive namespace holds four regions:
//!
//! - the mail-index map (`_index_`)
//! - the attachment map (`_attachments_`)
//! - one grouping per view type
//! - one auxiliary list per kind
//!
//! Values are JSON entry lists (`[[key, value], ...]`) so maps keep their
//! associative shape through the round-trip.
//!
//! Every public operation opens the database, performs a single read or
//! write, and closes it again before returning. Operations on the same store
//! are serialized by an async lock, so no handle is ever shared across
//! suspension points.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{
    AdditionalDataItem, ArchiveId, AttachmentMap, AuxiliaryKind, Grouping, MailIndexes, ViewType,
};
use crate::{Error, Result};

/// Folder created under the cache directory to hold the store.
pub const CACHE_FOLDER_NAME: &str = "mailsift-db";

const DATABASE_FILE: &str = "index.db";

const ROOT_REGION: &str = "root";
const GROUPS_REGION: &str = "groups";
const ADDITIONAL_REGION: &str = "additional";

const INDEX_KEY: &str = "_index_";
const ATTACHMENTS_KEY: &str = "_attachments_";

/// Index store for extraction results.
#[derive(Debug)]
pub struct IndexStore {
    database_path: PathBuf,
    lock: Mutex<()>,
    active: Option<ArchiveId>,
}

impl IndexStore {
    /// Opens the store rooted at `cache_dir/mailsift-db`.
    ///
    /// Creates the folder, database and schema if they don't exist. With
    /// `clear_on_start`, every stored entry is deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or the database
    /// cannot be initialized.
    pub async fn open(cache_dir: &Path, clear_on_start: bool) -> Result<Self> {
        let root = cache_dir.join(CACHE_FOLDER_NAME);
        tokio::fs::create_dir_all(&root).await?;

        let store = Self {
            database_path: root.join(DATABASE_FILE),
            lock: Mutex::new(()),
            active: None,
        };

        let pool = store.connect().await?;
        let init = initialize(&pool, clear_on_start).await;
        pool.close().await;
        init?;

        debug!(
            path = %store.database_path.display(),
            cleared = clear_on_start,
            "Index store ready"
        );
        Ok(store)
    }

    /// Path of the database file.
    #[must_use]
    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Selects the archive namespace for all following operations.
    pub fn open_for_archive(&mut self, archive: ArchiveId) {
        debug!(%archive, "Index store bound");
        self.active = Some(archive);
    }

    /// The archive namespace currently selected.
    #[must_use]
    pub const fn active_archive(&self) -> Option<&ArchiveId> {
        self.active.as_ref()
    }

    async fn connect(&self) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::new()
            .filename(&self.database_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(pool)
    }

    /// Runs `op` with a freshly opened handle, closing it on every exit path.
    async fn with_handle<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(SqlitePool, ArchiveId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let archive = self.active.clone().ok_or(Error::StoreUnavailable)?;
        let _guard = self.lock.lock().await;

        let pool = self.connect().await?;
        let result = op(pool.clone(), archive).await;
        pool.close().await;
        result
    }

    /// Replaces the mail-index map.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the write fails.
    pub async fn set_mail_indexes(&self, indexes: &MailIndexes) -> Result<()> {
        let value = encode_entries(indexes)?;
        self.with_handle(|pool, archive| async move {
            put(&pool, &archive, ROOT_REGION, INDEX_KEY, &value).await
        })
        .await
    }

    /// Reads the mail-index map.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the read fails.
    pub async fn get_mail_indexes(&self) -> Result<Option<MailIndexes>> {
        self.with_handle(|pool, archive| async move {
            get(&pool, &archive, ROOT_REGION, INDEX_KEY).await
        })
        .await?
        .map(|value| decode_entries(&value))
        .transpose()
    }

    /// Replaces the attachment map.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the write fails.
    pub async fn set_attachments(&self, attachments: &AttachmentMap) -> Result<()> {
        let value = encode_entries(attachments)?;
        self.with_handle(|pool, archive| async move {
            put(&pool, &archive, ROOT_REGION, ATTACHMENTS_KEY, &value).await
        })
        .await
    }

    /// Reads the attachment map.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the read fails.
    pub async fn get_attachments(&self) -> Result<Option<AttachmentMap>> {
        self.with_handle(|pool, archive| async move {
            get(&pool, &archive, ROOT_REGION, ATTACHMENTS_KEY).await
        })
        .await?
        .map(|value| decode_entries(&value))
        .transpose()
    }

    /// Replaces the grouping stored for `view_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the write fails.
    pub async fn set_group(&self, view_type: &ViewType, group: &Grouping) -> Result<()> {
        let value = encode_entries(group)?;
        let key = view_type.as_str().to_string();
        self.with_handle(|pool, archive| async move {
            put(&pool, &archive, GROUPS_REGION, &key, &value).await
        })
        .await
    }

    /// Reads the grouping stored for `view_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the read fails.
    pub async fn get_group(&self, view_type: &ViewType) -> Result<Option<Grouping>> {
        let key = view_type.as_str().to_string();
        self.with_handle(|pool, archive| async move {
            get(&pool, &archive, GROUPS_REGION, &key).await
        })
        .await?
        .map(|value| decode_entries(&value))
        .transpose()
    }

    /// Reads every stored grouping.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the read fails.
    pub async fn get_all_groups(&self) -> Result<BTreeMap<ViewType, Grouping>> {
        let rows = self
            .with_handle(|pool, archive| async move {
                list(&pool, &archive, GROUPS_REGION).await
            })
            .await?;

        rows.into_iter()
            .map(|(key, value)| Ok::<_, Error>((ViewType::new(key), decode_entries(&value)?)))
            .collect()
    }

    /// Replaces the auxiliary list of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the write fails.
    pub async fn set_auxiliary(
        &self,
        kind: AuxiliaryKind,
        items: &[AdditionalDataItem],
    ) -> Result<()> {
        let value = serde_json::to_string(items)?;
        self.with_handle(|pool, archive| async move {
            put(&pool, &archive, ADDITIONAL_REGION, kind.as_str(), &value).await
        })
        .await
    }

    /// Reads the auxiliary list of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the read fails.
    pub async fn get_auxiliary(
        &self,
        kind: AuxiliaryKind,
    ) -> Result<Option<Vec<AdditionalDataItem>>> {
        let value = self
            .with_handle(|pool, archive| async move {
                get(&pool, &archive, ADDITIONAL_REGION, kind.as_str()).await
            })
            .await?;

        Ok(value.map(|v| serde_json::from_str(&v)).transpose()?)
    }

    /// Reads every stored auxiliary list.
    ///
    /// Entries of kinds this build does not know are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the read fails.
    pub async fn get_all_auxiliary(
        &self,
    ) -> Result<BTreeMap<AuxiliaryKind, Vec<AdditionalDataItem>>> {
        let rows = self
            .with_handle(|pool, archive| async move {
                list(&pool, &archive, ADDITIONAL_REGION).await
            })
            .await?;

        let mut all = BTreeMap::new();
        for (key, value) in rows {
            if let Some(kind) = AuxiliaryKind::parse(&key) {
                all.insert(kind, serde_json::from_str(&value)?);
            }
        }
        Ok(all)
    }

    /// Deletes everything stored for the bound archive.
    ///
    /// # Errors
    ///
    /// Returns an error if no archive is bound or the delete fails.
    pub async fn clear_archive(&self) -> Result<()> {
        self.with_handle(|pool, archive| async move {
            sqlx::query(r"DELETE FROM archive_entries WHERE archive_id = ?")
                .bind(archive.as_str())
                .execute(&pool)
                .await?;
            Ok::<(), Error>(())
        })
        .await
    }
}

/// Creates the schema, optionally dropping every stored entry.
async fn initialize(pool: &SqlitePool, clear: bool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS archive_entries (
            archive_id TEXT NOT NULL,
            region TEXT NOT NULL,
            entry_key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (archive_id, region, entry_key)
        )
        ",
    )
    .execute(pool)
    .await?;

    if clear {
        sqlx::query(r"DELETE FROM archive_entries")
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn put(
    pool: &SqlitePool,
    archive: &ArchiveId,
    region: &str,
    key: &str,
    value: &str,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO archive_entries (archive_id, region, entry_key, value)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(archive_id, region, entry_key) DO UPDATE SET
            value = excluded.value
        ",
    )
    .bind(archive.as_str())
    .bind(region)
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

async fn get(
    pool: &SqlitePool,
    archive: &ArchiveId,
    region: &str,
    key: &str,
) -> Result<Option<String>> {
    let row = sqlx::query(
        r"
        SELECT value FROM archive_entries
        WHERE archive_id = ? AND region = ? AND entry_key = ?
        ",
    )
    .bind(archive.as_str())
    .bind(region)
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.get("value")))
}

async fn list(
    pool: &SqlitePool,
    archive: &ArchiveId,
    region: &str,
) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(
        r"
        SELECT entry_key, value FROM archive_entries
        WHERE archive_id = ? AND region = ?
        ORDER BY entry_key
        ",
    )
    .bind(archive.as_str())
    .bind(region)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row.get("entry_key"), row.get("value")))
        .collect())
}

fn encode_entries<K: Serialize, V: Serialize>(map: &BTreeMap<K, V>) -> Result<String> {
    let entries: Vec<(&K, &V)> = map.iter().collect();
    Ok(serde_json::to_string(&entries)?)
}

fn decode_entries<K: DeserializeOwned + Ord, V: DeserializeOwned>(
    value: &str,
) -> Result<BTreeMap<K, V>> {
    let entries: Vec<(K, V)> = serde_json::from_str(value)?;
    Ok(entries.into_iter().collect())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;
