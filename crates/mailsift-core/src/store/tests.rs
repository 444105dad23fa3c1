use tempfile::TempDir;

use super::*;
use crate::model::{AttachmentRecord, MessageId, StructuralPath};

async fn store(dir: &TempDir) -> IndexStore {
    let mut store = IndexStore::open(dir.path(), false).await.unwrap();
    store.open_for_archive(ArchiveId::new("/archives/a.pst"));
    store
}

fn sample_indexes() -> MailIndexes {
    MailIndexes::from([
        (MessageId(0), StructuralPath(vec![0, 0])),
        (MessageId(1), StructuralPath(vec![0, 1])),
        (MessageId(7), StructuralPath(vec![1, 3, 0])),
    ])
}

fn sample_group() -> Grouping {
    Grouping::from([
        ("2018".to_string(), vec![MessageId(7), MessageId(0)]),
        ("2019".to_string(), vec![MessageId(1)]),
    ])
}

#[tokio::test]
async fn test_operations_require_bound_archive() {
    let dir = TempDir::new().unwrap();
    let store = IndexStore::open(dir.path(), false).await.unwrap();

    assert!(store.active_archive().is_none());
    assert!(matches!(
        store.set_mail_indexes(&sample_indexes()).await,
        Err(Error::StoreUnavailable)
    ));
    assert!(matches!(
        store.get_mail_indexes().await,
        Err(Error::StoreUnavailable)
    ));
    assert!(matches!(
        store.get_all_groups().await,
        Err(Error::StoreUnavailable)
    ));
    assert!(matches!(
        store.get_auxiliary(AuxiliaryKind::FolderList).await,
        Err(Error::StoreUnavailable)
    ));
}

#[tokio::test]
async fn test_store_lives_under_cache_folder() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    assert_eq!(
        store.database_path(),
        dir.path().join(CACHE_FOLDER_NAME).join("index.db")
    );
    assert!(store.database_path().exists());
}

#[tokio::test]
async fn test_mail_indexes_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    assert_eq!(store.get_mail_indexes().await.unwrap(), None);

    store.set_mail_indexes(&sample_indexes()).await.unwrap();
    assert_eq!(
        store.get_mail_indexes().await.unwrap(),
        Some(sample_indexes())
    );
}

#[tokio::test]
async fn test_set_replaces_whole_map() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;

    store.set_mail_indexes(&sample_indexes()).await.unwrap();
    let smaller = MailIndexes::from([(MessageId(9), StructuralPath(vec![2, 0]))]);
    store.set_mail_indexes(&smaller).await.unwrap();

    assert_eq!(store.get_mail_indexes().await.unwrap(), Some(smaller));
}

#[tokio::test]
async fn test_attachments_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let attachments = AttachmentMap::from([(
        MessageId(3),
        vec![
            AttachmentRecord {
                filename: "report.pdf".to_string(),
                filesize: 52_000,
                mime_type: "application/pdf".to_string(),
            },
            AttachmentRecord {
                filename: "logo.png".to_string(),
                filesize: 800,
                mime_type: "image/png".to_string(),
            },
        ],
    )]);

    store.set_attachments(&attachments).await.unwrap();

    assert_eq!(store.get_attachments().await.unwrap(), Some(attachments));
}

#[tokio::test]
async fn test_groups_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let year = ViewType::new("year");
    let domain = ViewType::new("domain");
    let domains = Grouping::from([("example.org".to_string(), vec![MessageId(1)])]);

    store.set_group(&year, &sample_group()).await.unwrap();
    store.set_group(&domain, &domains).await.unwrap();

    let stored = store.get_group(&year).await.unwrap().unwrap();
    assert_eq!(stored, sample_group());
    assert_eq!(stored["2018"], vec![MessageId(7), MessageId(0)]);
    assert_eq!(
        store.get_group(&ViewType::new("month")).await.unwrap(),
        None
    );

    let all = store.get_all_groups().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[&year], sample_group());
    assert_eq!(all[&domain], domains);
}

#[tokio::test]
async fn test_empty_group_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let view = ViewType::new("correspondent");

    store.set_group(&view, &Grouping::new()).await.unwrap();

    assert_eq!(store.get_group(&view).await.unwrap(), Some(Grouping::new()));
}

#[tokio::test]
async fn test_auxiliary_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let folders = vec![
        AdditionalDataItem {
            id: "0".to_string(),
            name: "Inbox".to_string(),
        },
        AdditionalDataItem {
            id: "1".to_string(),
            name: "Sent Items".to_string(),
        },
    ];

    assert!(store.get_all_auxiliary().await.unwrap().is_empty());
    store
        .set_auxiliary(AuxiliaryKind::FolderList, &folders)
        .await
        .unwrap();

    assert_eq!(
        store.get_auxiliary(AuxiliaryKind::FolderList).await.unwrap(),
        Some(folders.clone())
    );
    let all = store.get_all_auxiliary().await.unwrap();
    assert_eq!(all[&AuxiliaryKind::FolderList], folders);
}

#[tokio::test]
async fn test_archives_are_isolated() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir).await;
    store.set_mail_indexes(&sample_indexes()).await.unwrap();

    store.open_for_archive(ArchiveId::new("/archives/b.pst"));
    assert_eq!(store.get_mail_indexes().await.unwrap(), None);
    assert!(store.get_all_groups().await.unwrap().is_empty());

    store.open_for_archive(ArchiveId::new("/archives/a.pst"));
    assert_eq!(
        store.get_mail_indexes().await.unwrap(),
        Some(sample_indexes())
    );
}

#[tokio::test]
async fn test_rebinding_same_archive_keeps_namespace() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir).await;
    let view = ViewType::new("year");
    store.set_group(&view, &sample_group()).await.unwrap();

    store.open_for_archive(ArchiveId::new("/archives/a.pst"));
    assert_eq!(store.get_group(&view).await.unwrap(), Some(sample_group()));

    let replacement = Grouping::from([("2020".to_string(), vec![MessageId(4)])]);
    store.set_group(&view, &replacement).await.unwrap();
    assert_eq!(store.get_all_groups().await.unwrap().len(), 1);
    assert_eq!(store.get_group(&view).await.unwrap(), Some(replacement));
}

#[tokio::test]
async fn test_entries_survive_reopen_unless_cleared() {
    let dir = TempDir::new().unwrap();
    {
        let store = store(&dir).await;
        store.set_mail_indexes(&sample_indexes()).await.unwrap();
    }

    let reopened = store(&dir).await;
    assert_eq!(
        reopened.get_mail_indexes().await.unwrap(),
        Some(sample_indexes())
    );

    let mut cleared = IndexStore::open(dir.path(), true).await.unwrap();
    cleared.open_for_archive(ArchiveId::new("/archives/a.pst"));
    assert_eq!(cleared.get_mail_indexes().await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_archive_only_touches_bound_namespace() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir).await;
    store.set_mail_indexes(&sample_indexes()).await.unwrap();
    store.open_for_archive(ArchiveId::new("/archives/b.pst"));
    store.set_mail_indexes(&sample_indexes()).await.unwrap();

    store.clear_archive().await.unwrap();
    assert_eq!(store.get_mail_indexes().await.unwrap(), None);

    store.open_for_archive(ArchiveId::new("/archives/a.pst"));
    assert!(store.get_mail_indexes().await.unwrap().is_some());
}

#[tokio::test]
async fn test_concurrent_operations_serialize() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir).await;
    let view = ViewType::new("year");
    let indexes = sample_indexes();
    let group = sample_group();

    let (a, b, c) = tokio::join!(
        store.set_mail_indexes(&indexes),
        store.set_group(&view, &group),
        store.get_all_groups(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(
        store.get_mail_indexes().await.unwrap(),
        Some(sample_indexes())
    );
    assert_eq!(store.get_group(&view).await.unwrap(), Some(sample_group()));
}
