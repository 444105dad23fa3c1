//! End-to-end extraction tests against dump archives on disk.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use mailsift_core::archive::{DumpAttachment, DumpFolder, DumpMessage};
use mailsift_core::{
    AuxiliaryKind, Coordinator, DumpOpener, IndexStore, StructuralPath, ViewConfiguration,
    ViewType, WorkerEvent,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn note(email: &str, year: i32) -> DumpMessage {
    DumpMessage::new("IPM.Note")
        .sent_by("", email)
        .delivered_at(Utc.with_ymd_and_hms(year, 6, 1, 9, 0, 0).unwrap())
}

/// Root holding a mail folder, a contacts folder and an unclassified folder.
fn mixed_tree() -> DumpFolder {
    DumpFolder::new("", "")
        .with_subfolder(
            DumpFolder::new("Inbox", "IPF.Note")
                .with_subfolder(
                    DumpFolder::new("Receipts", "IPF.Note").with_message(
                        note("shop@store.example", 2021)
                            .with_attachment(DumpAttachment::new("r.pdf", 2048, "application/pdf")),
                    ),
                )
                .with_message(note("alice@example.org", 2019))
                .with_message(DumpMessage::new("IPM.Contact"))
                .with_message(note("bob@example.org", 2020)),
        )
        .with_subfolder(
            DumpFolder::new("Contacts", "IPF.Contact")
                .with_message(note("hidden@example.org", 2018)),
        )
        .with_subfolder(DumpFolder::new("Archive", "").with_message(note("old@legacy.example", 2010)))
}

fn write_dump(dir: &TempDir, root: &DumpFolder) -> PathBuf {
    let path = dir.path().join("archive.json");
    std::fs::write(&path, json!({ "root": root }).to_string()).unwrap();
    path
}

async fn spawn_worker(
    dir: &TempDir,
) -> (
    Coordinator<DumpOpener>,
    mpsc::UnboundedReceiver<WorkerEvent>,
) {
    let store = IndexStore::open(dir.path(), false).await.unwrap();
    Coordinator::new(DumpOpener, store)
}

#[tokio::test]
async fn filters_folders_and_messages() {
    let dir = TempDir::new().unwrap();
    let path = write_dump(&dir, &mixed_tree());
    let (mut worker, _events) = spawn_worker(&dir).await;
    worker.open(&path).await.unwrap();

    let done = worker.extract(Some(0), None).await.unwrap();
    assert_eq!(done.count_email, 4);
    assert_eq!(done.count_folder, 4);
    assert_eq!(done.count_attachment, 1);
    assert_eq!(done.count_total, 9);

    let store = worker.store();
    let folders = store
        .get_auxiliary(AuxiliaryKind::FolderList)
        .await
        .unwrap()
        .unwrap();
    let names: Vec<&str> = folders.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["Inbox", "Receipts", "Archive"]);

    let mut paths: Vec<StructuralPath> = store
        .get_mail_indexes()
        .await
        .unwrap()
        .unwrap()
        .into_values()
        .collect();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            StructuralPath(vec![0, 0]),
            StructuralPath(vec![0, 0, 0]),
            StructuralPath(vec![0, 1]),
            StructuralPath(vec![1, 0]),
        ]
    );

    let domains = store
        .get_group(&ViewType::new("domain"))
        .await
        .unwrap()
        .unwrap();
    let keys: Vec<&str> = domains.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["example.org", "legacy.example", "store.example"]);
    assert_eq!(domains["example.org"].len(), 2);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_with_done() {
    let dir = TempDir::new().unwrap();
    let path = write_dump(&dir, &mixed_tree());
    let (mut worker, mut events) = spawn_worker(&dir).await;
    worker.open(&path).await.unwrap();

    let done = worker.extract(Some(0), None).await.unwrap();

    let mut snapshots = Vec::new();
    while let Ok(event) = events.try_recv() {
        snapshots.push(event);
    }
    let (last, progress) = snapshots.split_last().unwrap();
    assert_eq!(*last, WorkerEvent::Done(done));

    let states: Vec<_> = progress
        .iter()
        .map(|event| match event {
            WorkerEvent::Progress(state) => *state,
            WorkerEvent::Done(_) => panic!("done before the end"),
        })
        .collect();
    assert_eq!(states[0].count_total, 0);
    for pair in states.windows(2) {
        assert!(pair[1].count_email >= pair[0].count_email);
        assert!(pair[1].count_folder >= pair[0].count_folder);
        assert!(pair[1].count_attachment >= pair[0].count_attachment);
        assert!(pair[1].count_total >= pair[0].count_total);
    }
    assert!(states.iter().all(|s| s.progress));
    assert!(states.last().unwrap().count_total <= done.count_total);
}

#[tokio::test]
async fn cache_survives_worker_restart() {
    let dir = TempDir::new().unwrap();
    let path = write_dump(&dir, &mixed_tree());

    let stored = {
        let (mut worker, _events) = spawn_worker(&dir).await;
        worker.open(&path).await.unwrap();
        worker
            .extract(None, Some(vec![ViewConfiguration::new("year", "year")]))
            .await
            .unwrap();
        worker
            .store()
            .get_group(&ViewType::new("year"))
            .await
            .unwrap()
            .unwrap()
    };

    let (mut restarted, _events) = spawn_worker(&dir).await;
    restarted.open(&path).await.unwrap();
    let reread = restarted
        .store()
        .get_group(&ViewType::new("year"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reread, stored);
    assert_eq!(
        reread.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["2010", "2019", "2020", "2021"]
    );
}

#[tokio::test]
async fn archives_do_not_share_results() {
    let dir = TempDir::new().unwrap();
    let first = write_dump(&dir, &mixed_tree());
    let other_dir = TempDir::new().unwrap();
    let second = write_dump(
        &other_dir,
        &DumpFolder::new("", "")
            .with_subfolder(DumpFolder::new("Inbox", "IPF.Note").with_message(note("x@y.example", 2022))),
    );
    let (mut worker, _events) = spawn_worker(&dir).await;

    worker.open(&first).await.unwrap();
    worker.extract(None, None).await.unwrap();
    worker.open(&second).await.unwrap();
    worker.extract(None, None).await.unwrap();

    let second_indexes = worker.store().get_mail_indexes().await.unwrap().unwrap();
    assert_eq!(second_indexes.len(), 1);

    worker.open(&first).await.unwrap();
    let first_indexes = worker.store().get_mail_indexes().await.unwrap().unwrap();
    assert_eq!(first_indexes.len(), 4);
}
