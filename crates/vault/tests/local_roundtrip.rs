//! End-to-end transfers against the directory-backed vault.

use std::sync::{Arc, Mutex};

use coldstash_transfer::{TransferStatus, calculate_file_checksums};
use coldstash_vault::{ColdstashConfig, JobResolution, LocalVault, VaultApi, VaultManager};
use tempfile::TempDir;

type NoListener = fn(TransferStatus);

struct Fixture {
    dir: TempDir,
    local: Arc<LocalVault>,
    manager: VaultManager,
}

async fn fixture(chunk_size: u64) -> Fixture {
    let dir = TempDir::new().unwrap();
    let config = ColdstashConfig {
        chunk_size,
        local_root: dir.path().join("vaults"),
        ..ColdstashConfig::default()
    };
    let local = Arc::new(LocalVault::from_config(&config));
    local.create_vault("photos").await.unwrap();
    let manager = VaultManager::new(local.clone(), &config);
    Fixture {
        dir,
        local,
        manager,
    }
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

#[tokio::test]
async fn upload_retrieve_download_103_bytes() {
    let fx = fixture(30).await;
    let source = fx.dir.path().join("album.tar");
    let data = payload(103);
    std::fs::write(&source, &data).unwrap();

    let controller = fx
        .manager
        .upload_file(&source, "photos", 0, None::<NoListener>)
        .await
        .unwrap();
    let upload_status = controller.wait().await;
    assert!(upload_status.is_completed());
    assert_eq!(upload_status.max_position, 4);
    let archive = controller.join().await.unwrap().unwrap();

    let expected = calculate_file_checksums(&source, 30).await.unwrap();
    assert_eq!(archive.checksum, expected.tree_hash);

    let job_id = match fx
        .manager
        .get_or_initiate_retrieval_job(
            "photos",
            Some(&archive.archive_id),
            Some("album.tar"),
            true,
            true,
        )
        .await
        .unwrap()
    {
        JobResolution::Initiated(id) => id,
        other => panic!("expected a new job, got {other:?}"),
    };

    // The second request finds the completed job instead of starting another.
    match fx
        .manager
        .get_or_initiate_retrieval_job("photos", None, Some("album.tar"), true, true)
        .await
        .unwrap()
    {
        JobResolution::Existing(jobs) => assert_eq!(jobs[0].job_id, job_id),
        other => panic!("expected the existing job, got {other:?}"),
    }

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&statuses);
    let dest = fx.dir.path().join("restored.tar");
    let controller = fx
        .manager
        .download_archive(
            "photos",
            &job_id,
            &dest,
            Some(103),
            0,
            Some(move |s: TransferStatus| seen.lock().unwrap().push(s)),
        )
        .await
        .unwrap();
    let status = controller.wait().await;
    assert!(status.is_completed());
    assert_eq!(status.current_offset, 4);
    assert_eq!(status.max_position, 4);
    assert_eq!(status.bytes_transferred, 103);
    controller.join().await.unwrap().unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), data);
    let statuses = statuses.lock().unwrap();
    assert!(statuses
        .windows(2)
        .all(|w| w[0].current_offset <= w[1].current_offset));
    assert!(statuses.last().unwrap().is_completed());
}

#[tokio::test]
async fn interrupted_upload_resumes_with_same_archive_checksum() {
    let fx = fixture(16).await;
    let source = fx.dir.path().join("notes.txt");
    let data = payload(70);
    std::fs::write(&source, &data).unwrap();

    // Simulate an earlier attempt that sent the first two parts and stopped.
    let upload = fx
        .manager
        .find_or_initiate_upload("photos", "notes.txt")
        .await
        .unwrap();
    for i in 0..2u64 {
        let range = coldstash_protocol::ByteRange::new(i * 16, (i + 1) * 16).unwrap();
        fx.local
            .upload_part(
                "photos",
                &upload.multipart_upload_id,
                range,
                &data[range.start as usize..range.end as usize],
            )
            .await
            .unwrap();
    }

    let controller = fx
        .manager
        .upload_file(&source, "photos", 2, None::<NoListener>)
        .await
        .unwrap();
    let archive = controller.join().await.unwrap().unwrap();

    let expected = calculate_file_checksums(&source, 16).await.unwrap();
    assert_eq!(archive.checksum, expected.tree_hash);
    assert!(fx
        .manager
        .list_multipart_uploads("photos")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn inventory_lists_uploaded_files() {
    let fx = fixture(1024).await;
    for name in ["a.txt", "b.txt"] {
        let path = fx.dir.path().join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        fx.manager
            .upload_file(&path, "photos", 0, None::<NoListener>)
            .await
            .unwrap()
            .join()
            .await
            .unwrap()
            .unwrap();
    }

    // The first call starts the job; the local backend completes it at once.
    assert!(fx.manager.get_inventory("photos").await.unwrap().is_none());
    let inventory = fx.manager.get_inventory("photos").await.unwrap().unwrap();
    let mut names: Vec<String> = inventory
        .archive_list
        .iter()
        .filter_map(|a| a.filename.clone())
        .collect();
    names.sort();
    assert_eq!(names, ["a.txt", "b.txt"]);

    let vaults = fx.manager.list_vaults().await.unwrap();
    assert_eq!(vaults[0].archive_count, 2);
}

#[tokio::test]
async fn deleted_archive_disappears_from_vault() {
    let fx = fixture(1024).await;
    let path = fx.dir.path().join("gone.bin");
    std::fs::write(&path, b"short lived").unwrap();
    let archive = fx
        .manager
        .upload_file(&path, "photos", 0, None::<NoListener>)
        .await
        .unwrap()
        .join()
        .await
        .unwrap()
        .unwrap();

    fx.manager
        .delete_archive("photos", &archive.archive_id)
        .await
        .unwrap();
    assert_eq!(fx.manager.list_vaults().await.unwrap()[0].archive_count, 0);
    assert!(fx
        .manager
        .delete_archive("photos", &archive.archive_id)
        .await
        .unwrap_err()
        .is_remote());
}
