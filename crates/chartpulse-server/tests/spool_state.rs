mod common;

use uuid::Uuid;

#[tokio::test]
async fn spool_store_read_delete_through_state() {
    let tmp = tempfile::tempdir().unwrap();
    let state = common::test_app_state(sea_orm::DatabaseConnection::default(), tmp.path());

    let scan_id = Uuid::new_v4();
    let path = state
        .spool
        .store(scan_id, "take one.mp3", b"ID3 fake audio")
        .await
        .unwrap();

    assert!(state.spool.exists(&path).await);
    assert_eq!(state.spool.read(&path).await.unwrap(), b"ID3 fake audio");

    state.spool.delete(&path).await.unwrap();
    assert!(!state.spool.exists(&path).await);
}

#[tokio::test]
async fn spool_keys_uploads_by_scan_id() {
    let tmp = tempfile::tempdir().unwrap();
    let state = common::test_app_state(sea_orm::DatabaseConnection::default(), tmp.path());

    // Same filename from two different scans must not collide
    let a = state
        .spool
        .store(Uuid::new_v4(), "upload.mp3", b"first")
        .await
        .unwrap();
    let b = state
        .spool
        .store(Uuid::new_v4(), "upload.mp3", b"second")
        .await
        .unwrap();

    assert_ne!(a, b);
    assert_eq!(state.spool.read(&a).await.unwrap(), b"first");
    assert_eq!(state.spool.read(&b).await.unwrap(), b"second");
}

#[tokio::test]
async fn spool_contains_traversal_attempts() {
    let tmp = tempfile::tempdir().unwrap();
    let state = common::test_app_state(sea_orm::DatabaseConnection::default(), tmp.path());

    let path = state
        .spool
        .store(Uuid::new_v4(), "../../etc/passwd", b"nope")
        .await
        .unwrap();

    // The spooled file stays inside the spool root
    assert!(!path.contains(".."));
    assert!(tmp.path().join(&path).exists());
}
