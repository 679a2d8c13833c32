mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{test_config, FakeProjectFiles};
use pretty_assertions::assert_eq;
use serde_json::json;
use statesync_engine::{FileLocator, UserMigration};

fn locator(remote: &Arc<FakeProjectFiles>) -> FileLocator {
    FileLocator::new(remote.clone(), &test_config())
}

#[tokio::test]
async fn test_fresh_key_is_provisioned_once() {
    let remote = FakeProjectFiles::new();
    let locator = locator(&remote);

    let file_name = locator.resolve("wordFreq", || Ok(json!({}))).await.unwrap();
    assert!(file_name.starts_with("data-wordFreq-"));
    assert!(file_name.ends_with(".json"));
    assert_eq!(remote.file(&file_name), Some(json!({})));
    assert_eq!(remote.mapping("wordFreq").as_deref(), Some(file_name.as_str()));

    let again = locator
        .resolve("wordFreq", || panic!("must not provision twice"))
        .await
        .unwrap();
    assert_eq!(again, file_name);
    assert_eq!(remote.calls("create_file"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_resolves_share_one_file() {
    let remote = FakeProjectFiles::new();
    remote.set_save_latency(Duration::from_secs(1));
    let locator = locator(&remote);

    let (first, second, third) = tokio::join!(
        locator.resolve("wordFreq", || Ok(json!({"words": 1}))),
        locator.resolve("wordFreq", || Ok(json!({"words": 2}))),
        locator.resolve("wordFreq", || Ok(json!({"words": 3}))),
    );
    let first = first.unwrap();

    assert_eq!(second.unwrap(), first);
    assert_eq!(third.unwrap(), first);
    assert_eq!(remote.calls("create_file"), 1);
    assert_eq!(remote.calls("set_temporary_state"), 1);
    assert_eq!(remote.file_names(), vec![first.clone()]);
    assert_eq!(remote.mapping("wordFreq"), Some(first));
}

#[tokio::test]
async fn test_new_session_finds_recorded_mapping() {
    let remote = FakeProjectFiles::new();
    let file_name = locator(&remote)
        .resolve("wordFreq", || Ok(json!({"words": 1})))
        .await
        .unwrap();

    let next_session = locator(&remote);
    assert!(next_session.cached("wordFreq").is_none());
    let found = next_session
        .resolve("wordFreq", || panic!("must not provision twice"))
        .await
        .unwrap();
    assert_eq!(found, file_name);
    assert_eq!(remote.file_names(), vec![file_name]);
}

#[tokio::test]
async fn test_interrupted_provisioning_records_no_mapping() {
    let remote = FakeProjectFiles::new();
    let locator = locator(&remote);

    // Both provisioning attempts of the mapping write fail.
    remote.fail("set_temporary_state", 2);
    assert!(locator.resolve("wordFreq", || Ok(json!({}))).await.is_err());
    assert!(remote.mapping("wordFreq").is_none());
    assert!(locator.cached("wordFreq").is_none());

    let file_name = locator.resolve("wordFreq", || Ok(json!({}))).await.unwrap();
    assert_eq!(remote.mapping("wordFreq"), Some(file_name));
    assert_eq!(remote.calls("create_file"), 2);
}

#[tokio::test]
async fn test_failed_initial_write_is_retried_once() {
    let remote = FakeProjectFiles::new();
    let locator = locator(&remote);

    remote.fail("save_file_content", 1);
    let file_name = locator.resolve("wordFreq", || Ok(json!({}))).await.unwrap();
    assert_eq!(remote.calls("save_file_content"), 2);
    assert_eq!(remote.file(&file_name), Some(json!({})));
}

#[tokio::test]
async fn test_per_user_key() {
    let remote = FakeProjectFiles::new();
    let locator = FileLocator::new(remote.clone(), &test_config().with_per_user(true));

    assert_eq!(locator.key().await.unwrap(), "wordFreq-u42");
    assert_eq!(locator.key().await.unwrap(), "wordFreq-u42");
    assert_eq!(remote.calls("current_user_id"), 1);
}

#[tokio::test]
async fn test_new_user_starts_fresh_by_default() {
    let remote = FakeProjectFiles::new();
    remote.seed("wordFreq", "shared.json", json!({"words": 40}));
    let locator = FileLocator::new(remote.clone(), &test_config().with_per_user(true));

    let key = locator.key().await.unwrap();
    let file_name = locator.resolve(&key, || Ok(json!({}))).await.unwrap();

    assert_ne!(file_name, "shared.json");
    assert_eq!(remote.file(&file_name), Some(json!({})));
    assert_eq!(remote.file("shared.json"), Some(json!({"words": 40})));
}

#[tokio::test]
async fn test_new_user_copies_shared_state() {
    let remote = FakeProjectFiles::new();
    remote.seed("wordFreq", "shared.json", json!({"words": 40}));
    let config = test_config()
        .with_per_user(true)
        .with_user_migration(UserMigration::CopyShared);
    let locator = FileLocator::new(remote.clone(), &config);

    let key = locator.key().await.unwrap();
    let file_name = locator.resolve(&key, || Ok(json!({}))).await.unwrap();

    assert!(file_name.starts_with("data-wordFreq-u42-"));
    assert_eq!(remote.file(&file_name), Some(json!({"words": 40})));
    assert_eq!(remote.mapping("wordFreq").as_deref(), Some("shared.json"));
}

#[tokio::test]
async fn test_copy_shared_without_shared_file_starts_fresh() {
    let remote = FakeProjectFiles::new();
    let config = test_config()
        .with_per_user(true)
        .with_user_migration(UserMigration::CopyShared);
    let locator = FileLocator::new(remote.clone(), &config);

    let key = locator.key().await.unwrap();
    let file_name = locator
        .resolve(&key, || Ok(json!({"fresh": true})))
        .await
        .unwrap();
    assert_eq!(remote.file(&file_name), Some(json!({"fresh": true})));
}

#[tokio::test]
async fn test_repoint() {
    let remote = FakeProjectFiles::new();
    remote.seed("wordFreq", "old.json", json!({}));
    let locator = locator(&remote);
    assert_eq!(
        locator.lookup("wordFreq").await.unwrap().as_deref(),
        Some("old.json")
    );

    locator.repoint("wordFreq", "new.json").await.unwrap();
    assert_eq!(locator.cached("wordFreq").as_deref(), Some("new.json"));
    assert_eq!(remote.mapping("wordFreq").as_deref(), Some("new.json"));
}
