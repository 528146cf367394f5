//! Drives the access-key repository end to end: create, limit, enforce,
//! rename, and remove, against real (tempdir-backed) persisted state and a
//! real `/bin/true` proxy child process.

use std::sync::Arc;

use shadowbox_core::modules::access_key::AccessKeyRepository;
use shadowbox_core::modules::port_provider::PortProvider;
use shadowbox_core::modules::proxy_supervisor::{ProxySupervisor, ProxySupervisorSettings};
use shadowbox_core::modules::scraper_client::{ScraperClient, ScraperClientConfig};
use shadowbox_core::modules::server_config::ServerConfigStore;
use shadowbox_core::modules::usage_reader::UsageReader;
use shadowbox_types::DataLimit;

async fn build_repo(dir: &std::path::Path) -> Arc<AccessKeyRepository> {
    let port_provider = Arc::new(PortProvider::new());
    let server_config = Arc::new(
        ServerConfigStore::load(
            dir.join("shadowbox_server_config.json"),
            "shadowbox".to_string(),
            "1.0.0".to_string(),
            port_provider.clone(),
        )
        .await
        .unwrap(),
    );
    let proxy_supervisor = Arc::new(ProxySupervisor::new(ProxySupervisorSettings {
        binary_path: "/bin/true".into(),
        config_path: dir.join("outline-ss-server/config.yml"),
        mmdb_path: None,
        replay_protection: false,
    }));
    let scraper_client = ScraperClient::new(ScraperClientConfig::new("http://127.0.0.1:1")).unwrap();
    let usage_reader = Arc::new(UsageReader::new(scraper_client));

    AccessKeyRepository::load(
        dir.join("shadowbox_config.json"),
        server_config,
        port_provider,
        proxy_supervisor,
        usage_reader,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn create_rename_limit_and_remove_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let repo = build_repo(dir.path()).await;

    let key = repo.create_new_access_key().await.unwrap();
    assert_eq!(key.id, "0");

    let second = repo.create_new_access_key().await.unwrap();
    assert_eq!(second.id, "1", "ids are assigned sequentially and never reused within a run");

    repo.rename_access_key(&key.id, "laptop".to_string()).await.unwrap();
    let keys = repo.list_access_keys().await;
    assert_eq!(keys.iter().find(|k| k.id == key.id).unwrap().name, "laptop");

    // No usage is ever reported by the unreachable scraper fixture, so a
    // fresh limit never trips enforcement.
    repo.set_access_key_data_limit(&key.id, DataLimit { bytes: 1024 }).await.unwrap();
    assert!(!repo.is_over_data_limit(&key.id));

    repo.remove_access_key_data_limit(&key.id).await.unwrap();
    repo.remove_access_key(&second.id).await.unwrap();

    let keys = repo.list_access_keys().await;
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].id, key.id);
}

#[tokio::test]
async fn rename_rejects_overlong_names() {
    let dir = tempfile::tempdir().unwrap();
    let repo = build_repo(dir.path()).await;
    let key = repo.create_new_access_key().await.unwrap();

    let err = repo.rename_access_key(&key.id, "x".repeat(101)).await.unwrap_err();
    assert_eq!(err, shadowbox_types::ShadowboxError::InvalidName { name: "x".repeat(101) });
}

#[tokio::test]
async fn mutations_against_unknown_id_fail_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let repo = build_repo(dir.path()).await;

    let err = repo.remove_access_key("missing").await.unwrap_err();
    assert_eq!(err, shadowbox_types::ShadowboxError::AccessKeyNotFound { id: "missing".to_string() });
}

#[tokio::test]
async fn ids_are_not_reused_across_a_repository_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let repo = build_repo(dir.path()).await;
        let key = repo.create_new_access_key().await.unwrap();
        repo.remove_access_key(&key.id).await.unwrap();
    }

    let reloaded = build_repo(dir.path()).await;
    let next = reloaded.create_new_access_key().await.unwrap();
    assert_eq!(next.id, "1", "next_id must survive a reload even though id 0 was freed");
}
