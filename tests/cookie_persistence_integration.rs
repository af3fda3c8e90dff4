//! Integration tests for cookie jar persistence across client instances.

use std::sync::Arc;

use catalog_fetch_core::{
    COOKIE_JAR_IDENTIFIER, CatalogClient, ConfigRepository, FetchConfig, FixedLocale,
    RequestOptions, SqliteRepository,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

#[tokio::test]
async fn test_persisted_jar_is_replayed_by_fresh_client() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "sid=persisted; Path=/; Max-Age=3600"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(header("cookie", "sid=persisted"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (repository, first) = support::client();
    let login = first
        .fetch_formatted(&format!("{}/login", server.uri()), RequestOptions::get(), None)
        .await;
    assert!(login.is_success);
    assert!(first.persist_cookies().await.unwrap());
    assert!(
        repository
            .get(COOKIE_JAR_IDENTIFIER)
            .await
            .unwrap()
            .is_some()
    );
    drop(first);

    let second = support::client_over(&repository);
    let feed = second
        .fetch_formatted(&format!("{}/feed", server.uri()), RequestOptions::get(), None)
        .await;
    assert!(feed.is_success, "cookie not restored: {feed:?}");
}

#[tokio::test]
async fn test_unpersisted_cookies_are_lost() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=ephemeral"))
        .mount(&server)
        .await;

    let (repository, first) = support::client();
    first
        .fetch_formatted(&format!("{}/login", server.uri()), RequestOptions::get(), None)
        .await;
    drop(first);

    let second = support::client_over(&repository);
    assert!(second.cookie_store().jar().await.is_empty());
}

#[tokio::test]
async fn test_wipe_clears_cookies_in_memory_and_on_disk() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=abc; Path=/"))
        .mount(&server)
        .await;

    let (repository, client) = support::client();
    client
        .fetch_formatted(&format!("{}/login", server.uri()), RequestOptions::get(), None)
        .await;
    client.persist_cookies().await.unwrap();

    client.wipe_auth_data().await.unwrap();

    assert!(client.cookie_store().jar().await.is_empty());
    assert!(
        repository
            .get(COOKIE_JAR_IDENTIFIER)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_jar_survives_sqlite_reopen() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let temp_dir = tempfile::TempDir::new().unwrap();
    let db_path = temp_dir.path().join("store.db");

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "sid=disk; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(header("cookie", "sid=disk"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let open = |repository: Arc<SqliteRepository>| {
        CatalogClient::new(
            repository as Arc<dyn ConfigRepository>,
            FetchConfig::default(),
            Arc::new(FixedLocale::new("en-US")),
        )
    };

    {
        let repository = Arc::new(SqliteRepository::new(&db_path).await.unwrap());
        let client = open(Arc::clone(&repository));
        client
            .fetch_formatted(&format!("{}/login", server.uri()), RequestOptions::get(), None)
            .await;
        client.persist_cookies().await.unwrap();
        repository.close().await;
    }

    let repository = Arc::new(SqliteRepository::new(&db_path).await.unwrap());
    let client = open(Arc::clone(&repository));
    let feed = client
        .fetch_formatted(&format!("{}/feed", server.uri()), RequestOptions::get(), None)
        .await;
    assert!(feed.is_success, "{feed:?}");
    repository.close().await;
}
