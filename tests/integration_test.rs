//! Integration tests for the capture-replay cycle

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use tempfile::TempDir;
use tokio::sync::oneshot;

use acache::capture::{CacheManager, Fetch};
use acache::config::Config;
use acache::key::alias_key;
use acache::network::HttpServer;
use acache::proxy::HttpProxy;
use acache::replay::ReplayServer;
use acache::storage::RouteStore;
use acache::{AcacheError, Result};

/// Answers every URL with a fixed JSON body
struct StubFetcher {
    body: &'static str,
    content_type: &'static str,
}

impl Fetch for StubFetcher {
    type Body = Full<Bytes>;

    async fn fetch(&self, _url: &str) -> Result<Response<Full<Bytes>>> {
        Ok(Response::builder()
            .header("Content-Type", self.content_type)
            .body(Full::new(Bytes::from_static(self.body.as_bytes())))
            .unwrap())
    }
}

fn json_fetcher() -> StubFetcher {
    StubFetcher {
        body: "{\"x\":1}",
        content_type: "application/json",
    }
}

fn initialized_store() -> Arc<RouteStore> {
    let store = RouteStore::open_in_memory().unwrap();
    store.init_bucket().unwrap();
    Arc::new(store)
}

fn local_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        ..Config::default()
    }
}

/// Bind a replay server and serve it in the background
async fn spawn_replay(store: &RouteStore) -> (SocketAddr, oneshot::Sender<()>) {
    let server = ReplayServer::bind(store, &local_config()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(server.serve_until(async {
        rx.await.ok();
    }));

    (addr, tx)
}

#[tokio::test]
async fn test_capture_then_replay() {
    let store = initialized_store();
    let manager = CacheManager::new(Arc::clone(&store), json_fetcher());

    manager
        .add_route("https://example.test/data", "mydata")
        .await
        .unwrap();

    let (addr, shutdown) = spawn_replay(&store).await;

    let response = reqwest::get(format!("http://{addr}/mydata")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.text().await.unwrap(), "{\"x\":1}");

    let missing = reqwest::get(format!("http://{addr}/other")).await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_routes_in_key_order() {
    let store = initialized_store();
    let manager = CacheManager::new(Arc::clone(&store), json_fetcher());

    manager.add_route("https://example.test/b", "b").await.unwrap();
    manager.add_route("https://example.test/a", "a").await.unwrap();

    let routes = store.get_all().unwrap();
    assert_eq!(routes.len(), 2);

    let mut expected = vec![
        (alias_key("a").unwrap(), "a"),
        (alias_key("b").unwrap(), "b"),
    ];
    expected.sort();

    let aliases: Vec<_> = routes.iter().map(|r| r.alias.as_str()).collect();
    let expected_aliases: Vec<_> = expected.iter().map(|(_, alias)| *alias).collect();
    assert_eq!(aliases, expected_aliases);
}

#[tokio::test]
async fn test_contains_url_after_overwrite() {
    let store = initialized_store();
    let manager = CacheManager::new(Arc::clone(&store), json_fetcher());

    manager.add_route("https://example.test/v1", "data").await.unwrap();
    assert!(store.contains_url("https://example.test/v1").unwrap());

    manager.add_route("https://example.test/v2", "data").await.unwrap();
    assert!(!store.contains_url("https://example.test/v1").unwrap());
    assert!(store.contains_url("https://example.test/v2").unwrap());
    assert_eq!(store.get_all().unwrap().len(), 1);
}

#[tokio::test]
async fn test_clear_then_reinit() {
    let store = initialized_store();
    let manager = CacheManager::new(Arc::clone(&store), json_fetcher());
    manager.add_route("https://example.test/data", "mydata").await.unwrap();

    store.clear().unwrap();
    assert!(matches!(store.get_all(), Err(AcacheError::NoBucket(_))));

    let err = manager
        .add_route("https://example.test/data", "mydata")
        .await
        .unwrap_err();
    assert!(matches!(err, AcacheError::NoBucket(_)));

    store.init_bucket().unwrap();
    assert!(store.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn test_replay_without_bucket_fails() {
    let store = RouteStore::open_in_memory().unwrap();

    let result = ReplayServer::bind(&store, &local_config()).await;
    assert!(matches!(result, Err(AcacheError::NoBucket(_))));
}

#[tokio::test]
async fn test_snapshot_taken_at_startup() {
    let store = initialized_store();
    let manager = CacheManager::new(Arc::clone(&store), json_fetcher());
    manager.add_route("https://example.test/first", "first").await.unwrap();

    let (addr, shutdown) = spawn_replay(&store).await;

    manager.add_route("https://example.test/late", "late").await.unwrap();

    let first = reqwest::get(format!("http://{addr}/first")).await.unwrap();
    assert_eq!(first.status().as_u16(), 200);

    let late = reqwest::get(format!("http://{addr}/late")).await.unwrap();
    assert_eq!(late.status().as_u16(), 404);

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_persisted_store_replays_after_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("acache.db");

    {
        let store = Arc::new(RouteStore::open(&path).unwrap());
        store.init_bucket().unwrap();

        let manager = CacheManager::new(Arc::clone(&store), json_fetcher());
        manager.add_route("https://example.test/data", "mydata").await.unwrap();
    }

    let store = RouteStore::open(&path).unwrap();
    assert!(store.ensure_bucket().is_ok_and(|created| !created));

    let (addr, shutdown) = spawn_replay(&store).await;

    let body = reqwest::get(format!("http://{addr}/mydata"))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(body.as_ref(), b"{\"x\":1}");

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_proxy_then_replay() {
    let store = initialized_store();
    let manager = Arc::new(CacheManager::new(Arc::clone(&store), json_fetcher()));
    let proxy = HttpProxy::new(manager, "https://example.test/api", "text/plain").unwrap();

    let server = HttpServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), 8)
        .await
        .unwrap();
    let proxy_addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.serve_until(Arc::new(proxy), async {
        rx.await.ok();
    }));

    let proxied = reqwest::get(format!("http://{proxy_addr}/users/1"))
        .await
        .unwrap();
    assert_eq!(proxied.status().as_u16(), 200);
    assert_eq!(proxied.text().await.unwrap(), "{\"x\":1}");
    tx.send(()).ok();

    assert!(store.contains_url("https://example.test/api/users/1").unwrap());

    let (addr, shutdown) = spawn_replay(&store).await;
    let replayed = reqwest::get(format!("http://{addr}/users/1")).await.unwrap();
    assert_eq!(replayed.headers()["content-type"], "application/json");
    assert_eq!(replayed.text().await.unwrap(), "{\"x\":1}");

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_non_ascii_alias_replays() {
    let store = initialized_store();
    let manager = CacheManager::new(Arc::clone(&store), json_fetcher());
    manager.add_route("https://example.test/c", "café").await.unwrap();

    let (addr, shutdown) = spawn_replay(&store).await;

    // The client sends the path percent-encoded as /caf%C3%A9
    let response = reqwest::get(format!("http://{addr}/café")).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "{\"x\":1}");

    shutdown.send(()).ok();
}

#[tokio::test]
async fn test_proxy_encoded_path_then_replay() {
    let store = initialized_store();
    let manager = Arc::new(CacheManager::new(Arc::clone(&store), json_fetcher()));
    let proxy = HttpProxy::new(manager, "https://example.test/api", "text/plain").unwrap();

    let server = HttpServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), 8)
        .await
        .unwrap();
    let proxy_addr = server.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(server.serve_until(Arc::new(proxy), async {
        rx.await.ok();
    }));

    let proxied = reqwest::get(format!("http://{proxy_addr}/caf%C3%A9/menu"))
        .await
        .unwrap();
    assert_eq!(proxied.status().as_u16(), 200);
    tx.send(()).ok();

    let routes = store.get_all().unwrap();
    assert_eq!(routes.iter().next().unwrap().alias, "café/menu");

    let (addr, shutdown) = spawn_replay(&store).await;
    let replayed = reqwest::get(format!("http://{addr}/caf%C3%A9/menu"))
        .await
        .unwrap();
    assert_eq!(replayed.status().as_u16(), 200);
    assert_eq!(replayed.text().await.unwrap(), "{\"x\":1}");

    shutdown.send(()).ok();
}
