use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use httpmock::Method::{GET, POST};
use numista_rs::{
    CacheMode, ClientConfig, ManualClock, NumistaClient, NumistaError, RequestDescriptor,
};
use serde_json::json;

use crate::common::{builder_for, client_for, mock_json, setup_server};

#[tokio::test]
async fn catalogues_second_call_is_served_from_disk_cache() {
    let server = setup_server();
    let dir = tempfile::tempdir().unwrap();
    let body = json!({"catalogues": [{"id": 1}]});
    let mock = mock_json(&server, "/catalogues", 200, &body);

    let client = NumistaClient::builder()
        .config(ClientConfig {
            base_url: server.base_url(),
            api_key: Some("test-key".into()),
            cache_dir: Some(dir.path().to_path_buf()),
            cache_ttl_secs: 604_800,
            rate_limit_requests: 0,
            ..Default::default()
        })
        .build()
        .unwrap();

    let req = RequestDescriptor::get("/catalogues");
    let first = client.execute(&req).await.unwrap();
    assert_eq!(first.status(), 200);
    assert!(!first.served_from_cache());
    assert_eq!(first.payload(), &body);

    let second = client.execute(&req).await.unwrap();
    assert!(second.served_from_cache());
    assert_eq!(second.payload(), first.payload());
    assert_eq!(second.cache_indicator(), "💾");

    mock.assert_calls(1);
    assert!(dir.path().join("http_cache.db").exists());
}

#[tokio::test]
async fn disk_cache_survives_a_new_client() {
    let server = setup_server();
    let dir = tempfile::tempdir().unwrap();
    let mock = mock_json(&server, "/issuers", 200, &json!({"issuers": [{"code": "france"}]}));

    let cfg = ClientConfig {
        base_url: server.base_url(),
        api_key: Some("test-key".into()),
        cache_dir: Some(dir.path().to_path_buf()),
        rate_limit_requests: 0,
        ..Default::default()
    };
    let req = RequestDescriptor::get("/issuers");

    let first = NumistaClient::builder()
        .config(cfg.clone())
        .build()
        .unwrap();
    assert!(!first.execute(&req).await.unwrap().served_from_cache());
    drop(first);

    let second = NumistaClient::builder().config(cfg).build().unwrap();
    let env = second.execute(&req).await.unwrap();
    assert!(env.served_from_cache());
    mock.assert_calls(1);
}

#[tokio::test]
async fn expired_entries_are_refetched_and_replaced() {
    let server = setup_server();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    let client = builder_for(&server)
        .cache_ttl(Duration::from_secs(60))
        .clock(clock.clone())
        .build()
        .unwrap();
    let req = RequestDescriptor::get("/types/420");

    let mut old = mock_json(&server, "/types/420", 200, &json!({"id": 420, "title": "old"}));
    client.execute(&req).await.unwrap();
    clock.advance(Duration::from_secs(59));
    assert!(client.execute(&req).await.unwrap().served_from_cache());
    old.assert_calls(1);
    old.delete();

    let new = mock_json(&server, "/types/420", 200, &json!({"id": 420, "title": "new"}));
    clock.advance(Duration::from_secs(1));
    let refreshed = client.execute(&req).await.unwrap();
    assert!(!refreshed.served_from_cache());
    assert_eq!(refreshed.payload()["title"], "new");

    let cached = client.execute(&req).await.unwrap();
    assert!(cached.served_from_cache());
    assert_eq!(cached.payload()["title"], "new");
    new.assert_calls(1);
}

#[tokio::test]
async fn zero_ttl_disables_caching() {
    let server = setup_server();
    let mock = mock_json(&server, "/catalogues", 200, &json!({"catalogues": []}));
    let client = builder_for(&server).cache_ttl(Duration::ZERO).build().unwrap();
    assert!(!client.cache_enabled());

    let req = RequestDescriptor::get("/catalogues");
    for _ in 0..3 {
        assert!(!client.execute(&req).await.unwrap().served_from_cache());
    }
    mock.assert_calls(3);
}

#[tokio::test]
async fn refresh_skips_lookup_but_stores_and_bypass_does_neither() {
    let server = setup_server();
    let mock = mock_json(&server, "/mints", 200, &json!({"mints": [{"id": 1}]}));
    let client = client_for(&server);
    let req = RequestDescriptor::get("/mints");

    let bypass = client
        .execute_with(&req, CacheMode::Bypass, None)
        .await
        .unwrap();
    assert!(!bypass.served_from_cache());
    // bypass stored nothing
    assert!(!client.execute(&req).await.unwrap().served_from_cache());

    let refreshed = client
        .execute_with(&req, CacheMode::Refresh, None)
        .await
        .unwrap();
    assert!(!refreshed.served_from_cache());
    assert!(client.execute(&req).await.unwrap().served_from_cache());

    mock.assert_calls(3);
}

#[tokio::test]
async fn query_order_does_not_split_the_cache() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/types")
            .query_param("q", "franc")
            .query_param("page", "1");
        then.status(200).body(r#"{"types": []}"#);
    });
    let client = client_for(&server);

    let a = RequestDescriptor::get("/types").query("q", "franc").query("page", 1);
    let b = RequestDescriptor::get("types").query("page", 1).query("q", "franc");
    assert!(!client.execute(&a).await.unwrap().served_from_cache());
    assert!(client.execute(&b).await.unwrap().served_from_cache());
    mock.assert_calls(1);
}

#[tokio::test]
async fn mutating_requests_never_touch_the_cache() {
    let server = setup_server();
    let post = server.mock(|when, then| {
        when.method(POST).path("/users/7/collected_items");
        then.status(201).body(r#"{"id": 99}"#);
    });
    let get = mock_json(&server, "/users/7/collected_items", 200, &json!({"items": []}));
    let client = client_for(&server);

    let create = RequestDescriptor::post("/users/7/collected_items")
        .json(&json!({"type": 420, "quantity": 1}))
        .unwrap();
    for _ in 0..2 {
        let env = client.execute(&create).await.unwrap();
        assert_eq!(env.status(), 201);
        assert!(!env.served_from_cache());
    }
    post.assert_calls(2);

    // the POSTs did not seed anything for the GET of the same path
    let listed = client
        .execute(&RequestDescriptor::get("/users/7/collected_items"))
        .await
        .unwrap();
    assert!(!listed.served_from_cache());
    get.assert_calls(1);
}

#[tokio::test]
async fn undecodable_bodies_fail_and_are_not_cached() {
    let server = setup_server();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/catalogues");
        then.status(200).body("<html>maintenance</html>");
    });
    let client = client_for(&server);
    let req = RequestDescriptor::get("/catalogues");

    for _ in 0..2 {
        let err = client.execute(&req).await.unwrap_err();
        assert!(matches!(err, NumistaError::Decode(_)), "got {err:?}");
    }
    // decode errors are fatal: one call each, no retries, nothing stored
    mock.assert_calls(2);
}

#[tokio::test]
async fn cache_hits_do_not_consume_rate_limit_admissions() {
    let server = setup_server();
    let mock = mock_json(&server, "/catalogues", 200, &json!({"catalogues": []}));
    let client = builder_for(&server)
        .rate_limit(1, Duration::from_secs(3600))
        .build()
        .unwrap();
    let req = RequestDescriptor::get("/catalogues");

    client.execute(&req).await.unwrap();
    let hits = async {
        for _ in 0..5 {
            assert!(client.execute(&req).await.unwrap().served_from_cache());
        }
    };
    tokio::time::timeout(Duration::from_secs(5), hits)
        .await
        .expect("cache hits waited on the limiter");
    mock.assert_calls(1);
}

#[tokio::test]
async fn purge_and_clear_forward_to_the_store() {
    let server = setup_server();
    let mock = mock_json(&server, "/catalogues", 200, &json!({"catalogues": []}));
    let clock = Arc::new(ManualClock::default());
    let client = builder_for(&server)
        .cache_ttl(Duration::from_secs(10))
        .clock(clock.clone())
        .build()
        .unwrap();
    let req = RequestDescriptor::get("/catalogues");

    client.execute(&req).await.unwrap();
    assert_eq!(client.purge_cache().unwrap(), 0);
    clock.advance(Duration::from_secs(11));
    assert_eq!(client.purge_cache().unwrap(), 1);

    client.execute(&req).await.unwrap();
    client.clear_cache().unwrap();
    assert!(!client.execute(&req).await.unwrap().served_from_cache());
    mock.assert_calls(3);
}

#[tokio::test]
async fn clients_for_different_hosts_do_not_share_entries() {
    let dir = tempfile::tempdir().unwrap();
    let server_a = setup_server();
    let server_b = setup_server();
    let mock_a = mock_json(&server_a, "/catalogues", 200, &json!({"host": "a"}));
    let mock_b = mock_json(&server_b, "/catalogues", 200, &json!({"host": "b"}));

    let client_on = |server: &httpmock::MockServer| {
        NumistaClient::builder()
            .config(ClientConfig {
                base_url: server.base_url(),
                api_key: Some("test-key".into()),
                cache_dir: Some(dir.path().to_path_buf()),
                rate_limit_requests: 0,
                ..Default::default()
            })
            .build()
            .unwrap()
    };
    let a = client_on(&server_a);
    let b = client_on(&server_b);
    let req = RequestDescriptor::get("/catalogues");

    assert_eq!(a.execute(&req).await.unwrap().payload()["host"], "a");
    let from_b = b.execute(&req).await.unwrap();
    assert!(!from_b.served_from_cache());
    assert_eq!(from_b.payload()["host"], "b");

    // each host still gets its own hit
    assert_eq!(a.execute(&req).await.unwrap().payload()["host"], "a");
    assert_eq!(b.execute(&req).await.unwrap().payload()["host"], "b");
    mock_a.assert_calls(1);
    mock_b.assert_calls(1);
}

/// Serves an unreadable row for every key and refuses to delete it.
#[derive(Default)]
struct CorruptReadOnlyStore {
    removes: std::sync::atomic::AtomicU32,
}

impl numista_rs::CacheStore for CorruptReadOnlyStore {
    fn lookup(
        &self,
        key: &numista_rs::CacheKey,
    ) -> Result<Option<numista_rs::CacheEntry>, NumistaError> {
        Ok(Some(numista_rs::CacheEntry {
            key: key.clone(),
            status: 200,
            body: b"<html>not json</html>".to_vec(),
            stored_at: Utc::now(),
            ttl: Duration::from_secs(3600),
        }))
    }

    fn store(&self, _entry: numista_rs::CacheEntry) -> Result<(), NumistaError> {
        Ok(())
    }

    fn remove(&self, _key: &numista_rs::CacheKey) -> Result<bool, NumistaError> {
        self.removes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Err(NumistaError::Io(std::io::Error::other("cache is read-only")))
    }

    fn clear(&self) -> Result<(), NumistaError> {
        Ok(())
    }

    fn purge_expired(&self) -> Result<usize, NumistaError> {
        Ok(0)
    }
}

#[tokio::test]
async fn failed_removal_of_a_corrupt_entry_still_reaches_the_network() {
    let server = setup_server();
    let mock = mock_json(&server, "/catalogues", 200, &json!({"catalogues": []}));
    let store = Arc::new(CorruptReadOnlyStore::default());
    let client = builder_for(&server)
        .cache_store(store.clone())
        .build()
        .unwrap();

    let env = client
        .execute(&RequestDescriptor::get("/catalogues"))
        .await
        .unwrap();
    assert!(!env.served_from_cache());
    assert_eq!(env.payload(), &json!({"catalogues": []}));
    assert_eq!(store.removes.load(std::sync::atomic::Ordering::SeqCst), 1);
    mock.assert_calls(1);
}
