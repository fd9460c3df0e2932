use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use sensor_hub::{
    auth::AuthGate,
    build_state,
    cache::LatestCache,
    config::HubConfig,
    domain::{Aggregate, Channel, Reading},
    error::StoreError,
    handlers::AppState,
    ingest::IngestSchema,
    server::build_router,
    store::{DisconnectedStore, MemoryStore, Store, TimeoutStore},
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

const TOKEN: &str = "device-secret";

struct Hub {
    app: Router,
    store: Arc<MemoryStore>,
    cache: Arc<LatestCache>,
}

fn hub_with(secret: Option<&str>, require_write_auth: bool, schema: IngestSchema) -> Hub {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LatestCache::new());
    let state = Arc::new(AppState {
        store: store.clone(),
        cache: cache.clone(),
        auth: AuthGate::new(secret.map(str::to_string)),
        require_write_auth,
        schema,
    });
    Hub {
        app: build_router(state, None),
        store,
        cache,
    }
}

fn hub() -> Hub {
    hub_with(Some(TOKEN), true, IngestSchema::default())
}

fn post_update(body: &str, auth: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method("POST")
        .uri("/api/sensor-update")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        req = req.header(header::AUTHORIZATION, auth);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn bearer() -> Option<&'static str> {
    Some("Bearer device-secret")
}

#[tokio::test]
async fn ingest_then_latest() {
    let hub = hub();

    let resp = send(&hub.app, post_update(r#"{"temp":21.5,"humidity":60.2}"#, bearer())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["success"], json!(true));
    assert_eq!(v["data"]["temp"], json!(21.5));
    assert_eq!(v["data"]["humidity"], json!(60.2));
    assert!(v["data"]["observedAt"].is_string());

    let resp = send(&hub.app, get("/api/latest")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["temp"], json!(21.5));
    assert_eq!(v["humidity"], json!(60.2));
    assert!(v.get("lpg").is_none());

    assert_eq!(hub.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn latest_before_any_ingest_is_sentinel() {
    let hub = hub();
    let resp = send(&hub.app, get("/api/latest")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"temp": 0.0, "humidity": 0.0}));
}

#[tokio::test]
async fn non_numeric_channel_is_rejected_without_mutation() {
    let hub = hub();
    let resp = send(&hub.app, post_update(r#"{"temp":"hot","humidity":60.2}"#, bearer())).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(resp).await,
        json!({"success": false, "error": "Invalid data format"})
    );
    assert_eq!(*hub.cache.get().await, Reading::default());
    assert_eq!(hub.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_channel_is_rejected_without_mutation() {
    let hub = hub();
    send(&hub.app, post_update(r#"{"temp":10,"humidity":20}"#, bearer())).await;
    let before = hub.cache.get().await;

    let resp = send(&hub.app, post_update(r#"{"temp":11}"#, bearer())).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(hub.cache.get().await, before);
    assert_eq!(hub.store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let hub = hub();
    let resp = send(&hub.app, post_update("{temp: 21.5", bearer())).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(resp).await,
        json!({"success": false, "error": "Invalid JSON"})
    );
}

#[tokio::test]
async fn required_gas_channels_are_enforced() {
    let hub = hub_with(
        Some(TOKEN),
        true,
        IngestSchema::new(&[Channel::Lpg, Channel::Co, Channel::Smoke]),
    );
    let resp = send(&hub.app, post_update(r#"{"temp":1,"humidity":2,"lpg":3}"#, bearer())).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &hub.app,
        post_update(r#"{"temp":1,"humidity":2,"lpg":3,"co":4,"smoke":5}"#, bearer()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(hub.cache.get().await.smoke, Some(5.0));
}

#[tokio::test]
async fn missing_and_wrong_credentials_are_distinguished() {
    let hub = hub();
    let body = r#"{"temp":21.5,"humidity":60.2}"#;

    let resp = send(&hub.app, post_update(body, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(resp).await["success"], json!(false));

    let resp = send(&hub.app, post_update(body, Some("Token device-secret"))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(&hub.app, post_update(body, Some("Bearer wrong"))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    assert_eq!(*hub.cache.get().await, Reading::default());
    assert_eq!(hub.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn auth_runs_before_validation() {
    let hub = hub();
    let resp = send(&hub.app, post_update("not json", Some("Bearer wrong"))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_server_secret_fails_closed() {
    let hub = hub_with(None, true, IngestSchema::default());
    for auth in [None, Some("Bearer "), Some("Bearer anything")] {
        let resp = send(&hub.app, post_update(r#"{"temp":1,"humidity":2}"#, auth)).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v = json_body(resp).await;
        assert_eq!(v["success"], json!(false));
        assert_eq!(v["error"], json!("Server write token is not configured"));
    }
    assert_eq!(hub.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn write_auth_can_be_disabled_explicitly() {
    let hub = hub_with(None, false, IngestSchema::default());
    let resp = send(&hub.app, post_update(r#"{"temp":1,"humidity":2}"#, None)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn failed_append_leaves_cache_untouched() {
    let hub = hub();
    send(&hub.app, post_update(r#"{"temp":10,"humidity":20}"#, bearer())).await;
    let before = hub.cache.get().await;

    hub.store.fail_appends(true);
    let resp = send(&hub.app, post_update(r#"{"temp":30,"humidity":40}"#, bearer())).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(resp).await,
        json!({"success": false, "error": "Store unavailable"})
    );
    assert_eq!(hub.cache.get().await, before);
    assert_eq!(hub.store.rows().await, vec![before.as_ref().clone()]);

    let v = json_body(send(&hub.app, get("/api/latest")).await).await;
    assert_eq!(v["temp"], json!(10.0));
}

/// a store that never answers
struct HungStore;

#[async_trait]
impl Store for HungStore {
    async fn append(&self, _reading: &Reading) -> Result<DateTime<Utc>, StoreError> {
        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        Ok(Utc::now())
    }

    async fn latest(&self) -> Result<Option<Reading>, StoreError> {
        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        Ok(None)
    }

    async fn window_aggregate(&self, _window: StdDuration) -> Result<Aggregate, StoreError> {
        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        Ok(Aggregate::default())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

#[tokio::test]
async fn hung_store_times_out_without_touching_cache() {
    let cache = Arc::new(LatestCache::with_reading(Reading::new(10.0, 20.0)));
    let state = Arc::new(AppState {
        store: Arc::new(TimeoutStore::new(HungStore, StdDuration::from_millis(50))),
        cache: cache.clone(),
        auth: AuthGate::new(Some(TOKEN.into())),
        require_write_auth: true,
        schema: IngestSchema::default(),
    });
    let app = build_router(state, None);

    let resp = send(&app, post_update(r#"{"temp":30,"humidity":40}"#, bearer())).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        json_body(resp).await,
        json!({"success": false, "error": "Store unavailable"})
    );
    assert_eq!(*cache.get().await, Reading::new(10.0, 20.0));

    let resp = send(&app, get("/api/stats")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn stats_cover_only_the_last_24h() {
    let hub = hub();
    let now = Utc::now();
    for i in 0..10 {
        hub.store
            .insert_at(
                Reading::new(20.0 + i as f64, 40.0 + i as f64),
                now - Duration::hours(i),
            )
            .await;
    }
    hub.store
        .insert_at(Reading::new(-40.0, 100.0), now - Duration::hours(25))
        .await;

    let resp = send(&hub.app, get("/api/stats")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["readings24h"], json!(10));
    assert_eq!(v["maxTemp24h"], json!(29.0));
    assert_eq!(v["minTemp24h"], json!(20.0));
    assert_eq!(v["avgHum24h"], json!(44.5));
}

#[tokio::test]
async fn stats_never_consult_the_cache() {
    let hub = hub();
    hub.cache.set(Reading::new(50.0, 50.0)).await;
    let v = json_body(send(&hub.app, get("/api/stats")).await).await;
    assert_eq!(v["readings24h"], json!(0));
    assert_eq!(v["maxTemp24h"], json!(0.0));
}

#[tokio::test]
async fn store_outage_degrades_gracefully() {
    let mut config = HubConfig::default();
    config.auth.write_token = Some(TOKEN.into());
    let state = build_state(&config, Arc::new(DisconnectedStore)).await;
    let app = build_router(state, None);

    let resp = send(&app, get("/api/latest")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"temp": 0.0, "humidity": 0.0}));

    let resp = send(&app, get("/api/stats")).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["success"], json!(false));

    let resp = send(&app, post_update(r#"{"temp":1,"humidity":2}"#, bearer())).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn build_state_seeds_cache_from_store() {
    let store = Arc::new(MemoryStore::new());
    store.append(&Reading::new(18.0, 55.0)).await.unwrap();

    let state = build_state(&HubConfig::default(), store).await;
    let app = build_router(state, None);

    let v = json_body(send(&app, get("/api/latest")).await).await;
    assert_eq!(v["temp"], json!(18.0));
    assert!(v["observedAt"].is_string());
}

#[tokio::test]
async fn preflight_is_no_content_with_cors_headers() {
    let hub = hub();
    for uri in ["/api/sensor-update", "/api/latest", "/anything"] {
        let resp = send(
            &hub.app,
            Request::builder()
                .method("OPTIONS")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT, "{uri}");
        let headers = resp.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS"
        );
        let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
        assert!(bytes.is_empty());
    }
}

#[tokio::test]
async fn error_responses_carry_cors_headers() {
    let hub = hub();
    let resp = send(&hub.app, post_update("{}", Some("Bearer wrong"))).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(resp
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));

    let resp = send(&hub.app, get("/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        json_body(resp).await,
        json!({"success": false, "error": "Not Found"})
    );
}

#[tokio::test]
async fn responses_carry_request_id() {
    let hub = hub();
    let resp = send(&hub.app, get("/healthz")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(json_body(resp).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn wrong_method_on_known_route_is_not_ok() {
    let hub = hub();
    let cases = [
        ("GET", "/api/sensor-update"),
        ("POST", "/api/latest"),
        ("POST", "/api/stats"),
        ("DELETE", "/healthz"),
    ];
    for (method, uri) in cases {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let resp = send(&hub.app, req).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(
            json_body(resp).await,
            json!({"success": false, "error": "Method Not Allowed"})
        );
    }
    assert_eq!(hub.store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn oversized_body_is_rejected_with_json() {
    let hub = hub();
    let padding = "x".repeat(3 * 1024 * 1024);
    let body = format!(r#"{{"temp":1,"humidity":2,"pad":"{padding}"}}"#);

    let resp = send(&hub.app, post_update(&body, bearer())).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        json_body(resp).await,
        json!({"success": false, "error": "Payload Too Large"})
    );

    // auth still runs first
    let resp = send(&hub.app, post_update(&body, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(hub.store.count().await.unwrap(), 0);
    assert_eq!(*hub.cache.get().await, Reading::default());
}
