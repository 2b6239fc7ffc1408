//! In-process mock of the OpenAQ v3 API used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, Request};
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{Value, json};
use tokio::sync::Mutex;

pub const LOCATIONS_FOUND: u64 = 2_500;

#[derive(Default)]
pub struct TestServerState {
    pub request_count: AtomicUsize,
    pub last_path: Mutex<Option<String>>,
    pub last_query: Mutex<Option<HashMap<String, String>>>,
    pub last_api_key: Mutex<Option<String>>,
    pub last_user_agent: Mutex<Option<String>>,
    /// Reported in `x-ratelimit-remaining`.
    pub remaining: AtomicU32,
    /// Reported in `x-ratelimit-reset`.
    pub reset: AtomicU32,
    /// When set, every request is answered with this status.
    pub forced_status: Mutex<Option<u16>>,
    /// When set, every request is answered 200 with this body.
    pub forced_body: Mutex<Option<Value>>,
    /// Location listings report `found` as `">1000"`.
    pub found_lower_bound: AtomicBool,
    /// Milliseconds to sit on each request before answering.
    pub delay_ms: AtomicU64,
}

impl TestServerState {
    pub fn new() -> Arc<Self> {
        let state = Self::default();
        state.remaining.store(59, Ordering::Relaxed);
        state.reset.store(60, Ordering::Relaxed);
        Arc::new(state)
    }

    pub fn requests(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }
}

fn manifest_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub fn load_test_data(filename: &str) -> Value {
    let path = manifest_path().join("test_data").join(filename);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to load test data from {path:?}: {e}"));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse test data from {path:?}: {e}"))
}

fn respond(state: &TestServerState, status: StatusCode, body: Value) -> Response {
    let remaining = state.remaining.load(Ordering::Relaxed);
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("x-ratelimit-limit", "60")
        .header("x-ratelimit-remaining", remaining.to_string())
        .header("x-ratelimit-used", (60u32.saturating_sub(remaining)).to_string())
        .header("x-ratelimit-reset", state.reset.load(Ordering::Relaxed).to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn not_found(state: &TestServerState, what: &str) -> Response {
    respond(
        state,
        StatusCode::NOT_FOUND,
        json!({"detail": format!("{what} not found")}),
    )
}

/// Serves `limit` synthetic locations for `page`, out of [`LOCATIONS_FOUND`].
fn locations_page(params: &HashMap<String, String>, lower_bound: bool) -> Value {
    let page: u64 = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: u64 = params.get("limit").and_then(|l| l.parse().ok()).unwrap_or(100);
    let template = load_test_data("locations.json")["results"][0].clone();

    let first = (page - 1) * limit;
    let last = (first + limit).min(LOCATIONS_FOUND);
    let results: Vec<Value> = (first..last)
        .map(|i| {
            let mut location = template.clone();
            location["id"] = json!(i + 1);
            location
        })
        .collect();
    let found = if lower_bound {
        json!(">1000")
    } else {
        json!(LOCATIONS_FOUND)
    };

    json!({
        "meta": {"name": "openaq-api", "website": "/", "page": page, "limit": limit, "found": found},
        "results": results,
    })
}

fn single(fixture: &str, id: u64) -> Option<Value> {
    let mut data = load_test_data(fixture);
    let found = data["results"]
        .as_array()
        .and_then(|results| results.iter().find(|r| r["id"] == json!(id)).cloned())?;
    data["results"] = json!([found]);
    data["meta"]["found"] = json!(1);
    Some(data)
}

fn header(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn id(segment: &str) -> Option<u64> {
    segment.parse().ok()
}

async fn mock_handler(req: Request, state: Arc<TestServerState>) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let path = req.uri().path().to_string();
    let params = Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .map(|Query(p)| p)
        .unwrap_or_default();
    let api_key = header(&req, "x-api-key");
    let user_agent = header(&req, "user-agent");
    drop(req);

    *state.last_api_key.lock().await = api_key;
    *state.last_user_agent.lock().await = user_agent;
    *state.last_path.lock().await = Some(path.clone());
    *state.last_query.lock().await = Some(params.clone());

    let delay = state.delay_ms.load(Ordering::Relaxed);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    if let Some(code) = *state.forced_status.lock().await {
        let status = StatusCode::from_u16(code).unwrap();
        return respond(&state, status, json!({"detail": format!("forced {code}")}));
    }

    if let Some(body) = state.forced_body.lock().await.clone() {
        return respond(&state, StatusCode::OK, body);
    }

    let segments: Vec<&str> = path
        .trim_start_matches("/v3/")
        .trim_end_matches('/')
        .split('/')
        .collect();

    let body = match segments.as_slice() {
        ["locations"] => Some(locations_page(
            &params,
            state.found_lower_bound.load(Ordering::Relaxed),
        )),
        ["locations", n] => id(n).and_then(|n| single("locations.json", n)),
        ["locations", n, "latest"] if id(n) == Some(2178) => Some(load_test_data("latest.json")),
        ["locations", n, "sensors"] if id(n) == Some(2178) => Some(load_test_data("sensors.json")),
        ["sensors", n] => id(n).and_then(|n| single("sensors.json", n)),
        ["sensors", _, "measurements" | "hours" | "days" | "years", ..] => {
            Some(load_test_data("measurements.json"))
        }
        ["parameters"] => Some(load_test_data("parameters.json")),
        ["parameters", n] => id(n).and_then(|n| single("parameters.json", n)),
        ["parameters", _, "latest"] => Some(load_test_data("latest.json")),
        ["manufacturers", n, "instruments"] if id(n) == Some(4) => {
            let mut data = load_test_data("instruments.json");
            data["results"] = json!([data["results"][1].clone()]);
            Some(data)
        }
        [resource] => {
            let fixture = format!("{resource}.json");
            manifest_path()
                .join("test_data")
                .join(&fixture)
                .exists()
                .then(|| load_test_data(&fixture))
        }
        [resource, n] => id(n).and_then(|n| single(&format!("{resource}.json"), n)),
        _ => None,
    };

    match body {
        Some(body) => respond(&state, StatusCode::OK, body),
        None => not_found(&state, &path),
    }
}

pub fn create_router(state: Arc<TestServerState>) -> Router {
    Router::new().fallback(move |req| {
        let state = state.clone();
        async move { mock_handler(req, state).await }
    })
}

/// Starts the mock on the current runtime and returns its API root.
pub async fn start_server(state: Arc<TestServerState>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{addr}/v3/")
}

/// Starts the mock on a background thread with its own runtime, for tests
/// that drive the blocking client.
pub fn start_blocking_server(state: Arc<TestServerState>) -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, create_router(state)).await.unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    format!("http://{addr}/v3/")
}
