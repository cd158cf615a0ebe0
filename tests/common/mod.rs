//! Shared fixtures: an in-process fake library backend and a fake device

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use campus_library_core::{
    config::AppConfig,
    models::{PermissionStatus, Platform},
    repository::Repository,
    services::push::PushPlatform,
    AppResult, ClientContext,
};

pub const EMAIL: &str = "ada@campus.edu";
pub const PASSWORD: &str = "correct-horse";
pub const SESSION_TOKEN: &str = "tok-ada";
pub const DEVICE_TOKEN: &str = "ExponentPushToken[fake-device]";

/// Address that refuses connections immediately
pub const DEAD_ADDRESS: &str = "127.0.0.1:1";

/// A push token the backend received
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedPushToken {
    pub bearer: String,
    pub token: String,
    pub platform: String,
}

#[derive(Default)]
pub struct Backend {
    pub address: String,
    valid_tokens: Mutex<HashSet<String>>,
    push_tokens: Mutex<Vec<ReceivedPushToken>>,
    fail_push: AtomicBool,
    reject_push_session: AtomicBool,
    pub health_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
}

impl Backend {
    pub fn revoke(&self, token: &str) {
        self.valid_tokens.lock().unwrap().remove(token);
    }

    pub fn fail_push(&self, fail: bool) {
        self.fail_push.store(fail, Ordering::SeqCst);
    }

    /// Answer push-token uploads with 401 even for valid sessions
    pub fn reject_push_session(&self, reject: bool) {
        self.reject_push_session.store(reject, Ordering::SeqCst);
    }

    pub fn push_tokens(&self) -> Vec<ReceivedPushToken> {
        self.push_tokens.lock().unwrap().clone()
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    fn is_valid(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .to_string();
        self.valid_tokens
            .lock()
            .unwrap()
            .contains(&token)
            .then_some(token)
    }
}

fn ada() -> Value {
    json!({
        "_id": "u1",
        "name": "Ada Lovelace",
        "email": EMAIL,
        "studentId": "S42",
        "department": "Mathematics"
    })
}

type Reply = (StatusCode, Json<Value>);

fn unauthorized() -> Reply {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Token expired" })))
}

async fn health(State(backend): State<Arc<Backend>>) -> Json<Value> {
    backend.health_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "ok" }))
}

async fn login(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Reply {
    backend.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        backend.valid_tokens.lock().unwrap().insert(SESSION_TOKEN.to_string());
        (StatusCode::OK, Json(json!({ "token": SESSION_TOKEN, "user": ada() })))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid email or password" })),
        )
    }
}

async fn register(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Reply {
    if body["email"] == EMAIL {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Email already registered" })),
        );
    }
    let token = format!("tok-{}", body["name"].as_str().unwrap_or("new").to_lowercase());
    backend.valid_tokens.lock().unwrap().insert(token.clone());
    let user = json!({
        "id": "u2",
        "name": body["name"],
        "email": body["email"],
        "studentId": body["studentId"],
    });
    (StatusCode::CREATED, Json(json!({ "token": token, "user": user })))
}

async fn me(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    match backend.is_valid(&headers) {
        Some(_) => (StatusCode::OK, Json(json!({ "user": ada() }))),
        None => unauthorized(),
    }
}

async fn push_token(State(backend): State<Arc<Backend>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    let Some(bearer) = backend.is_valid(&headers) else {
        return unauthorized();
    };
    if backend.reject_push_session.load(Ordering::SeqCst) {
        return unauthorized();
    }
    if backend.fail_push.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "message": "Push service unavailable" })),
        );
    }
    backend.push_tokens.lock().unwrap().push(ReceivedPushToken {
        bearer,
        token: body["pushToken"].as_str().unwrap_or_default().to_string(),
        platform: body["platform"].as_str().unwrap_or_default().to_string(),
    });
    (StatusCode::OK, Json(json!({ "success": true, "user": ada() })))
}

async fn loans(State(backend): State<Arc<Backend>>, headers: HeaderMap) -> Reply {
    match backend.is_valid(&headers) {
        Some(_) => (StatusCode::OK, Json(json!([]))),
        None => unauthorized(),
    }
}

async fn reports() -> Reply {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "message": "Librarian role required" })),
    )
}

/// Spawn the fake backend on an ephemeral port
pub async fn spawn_backend() -> Arc<Backend> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let backend = Arc::new(Backend {
        address: format!("127.0.0.1:{}", port),
        ..Default::default()
    });

    let api = Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/users/push-token", post(push_token))
        .route("/loans", get(loans))
        .route("/admin/reports", get(reports))
        .with_state(backend.clone());
    let app = Router::new().nest("/api", api);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    backend
}

/// Config whose first candidate is dead and second is `address`
pub fn config_for(address: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.discovery.candidates = vec![DEAD_ADDRESS.to_string(), address.to_string()];
    config.discovery.probe_timeout_ms = 500;
    config.discovery.manual_probe_timeout_ms = 500;
    config.http.request_timeout_secs = 5;
    config.push.registration_delay_ms = 50;
    config
}

pub fn context(config: AppConfig, repository: Repository, platform: Arc<FakeDevice>) -> ClientContext {
    ClientContext::new(config, repository, platform).unwrap()
}

/// Physical device whose user answers the permission prompt with `answer`
pub struct FakeDevice {
    answer: PermissionStatus,
    granted: AtomicBool,
    pub prompts: AtomicUsize,
}

impl FakeDevice {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self {
            answer: PermissionStatus::Granted,
            granted: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn declining() -> Arc<Self> {
        Arc::new(Self {
            answer: PermissionStatus::Denied,
            granted: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
        })
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushPlatform for FakeDevice {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn is_physical_device(&self) -> bool {
        true
    }

    async fn permission_status(&self) -> PermissionStatus {
        if self.granted.load(Ordering::SeqCst) {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Undetermined
        }
    }

    async fn request_permission(&self) -> PermissionStatus {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.answer == PermissionStatus::Granted {
            self.granted.store(true, Ordering::SeqCst);
        }
        self.answer
    }

    async fn obtain_token(&self) -> AppResult<String> {
        Ok(DEVICE_TOKEN.to_string())
    }
}
