//! Integration test harness for the back office.
//!
//! Drives the full router (access guard, sessions, handlers) in-process with
//! `tower::ServiceExt::oneshot`, over an in-memory document store and the
//! tower-sessions memory store. Sign-in goes through a test-only route that
//! writes the principal the same way the passkey handlers do.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p backoffice-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    routing::post,
};
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use tower_sessions::{MemoryStore, Session};

use backoffice_admin::config::BackOfficeConfig;
use backoffice_admin::db::{
    Collection, Document, DocumentStore, MemoryDocumentStore, ProfileRepository, StoreError,
};
use backoffice_admin::middleware::set_current_principal;
use backoffice_admin::models::{Principal, UserProfile};
use backoffice_admin::routes;
use backoffice_admin::services::PublicPaths;
use backoffice_admin::state::AppState;
use backoffice_core::{Email, PrincipalUid, UserType};

/// Path of the test-only sign-in route.
pub const TEST_LOGIN_PATH: &str = "/test/login";

/// Guard lookup timeout used by the harness.
pub const GUARD_TIMEOUT: Duration = Duration::from_millis(200);

/// Memory store with switches for failing or slowing profile lookups.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryDocumentStore,
    fail_profiles: AtomicBool,
    profile_delay_ms: AtomicU64,
}

impl FlakyStore {
    /// Make every profile read fail.
    pub fn fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    /// Delay every profile read.
    pub fn delay_profiles(&self, delay: Duration) {
        self.profile_delay_ms
            .store(u64::try_from(delay.as_millis()).unwrap(), Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Document>, StoreError> {
        if collection == Collection::Users {
            let delay = self.profile_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if self.fail_profiles.load(Ordering::SeqCst) {
                return Err(StoreError::Unavailable("profiles offline".to_owned()));
            }
        }
        self.inner.get(collection, key).await
    }

    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.inner.list(collection).await
    }

    async fn create(
        &self,
        collection: Collection,
        key: &str,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        self.inner.create(collection, key, body).await
    }

    async fn replace(
        &self,
        collection: Collection,
        key: &str,
        expected_version: i64,
        body: &JsonValue,
    ) -> Result<bool, StoreError> {
        self.inner
            .replace(collection, key, expected_version, body)
            .await
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(collection, key).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// A response with its body read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: String,
    pub body: String,
}

impl TestResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> JsonValue {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// In-process back office.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<FlakyStore>,
}

/// A client holding one session cookie.
#[derive(Clone)]
pub struct Client {
    router: Router,
    cookie: Option<String>,
}

impl TestApp {
    /// Build the app with default configuration.
    pub fn new() -> Self {
        Self::with_env(&[])
    }

    /// Build the app with extra configuration variables.
    pub fn with_env(extra: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = HashMap::from([
            (
                "BACKOFFICE_DATABASE_URL".to_owned(),
                "postgres://unused@localhost/backoffice".to_owned(),
            ),
            (
                "BACKOFFICE_BASE_URL".to_owned(),
                "http://localhost:3001".to_owned(),
            ),
            (
                "BACKOFFICE_GUARD_TIMEOUT_MS".to_owned(),
                GUARD_TIMEOUT.as_millis().to_string(),
            ),
        ]);
        for (key, value) in extra {
            vars.insert((*key).to_owned(), (*value).to_owned());
        }
        let config = BackOfficeConfig::load(&|key| vars.get(key).cloned()).unwrap();

        let store = Arc::new(FlakyStore::default());
        let public = PublicPaths::default().with_path(TEST_LOGIN_PATH);
        let state = AppState::with_public_paths(config, store.clone(), public).unwrap();

        let routes = routes::routes().route(TEST_LOGIN_PATH, post(test_login));
        let router = backoffice_admin::with_layers(routes, state, MemoryStore::default());

        Self { router, store }
    }

    /// A client with no session.
    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Create a profile with the given user type.
    pub async fn seed_profile(&self, email: &str, user_type: UserType) -> Principal {
        let email = Email::parse(email).unwrap();
        let mut profile = UserProfile::register(PrincipalUid::generate(), email, "Test User");
        profile.user_type = user_type;
        ProfileRepository::new(self.store.as_ref())
            .create(&profile)
            .await
            .unwrap();
        Principal {
            uid: profile.uid,
            email: profile.email,
        }
    }

    /// A client signed in as a fresh profile with the given user type.
    pub async fn signed_in(&self, email: &str, user_type: UserType) -> (Client, Principal) {
        let principal = self.seed_profile(email, user_type).await;
        let mut client = self.client();
        client.sign_in(&principal).await;
        (client, principal)
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Sign `principal` in through the test route.
    pub async fn sign_in(&mut self, principal: &Principal) {
        let body = serde_json::to_value(principal).unwrap();
        let response = self.post(TEST_LOGIN_PATH, &body).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: &JsonValue) -> TestResponse {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&mut self, path: &str, body: &JsonValue) -> TestResponse {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&mut self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None).await
    }

    /// Send a request, carrying and updating the session cookie.
    pub async fn send(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&JsonValue>,
    ) -> TestResponse {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(json).unwrap())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_owned())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            content_type,
            body: String::from_utf8(bytes.to_vec()).unwrap(),
        }
    }
}

async fn test_login(session: Session, Json(principal): Json<Principal>) -> StatusCode {
    set_current_principal(&session, &principal).await.unwrap();
    StatusCode::NO_CONTENT
}
