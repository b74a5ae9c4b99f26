//! Access guard for the protected back-office subtree.
//!
//! Every navigation is evaluated in two steps. The path is first checked
//! against the public allow-list synchronously, with no I/O. Otherwise the
//! signed-in principal's profile is looked up under a bounded timeout and its
//! user type decides the outcome. Any failure along the way denies: the guard
//! fails closed.
//!
//! [`AccessGuard`] evaluates a single navigation. [`NavigationSession`] tracks
//! a sequence of navigations and identity changes and makes sure only the
//! latest one publishes a result.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use backoffice_core::UserType;

use crate::db::{DocumentStore, ProfileRepository};
use crate::models::Principal;

/// Default bound on the profile lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Paths reachable without authorization.
#[derive(Debug, Clone)]
pub struct PublicPaths {
    exact: BTreeSet<String>,
    prefixes: Vec<String>,
}

impl Default for PublicPaths {
    fn default() -> Self {
        let exact = [
            "/auth/login",
            "/auth/register",
            "/auth/reset",
            "/auth/logout",
            "/health",
            "/health/ready",
        ];
        Self {
            exact: exact.into_iter().map(str::to_owned).collect(),
            prefixes: vec!["/api/auth/webauthn/".to_owned()],
        }
    }
}

impl PublicPaths {
    /// Allow one more exact path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.exact.insert(path.into());
        self
    }

    /// Whether `path` is on the allow-list.
    ///
    /// A single trailing slash is ignored, so `/auth/login/` is public too.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        let trimmed = match path.strip_suffix('/') {
            Some(rest) if !rest.is_empty() => rest,
            _ => path,
        };
        self.exact.contains(trimmed) || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

/// Why a navigation was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "usertype", rename_all = "snake_case")]
pub enum DenialReason {
    /// Nobody is signed in.
    Unauthenticated,
    /// The principal has no profile.
    ProfileMissing,
    /// The profile's user type may not enter the back office.
    InsufficientRole(UserType),
    /// The profile could not be read or is malformed.
    LookupFailed,
    /// The profile lookup did not finish in time.
    LookupTimedOut,
}

impl DenialReason {
    /// Generic message shown to the user.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Unauthenticated => "Please sign in to continue.",
            Self::ProfileMissing | Self::InsufficientRole(_) => {
                "You do not have access to this area."
            }
            Self::LookupFailed | Self::LookupTimedOut => {
                "Access could not be verified. Please try again later."
            }
        }
    }
}

/// A principal admitted to the back office.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub principal: Principal,
    pub user_type: UserType,
}

/// Guard state for one navigation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuardState {
    /// Nothing evaluated yet.
    #[default]
    Unresolved,
    /// The path is on the allow-list.
    PublicRoute,
    /// The profile lookup is in flight.
    Resolving,
    Authorized(Authorization),
    Denied(DenialReason),
}

/// The three-valued view of [`GuardState`] that pages observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardStatus {
    Unresolved,
    Authorized,
    Denied,
}

impl GuardState {
    /// Collapse into the status pages render from.
    #[must_use]
    pub const fn status(&self) -> GuardStatus {
        match self {
            Self::Unresolved | Self::Resolving => GuardStatus::Unresolved,
            Self::PublicRoute | Self::Authorized(_) => GuardStatus::Authorized,
            Self::Denied(_) => GuardStatus::Denied,
        }
    }

    /// Whether evaluation has reached a final outcome.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Unresolved | Self::Resolving)
    }
}

/// Evaluates navigations against the allow-list and the profile store.
///
/// The guard only reads; it never writes profiles or sessions.
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn DocumentStore>,
    public: Arc<PublicPaths>,
    timeout: Duration,
}

impl std::fmt::Debug for AccessGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGuard")
            .field("public", &self.public)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AccessGuard {
    /// Create a guard reading profiles from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, public: PublicPaths, timeout: Duration) -> Self {
        Self {
            store,
            public: Arc::new(public),
            timeout,
        }
    }

    /// The public allow-list.
    #[must_use]
    pub fn public_paths(&self) -> &PublicPaths {
        &self.public
    }

    /// Evaluate one navigation.
    pub async fn evaluate(&self, path: &str, principal: Option<&Principal>) -> GuardState {
        if self.public.is_public(path) {
            return GuardState::PublicRoute;
        }
        match principal {
            None => GuardState::Denied(DenialReason::Unauthenticated),
            Some(principal) => self.authorize(principal).await,
        }
    }

    /// Look up `principal`'s profile and decide.
    #[instrument(skip(self, principal), fields(uid = %principal.uid))]
    pub async fn authorize(&self, principal: &Principal) -> GuardState {
        let profiles = ProfileRepository::new(self.store.as_ref());
        let lookup = tokio::time::timeout(self.timeout, profiles.get(principal.uid)).await;

        let profile = match lookup {
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis(), "Profile lookup timed out");
                return GuardState::Denied(DenialReason::LookupTimedOut);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Profile lookup failed");
                return GuardState::Denied(DenialReason::LookupFailed);
            }
            Ok(Ok(None)) => {
                debug!("No profile for principal");
                return GuardState::Denied(DenialReason::ProfileMissing);
            }
            Ok(Ok(Some(profile))) => profile,
        };

        if profile.user_type.is_back_office() {
            GuardState::Authorized(Authorization {
                principal: principal.clone(),
                user_type: profile.user_type,
            })
        } else {
            debug!(user_type = %profile.user_type, "User type not admitted");
            GuardState::Denied(DenialReason::InsufficientRole(profile.user_type))
        }
    }
}

/// Guard state tracking for a sequence of navigations.
///
/// This is the embedding API for long-lived clients (a desktop shell, a
/// websocket page) that follow one user across several navigations. The
/// HTTP server evaluates each request on its own through
/// [`AccessGuard::evaluate`].
///
/// Each [`navigate`](Self::navigate) or [`set_principal`](Self::set_principal)
/// restarts evaluation. A newer change aborts the in-flight lookup and bumps
/// the generation, so a late result from an older navigation is discarded
/// rather than published.
pub struct NavigationSession {
    guard: AccessGuard,
    path: Option<String>,
    principal: Option<Principal>,
    generation: Arc<AtomicU64>,
    state_tx: Arc<watch::Sender<GuardState>>,
    state_rx: watch::Receiver<GuardState>,
    lookup: Option<JoinHandle<()>>,
}

impl NavigationSession {
    /// Create a session with no current path or principal.
    #[must_use]
    pub fn new(guard: AccessGuard) -> Self {
        let (state_tx, state_rx) = watch::channel(GuardState::Unresolved);
        Self {
            guard,
            path: None,
            principal: None,
            generation: Arc::new(AtomicU64::new(0)),
            state_tx: Arc::new(state_tx),
            state_rx,
            lookup: None,
        }
    }

    /// Navigate to `path` and re-evaluate.
    pub fn navigate(&mut self, path: impl Into<String>) {
        self.path = Some(path.into());
        self.restart();
    }

    /// Record an identity change (sign-in, sign-out) and re-evaluate.
    pub fn set_principal(&mut self, principal: Option<Principal>) {
        self.principal = principal;
        self.restart();
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state_rx.borrow().clone()
    }

    /// The current three-valued status.
    #[must_use]
    pub fn status(&self) -> GuardStatus {
        self.state_rx.borrow().status()
    }

    /// Watch state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GuardState> {
        self.state_rx.clone()
    }

    /// Wait until the current navigation settles.
    ///
    /// Returns [`GuardState::Unresolved`] at once if nothing has been
    /// navigated to yet.
    pub async fn resolved(&self) -> GuardState {
        if self.path.is_none() {
            return GuardState::Unresolved;
        }
        let mut rx = self.state_rx.clone();
        match rx.wait_for(GuardState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => GuardState::Denied(DenialReason::LookupFailed),
        }
    }

    fn restart(&mut self) {
        if let Some(handle) = self.lookup.take() {
            handle.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state_tx.send_replace(GuardState::Unresolved);

        let Some(path) = self.path.as_deref() else {
            return;
        };
        if self.guard.public_paths().is_public(path) {
            self.state_tx.send_replace(GuardState::PublicRoute);
            return;
        }
        let Some(principal) = self.principal.clone() else {
            self.state_tx
                .send_replace(GuardState::Denied(DenialReason::Unauthenticated));
            return;
        };

        self.state_tx.send_replace(GuardState::Resolving);
        let guard = self.guard.clone();
        let current = Arc::clone(&self.generation);
        let state_tx = Arc::clone(&self.state_tx);
        self.lookup = Some(tokio::spawn(async move {
            let outcome = guard.authorize(&principal).await;
            // Compare under the channel lock so a restart cannot slip in
            // between the check and the write.
            state_tx.send_if_modified(|state| {
                if current.load(Ordering::SeqCst) == generation {
                    *state = outcome;
                    true
                } else {
                    false
                }
            });
        }));
    }
}

impl Drop for NavigationSession {
    fn drop(&mut self) {
        if let Some(handle) = self.lookup.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use backoffice_core::{Email, PrincipalUid};
    use serde_json::json;

    use super::*;
    use crate::db::testing::ScriptedStore;
    use crate::db::{Collection, ProfileRepository};
    use crate::models::UserProfile;

    fn principal(email: &str) -> Principal {
        Principal {
            uid: PrincipalUid::generate(),
            email: Email::parse(email).unwrap(),
        }
    }

    async fn seed(store: &ScriptedStore, principal: &Principal, user_type: UserType) {
        let mut profile =
            UserProfile::register(principal.uid, principal.email.clone(), "Test User");
        profile.user_type = user_type;
        ProfileRepository::new(store).create(&profile).await.unwrap();
    }

    fn guard(store: Arc<ScriptedStore>, timeout: Duration) -> AccessGuard {
        AccessGuard::new(store, PublicPaths::default(), timeout)
    }

    #[test]
    fn test_public_paths() {
        let public = PublicPaths::default();
        assert!(public.is_public("/auth/login"));
        assert!(public.is_public("/auth/login/"));
        assert!(public.is_public("/api/auth/webauthn/register/start"));
        assert!(!public.is_public("/"));
        assert!(!public.is_public("/api/customers"));
        assert!(!public.is_public("/auth/login-as-admin"));
        assert!(public.clone().with_path("/status").is_public("/status"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GuardState::Unresolved.status(), GuardStatus::Unresolved);
        assert_eq!(GuardState::Resolving.status(), GuardStatus::Unresolved);
        assert_eq!(GuardState::PublicRoute.status(), GuardStatus::Authorized);
        assert_eq!(
            GuardState::Denied(DenialReason::LookupTimedOut).status(),
            GuardStatus::Denied
        );
    }

    #[tokio::test]
    async fn test_public_route_skips_lookup() {
        let store = Arc::new(ScriptedStore::failing());
        let guard = guard(store.clone(), DEFAULT_LOOKUP_TIMEOUT);
        let someone = principal("someone@example.com");

        assert_eq!(guard.evaluate("/auth/login", None).await, GuardState::PublicRoute);
        assert_eq!(
            guard.evaluate("/auth/register", Some(&someone)).await,
            GuardState::PublicRoute
        );
        assert_eq!(store.gets(), 0);
    }

    #[tokio::test]
    async fn test_unauthenticated() {
        let store = Arc::new(ScriptedStore::new());
        let guard = guard(store.clone(), DEFAULT_LOOKUP_TIMEOUT);

        assert_eq!(
            guard.evaluate("/dashboard", None).await,
            GuardState::Denied(DenialReason::Unauthenticated)
        );
        assert_eq!(store.gets(), 0);
    }

    #[tokio::test]
    async fn test_user_types() {
        let store = Arc::new(ScriptedStore::new());
        let guard = guard(store.clone(), DEFAULT_LOOKUP_TIMEOUT);

        for user_type in UserType::ALL {
            let who = principal(&format!("{user_type}@example.com"));
            seed(&store, &who, user_type).await;
            let state = guard.evaluate("/dashboard", Some(&who)).await;

            if matches!(user_type, UserType::Admin | UserType::Staff) {
                assert_eq!(
                    state,
                    GuardState::Authorized(Authorization {
                        principal: who.clone(),
                        user_type,
                    })
                );
            } else {
                assert_eq!(
                    state,
                    GuardState::Denied(DenialReason::InsufficientRole(user_type))
                );
            }
        }
    }

    #[tokio::test]
    async fn test_missing_profile() {
        let store = Arc::new(ScriptedStore::new());
        let guard = guard(store, DEFAULT_LOOKUP_TIMEOUT);
        let who = principal("ghost@example.com");

        assert_eq!(
            guard.evaluate("/dashboard", Some(&who)).await,
            GuardState::Denied(DenialReason::ProfileMissing)
        );
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let store = Arc::new(ScriptedStore::failing());
        let guard = guard(store, DEFAULT_LOOKUP_TIMEOUT);
        let who = principal("admin@example.com");

        assert_eq!(
            guard.evaluate("/dashboard", Some(&who)).await,
            GuardState::Denied(DenialReason::LookupFailed)
        );
    }

    #[tokio::test]
    async fn test_malformed_profile_fails_closed() {
        let store = Arc::new(ScriptedStore::new());
        let who = principal("odd@example.com");
        store
            .inner
            .create(
                Collection::Users,
                &who.uid.to_string(),
                &json!({"uid": who.uid, "usertype": "admin"}),
            )
            .await
            .unwrap();
        let guard = guard(store, DEFAULT_LOOKUP_TIMEOUT);

        assert_eq!(
            guard.evaluate("/dashboard", Some(&who)).await,
            GuardState::Denied(DenialReason::LookupFailed)
        );
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out() {
        let who = principal("slow@example.com");
        let store = Arc::new(
            ScriptedStore::new().with_delay(who.uid.to_string(), Duration::from_secs(5)),
        );
        seed(&store, &who, UserType::Admin).await;
        let guard = guard(store, Duration::from_millis(50));

        assert_eq!(
            guard.evaluate("/dashboard", Some(&who)).await,
            GuardState::Denied(DenialReason::LookupTimedOut)
        );
    }

    #[tokio::test]
    async fn test_session_public_route_is_synchronous() {
        let store = Arc::new(ScriptedStore::new());
        let mut session = NavigationSession::new(guard(store.clone(), DEFAULT_LOOKUP_TIMEOUT));
        assert_eq!(session.status(), GuardStatus::Unresolved);

        session.navigate("/auth/reset");
        assert_eq!(session.state(), GuardState::PublicRoute);
        assert_eq!(store.gets(), 0);
    }

    #[tokio::test]
    async fn test_session_resolved_before_navigation_returns_immediately() {
        let store = Arc::new(ScriptedStore::new());
        let mut session = NavigationSession::new(guard(store.clone(), DEFAULT_LOOKUP_TIMEOUT));
        session.set_principal(Some(principal("staff@example.com")));

        let state = tokio::time::timeout(Duration::from_millis(100), session.resolved())
            .await
            .unwrap();
        assert_eq!(state, GuardState::Unresolved);
        assert_eq!(store.gets(), 0);
    }

    #[tokio::test]
    async fn test_session_resolves_authorized() {
        let store = Arc::new(ScriptedStore::new());
        let who = principal("staff@example.com");
        seed(&store, &who, UserType::Staff).await;

        let mut session = NavigationSession::new(guard(store, DEFAULT_LOOKUP_TIMEOUT));
        session.set_principal(Some(who));
        session.navigate("/invoices");

        assert_eq!(session.resolved().await.status(), GuardStatus::Authorized);
    }

    #[tokio::test]
    async fn test_session_last_navigation_wins() {
        let slow = principal("slow-admin@example.com");
        let store = Arc::new(
            ScriptedStore::new().with_delay(slow.uid.to_string(), Duration::from_millis(200)),
        );
        seed(&store, &slow, UserType::Admin).await;

        let mut session = NavigationSession::new(guard(store, DEFAULT_LOOKUP_TIMEOUT));
        let mut updates = session.subscribe();
        session.set_principal(Some(slow));
        session.navigate("/dashboard");
        assert_eq!(session.state(), GuardState::Resolving);

        // Navigate away before the slow lookup completes.
        session.navigate("/auth/login");
        assert_eq!(session.state(), GuardState::PublicRoute);
        let _ = updates.borrow_and_update();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(session.state(), GuardState::PublicRoute);
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_session_identity_change_discards_stale_result() {
        let admin = principal("admin@example.com");
        let customer = principal("customer@example.com");
        let store = Arc::new(
            ScriptedStore::new().with_delay(admin.uid.to_string(), Duration::from_millis(200)),
        );
        seed(&store, &admin, UserType::Admin).await;
        seed(&store, &customer, UserType::Customer).await;

        let mut session = NavigationSession::new(guard(store, DEFAULT_LOOKUP_TIMEOUT));
        session.navigate("/payroll");
        session.set_principal(Some(admin));
        session.set_principal(Some(customer));

        let expected = GuardState::Denied(DenialReason::InsufficientRole(UserType::Customer));
        assert_eq!(session.resolved().await, expected);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(session.state(), expected);
    }

    #[tokio::test]
    async fn test_session_sign_out_denies() {
        let store = Arc::new(ScriptedStore::new());
        let who = principal("staff@example.com");
        seed(&store, &who, UserType::Staff).await;

        let mut session = NavigationSession::new(guard(store, DEFAULT_LOOKUP_TIMEOUT));
        session.set_principal(Some(who));
        session.navigate("/customers");
        assert_eq!(session.resolved().await.status(), GuardStatus::Authorized);

        session.set_principal(None);
        assert_eq!(
            session.state(),
            GuardState::Denied(DenialReason::Unauthenticated)
        );
    }
}
