//! Application state shared across handlers.

use std::sync::Arc;

use url::Url;
use webauthn_rs::prelude::*;

use crate::config::BackOfficeConfig;
use crate::db::DocumentStore;
use crate::services::{AccessGuard, IdAllocator, PublicPaths, PushClient};

/// Error creating `WebAuthn` configuration.
#[derive(Debug, thiserror::Error)]
pub enum WebauthnConfigError {
    #[error("base_url must have a host")]
    MissingHost,
    #[error("webauthn error: {0}")]
    WebAuthn(#[from] WebauthnError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// document store, the ID allocator, the access guard and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BackOfficeConfig,
    store: Arc<dyn DocumentStore>,
    allocator: IdAllocator,
    guard: AccessGuard,
    push: Option<PushClient>,
    webauthn: Webauthn,
}

impl AppState {
    /// Create a new application state with the default public allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error if the `WebAuthn` configuration is invalid.
    pub fn new(
        config: BackOfficeConfig,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, WebauthnConfigError> {
        Self::with_public_paths(config, store, PublicPaths::default())
    }

    /// Create a new application state with a custom public allow-list.
    ///
    /// # Errors
    ///
    /// Returns an error if the `WebAuthn` configuration is invalid.
    pub fn with_public_paths(
        config: BackOfficeConfig,
        store: Arc<dyn DocumentStore>,
        public: PublicPaths,
    ) -> Result<Self, WebauthnConfigError> {
        let webauthn = create_webauthn(&config.base_url)?;
        let allocator = IdAllocator::new(Arc::clone(&store));
        let guard = AccessGuard::new(Arc::clone(&store), public, config.guard_timeout);
        let push = config
            .push()
            .map(|push| PushClient::new(push.endpoint.clone(), push.server_key.clone()));

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                allocator,
                guard,
                push,
                webauthn,
            }),
        })
    }

    /// Get a reference to the back-office configuration.
    #[must_use]
    pub fn config(&self) -> &BackOfficeConfig {
        &self.inner.config
    }

    /// Get a reference to the document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// Get a reference to the ID allocator.
    #[must_use]
    pub fn allocator(&self) -> &IdAllocator {
        &self.inner.allocator
    }

    /// Get a reference to the access guard.
    #[must_use]
    pub fn guard(&self) -> &AccessGuard {
        &self.inner.guard
    }

    /// Get the push client, if push forwarding is configured.
    #[must_use]
    pub fn push(&self) -> Option<&PushClient> {
        self.inner.push.as_ref()
    }

    /// Get a reference to the `WebAuthn` configuration.
    #[must_use]
    pub fn webauthn(&self) -> &Webauthn {
        &self.inner.webauthn
    }
}

/// Create a `WebAuthn` instance for the back office's public URL.
fn create_webauthn(url: &Url) -> Result<Webauthn, WebauthnConfigError> {
    let rp_id = url.host_str().ok_or(WebauthnConfigError::MissingHost)?;

    let builder = WebauthnBuilder::new(rp_id, url)?
        .rp_name("Back Office")
        .allow_subdomains(false);

    Ok(builder.build()?)
}
