//! Application state shared across handlers.

use std::sync::Arc;

use parcel_desk_core::RetrievalFlow;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::services::access::RoleAdmin;
use crate::services::auth::TokenVerifier;
use crate::services::lifecycle::OrderLifecycle;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the store, token verifier and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: Arc<dyn Store>,
    tokens: TokenVerifier,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn Store>) -> Self {
        let tokens = TokenVerifier::new(&config.auth);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                tokens,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the backing store.
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get a reference to the bearer token verifier.
    #[must_use]
    pub fn tokens(&self) -> &TokenVerifier {
        &self.inner.tokens
    }

    /// Deployment retrieval flow.
    #[must_use]
    pub fn flow(&self) -> RetrievalFlow {
        self.inner.config.retrieval_flow
    }

    /// Lifecycle engine bound to this state's store and flow.
    #[must_use]
    pub fn lifecycle(&self) -> OrderLifecycle<'_> {
        OrderLifecycle::new(self.store(), self.flow())
    }

    /// Role administration bound to this state's store.
    #[must_use]
    pub fn roles(&self) -> RoleAdmin<'_> {
        RoleAdmin::new(self.store())
    }
}
