// RFM Insights client core
//
// The browser-side layer of the RFM Insights analytics app, rebuilt as a
// library: an authenticated HTTP client against the versioned backend API
// and an observable state store that keeps a single snapshot synchronized
// with whatever owns the display surface.
//
// Architecture:
// - ApiClient (reqwest): authenticated, timeout-bounded JSON calls, typed
//   error taxonomy, per-resource bindings
// - StateStore: snapshot + publish/subscribe, folds API results into state
// - KeyValueStorage: durable session data (token + user) surviving restarts
// - AppContext: explicit dependency-injection root, instantiated once
//
// Control flow: UI event -> StateStore method -> ApiClient request ->
// backend -> store merges the result -> subscribers re-render.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod store;

pub use client::{ApiClient, AuthEvent};
pub use config::Config;
pub use error::ClientError;
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::{AppState, StatePatch, StateStore, SubscriptionId};

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything the UI event loop needs, wired together once at process start
///
/// Replaces the window-scoped singletons of the original design: the owner
/// constructs one context and passes it around, so single-instance semantics
/// hold without hidden globals.
pub struct AppContext {
    pub client: Arc<ApiClient>,
    pub store: Arc<StateStore>,
    /// Auth events from the client (session expiry). The UI collaborator
    /// listens here and performs the redirect; the core never navigates.
    pub auth_events: mpsc::UnboundedReceiver<AuthEvent>,
}

impl AppContext {
    pub fn new(config: &Config, storage: Arc<dyn KeyValueStorage>) -> Result<Self> {
        let (auth_tx, auth_events) = mpsc::unbounded_channel();
        let client = Arc::new(ApiClient::new(config, storage.clone(), auth_tx)?);
        let store = StateStore::new(client.clone(), storage);

        Ok(Self {
            client,
            store,
            auth_events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::time::Duration;

    #[tokio::test]
    async fn test_context_delivers_auth_events_to_owner() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route(
            "/v1/auth/me",
            get(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({"detail": "Token expired"})),
                )
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = Config {
            api_url: format!("http://{}", addr),
            api_version: "v1".to_string(),
            timeout: Duration::from_secs(5),
        };
        let storage = Arc::new(MemoryStorage::new());
        let mut ctx = AppContext::new(&config, storage).unwrap();

        ctx.client.set_token("stale");
        let _ = ctx.client.get_user_profile().await;

        assert_eq!(ctx.auth_events.recv().await, Some(AuthEvent::SessionExpired));
    }

    #[tokio::test]
    async fn test_store_hydrates_from_shared_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let ctx = AppContext::new(&Config::default(), storage.clone()).unwrap();
        assert!(!ctx.store.get_state().is_authenticated);

        // Token written through the client is visible to a store built over
        // the same storage (cold-start hydration path)
        ctx.client.set_token("tok");
        let store = StateStore::new(ctx.client.clone(), storage);
        assert!(store.get_state().is_authenticated);
    }
}
