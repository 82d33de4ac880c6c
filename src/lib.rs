//! Registration-token issuance service.
//!
//! Hands out monotonically increasing, human-readable serial tokens
//! (e.g. `BYPC/2025/03/007`) to registrants. Issuance is admin-gated, and
//! serial uniqueness per `(prefix, year, month)` scope is enforced by the
//! sequence store's transaction — never by in-process locks, which would not
//! survive running more than one instance.

pub mod allocator;
pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;
pub mod store;

use std::sync::Arc;

use allocator::Allocator;
use auth::{AuthGate, IdentityProvider};
use store::SequenceStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub gate: AuthGate,
    pub allocator: Allocator,
    pub store: Arc<dyn SequenceStore>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SequenceStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &config::Config,
    ) -> Self {
        Self {
            gate: AuthGate::new(identity, store.clone()),
            allocator: Allocator::new(store.clone(), config.retry_policy()),
            store,
        }
    }
}
