//! Sequence store — the durable side of token issuance.
//!
//! `SequenceStore` is the seam between the allocator and the database:
//! `PgStore` is the production implementation, `MemoryStore` backs tests and
//! local development.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::allocator::TokenScope;
use crate::auth::AdminRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent allocation touched the same scope. Safe to retry.
    #[error("transaction conflict")]
    Conflict,

    /// The store could not be reached. Transient, retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Durable fact that one serial was issued within a scope. Insert-only.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AllocationRecord {
    pub id: Uuid,
    pub token_prefix: String,
    pub token_year: i32,
    /// Zero-padded 2-digit month, e.g. "03".
    pub token_month: String,
    pub token_serial: i64,
    pub token: String,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AllocationFilter {
    pub prefix: Option<String>,
    pub year: Option<i32>,
    pub month: Option<String>,
}

#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Look up the administrator record for a verified principal.
    async fn get_administrator(
        &self,
        principal_id: &str,
    ) -> Result<Option<AdminRecord>, StoreError>;

    /// Assign the next serial for `scope` and persist the allocation record,
    /// atomically. Two racing calls for the same scope must never commit the
    /// same serial; one of them gets `StoreError::Conflict` instead.
    async fn allocate(&self, scope: &TokenScope, issued_by: &str) -> Result<i64, StoreError>;

    /// Highest serial issued for `scope` so far (0 if none).
    async fn max_serial(&self, scope: &TokenScope) -> Result<i64, StoreError>;

    /// Issued tokens matching `filter`, newest first.
    async fn list_allocations(
        &self,
        filter: &AllocationFilter,
    ) -> Result<Vec<AllocationRecord>, StoreError>;
}
