//! Token allocator — the correctness-critical core.
//!
//! Computes the next serial for a `(prefix, year, month)` scope and composes
//! the final token string. Serial uniqueness is delegated to the store's
//! transaction; this layer adds scope validation, token formatting, and
//! bounded retry with exponential backoff for transient store failures.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::time::sleep;

use crate::errors::AppError;
use crate::store::{SequenceStore, StoreError};

/// The `(prefix, year, month)` triple within which serials are unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenScope {
    pub prefix: String,
    pub year: i32,
    /// Zero-padded 2-digit month, e.g. "03".
    pub month: String,
}

impl TokenScope {
    pub fn new(prefix: &str, year: i32, month: u32) -> Result<Self, AppError> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(AppError::BadRequest(
                "prefix must be a non-empty string".into(),
            ));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            year,
            month: format!("{:02}", month),
        })
    }

    /// Scope for the current UTC month. Year and month come from server time,
    /// never from the caller. An allocation still in flight when the month
    /// rolls over keeps the scope it was opened with.
    pub fn current(prefix: &str) -> Result<Self, AppError> {
        let now = Utc::now();
        Self::new(prefix, now.year(), now.month())
    }

    /// Compose the token string for a serial within this scope.
    /// 3-digit zero-padding is a minimum width: serial 1000 renders as 1000.
    pub fn token_for(&self, serial: i64) -> String {
        format!("{}/{}/{}/{:03}", self.prefix, self.year, self.month, serial)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Allocation {
    pub token: String,
    pub year: i32,
    pub month: String,
    pub serial: i64,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 25,
            max_backoff_ms: 500,
            jitter_ms: 25,
        }
    }
}

#[derive(Clone)]
pub struct Allocator {
    store: Arc<dyn SequenceStore>,
    retry: RetryPolicy,
}

impl Allocator {
    pub fn new(store: Arc<dyn SequenceStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Allocate the next serial for `scope`, retrying transient store
    /// failures up to the configured attempt ceiling. Conflicts mean a
    /// concurrent request won the race for the same serial; the racing
    /// losers land on later serials, never duplicates.
    pub async fn allocate(
        &self,
        scope: &TokenScope,
        issued_by: &str,
    ) -> Result<Allocation, AppError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.store.allocate(scope, issued_by).await {
                Ok(serial) => {
                    return Ok(Allocation {
                        token: scope.token_for(serial),
                        year: scope.year,
                        month: scope.month.clone(),
                        serial,
                    });
                }
                Err(e @ (StoreError::Conflict | StoreError::Unavailable(_))) => {
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(
                            prefix = %scope.prefix,
                            attempts = attempt,
                            "allocation failed after exhausting retries: {}",
                            e
                        );
                        return Err(e.into());
                    }

                    let wait = self.backoff(attempt);
                    tracing::debug!(
                        prefix = %scope.prefix,
                        attempt = attempt,
                        "transient allocation failure ({}); retrying in {:?}",
                        e,
                        wait
                    );
                    sleep(wait).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry.base_backoff_ms as f64;
        let max = self.retry.max_backoff_ms as f64;

        // Exponential: base * 2^(attempt - 1), capped, plus jitter
        let raw = base * 2_f64.powi(attempt as i32 - 1);
        let capped = raw.min(max);
        let jitter = rand::thread_rng().gen_range(0..=self.retry.jitter_ms);

        Duration::from_millis(capped as u64 + jitter)
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::auth::AdminRecord;
    use crate::store::memory::MemoryStore;
    use crate::store::{AllocationFilter, AllocationRecord};

    #[test]
    fn token_format_on_empty_scope() {
        let scope = TokenScope::new("BYPC", 2025, 3).unwrap();
        assert_eq!(scope.token_for(1), "BYPC/2025/03/001");
        assert_eq!(scope.token_for(7), "BYPC/2025/03/007");
        assert_eq!(scope.token_for(42), "BYPC/2025/03/042");
    }

    #[test]
    fn serial_padding_is_minimum_width() {
        let scope = TokenScope::new("BYPC", 2025, 12).unwrap();
        assert_eq!(scope.token_for(999), "BYPC/2025/12/999");
        assert_eq!(scope.token_for(1000), "BYPC/2025/12/1000");
        assert_eq!(scope.token_for(12345), "BYPC/2025/12/12345");
    }

    #[test]
    fn month_is_zero_padded() {
        let scope = TokenScope::new("GSR", 2025, 4).unwrap();
        assert_eq!(scope.month, "04");
        let scope = TokenScope::new("GSR", 2025, 11).unwrap();
        assert_eq!(scope.month, "11");
    }

    #[test]
    fn empty_prefix_is_rejected() {
        assert!(matches!(
            TokenScope::new("", 2025, 3),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            TokenScope::new("   ", 2025, 3),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn current_scope_uses_server_time() {
        let scope = TokenScope::current("BYPC").unwrap();
        let now = Utc::now();
        assert_eq!(scope.year, now.year());
        assert_eq!(scope.month, format!("{:02}", now.month()));
    }

    #[tokio::test]
    async fn allocation_starts_at_one_and_is_monotonic() {
        let store = Arc::new(MemoryStore::new());
        let allocator = Allocator::new(store, RetryPolicy::default());
        let scope = TokenScope::new("BYPC", 2025, 3).unwrap();

        let first = allocator.allocate(&scope, "admin-1").await.unwrap();
        assert_eq!(first.serial, 1);
        assert_eq!(first.token, "BYPC/2025/03/001");

        let second = allocator.allocate(&scope, "admin-1").await.unwrap();
        assert_eq!(second.serial, 2);
        assert_eq!(second.token, "BYPC/2025/03/002");
    }

    /// Store that reports a conflict on every attempt, counting calls.
    struct AlwaysConflict {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SequenceStore for AlwaysConflict {
        async fn get_administrator(
            &self,
            _principal_id: &str,
        ) -> Result<Option<AdminRecord>, StoreError> {
            Ok(None)
        }

        async fn allocate(&self, _scope: &TokenScope, _issued_by: &str) -> Result<i64, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Conflict)
        }

        async fn max_serial(&self, _scope: &TokenScope) -> Result<i64, StoreError> {
            Ok(0)
        }

        async fn list_allocations(
            &self,
            _filter: &AllocationFilter,
        ) -> Result<Vec<AllocationRecord>, StoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn retries_stop_at_the_configured_ceiling() {
        let store = Arc::new(AlwaysConflict {
            calls: AtomicU32::new(0),
        });
        let allocator = Allocator::new(
            store.clone(),
            RetryPolicy {
                max_attempts: 5,
                base_backoff_ms: 1,
                max_backoff_ms: 2,
                jitter_ms: 0,
            },
        );
        let scope = TokenScope::new("BYPC", 2025, 3).unwrap();

        let result = allocator.allocate(&scope, "admin-1").await;
        assert!(matches!(result, Err(AppError::TransactionConflict)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn conflict_then_success_is_retried() {
        struct ConflictOnce {
            calls: AtomicU32,
        }

        #[async_trait]
        impl SequenceStore for ConflictOnce {
            async fn get_administrator(
                &self,
                _principal_id: &str,
            ) -> Result<Option<AdminRecord>, StoreError> {
                Ok(None)
            }

            async fn allocate(
                &self,
                _scope: &TokenScope,
                _issued_by: &str,
            ) -> Result<i64, StoreError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(StoreError::Conflict)
                } else {
                    Ok(8)
                }
            }

            async fn max_serial(&self, _scope: &TokenScope) -> Result<i64, StoreError> {
                Ok(7)
            }

            async fn list_allocations(
                &self,
                _filter: &AllocationFilter,
            ) -> Result<Vec<AllocationRecord>, StoreError> {
                Ok(vec![])
            }
        }

        let store = Arc::new(ConflictOnce {
            calls: AtomicU32::new(0),
        });
        let allocator = Allocator::new(
            store.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_backoff_ms: 1,
                max_backoff_ms: 2,
                jitter_ms: 0,
            },
        );
        let scope = TokenScope::new("BYPC", 2025, 3).unwrap();

        let allocation = allocator.allocate(&scope, "admin-1").await.unwrap();
        assert_eq!(allocation.serial, 8);
        assert_eq!(allocation.token, "BYPC/2025/03/008");
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}
