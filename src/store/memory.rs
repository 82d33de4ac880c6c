//! In-memory `SequenceStore` for tests and local development.
//!
//! The mutex makes allocation trivially atomic here; real contention
//! behavior (serialization failures, retries) is exercised against the
//! Postgres implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::allocator::TokenScope;
use crate::auth::{AdminRecord, Role};
use crate::store::{AllocationFilter, AllocationRecord, SequenceStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    admins: HashMap<String, AdminRecord>,
    records: Vec<AllocationRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an administrator record (builder style, for test setup).
    pub fn with_admin(self, principal_id: &str, role: Role, name: &str) -> Self {
        self.inner.lock().unwrap().admins.insert(
            principal_id.to_string(),
            AdminRecord {
                principal_id: principal_id.to_string(),
                role,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn record_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }
}

fn matches_scope(r: &AllocationRecord, scope: &TokenScope) -> bool {
    r.token_prefix == scope.prefix && r.token_year == scope.year && r.token_month == scope.month
}

#[async_trait]
impl SequenceStore for MemoryStore {
    async fn get_administrator(
        &self,
        principal_id: &str,
    ) -> Result<Option<AdminRecord>, StoreError> {
        Ok(self.inner.lock().unwrap().admins.get(principal_id).cloned())
    }

    async fn allocate(&self, scope: &TokenScope, issued_by: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let max = inner
            .records
            .iter()
            .filter(|r| matches_scope(r, scope))
            .map(|r| r.token_serial)
            .max()
            .unwrap_or(0);
        let serial = max + 1;
        inner.records.push(AllocationRecord {
            id: Uuid::new_v4(),
            token_prefix: scope.prefix.clone(),
            token_year: scope.year,
            token_month: scope.month.clone(),
            token_serial: serial,
            token: scope.token_for(serial),
            generated_at: Utc::now(),
            generated_by: issued_by.to_string(),
        });
        Ok(serial)
    }

    async fn max_serial(&self, scope: &TokenScope) -> Result<i64, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| matches_scope(r, scope))
            .map(|r| r.token_serial)
            .max()
            .unwrap_or(0))
    }

    async fn list_allocations(
        &self,
        filter: &AllocationFilter,
    ) -> Result<Vec<AllocationRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<AllocationRecord> = inner
            .records
            .iter()
            .filter(|r| {
                filter.prefix.as_ref().map_or(true, |p| &r.token_prefix == p)
                    && filter.year.map_or(true, |y| r.token_year == y)
                    && filter.month.as_ref().map_or(true, |m| &r.token_month == m)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(out)
    }
}
