use async_trait::async_trait;
use sqlx::PgPool;

use crate::allocator::TokenScope;
use crate::auth::{AdminRecord, Role};
use crate::store::{AllocationFilter, AllocationRecord, SequenceStore, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Classify a driver error into the store taxonomy.
///
/// 40001 (serialization_failure), 40P01 (deadlock_detected) and 23505
/// (unique_violation on the scope+serial index) all mean a concurrent
/// allocation won the race; the caller retries those.
fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            if code == "40001" || code == "40P01" || code == "23505" {
                return StoreError::Conflict;
            }
        }
    }
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(e.to_string())
        }
        other => StoreError::Other(other.into()),
    }
}

#[derive(sqlx::FromRow)]
struct AdminRow {
    principal_id: String,
    role: String,
    name: String,
}

#[async_trait]
impl SequenceStore for PgStore {
    async fn get_administrator(
        &self,
        principal_id: &str,
    ) -> Result<Option<AdminRecord>, StoreError> {
        let row = sqlx::query_as::<_, AdminRow>(
            "SELECT principal_id, role, name FROM admins WHERE principal_id = $1",
        )
        .bind(principal_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        Ok(row.map(|r| AdminRecord {
            principal_id: r.principal_id,
            role: Role::from_str(&r.role),
            name: r.name,
        }))
    }

    async fn allocate(&self, scope: &TokenScope, issued_by: &str) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // Read-max + insert must be one serializable unit; a concurrent
        // transaction on the same scope aborts with 40001 and gets retried
        // by the allocator. Dropping this future before commit rolls back,
        // so a disconnecting caller leaves no partial record.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        let max: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(MAX(token_serial), 0)
               FROM registration_tokens
               WHERE token_prefix = $1 AND token_year = $2 AND token_month = $3"#,
        )
        .bind(&scope.prefix)
        .bind(scope.year)
        .bind(&scope.month)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        let serial = max + 1;
        sqlx::query(
            r#"INSERT INTO registration_tokens
                   (token_prefix, token_year, token_month, token_serial, token, generated_by)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(&scope.prefix)
        .bind(scope.year)
        .bind(&scope.month)
        .bind(serial)
        .bind(scope.token_for(serial))
        .bind(issued_by)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        Ok(serial)
    }

    async fn max_serial(&self, scope: &TokenScope) -> Result<i64, StoreError> {
        let max: i64 = sqlx::query_scalar(
            r#"SELECT COALESCE(MAX(token_serial), 0)
               FROM registration_tokens
               WHERE token_prefix = $1 AND token_year = $2 AND token_month = $3"#,
        )
        .bind(&scope.prefix)
        .bind(scope.year)
        .bind(&scope.month)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;
        Ok(max)
    }

    async fn list_allocations(
        &self,
        filter: &AllocationFilter,
    ) -> Result<Vec<AllocationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, AllocationRecord>(
            r#"SELECT id, token_prefix, token_year, token_month, token_serial,
                      token, generated_at, generated_by
               FROM registration_tokens
               WHERE ($1::text IS NULL OR token_prefix = $1)
                 AND ($2::int IS NULL OR token_year = $2)
                 AND ($3::text IS NULL OR token_month = $3)
               ORDER BY generated_at DESC
               LIMIT 500"#,
        )
        .bind(&filter.prefix)
        .bind(filter.year)
        .bind(&filter.month)
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        Ok(rows)
    }
}
