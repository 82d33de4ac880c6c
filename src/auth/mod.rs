//! Authorization gate — bearer extraction, credential verification, and the
//! administrator role check. Read-only; authorization failures are terminal
//! for the request and never retried.

pub mod jwt;

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::store::SequenceStore;

/// Roles the admin panel can assign. Matches the `role` column in `admins`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    MasterAdmin,
    SuperAdmin,
    Other(String),
}

impl Role {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Role::Admin,
            "master_admin" => Role::MasterAdmin,
            "super_admin" => Role::SuperAdmin,
            other => Role::Other(other.to_string()),
        }
    }

    /// Whether this role may issue registration tokens.
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::MasterAdmin | Role::SuperAdmin)
    }
}

/// Administrator record, managed elsewhere; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRecord {
    pub principal_id: String,
    pub role: Role,
    pub name: String,
}

/// Verifies a raw bearer credential and returns the principal id.
/// Cryptographic validation is entirely the provider's concern.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_credential(&self, raw: &str) -> Result<String, AppError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AppError::Unauthenticated)?;
    if token.is_empty() {
        return Err(AppError::Unauthenticated);
    }
    Ok(token)
}

#[derive(Clone)]
pub struct AuthGate {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn SequenceStore>,
}

impl AuthGate {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn SequenceStore>) -> Self {
        Self { identity, store }
    }

    /// Verify the bearer credential and confirm the caller is a registered
    /// administrator. Runs before any allocation is attempted.
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<AdminRecord, AppError> {
        let raw = bearer_token(headers)?;
        let principal_id = self.identity.verify_credential(raw).await?;

        let admin = self
            .store
            .get_administrator(&principal_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                tracing::warn!(principal_id = %principal_id, "issuance denied: no administrator record");
                AppError::Forbidden
            })?;

        if !admin.role.is_admin() {
            tracing::warn!(
                principal_id = %principal_id,
                role = ?admin.role,
                "issuance denied: role lacks admin capability"
            );
            return Err(AppError::Forbidden);
        }

        Ok(admin)
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::from_str("admin"), Role::Admin);
        assert_eq!(Role::from_str("Admin"), Role::Admin);
        assert_eq!(Role::from_str("master_admin"), Role::MasterAdmin);
        assert_eq!(Role::from_str("super_admin"), Role::SuperAdmin);
        assert_eq!(Role::from_str("editor"), Role::Other("editor".into()));
    }

    #[test]
    fn test_admin_capability_predicate() {
        assert!(Role::Admin.is_admin());
        assert!(Role::MasterAdmin.is_admin());
        assert!(Role::SuperAdmin.is_admin());
        assert!(!Role::Other("viewer".into()).is_admin());
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc123"),
        );
        assert_eq!(bearer_token(&headers).unwrap(), "abc123");
    }

    #[test]
    fn test_bearer_token_missing_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc123"),
        );
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthenticated)
        ));
    }

    #[test]
    fn test_bearer_token_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert!(matches!(
            bearer_token(&headers),
            Err(AppError::Unauthenticated)
        ));
    }
}
