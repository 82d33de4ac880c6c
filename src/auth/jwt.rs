//! JWT-based `IdentityProvider`.
//!
//! The identity provider issues HS256-signed tokens; this side only verifies
//! signature and expiry with the shared secret and returns the `sub` claim
//! as the principal id.

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::auth::IdentityProvider;
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
}

pub struct JwtVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_aud = false;
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtVerifier {
    async fn verify_credential(&self, raw: &str) -> Result<String, AppError> {
        let data = decode::<Claims>(raw, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!("credential rejected: {}", e);
            AppError::Unauthenticated
        })?;
        Ok(data.claims.sub)
    }
}

// ── Tests ───────────────────────────────────────────────────────
