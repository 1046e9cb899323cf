//! Shared-secret authentication of the pipeline routes.
//!
//! The caller presents the secret as `Authorization: Bearer <secret>` or
//! as a `secret` query parameter (for schedulers that cannot set headers).
//! Comparison goes through HMAC-SHA256 tags under a per-process random key,
//! so it takes the same time whatever the candidate looks like.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// The configured trigger secret, held only as a keyed tag.
pub struct TriggerSecret {
    key: [u8; 32],
    /// `None` when no secret is configured
    expected: Option<Vec<u8>>,
}

impl TriggerSecret {
    pub fn new(secret: &str) -> Self {
        let key: [u8; 32] = rand::random();
        let expected = (!secret.is_empty()).then(|| Self::tag(&key, secret)).flatten();
        Self { key, expected }
    }

    fn tag(key: &[u8], value: &str) -> Option<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(key).ok()?;
        mac.update(value.as_bytes());
        Some(mac.finalize().into_bytes().to_vec())
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    /// Constant-time check of a caller-supplied credential.
    pub fn verify(&self, candidate: &str) -> bool {
        let Some(expected) = &self.expected else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(candidate.as_bytes());
        mac.verify_slice(expected).is_ok()
    }
}

#[derive(Debug, Deserialize)]
struct CredentialQuery {
    secret: Option<String>,
}

/// Credential from the bearer header, else from `?secret=`.
pub fn extract_credential(parts: &Parts) -> Option<String> {
    let bearer = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    bearer.or_else(|| {
        Query::<CredentialQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.secret)
            .filter(|v| !v.is_empty())
    })
}

/// Extractor guarding the pipeline routes.
#[derive(Debug, Clone, Copy)]
pub struct TriggerAuth;

#[axum::async_trait]
impl FromRequestParts<AppState> for TriggerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if !state.trigger_secret.is_configured() {
            warn!("Pipeline route called but no trigger secret is configured");
            return Err(ApiError::unauthorized("Trigger secret not configured"));
        }

        match extract_credential(parts) {
            Some(credential) if state.trigger_secret.verify(&credential) => Ok(TriggerAuth),
            Some(_) => {
                warn!(path = %parts.uri.path(), "Rejected pipeline call with invalid secret");
                Err(ApiError::unauthorized("Invalid credentials"))
            }
            None => Err(ApiError::unauthorized("Missing credentials")),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_verify() {
        let secret = TriggerSecret::new("s3cret");
        assert!(secret.is_configured());
        assert!(secret.verify("s3cret"));
        assert!(!secret.verify("s3cret "));
        assert!(!secret.verify(""));
        assert!(!secret.verify("other"));
    }

    #[test]
    fn test_empty_secret_rejects_everything() {
        let secret = TriggerSecret::new("");
        assert!(!secret.is_configured());
        assert!(!secret.verify(""));
        assert!(!secret.verify("anything"));
    }

    #[test]
    fn test_extract_credential() {
        assert_eq!(
            extract_credential(&parts("/api/pipeline/run", Some("Bearer abc"))).as_deref(),
            Some("abc")
        );
        assert_eq!(
            extract_credential(&parts("/api/pipeline/run?secret=xyz", None)).as_deref(),
            Some("xyz")
        );
        // Header wins over the query parameter
        assert_eq!(
            extract_credential(&parts("/api/pipeline/run?secret=xyz", Some("Bearer abc"))).as_deref(),
            Some("abc")
        );
        assert_eq!(extract_credential(&parts("/api/pipeline/run", Some("Basic abc"))), None);
        assert_eq!(extract_credential(&parts("/api/pipeline/run?secret=", None)), None);
    }
}
