//! # Issuer Authentication
//!
//! Bearer-token authentication for the issuer-authenticated routes (signing,
//! status changes, key management). Verification routes, status reads and
//! published status lists are public and never ask for a [`CallerIdentity`].
//!
//! ## Token Format
//!
//! ```text
//! Bearer {secret}             : operator, may act for any issuer
//! Bearer {issuerId}:{tag}     : scoped to one issuer
//! ```
//!
//! `tag` is the unpadded base64url HMAC-SHA256 of the issuer id under the
//! service secret ([`issuer_token`]). A scoped token never carries the
//! secret, so it can neither be stripped down to the operator token nor
//! rebound to another issuer id.
//!
//! Issuer ids may themselves contain `:` (DIDs), so the tag is the part
//! after the last colon.
//!
//! ## Security Invariants
//!
//! - Secrets and tags are compared in constant time.
//! - A scoped caller acting for another issuer gets 403, never a silent
//!   downgrade.
//! - With no token configured every caller is an operator; the service logs
//!   a warning at startup.

use axum::extract::FromRef;
use axum::http::header;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bdg_core::IssuerId;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Secret;
use crate::error::AppError;

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Who is calling an authenticated route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerIdentity {
    /// Holds the service secret; acts for any issuer.
    Operator,
    /// Holds an issuer-scoped token.
    Issuer(IssuerId),
}

impl CallerIdentity {
    /// Check that the caller holds the service secret.
    pub fn require_operator(&self) -> Result<(), AppError> {
        match self {
            Self::Operator => Ok(()),
            Self::Issuer(own) => Err(AppError::Forbidden(format!(
                "token for issuer {own} cannot perform operator actions"
            ))),
        }
    }

    /// Check that the caller may act for `issuer_id`.
    pub fn may_act_for(&self, issuer_id: &IssuerId) -> Result<(), AppError> {
        match self {
            Self::Operator => Ok(()),
            Self::Issuer(own) if own == issuer_id => Ok(()),
            Self::Issuer(own) => Err(AppError::Forbidden(format!(
                "token for issuer {own} cannot act for issuer {issuer_id}"
            ))),
        }
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
    AuthConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);
        let Some(expected) = config.token.as_ref() else {
            return Ok(CallerIdentity::Operator);
        };

        let header_value = match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => value.to_str().map_err(|_| {
                tracing::warn!("authentication failed: non-ASCII authorization header");
                AppError::Unauthorized("malformed authorization header".into())
            })?,
            None => {
                tracing::warn!("authentication failed: missing authorization header");
                return Err(AppError::Unauthorized("missing authorization header".into()));
            }
        };
        let Some(provided) = header_value.strip_prefix("Bearer ") else {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            return Err(AppError::Unauthorized(
                "authorization header must use Bearer scheme".into(),
            ));
        };

        parse_bearer_token(provided.trim(), expected.expose()).map_err(|msg| {
            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
            AppError::Unauthorized(msg)
        })
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Expected bearer secret. `None` disables authentication.
#[derive(Clone, Default)]
pub struct AuthConfig {
    pub token: Option<Secret>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
///
/// When lengths differ, performs a dummy comparison so the rejection takes
/// the same path regardless of length.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

type HmacSha256 = Hmac<Sha256>;

fn issuer_tag(secret: &str, issuer_id: &str) -> Result<String, String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "invalid token secret".to_string())?;
    mac.update(issuer_id.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Bearer token scoped to `issuer_id`: `{issuerId}:{tag}`.
pub fn issuer_token(secret: &str, issuer_id: &IssuerId) -> Result<String, AppError> {
    let tag = issuer_tag(secret, issuer_id.as_str()).map_err(AppError::Internal)?;
    Ok(format!("{issuer_id}:{tag}"))
}

/// Parse a bearer token as `{secret}` or `{issuerId}:{tag}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    if constant_time_token_eq(provided, expected_secret) {
        return Ok(CallerIdentity::Operator);
    }
    let Some((issuer, tag)) = provided.rsplit_once(':') else {
        return Err("invalid bearer token".into());
    };
    if !constant_time_token_eq(tag, &issuer_tag(expected_secret, issuer)?) {
        return Err("invalid bearer token".into());
    }
    let issuer_id = IssuerId::new(issuer).map_err(|_| "bearer token names an empty issuer".to_string())?;
    Ok(CallerIdentity::Issuer(issuer_id))
}
