//! # Key Management Endpoints
//!
//! | Route | Auth |
//! |-------|------|
//! | `POST /issuers/:issuerId/keys` | issuer |
//! | `POST /issuers/:issuerId/keys/rotate` | issuer |
//! | `GET /issuers/:issuerId/keys` | public |
//! | `GET /keys/:keyId` | public |
//! | `POST /keys/:keyId/revoke` | issuer |
//! | `POST /issuers/:issuerId/token` | operator |
//!
//! Key responses carry public material only ([`VerificationMethod`]).

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bdg_core::{IssuerId, KeyId};
use bdg_crypto::KeyAlgorithm;
use bdg_keys::VerificationMethod;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{issuer_token, CallerIdentity};
use crate::error::{extract_json, AppError};
use crate::state::AppState;

/// Body of key generation and rotation.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyRequest {
    /// `Ed25519`, `RS256` or `ES256`. Generation defaults to Ed25519;
    /// rotation defaults to the previous key's algorithm.
    #[serde(default)]
    pub algorithm: Option<String>,
}

/// An issuer-scoped bearer token.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerTokenResponse {
    pub issuer_id: String,
    pub token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/issuers/:issuer_id/keys", post(generate_key).get(list_keys))
        .route("/issuers/:issuer_id/keys/rotate", post(rotate_key))
        .route("/issuers/:issuer_id/token", post(mint_issuer_token))
        .route("/keys/:key_id", get(get_key))
        .route("/keys/:key_id/revoke", post(revoke_key))
}

fn parse_algorithm(raw: Option<&str>) -> Result<Option<KeyAlgorithm>, AppError> {
    raw.map(|s| {
        s.parse::<KeyAlgorithm>()
            .map_err(|_| AppError::Validation(format!("unsupported algorithm {s:?}")))
    })
    .transpose()
}

/// Empty bodies are allowed on the key routes.
fn optional_body(body: Result<Json<KeyRequest>, JsonRejection>) -> Result<KeyRequest, AppError> {
    match body {
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(KeyRequest::default()),
        other => extract_json(other),
    }
}

/// POST /issuers/:issuerId/keys: Generate a key and make it active.
#[utoipa::path(
    post,
    path = "/issuers/{issuer_id}/keys",
    params(("issuer_id" = String, Path, description = "Issuer id")),
    request_body = KeyRequest,
    responses(
        (status = 201, description = "Key generated; the previous active key is revoked"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 422, description = "Unsupported algorithm", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub(crate) async fn generate_key(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(issuer_id): Path<String>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VerificationMethod>), AppError> {
    let req = optional_body(body)?;
    let issuer_id = IssuerId::new(issuer_id)?;
    caller.may_act_for(&issuer_id)?;
    let algorithm = parse_algorithm(req.algorithm.as_deref())?.unwrap_or(KeyAlgorithm::Ed25519);

    let record = state.keys.generate_key(&issuer_id, algorithm).await?;
    state.metrics.record_key_generated(algorithm.as_str());
    Ok((StatusCode::CREATED, Json(record.to_verification_method())))
}

/// POST /issuers/:issuerId/keys/rotate: Replace the active key.
#[utoipa::path(
    post,
    path = "/issuers/{issuer_id}/keys/rotate",
    params(("issuer_id" = String, Path, description = "Issuer id")),
    request_body = KeyRequest,
    responses(
        (status = 201, description = "New active key"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 404, description = "Issuer has no keys", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub(crate) async fn rotate_key(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(issuer_id): Path<String>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<VerificationMethod>), AppError> {
    let req = optional_body(body)?;
    let issuer_id = IssuerId::new(issuer_id)?;
    caller.may_act_for(&issuer_id)?;
    let algorithm = parse_algorithm(req.algorithm.as_deref())?;

    let record = state.keys.rotate_key(&issuer_id, algorithm).await?;
    state.metrics.record_key_generated(record.algorithm.as_str());
    Ok((StatusCode::CREATED, Json(record.to_verification_method())))
}

/// GET /issuers/:issuerId/keys: All keys of an issuer, oldest first.
#[utoipa::path(
    get,
    path = "/issuers/{issuer_id}/keys",
    params(("issuer_id" = String, Path, description = "Issuer id")),
    responses(
        (status = 200, description = "Verification methods"),
        (status = 404, description = "Issuer has no keys", body = crate::error::ErrorBody),
    ),
    tag = "keys"
)]
pub(crate) async fn list_keys(
    State(state): State<AppState>,
    Path(issuer_id): Path<String>,
) -> Result<Json<Vec<VerificationMethod>>, AppError> {
    let issuer_id = IssuerId::new(issuer_id)?;
    Ok(Json(state.keys.list_keys(&issuer_id).await?))
}

/// GET /keys/:keyId: Public verification-method document.
#[utoipa::path(
    get,
    path = "/keys/{key_id}",
    params(("key_id" = String, Path, description = "Key id (UUID)")),
    responses(
        (status = 200, description = "Verification method"),
        (status = 404, description = "Unknown key", body = crate::error::ErrorBody),
    ),
    tag = "keys"
)]
pub(crate) async fn get_key(
    State(state): State<AppState>,
    Path(key_id): Path<String>,
) -> Result<Json<VerificationMethod>, AppError> {
    let key_id: KeyId = key_id.parse()?;
    Ok(Json(state.keys.get_key(&key_id).await?.to_verification_method()))
}

/// POST /keys/:keyId/revoke: Retire a key without replacing it.
#[utoipa::path(
    post,
    path = "/keys/{key_id}/revoke",
    params(("key_id" = String, Path, description = "Key id (UUID)")),
    responses(
        (status = 200, description = "Revoked key"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Key belongs to another issuer", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown key", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub(crate) async fn revoke_key(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(key_id): Path<String>,
) -> Result<Json<VerificationMethod>, AppError> {
    let key_id: KeyId = key_id.parse()?;
    let record = state.keys.get_key(&key_id).await?;
    caller.may_act_for(&record.issuer_id)?;
    let revoked = state.keys.revoke_key(&key_id).await?;
    Ok(Json(revoked.to_verification_method()))
}

/// POST /issuers/:issuerId/token: Mint a bearer token scoped to one issuer.
#[utoipa::path(
    post,
    path = "/issuers/{issuer_id}/token",
    params(("issuer_id" = String, Path, description = "Issuer id")),
    responses(
        (status = 200, description = "Issuer-scoped token", body = IssuerTokenResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not the operator", body = crate::error::ErrorBody),
        (status = 422, description = "Authentication is disabled", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "keys"
)]
pub(crate) async fn mint_issuer_token(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(issuer_id): Path<String>,
) -> Result<Json<IssuerTokenResponse>, AppError> {
    caller.require_operator()?;
    let issuer_id = IssuerId::new(issuer_id)?;
    let Some(secret) = state.auth.token.as_ref() else {
        return Err(AppError::Validation(
            "authentication is disabled; no issuer token to mint".into(),
        ));
    };
    let token = issuer_token(secret.expose(), &issuer_id)?;
    tracing::info!(issuer = %issuer_id, "issuer token minted");
    Ok(Json(IssuerTokenResponse {
        issuer_id: issuer_id.to_string(),
        token,
    }))
}
