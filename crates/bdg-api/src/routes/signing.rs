//! # Credential Signing Endpoints
//!
//! `POST /sign/jwt` and `POST /sign/ld` sign an unsigned credential with the
//! issuer's active key (or a named key of that issuer), producing a
//! `JwtProof2020` or a `DataIntegrityProof`. Both are issuer-authenticated.
//!
//! A credential with an `id` and no `credentialStatus` is registered on the
//! issuer's revocation list before signing, so the embedded
//! `StatusList2021Entry` is covered by the proof.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use bdg_core::{IssuerId, KeyId};
use bdg_status::{StatusPurpose, STATUS_LIST_CONTEXT};
use bdg_vc::{Credential, CredentialSigner, ProofFormat, SignOptions};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::{extract_json, AppError};
use crate::routes::status::addressable_credential_id;
use crate::state::AppState;

/// Request body for both signing endpoints.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    /// Issuer whose key signs.
    pub issuer_id: String,
    /// Unsigned credential. Any existing `proof` is replaced.
    #[schema(value_type = Object)]
    pub credential: Value,
    /// Sign with this key of the issuer instead of the active one.
    #[serde(default)]
    pub key_id: Option<String>,
    /// Embed a revocation-list entry. Defaults to "when the credential has
    /// an id".
    #[serde(default)]
    pub with_status: Option<bool>,
}

/// Signed credential.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    #[schema(value_type = Object)]
    pub credential: Value,
    /// `{controller}#{keyId}` of the signing key.
    pub verification_method: String,
    pub key_id: String,
    /// The embedded status entry, when one was added.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub credential_status: Option<Value>,
    /// The compact JWS, for `/sign/jwt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sign/jwt", post(sign_jwt))
        .route("/sign/ld", post(sign_ld))
}

/// POST /sign/jwt: Sign with a `JwtProof2020`.
#[utoipa::path(
    post,
    path = "/sign/jwt",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Credential signed", body = SignResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Key revoked or belongs to another issuer", body = crate::error::ErrorBody),
        (status = 404, description = "Issuer has no active key", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed credential", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "signing"
)]
pub(crate) async fn sign_jwt(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SignRequest>, JsonRejection>,
) -> Result<Json<SignResponse>, AppError> {
    let req = extract_json(body)?;
    sign(&state, &caller, req, ProofFormat::Jwt).await.map(Json)
}

/// POST /sign/ld: Sign with a `DataIntegrityProof`.
#[utoipa::path(
    post,
    path = "/sign/ld",
    request_body = SignRequest,
    responses(
        (status = 200, description = "Credential signed", body = SignResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Key revoked or belongs to another issuer", body = crate::error::ErrorBody),
        (status = 404, description = "Issuer has no active key", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed credential, or an RS256 key", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "signing"
)]
pub(crate) async fn sign_ld(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SignRequest>, JsonRejection>,
) -> Result<Json<SignResponse>, AppError> {
    let req = extract_json(body)?;
    sign(&state, &caller, req, ProofFormat::DataIntegrity)
        .await
        .map(Json)
}

#[tracing::instrument(skip_all, fields(issuer = %req.issuer_id, format = ?format))]
async fn sign(
    state: &AppState,
    caller: &CallerIdentity,
    req: SignRequest,
    format: ProofFormat,
) -> Result<SignResponse, AppError> {
    let issuer_id = IssuerId::new(req.issuer_id)?;
    caller.may_act_for(&issuer_id)?;

    let mut document = Credential::from_value(req.credential)?;
    check_document_issuer(state, &document, &issuer_id)?;

    let key = match req.key_id.as_deref() {
        Some(raw) => {
            let key_id: KeyId = raw.parse()?;
            let key = state.keys.unlock(&key_id).await?;
            if key.issuer_id != issuer_id {
                return Err(AppError::Forbidden(format!(
                    "key {key_id} does not belong to issuer {issuer_id}"
                )));
            }
            key
        }
        None => state.keys.active_signing_key(&issuer_id).await?,
    };
    // Before registration, so a rejected pair leaves no status entry behind.
    CredentialSigner::ensure_supported(key.key_pair.algorithm(), format)?;

    let already_has_status = document.get("credentialStatus").is_some();
    let register = match req.with_status {
        Some(false) => false,
        Some(true) if already_has_status => false,
        Some(true) if document.id().is_none() => {
            return Err(AppError::Validation(
                "withStatus requires the credential to have an id".into(),
            ))
        }
        Some(true) => true,
        None => !already_has_status && document.id().is_some(),
    };

    let mut credential_status = None;
    if register {
        if let Some(credential_id) = document.id() {
            let credential_id = addressable_credential_id(credential_id.as_str())?;
            let entry = state
                .status
                .register(&issuer_id, &credential_id, StatusPurpose::Revocation)
                .await?;
            let entry = serde_json::to_value(&entry)
                .map_err(|e| AppError::Internal(format!("serialize status entry: {e}")))?;
            add_context(&mut document, STATUS_LIST_CONTEXT);
            document.insert("credentialStatus", entry.clone());
            credential_status = Some(entry);
        }
    }

    let options = SignOptions::new(key.verification_method.clone(), format);
    let signed = state.signer.sign(&document, &key.key_pair, &options)?;

    let jwt = match signed.proof()? {
        Some(bdg_vc::Proof::Jwt(proof)) => Some(proof.jwt),
        _ => None,
    };
    let format_label = match format {
        ProofFormat::Jwt => "jwt",
        ProofFormat::DataIntegrity => "data-integrity",
    };
    state.metrics.record_signed(format_label);
    tracing::info!(
        key_id = %key.key_id,
        credential_id = signed.id().as_ref().map(|id| id.as_str()).unwrap_or(""),
        "credential signed"
    );

    Ok(SignResponse {
        credential: signed.into_value(),
        verification_method: key.verification_method,
        key_id: key.key_id.to_string(),
        credential_status,
        jwt,
    })
}

/// The document's `issuer` must name the signing issuer, either by issuer id
/// or by controller DID.
fn check_document_issuer(
    state: &AppState,
    document: &Credential,
    issuer_id: &IssuerId,
) -> Result<(), AppError> {
    match document.issuer() {
        None => Err(AppError::Validation("credential has no issuer".into())),
        Some(issuer) if &issuer == issuer_id => Ok(()),
        Some(issuer) if issuer.as_str() == state.keys.controller_for(issuer_id) => Ok(()),
        Some(issuer) => Err(AppError::Validation(format!(
            "credential issuer {issuer} does not match issuerId {issuer_id}"
        ))),
    }
}

/// Append `context` to `@context` when it is an array that lacks it.
fn add_context(document: &mut Credential, context: &str) {
    if let Some(Value::Array(contexts)) = document.get("@context") {
        if !contexts.iter().any(|c| c.as_str() == Some(context)) {
            let mut contexts = contexts.clone();
            contexts.push(Value::String(context.to_string()));
            document.insert("@context", Value::Array(contexts));
        }
    }
}
