//! # Credential Verification Endpoints
//!
//! `POST /verify/jwt` and `POST /verify/ld` are public. An invalid
//! credential is a `200` with `verified: false` and the reasons in `errors`;
//! only a request missing its input is rejected.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use bdg_vc::{
    credential_from_jwt, Credential, ProofKind, StatusOutcome, VerificationResult,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{extract_json, AppError};
use crate::state::AppState;

/// Request body for the verification endpoints.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Signed credential with its proof.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub credential: Option<Value>,
    /// Bare compact JWS (`/verify/jwt` only), as returned by `/sign/jwt`.
    #[serde(default)]
    pub jwt: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify/jwt", post(verify_jwt))
        .route("/verify/ld", post(verify_ld))
}

/// POST /verify/jwt: Verify a `JwtProof2020` credential or a bare JWT.
#[utoipa::path(
    post,
    path = "/verify/jwt",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification result; see `verified` and `errors`"),
        (status = 422, description = "Neither credential nor jwt given", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn verify_jwt(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerificationResult>, AppError> {
    let req = extract_json(body)?;
    let parsed = match (req.credential, req.jwt) {
        (Some(credential), _) => Credential::from_value(credential),
        (None, Some(jwt)) => credential_from_jwt(jwt.trim()),
        (None, None) => {
            return Err(AppError::Validation(
                "request must contain credential or jwt".into(),
            ))
        }
    };
    Ok(Json(verify(&state, parsed, ProofKind::Jwt).await))
}

/// POST /verify/ld: Verify a `DataIntegrityProof` credential.
#[utoipa::path(
    post,
    path = "/verify/ld",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification result; see `verified` and `errors`"),
        (status = 422, description = "No credential given", body = crate::error::ErrorBody),
    ),
    tag = "verification"
)]
pub(crate) async fn verify_ld(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerificationResult>, AppError> {
    let req = extract_json(body)?;
    let Some(credential) = req.credential else {
        return Err(AppError::Validation("request must contain credential".into()));
    };
    Ok(Json(
        verify(&state, Credential::from_value(credential), ProofKind::DataIntegrity).await,
    ))
}

async fn verify(
    state: &AppState,
    parsed: Result<Credential, bdg_vc::VcError>,
    kind: ProofKind,
) -> VerificationResult {
    let result = match parsed {
        Ok(credential) => state.verifier.verify_expecting(&credential, kind).await,
        Err(e) => VerificationResult {
            verified: false,
            errors: vec![e.to_string()],
            proof_type: Some(kind),
            verification_method: None,
            status: StatusOutcome::NotChecked,
        },
    };
    let label = match kind {
        ProofKind::Jwt => "jwt",
        ProofKind::DataIntegrity => "data-integrity",
    };
    state.metrics.record_verified(label, result.verified);
    if !result.verified {
        tracing::debug!(errors = ?result.errors, "credential rejected");
    }
    result
}
