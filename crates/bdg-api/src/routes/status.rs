//! # Credential Status Endpoints
//!
//! - `GET /status/list/:issuerId[?purpose=suspension]`: the signed
//!   StatusList2021 credential, created on first request. Public.
//! - `GET /status/:credentialId`: revoked/suspended flags, reason, and the
//!   list entries. Public.
//! - `POST /status/:credentialId`: set or clear a bit. Issuer-authenticated.
//!
//! Credential ids are URIs; clients percent-encode them in the path. The id
//! `list` is reserved, since `/status/list` is the list prefix.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bdg_core::{CredentialId, IssuerId};
use bdg_status::{CredentialStatusView, StatusChange, StatusPurpose};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::auth::CallerIdentity;
use crate::error::{extract_json, AppError};
use crate::state::AppState;

/// Query of the list endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// `revocation` (default) or `suspension`.
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Body of a status change.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    /// Issuer the credential is registered to.
    pub issuer_id: String,
    /// New bit value: `true` revokes (or suspends), `false` clears.
    pub revoked: bool,
    #[serde(default)]
    pub reason: Option<String>,
    /// `revocation` (default) or `suspension`.
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Result of a status change.
#[derive(Debug, Serialize)]
pub struct StatusUpdateResponse {
    pub change: StatusChange,
    pub status: CredentialStatusView,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status/list/:issuer_id", get(get_status_list))
        .route(
            "/status/:credential_id",
            get(get_credential_status).post(set_credential_status),
        )
}

/// Path segment under `/status/` that names the list routes.
pub const RESERVED_CREDENTIAL_ID: &str = "list";

/// A credential id that can be addressed as `/status/{id}`.
pub(crate) fn addressable_credential_id(raw: impl Into<String>) -> Result<CredentialId, AppError> {
    let id = CredentialId::new(raw)?;
    if id.as_str() == RESERVED_CREDENTIAL_ID {
        return Err(AppError::Validation(format!(
            "credential id {RESERVED_CREDENTIAL_ID:?} is reserved"
        )));
    }
    Ok(id)
}

fn parse_purpose(raw: Option<&str>) -> Result<StatusPurpose, AppError> {
    match raw {
        None | Some("") => Ok(StatusPurpose::Revocation),
        Some(s) => Ok(s.parse::<StatusPurpose>()?),
    }
}

/// GET /status/list/:issuerId: Published status list credential.
#[utoipa::path(
    get,
    path = "/status/list/{issuer_id}",
    params(("issuer_id" = String, Path, description = "Issuer id"), ListQuery),
    responses(
        (status = 200, description = "Signed StatusList2021Credential"),
        (status = 404, description = "Issuer has no signing key", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown purpose", body = crate::error::ErrorBody),
    ),
    tag = "status"
)]
pub(crate) async fn get_status_list(
    State(state): State<AppState>,
    Path(issuer_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let issuer_id = IssuerId::new(issuer_id)?;
    let purpose = parse_purpose(query.purpose.as_deref())?;
    let credential = state
        .status
        .status_list_credential(&issuer_id, purpose)
        .await?;
    Ok(Json(credential.into_value()))
}

/// GET /status/:credentialId: Current status of a credential.
#[utoipa::path(
    get,
    path = "/status/{credential_id}",
    params(("credential_id" = String, Path, description = "Credential id, percent-encoded")),
    responses(
        (status = 200, description = "Credential status"),
        (status = 404, description = "Credential was never registered", body = crate::error::ErrorBody),
        (status = 500, description = "Status list unreadable", body = crate::error::ErrorBody),
    ),
    tag = "status"
)]
pub(crate) async fn get_credential_status(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> Result<Json<CredentialStatusView>, AppError> {
    let credential_id = addressable_credential_id(credential_id)?;
    Ok(Json(state.status.status_of(&credential_id).await?))
}

/// POST /status/:credentialId: Revoke, reinstate, suspend or unsuspend.
#[utoipa::path(
    post,
    path = "/status/{credential_id}",
    params(("credential_id" = String, Path, description = "Credential id, percent-encoded")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status written"),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
        (status = 403, description = "Credential registered to another issuer", body = crate::error::ErrorBody),
        (status = 409, description = "Concurrent writers exhausted retries", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "status"
)]
pub(crate) async fn set_credential_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(credential_id): Path<String>,
    body: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<StatusUpdateResponse>, AppError> {
    let req = extract_json(body)?;
    let credential_id = addressable_credential_id(credential_id)?;
    let issuer_id = IssuerId::new(req.issuer_id)?;
    caller.may_act_for(&issuer_id)?;
    let purpose = parse_purpose(req.purpose.as_deref())?;

    let change = state
        .status
        .set_status(&issuer_id, &credential_id, purpose, req.revoked, req.reason)
        .await?;
    if change.changed {
        state
            .metrics
            .record_status_change(purpose.as_str(), change.value);
    }
    let status = state.status.status_of(&credential_id).await?;
    Ok(Json(StatusUpdateResponse { change, status }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_not_a_credential_id() {
        assert!(matches!(
            addressable_credential_id("list"),
            Err(AppError::Validation(_))
        ));
        assert!(addressable_credential_id("urn:uuid:list").is_ok());
        assert!(addressable_credential_id("lists").is_ok());
    }

    #[test]
    fn purpose_defaults_to_revocation() {
        assert_eq!(parse_purpose(None).unwrap(), StatusPurpose::Revocation);
        assert_eq!(parse_purpose(Some("")).unwrap(), StatusPurpose::Revocation);
        assert_eq!(
            parse_purpose(Some("suspension")).unwrap(),
            StatusPurpose::Suspension
        );
        assert!(matches!(
            parse_purpose(Some("expiry")),
            Err(AppError::Validation(_))
        ));
    }
}
