//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Badge Trust Core API",
        version = "0.1.0",
        description = "Signing, verification and revocation of W3C Verifiable Credentials (Open Badges 3.0).",
        license(name = "AGPL-3.0-or-later")
    ),
    paths(
        // Signing
        crate::routes::signing::sign_jwt,
        crate::routes::signing::sign_ld,
        // Verification
        crate::routes::verify::verify_jwt,
        crate::routes::verify::verify_ld,
        // Status
        crate::routes::status::get_status_list,
        crate::routes::status::get_credential_status,
        crate::routes::status::set_credential_status,
        // Keys
        crate::routes::keys::generate_key,
        crate::routes::keys::rotate_key,
        crate::routes::keys::list_keys,
        crate::routes::keys::get_key,
        crate::routes::keys::revoke_key,
        crate::routes::keys::mint_issuer_token,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::signing::SignRequest,
        crate::routes::signing::SignResponse,
        crate::routes::verify::VerifyRequest,
        crate::routes::status::StatusUpdateRequest,
        crate::routes::keys::KeyRequest,
        crate::routes::keys::IssuerTokenResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "signing", description = "Credential signing"),
        (name = "verification", description = "Credential verification"),
        (name = "status", description = "StatusList2021 revocation and suspension"),
        (name = "keys", description = "Issuer signing-key lifecycle"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by authenticated paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/sign/jwt",
            "/sign/ld",
            "/verify/jwt",
            "/verify/ld",
            "/status/list/{issuer_id}",
            "/status/{credential_id}",
            "/issuers/{issuer_id}/keys",
            "/issuers/{issuer_id}/keys/rotate",
            "/keys/{key_id}",
            "/keys/{key_id}/revoke",
            "/issuers/{issuer_id}/token",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn bearer_scheme_registered() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
