//! OpenAPI documentation configuration.
//!
//! Defines the [`ApiDoc`] struct generating the OpenAPI specification for
//! the REST API: sync endpoints, health probes, schema wrappers for domain
//! types, and the bearer security scheme. Swagger UI serves the document in
//! debug builds at `/docs`.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::inbound::http::schemas::{ErrorCodeSchema, ErrorSchema};
use crate::inbound::http::sync::{
    PullRequestBody, PullResponseBody, PushRequestBody, PushResponseBody, SensorDataBody,
    SensorReadingBody, SessionBody, SessionDescriptorBody, StatusResponseBody, SyncLogBody,
};

/// Enrich the generated document with the bearer security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "BearerToken",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("Bearer token issued by the identity collaborator."))
                    .build(),
            ),
        );
    }
}

/// OpenAPI document for the REST API.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Sensor sync backend API",
        description = "Push/pull reconciliation for offline-first multi-sensor recording clients.",
        license(name = "MIT")
    ),
    servers(
        (url = "/", description = "Relative to the deployment base URL")
    ),
    security(("BearerToken" = [])),
    paths(
        crate::inbound::http::sync::push_sync,
        crate::inbound::http::sync::pull_sync,
        crate::inbound::http::sync::sync_status,
        crate::inbound::http::health::ready,
        crate::inbound::http::health::live,
    ),
    components(schemas(
        PushRequestBody,
        PushResponseBody,
        SessionDescriptorBody,
        SensorReadingBody,
        PullRequestBody,
        PullResponseBody,
        SessionBody,
        SensorDataBody,
        StatusResponseBody,
        SyncLogBody,
        ErrorSchema,
        ErrorCodeSchema,
    )),
    tags(
        (name = "sync", description = "Push/pull reconciliation and status"),
        (name = "health", description = "Liveness and readiness probes")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use utoipa::OpenApi;

    use super::*;

    #[test]
    fn document_references_every_sync_path() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/sync/push"));
        assert!(paths.iter().any(|p| p.as_str() == "/sync/pull"));
        assert!(paths.iter().any(|p| p.as_str() == "/sync/status"));
        assert!(paths.iter().any(|p| p.as_str() == "/health/ready"));
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components present");
        assert!(components.security_schemes.contains_key("BearerToken"));
    }
}
