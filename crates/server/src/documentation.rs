//! OpenAPI document generation.
//!
//! One document is produced per supported API version, titled with the
//! version number and served next to the interactive UI.

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::routes;
use crate::versioning::{ApiVersion, VersionError, SUPPORTED_VERSIONS};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Resolve API",
        version = "1.0",
        description = "Resolve issue tracking web API services",
        contact(name = "Resolve Maintainers", email = "api@resolve.example.com")
    ),
    paths(routes::health, routes::status),
    components(schemas(
        routes::HealthResponse,
        routes::StatusResponse,
        VersionError,
    )),
    tags(
        (name = "health", description = "Liveness checks"),
        (name = "status", description = "Host status")
    )
)]
struct ApiDoc;

/// The document for one API version. The shared skeleton is restamped with
/// the version's title and number.
pub fn document_for(version: ApiVersion) -> utoipa::openapi::OpenApi {
    let mut document = ApiDoc::openapi();
    document.info.title = format!("Resolve API {version}");
    document.info.version = version.to_string();
    document
}

/// Swagger JSON plus UI routes, one endpoint per supported version.
pub fn swagger_ui() -> SwaggerUi {
    let mut ui = SwaggerUi::new("/swagger");
    for version in SUPPORTED_VERSIONS {
        ui = ui.url(
            format!("/swagger/{}/swagger.json", version.group()),
            document_for(*version),
        );
    }
    ui
}
