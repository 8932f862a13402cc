//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Findings Server",
        version = "0.3.0",
        description = "API server for recording mechanical-inspection findings with signature and attachment artifacts"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Finding endpoints
        api::findings::create_finding,
        api::findings::list_findings,
        api::findings::get_finding,
        // Personnel endpoints
        api::personnel::get_personnel,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            models::Pagination,
            models::PaginationParams,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Findings
            models::MaintenanceType,
            models::Finding,
            api::findings::FindingListResponse,
            // Personnel
            api::personnel::PersonnelResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Findings", description = "Finding submission and history"),
        (name = "Personnel", description = "Selectable personnel rosters")
    )
)]
pub struct ApiDoc;
