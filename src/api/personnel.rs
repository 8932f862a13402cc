//! Personnel roster endpoint.
//!
//! The selectable supervisor and technician names are configuration data,
//! not constants baked into the client.

use actix_web::{get, web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::Config;

/// Personnel roster response.
#[derive(Serialize, ToSchema)]
pub struct PersonnelResponse {
    /// Supervisor names, in display order
    pub supervisors: Vec<String>,
    /// Technician names, in display order
    pub technicians: Vec<String>,
}

/// Get the selectable personnel rosters.
///
/// GET /personnel
#[utoipa::path(
    get,
    path = "/api/v1/personnel",
    tag = "Personnel",
    responses(
        (status = 200, description = "Supervisor and technician rosters", body = PersonnelResponse)
    )
)]
#[get("/personnel")]
pub async fn get_personnel(config: web::Data<Config>) -> HttpResponse {
    HttpResponse::Ok().json(PersonnelResponse {
        supervisors: config.supervisors.clone(),
        technicians: config.technicians.clone(),
    })
}

/// Configure personnel routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_personnel);
}
