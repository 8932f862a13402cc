//! API endpoint modules.

pub mod findings;
pub mod health;
pub mod openapi;
pub mod personnel;

pub use findings::configure_routes as configure_finding_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use personnel::configure_routes as configure_personnel_routes;
