use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::session::{ConnectionStatus, StatusResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::session::start,
        super::api::session::stop,
        super::api::session::status,
        super::api::history::list_history,
    ),
    components(
        schemas(
            StatusResponse,
            ConnectionStatus,
            ErrorResponse,
            crate::session::SessionMode,
            crate::session::SessionStatus,
            crate::location::PositionSample,
            crate::sink::LocationRecord,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Geobeacon API",
        description = "API for controlling the location tracking session",
        version = "0.1.0"
    ),
    tags(
        (name = "session", description = "Tracking session control"),
        (name = "history", description = "Published location history")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
