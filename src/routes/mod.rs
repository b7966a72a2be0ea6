// Route exports
pub mod users;

use actix_web::web;

pub use users::AppState;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(users::configure),
    );
}

/// JSON extractor config that renders payload errors in the `{error}` envelope
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(crate::error::handle_json_payload_error)
}
