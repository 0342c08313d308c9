pub mod documents;
pub mod middleware;
pub mod validation;

use actix_web::{error::JsonPayloadError, web, HttpRequest};

use crate::errors::AppError;

/// Все маршруты `/api`; используется и сервером, и тестами.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(documents::init_routes));
}

/// Ошибки разбора JSON отдаём в общем формате `ErrorResponse`.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            log::debug!("Rejected JSON payload: {}", err);
            AppError::InvalidInput(err.to_string()).into()
        })
}
