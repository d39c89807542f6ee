use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod email;
pub mod logging;
pub mod payroll;
pub mod state;

pub use crate::config::{ConfigError, MailerConfig};
pub use crate::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(crate::email::handlers::send_salary_emails),
    components(
        schemas(
            email::models::SendSalaryResponse,
            email::models::SendSalaryData,
            email::models::SendSalaryFailure,
            email::models::RequestRef,
            payroll::BatchResult,
            payroll::BatchOutcome,
            payroll::FailureDetail,
            payroll::CheckDetail,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Salary Email", description = "Encrypted salary statement delivery.")
    )
)]
pub struct ApiDoc;

/// Browser origins served from a local dev server.
fn is_local_origin(origin: &[u8]) -> bool {
    origin == b"http://localhost" || origin.starts_with(b"http://localhost:")
}

pub async fn run() -> std::io::Result<()> {
    let config = match MailerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(None)?;
            log::error!("Invalid configuration. Please check your .env file. Error: {}", e);
            std::process::exit(1);
        }
    };
    logging::init_logging(config.log_dir.as_deref())?;

    let app_state = web::Data::new(AppState::from_config(&config));

    let prometheus = PrometheusMetricsBuilder::new("salary_mailer")
        .endpoint("/metrics")
        .build()
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    log::info!(
        "Starting server at http://{}:{}",
        config.bind_addr,
        config.port
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin_fn(|origin, _req_head| is_local_origin(origin.as_bytes()))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus.clone())
            .app_data(app_state.clone())
            .service(
                web::scope("/api")
                    .wrap(cors)
                    .configure(email::config)
                    .default_service(web::route().to(email::handlers::not_found)),
            )
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_origins() {
        assert!(is_local_origin(b"http://localhost:3000"));
        assert!(is_local_origin(b"http://localhost"));
        assert!(!is_local_origin(b"http://localhost.evil.com"));
        assert!(!is_local_origin(b"https://example.com"));
    }

    #[test]
    fn test_openapi_lists_send_endpoint() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(doc["paths"]["/api/email/send-salary-emails"]["post"].is_object());
    }
}
