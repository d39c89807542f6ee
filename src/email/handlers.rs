use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use log::{error, info};
use uuid::Uuid;

use crate::email::models::{RequestRef, SendSalaryData, SendSalaryFailure, SendSalaryResponse};
use crate::email::multipart::MultipartParser;
use crate::payroll::PeriodLabel;
use crate::state::AppState;
use crate::ErrorResponse;

#[utoipa::path(
    context_path = "/api",
    tag = "Salary Email",
    post,
    path = "/email/send-salary-emails",
    request_body(content = inline(crate::email::models::UploadSalaryRequest), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Batch finished; inspect error_details and check_details for per-row outcomes", body = SendSalaryResponse),
        (status = 400, description = "Missing upload, unsupported format, unreadable or malformed spreadsheet", body = SendSalaryFailure),
        (status = 500, description = "Template unavailable or SMTP session could not be opened", body = SendSalaryFailure)
    )
)]
pub async fn send_salary_emails(payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    let request_id = Uuid::new_v4();
    info!("[{}] Received salary batch request", request_id);

    let upload = match MultipartParser::parse_salary_upload(payload).await {
        Ok(upload) => upload,
        Err(e) => {
            error!("[{}] Invalid upload: {}", request_id, e);
            return HttpResponse::from(e);
        }
    };
    info!(
        "[{}] Processing '{}' ({} bytes)",
        request_id,
        upload.filename,
        upload.bytes.len()
    );

    match data.orchestrator.run(upload, PeriodLabel::now()).await {
        Ok(result) => {
            let message = if result.success {
                "All statements sent".to_string()
            } else {
                format!(
                    "Sent {} of {} statements",
                    result.success_count, result.total
                )
            };
            info!("[{}] {}", request_id, message);
            HttpResponse::Ok().json(SendSalaryResponse {
                data: SendSalaryData { request_id, result },
                message,
                code: 200,
            })
        }
        Err(e) => {
            let status = if e.is_batch_fatal() {
                error!("[{}] Batch aborted: {}", request_id, e);
                e.http_status()
            } else {
                error!("[{}] Row error escaped the batch: {}", request_id, e);
                StatusCode::INTERNAL_SERVER_ERROR
            };
            HttpResponse::build(status).json(SendSalaryFailure {
                data: RequestRef { request_id },
                message: e.to_string(),
                code: status.as_u16(),
            })
        }
    }
}

/// Fallback for unknown `/api` routes.
pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(ErrorResponse::not_found("Route not found"))
}
