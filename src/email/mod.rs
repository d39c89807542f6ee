//! HTTP surface for salary batches.

pub mod handlers;
pub mod models;
pub mod multipart;

use actix_web::web;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/email").service(
            web::resource("/send-salary-emails")
                .route(web::post().to(handlers::send_salary_emails)),
        ),
    );
}
