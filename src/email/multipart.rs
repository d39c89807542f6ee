use actix_multipart::Multipart;
use actix_web::HttpResponse;
use futures::StreamExt;
use sanitize_filename::sanitize;

use crate::payroll::SpreadsheetUpload;
use crate::ErrorResponse;

/// Form field carrying the spreadsheet.
pub const UPLOAD_FIELD: &str = "excel";

#[derive(Debug, thiserror::Error)]
pub enum MultipartParseError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("No file uploaded in field '{0}'")]
    MissingField(&'static str),
    #[error("Uploaded file has no filename")]
    MissingFilename,
}

impl From<MultipartParseError> for HttpResponse {
    fn from(error: MultipartParseError) -> Self {
        match error {
            MultipartParseError::MissingField(_) | MultipartParseError::MissingFilename => {
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&error.to_string()))
            }
            _ => HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error(&error.to_string())),
        }
    }
}

pub struct MultipartParser;

impl MultipartParser {
    /// Read the spreadsheet from the `excel` field. Other fields are drained and ignored.
    pub async fn parse_salary_upload(
        mut multipart: Multipart,
    ) -> Result<SpreadsheetUpload, MultipartParseError> {
        let mut upload: Option<SpreadsheetUpload> = None;

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| MultipartParseError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                MultipartParseError::FieldError("Content disposition not found".to_string())
            })?;
            let is_upload = content_disposition.get_name() == Some(UPLOAD_FIELD);
            let filename = content_disposition.get_filename().map(sanitize);

            let mut bytes = Vec::new();
            while let Some(chunk) = field.next().await {
                let data = chunk.map_err(|e| MultipartParseError::IoError(e.to_string()))?;
                bytes.extend_from_slice(&data);
            }

            if is_upload && upload.is_none() {
                let filename = filename
                    .filter(|f| !f.is_empty())
                    .ok_or(MultipartParseError::MissingFilename)?;
                upload = Some(SpreadsheetUpload::new(filename, bytes));
            }
        }

        upload.ok_or(MultipartParseError::MissingField(UPLOAD_FIELD))
    }
}
