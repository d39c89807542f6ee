use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::payroll::BatchResult;

/// Batch result tagged with the request that produced it.
#[derive(Debug, Serialize, ToSchema)]
pub struct SendSalaryData {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub result: BatchResult,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendSalaryResponse {
    pub data: SendSalaryData,
    #[schema(example = "All statements sent")]
    pub message: String,
    #[schema(example = 200)]
    pub code: u16,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestRef {
    pub request_id: Uuid,
}

/// Envelope for batch-fatal errors.
#[derive(Debug, Serialize, ToSchema)]
pub struct SendSalaryFailure {
    pub data: RequestRef,
    #[schema(example = "missing required column 'email' (邮箱 / Email)")]
    pub message: String,
    #[schema(example = 400)]
    pub code: u16,
}

#[derive(Debug, ToSchema)]
pub struct UploadSalaryRequest {
    /// Spreadsheet file (xlsx, xlsm, xlsb, xls or ods).
    #[allow(unused)]
    #[schema(value_type = String, format = Binary)]
    pub excel: Vec<u8>,
}
