//! Payroll statement pipeline.
//!
//! Each spreadsheet row goes through the same sequence:
//! - `recipient` - advisory name/email check
//! - `render` - statement PDF via the Typst CLI
//! - `protect` - password encryption via qpdf
//! - `compose` - HTML notification with the protected PDF attached
//! - `channel` - delivery over one SMTP session per batch
//!
//! `batch` drives the sequence and keeps one row's failure from touching the next.

pub mod artifact;
pub mod batch;
pub mod channel;
pub mod compose;
pub mod fonts;
pub mod loader;
pub mod locale;
pub mod money;
pub mod password;
pub mod protect;
pub mod recipient;
pub mod render;

pub use artifact::{ArtifactState, DocumentArtifact};
pub use batch::{
    BatchOrchestrator, BatchOutcome, BatchResult, BatchSettings, CheckDetail, FailureDetail,
    PasswordPolicy, PeriodLabel,
};
pub use channel::{ChannelConnector, DeliveryChannel, SmtpConnector, SmtpSettings, TlsMode};
pub use compose::{EmailTemplate, MailAttachment, Notification, NotificationComposer};
pub use fonts::{FontRegistry, FALLBACK_FAMILY};
pub use loader::{load_spreadsheet, CompensationRow, Field, LoadedTable, SpreadsheetUpload};
pub use locale::Locale;
pub use protect::{DocumentProtector, QpdfProtector};
pub use render::{StatementRenderer, StatementRequest, TypstStatementRenderer};

use actix_web::http::StatusCode;
use thiserror::Error;

/// Failures raised while rendering a statement.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create temporary directory: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("failed to create output file: {0}")]
    OutputFile(#[source] std::io::Error),
    #[error("failed to write Typst source: {0}")]
    WriteSource(#[source] std::io::Error),
    #[error("Typst CLI execution failed: {0}")]
    TypstIo(#[source] std::io::Error),
    #[error("Typst CLI exited with status {code}: {stderr}")]
    TypstExit { code: i32, stderr: String },
    #[error("render task aborted: {0}")]
    Aborted(String),
}

/// Failures raised while encrypting a statement.
#[derive(Debug, Error)]
pub enum ProtectError {
    #[error("failed to create output file: {0}")]
    OutputFile(#[source] std::io::Error),
    #[error("qpdf execution failed: {0}")]
    QpdfIo(#[source] std::io::Error),
    #[error("qpdf exited with status {code}: {stderr}")]
    QpdfExit { code: i32, stderr: String },
}

/// Every failure the pipeline can report, batch-fatal or row-scoped.
#[derive(Debug, Error)]
pub enum PayrollError {
    #[error("unsupported spreadsheet file '{filename}', expected one of: xlsx, xlsm, xlsb, xls, ods")]
    Format { filename: String },

    #[error("failed to parse spreadsheet: {0}")]
    Parse(String),

    #[error("missing required column '{column}' ({headers})")]
    Schema { column: String, headers: String },

    #[error("failed to load email template '{path}': {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing email address")]
    MissingEmail,

    #[error("failed to render statement: {0}")]
    Render(#[from] RenderError),

    #[error("failed to protect statement: {0}")]
    Protect(#[from] ProtectError),

    #[error("failed to compose notification: {0}")]
    Compose(String),

    #[error("failed to connect to mail server: {0}")]
    Connect(String),

    #[error("failed to send message: {0}")]
    Send(String),
}

impl PayrollError {
    /// True when no row of the batch can be attempted after this error.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::Format { .. }
                | Self::Parse(_)
                | Self::Schema { .. }
                | Self::Template { .. }
                | Self::Connect(_)
        )
    }

    /// Status code for a batch-fatal error; uploads the client can fix map to 400.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Format { .. } | Self::Parse(_) | Self::Schema { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
