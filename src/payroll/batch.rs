//! Batch orchestration.
//!
//! `Loading` (spreadsheet and template) and `ChannelOpen` failures end the
//! batch before any row is attempted. After that every row runs the full
//! pipeline on its own: a failing row is recorded and the loop moves on.

use chrono::{Datelike, Local, NaiveDate};
use log::{error, info, warn};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use utoipa::ToSchema;

use super::channel::{ChannelConnector, DeliveryChannel};
use super::compose::{EmailTemplate, NotificationComposer};
use super::loader::{load_spreadsheet, CompensationRow, SpreadsheetUpload};
use super::locale::Locale;
use super::password::generate_password;
use super::protect::DocumentProtector;
use super::recipient::check_email_name;
use super::render::{StatementRenderer, StatementRequest};
use super::{PayrollError, RenderError};

/// Reporting date captured once at batch start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodLabel {
    date: NaiveDate,
}

impl PeriodLabel {
    pub fn now() -> Self {
        Self {
            date: Local::now().date_naive(),
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self { date }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Subject line from a chrono format string, e.g. `%d/%m/%Y明细`.
    ///
    /// `None` when the format is malformed or asks for fields a date cannot
    /// supply, such as `%H`.
    pub fn try_subject(&self, format: &str) -> Option<String> {
        let mut subject = String::new();
        write!(subject, "{}", self.date.format(format)).ok()?;
        Some(subject)
    }

    /// Like `try_subject`, falling back to the locale's default format.
    pub fn subject(&self, format: &str, locale: Locale) -> String {
        self.try_subject(format).unwrap_or_else(|| {
            warn!(
                "Subject format '{}' cannot be applied to a date, using the default",
                format
            );
            self.try_subject(locale.labels().default_subject_format)
                .unwrap_or_default()
        })
    }

    pub fn attachment_name(&self) -> String {
        format!("payslip-{}-{:02}.pdf", self.year(), self.month())
    }
}

/// Where each row's open password comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordPolicy {
    /// A fresh random password per recipient.
    PerRecipient,
    /// One password shared by the whole batch.
    Fixed(String),
}

impl PasswordPolicy {
    pub fn password_for_row(&self) -> String {
        match self {
            Self::PerRecipient => generate_password(),
            Self::Fixed(password) => password.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub template_path: PathBuf,
    pub logo_path: Option<PathBuf>,
    pub password_policy: PasswordPolicy,
    pub subject_format: String,
    pub locale: Locale,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct FailureDetail {
    pub recipient: String,
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct CheckDetail {
    pub recipient: String,
    pub email: String,
    pub msg: String,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    Success,
    PartialFailure,
}

/// Per-batch tally returned to the caller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchResult {
    /// True when every row was delivered.
    pub success: bool,
    pub outcome: BatchOutcome,
    pub total: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub error_details: Vec<FailureDetail>,
    pub check_count: usize,
    pub check_details: Vec<CheckDetail>,
    pub subject: String,
}

impl BatchResult {
    fn new(total: usize, subject: String) -> Self {
        Self {
            success: total == 0,
            outcome: BatchOutcome::Success,
            total,
            success_count: 0,
            error_count: 0,
            error_details: Vec::new(),
            check_count: 0,
            check_details: Vec::new(),
            subject,
        }
    }

    fn record_success(&mut self) {
        self.success_count += 1;
    }

    fn record_failure(&mut self, detail: FailureDetail) {
        self.error_count += 1;
        self.error_details.push(detail);
    }

    fn record_check(&mut self, detail: CheckDetail) {
        self.check_count += 1;
        self.check_details.push(detail);
    }

    fn finish(&mut self) {
        self.success = self.success_count == self.total;
        self.outcome = if self.success {
            BatchOutcome::Success
        } else {
            BatchOutcome::PartialFailure
        };
    }
}

enum RowOutcome {
    Sent,
    Flagged,
    Failed(PayrollError),
}

/// Drives the per-row pipeline over one delivery session.
pub struct BatchOrchestrator {
    settings: BatchSettings,
    renderer: Arc<dyn StatementRenderer>,
    protector: Arc<dyn DocumentProtector>,
    composer: NotificationComposer,
    connector: Arc<dyn ChannelConnector>,
}

impl BatchOrchestrator {
    pub fn new(
        settings: BatchSettings,
        renderer: Arc<dyn StatementRenderer>,
        protector: Arc<dyn DocumentProtector>,
        composer: NotificationComposer,
        connector: Arc<dyn ChannelConnector>,
    ) -> Self {
        Self {
            settings,
            renderer,
            protector,
            composer,
            connector,
        }
    }

    /// Run one batch. `Err` means a batch-fatal error; row failures are in the result.
    pub async fn run(
        &self,
        upload: SpreadsheetUpload,
        period: PeriodLabel,
    ) -> Result<BatchResult, PayrollError> {
        let table = tokio::task::spawn_blocking(move || load_spreadsheet(&upload))
            .await
            .map_err(|e| PayrollError::Parse(e.to_string()))?
            .inspect_err(|e| error!("Failed to read spreadsheet: {}", e))?;

        let template = EmailTemplate::load(&self.settings.template_path)
            .await
            .inspect_err(|e| error!("Failed to load template: {}", e))?;

        let subject = period.subject(&self.settings.subject_format, self.settings.locale);

        let mut channel = self
            .connector
            .open()
            .await
            .inspect_err(|e| error!("SMTP connection failed: {}", e))?;

        let mut result = BatchResult::new(table.row_count, subject.clone());
        let labels = self.settings.locale.labels();

        for row in &table.rows {
            let recipient = row
                .name
                .clone()
                .unwrap_or_else(|| labels.unknown_recipient.to_string());
            let email = row
                .email
                .clone()
                .unwrap_or_else(|| labels.missing_email.to_string());

            match self
                .process_row(channel.as_mut(), &template, row, &period, &subject)
                .await
            {
                RowOutcome::Sent => {
                    info!("Sent statement to {} <{}>", recipient, email);
                    result.record_success();
                }
                RowOutcome::Flagged => {
                    warn!("Flagged {} <{}> for manual check", recipient, email);
                    result.record_check(CheckDetail {
                        recipient,
                        email,
                        msg: labels.mismatch_reason.to_string(),
                    });
                }
                RowOutcome::Failed(err) => {
                    error!("Sending to {} <{}> failed: {}", recipient, email, err);
                    result.record_failure(FailureDetail {
                        recipient,
                        email,
                        error: err.to_string(),
                    });
                }
            }
        }

        if let Err(e) = channel.close().await {
            warn!("Failed to close SMTP session cleanly: {}", e);
        }

        result.finish();
        if result.success {
            info!("All statements sent, total: {}", result.success_count);
        } else {
            warn!(
                "Batch finished, sent {}/{} ({} failed, {} flagged)",
                result.success_count, result.total, result.error_count, result.check_count
            );
        }
        Ok(result)
    }

    async fn process_row(
        &self,
        channel: &mut dyn DeliveryChannel,
        template: &EmailTemplate,
        row: &CompensationRow,
        period: &PeriodLabel,
        subject: &str,
    ) -> RowOutcome {
        let Some(email) = row.email.as_deref() else {
            return RowOutcome::Failed(PayrollError::MissingEmail);
        };

        // Rows without a name skip the mismatch check.
        if let Some(name) = row.name.as_deref() {
            if !check_email_name(name, email) {
                return RowOutcome::Flagged;
            }
        }

        match self
            .deliver(channel, template, row, email, period, subject)
            .await
        {
            Ok(()) => RowOutcome::Sent,
            Err(err) => RowOutcome::Failed(err),
        }
    }

    /// Render, protect, compose, send. Both artifacts live only inside the
    /// blocking task and are deleted before it returns the attachment bytes.
    async fn deliver(
        &self,
        channel: &mut dyn DeliveryChannel,
        template: &EmailTemplate,
        row: &CompensationRow,
        email: &str,
        period: &PeriodLabel,
        subject: &str,
    ) -> Result<(), PayrollError> {
        let password = self.settings.password_policy.password_for_row();
        let request = StatementRequest {
            row: row.clone(),
            recipient: row.name.clone(),
            logo: self.settings.logo_path.clone(),
            issued_on: period.date(),
        };

        let renderer = Arc::clone(&self.renderer);
        let protector = Arc::clone(&self.protector);
        let open_password = password.clone();
        let attachment = tokio::task::spawn_blocking(move || {
            let rendered = renderer.render(&request)?;
            let protected = protector.protect(&rendered, &open_password)?;
            if let Err(e) = rendered.delete() {
                warn!("Failed to delete rendered statement: {}", e);
            }
            protected.read_bytes().map_err(|e| {
                PayrollError::Compose(format!(
                    "failed to read protected statement {}: {}",
                    protected.path().display(),
                    e
                ))
            })
        })
        .await
        .map_err(|e| PayrollError::Render(RenderError::Aborted(e.to_string())))??;

        let notification = self.composer.compose(
            template,
            row,
            email,
            subject,
            &period.attachment_name(),
            attachment,
            &password,
        );
        channel.send(&notification).await
    }
}
