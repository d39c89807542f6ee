//! Fakes and fixtures shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use salary_mailer::payroll::{
    ArtifactState, BatchOrchestrator, BatchSettings, ChannelConnector, DeliveryChannel,
    DocumentArtifact, DocumentProtector, Locale, Notification, NotificationComposer,
    PasswordPolicy, PayrollError, ProtectError, RenderError, StatementRenderer, StatementRequest,
    SpreadsheetUpload,
};

pub const SENDER: &str = "hr@co.com";

pub const HEADERS: [&str; 9] = [
    "姓名", "邮箱", "基本工资", "服务费", "奖金", "提成", "其他", "扣款", "实发工资",
];

#[derive(Debug, Clone)]
pub enum Cell {
    Text(&'static str),
    Num(f64),
    Blank,
}

/// Build an xlsx workbook in memory. The first row is written as headers.
pub fn xlsx(headers: &[&str], rows: &[Vec<Cell>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        let r = (r + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    sheet.write_string(r, col as u16, *text).unwrap();
                }
                Cell::Num(value) => {
                    sheet.write_number(r, col as u16, *value).unwrap();
                }
                Cell::Blank => {}
            }
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// A standard row: name, email, then base/bonus/deduction/total with zeros elsewhere.
pub fn salary_row(name: Option<&'static str>, email: Option<&'static str>, total: f64) -> Vec<Cell> {
    vec![
        name.map(Cell::Text).unwrap_or(Cell::Blank),
        email.map(Cell::Text).unwrap_or(Cell::Blank),
        Cell::Num(total),
        Cell::Num(0.0),
        Cell::Num(0.0),
        Cell::Num(0.0),
        Cell::Num(0.0),
        Cell::Num(0.0),
        Cell::Num(total),
    ]
}

pub fn upload(rows: &[Vec<Cell>]) -> SpreadsheetUpload {
    SpreadsheetUpload::new("salary.xlsx", xlsx(&HEADERS, rows))
}

pub fn template_file(dir: &Path, html: &str) -> PathBuf {
    let path = dir.join("salary_email.html");
    fs::write(&path, html).unwrap();
    path
}

/// Renderer writing a small fake PDF into a watched directory.
pub struct FakeRenderer {
    pub dir: PathBuf,
    pub fail_for: Option<String>,
    pub rendered: Mutex<Vec<PathBuf>>,
}

impl FakeRenderer {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fail_for: None,
            rendered: Mutex::new(Vec::new()),
        }
    }
}

impl StatementRenderer for FakeRenderer {
    fn render(&self, request: &StatementRequest) -> Result<DocumentArtifact, PayrollError> {
        if request.row.email.is_some() && request.row.email == self.fail_for {
            return Err(RenderError::TypstExit {
                code: 1,
                stderr: "font not found".to_string(),
            }
            .into());
        }
        let artifact = DocumentArtifact::create_in(&self.dir, ArtifactState::Rendered)
            .map_err(RenderError::OutputFile)?;
        let body = format!("%PDF-fake {}", request.row.amounts.total);
        fs::write(artifact.path(), body).map_err(RenderError::WriteSource)?;
        self.rendered.lock().push(artifact.path().to_path_buf());
        Ok(artifact)
    }
}

/// Protector prefixing the input with the password, optionally failing.
pub struct FakeProtector {
    pub dir: PathBuf,
    pub fail: bool,
    pub passwords: Mutex<Vec<String>>,
}

impl FakeProtector {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fail: false,
            passwords: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(dir: &Path) -> Self {
        Self {
            fail: true,
            ..Self::new(dir)
        }
    }
}

impl DocumentProtector for FakeProtector {
    fn protect(
        &self,
        document: &DocumentArtifact,
        password: &str,
    ) -> Result<DocumentArtifact, PayrollError> {
        self.passwords.lock().push(password.to_string());
        if self.fail {
            return Err(ProtectError::QpdfExit {
                code: 2,
                stderr: "damaged input".to_string(),
            }
            .into());
        }
        let input = document.read_bytes().map_err(ProtectError::OutputFile)?;
        let protected = DocumentArtifact::create_in(&self.dir, ArtifactState::Protected)
            .map_err(ProtectError::OutputFile)?;
        let mut bytes = format!("ENC[{password}]").into_bytes();
        bytes.extend_from_slice(&input);
        fs::write(protected.path(), bytes).map_err(ProtectError::OutputFile)?;
        Ok(protected)
    }
}

/// Connector recording every message instead of sending it.
#[derive(Default)]
pub struct RecordingConnector {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    pub reject: Option<String>,
    pub refuse_open: bool,
    pub opened: AtomicBool,
    pub closed: Arc<AtomicBool>,
}

#[async_trait]
impl ChannelConnector for RecordingConnector {
    async fn open(&self) -> Result<Box<dyn DeliveryChannel>, PayrollError> {
        if self.refuse_open {
            return Err(PayrollError::Connect("535 authentication failed".to_string()));
        }
        self.opened.store(true, Ordering::SeqCst);
        Ok(Box::new(RecordingChannel {
            sent: Arc::clone(&self.sent),
            reject: self.reject.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<Notification>>>,
    reject: Option<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&mut self, notification: &Notification) -> Result<(), PayrollError> {
        if self.reject.as_deref() == Some(notification.to.as_str()) {
            return Err(PayrollError::Send("550 mailbox unavailable".to_string()));
        }
        self.sent.lock().push(notification.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), PayrollError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn settings(template_path: PathBuf, policy: PasswordPolicy, locale: Locale) -> BatchSettings {
    BatchSettings {
        template_path,
        logo_path: None,
        password_policy: policy,
        subject_format: locale.labels().default_subject_format.to_string(),
        locale,
    }
}

/// Everything one batch test needs, with the artifact directory kept alive.
pub struct Harness {
    pub workdir: TempDir,
    pub renderer: Arc<FakeRenderer>,
    pub protector: Arc<FakeProtector>,
    pub connector: Arc<RecordingConnector>,
    pub orchestrator: BatchOrchestrator,
}

impl Harness {
    pub fn artifacts_left(&self) -> usize {
        fs::read_dir(self.artifact_dir()).unwrap().count()
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.workdir.path().join("artifacts")
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.connector.sent.lock().clone()
    }
}

pub struct HarnessBuilder {
    template: String,
    policy: PasswordPolicy,
    locale: Locale,
    failing_protector: bool,
    render_failure: Option<String>,
    connector: RecordingConnector,
    missing_template: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            template: "<html><body><p>{{name}}: {{total}}</p></body></html>".to_string(),
            policy: PasswordPolicy::PerRecipient,
            locale: Locale::Zh,
            failing_protector: false,
            render_failure: None,
            connector: RecordingConnector::default(),
            missing_template: false,
        }
    }
}

impl HarnessBuilder {
    pub fn template(mut self, html: &str) -> Self {
        self.template = html.to_string();
        self
    }

    pub fn policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn failing_protector(mut self) -> Self {
        self.failing_protector = true;
        self
    }

    pub fn render_failure_for(mut self, email: &str) -> Self {
        self.render_failure = Some(email.to_string());
        self
    }

    pub fn reject_recipient(mut self, email: &str) -> Self {
        self.connector.reject = Some(email.to_string());
        self
    }

    pub fn refuse_open(mut self) -> Self {
        self.connector.refuse_open = true;
        self
    }

    pub fn missing_template(mut self) -> Self {
        self.missing_template = true;
        self
    }

    pub fn build(self) -> Harness {
        let workdir = tempfile::tempdir().unwrap();
        let artifact_dir = workdir.path().join("artifacts");
        fs::create_dir_all(&artifact_dir).unwrap();

        let template_path = if self.missing_template {
            workdir.path().join("missing.html")
        } else {
            template_file(workdir.path(), &self.template)
        };

        let mut renderer = FakeRenderer::new(&artifact_dir);
        renderer.fail_for = self.render_failure;
        let renderer = Arc::new(renderer);
        let protector = Arc::new(if self.failing_protector {
            FakeProtector::failing(&artifact_dir)
        } else {
            FakeProtector::new(&artifact_dir)
        });
        let connector = Arc::new(self.connector);

        let orchestrator = BatchOrchestrator::new(
            settings(template_path, self.policy, self.locale),
            renderer.clone(),
            protector.clone(),
            NotificationComposer::new(SENDER, self.locale),
            connector.clone(),
        );

        Harness {
            workdir,
            renderer,
            protector,
            connector,
            orchestrator,
        }
    }
}
