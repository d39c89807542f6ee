use log::error;
use std::sync::Arc;

use crate::config::MailerConfig;
use crate::payroll::{
    BatchOrchestrator, BatchSettings, ChannelConnector, DocumentProtector, FontRegistry,
    NotificationComposer, QpdfProtector, SmtpConnector, StatementRenderer,
    TypstStatementRenderer, FALLBACK_FAMILY,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BatchOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: BatchOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Wire the production renderer, protector and SMTP connector.
    pub fn from_config(config: &MailerConfig) -> Self {
        let fonts = Arc::new(FontRegistry::discover(
            &config.statement_font,
            &config.font_dir,
        ));
        if !fonts.has_cjk_typeface() {
            error!(
                "No CJK typeface available: '{}' is not installed and {} has no font files. \
                 Statements will show missing glyphs until {} is placed there (FONT_DIR)",
                config.statement_font,
                config.font_dir.display(),
                FALLBACK_FAMILY
            );
        }
        let renderer: Arc<dyn StatementRenderer> = Arc::new(TypstStatementRenderer::new(
            config.typst_bin.clone(),
            fonts,
            config.locale,
            config.currency_symbol.clone(),
        ));
        let protector: Arc<dyn DocumentProtector> =
            Arc::new(QpdfProtector::new(config.qpdf_bin.clone()));
        let connector: Arc<dyn ChannelConnector> =
            Arc::new(SmtpConnector::new(config.smtp.clone()));

        let settings = BatchSettings {
            template_path: config.template_path.clone(),
            logo_path: config.logo_path.clone(),
            password_policy: config.password_policy.clone(),
            subject_format: config.subject_format.clone(),
            locale: config.locale,
        };

        Self::new(BatchOrchestrator::new(
            settings,
            renderer,
            protector,
            NotificationComposer::new(config.sender_email.clone(), config.locale),
            connector,
        ))
    }
}
