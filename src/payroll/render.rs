//! Statement rendering with the Typst CLI.
//!
//! Typst source is generated per row, written to a temporary directory and
//! compiled straight into a `DocumentArtifact`.

use chrono::NaiveDate;
use log::{debug, warn};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::tempdir;

use super::artifact::{ArtifactState, DocumentArtifact};
use super::fonts::FontRegistry;
use super::loader::{CompensationRow, Field};
use super::locale::{Labels, Locale};
use super::money::format_currency;
use super::{PayrollError, RenderError};

const SOURCE_FILE: &str = "statement.typ";
const LOGO_STEM: &str = "logo";

/// Everything needed to render one statement.
#[derive(Debug, Clone)]
pub struct StatementRequest {
    pub row: CompensationRow,
    pub recipient: Option<String>,
    pub logo: Option<PathBuf>,
    pub issued_on: NaiveDate,
}

/// Turns one row into a rendered, unencrypted PDF.
pub trait StatementRenderer: Send + Sync {
    fn render(&self, request: &StatementRequest) -> Result<DocumentArtifact, PayrollError>;
}

/// Renderer backed by the `typst` binary.
pub struct TypstStatementRenderer {
    typst_bin: String,
    fonts: Arc<FontRegistry>,
    locale: Locale,
    currency: String,
}

impl TypstStatementRenderer {
    pub fn new(
        typst_bin: impl Into<String>,
        fonts: Arc<FontRegistry>,
        locale: Locale,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            typst_bin: typst_bin.into(),
            fonts,
            locale,
            currency: currency.into(),
        }
    }

    /// Copy the logo next to the source so Typst can reach it; missing or
    /// non-image logos are skipped with a warning.
    fn stage_logo(&self, logo: Option<&Path>, workdir: &Path) -> Option<String> {
        let logo = logo?;
        let is_image = mime_guess::from_path(logo)
            .first()
            .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .unwrap_or(false);
        if !is_image {
            warn!("Logo {} is not an image, skipping", logo.display());
            return None;
        }

        let ext = logo.extension().and_then(|e| e.to_str()).unwrap_or("png");
        let staged = format!("{LOGO_STEM}.{}", ext.to_ascii_lowercase());
        match fs::copy(logo, workdir.join(&staged)) {
            Ok(_) => Some(staged),
            Err(e) => {
                warn!("Logo {} unavailable, skipping: {}", logo.display(), e);
                None
            }
        }
    }

    fn compile(&self, workdir: &Path, output: &Path) -> Result<(), RenderError> {
        let mut command = Command::new(&self.typst_bin);
        command.arg("compile");
        for dir in self.fonts.font_dirs() {
            command.arg("--font-path").arg(dir);
        }
        let result = command
            .arg(workdir.join(SOURCE_FILE))
            .arg(output)
            .current_dir(workdir)
            .output()
            .map_err(RenderError::TypstIo)?;

        if !result.status.success() {
            return Err(RenderError::TypstExit {
                code: result.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl StatementRenderer for TypstStatementRenderer {
    fn render(&self, request: &StatementRequest) -> Result<DocumentArtifact, PayrollError> {
        let workdir = tempdir().map_err(RenderError::TempDir)?;
        let logo = self.stage_logo(request.logo.as_deref(), workdir.path());

        let source = build_statement_source(
            request,
            logo.as_deref(),
            self.locale,
            &self.currency,
            self.fonts.families(),
        );
        fs::write(workdir.path().join(SOURCE_FILE), source).map_err(RenderError::WriteSource)?;

        let artifact =
            DocumentArtifact::create(ArtifactState::Rendered).map_err(RenderError::OutputFile)?;
        self.compile(workdir.path(), artifact.path())?;
        debug!("Rendered statement to {}", artifact.path().display());
        Ok(artifact)
    }
}

/// Escape special characters for Typst strings.
pub fn escape_typst_string(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', r#"\""#)
        .replace('\n', r"\n")
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", escape_typst_string(value))
}

fn component_label(field: Field, locale: Locale) -> &'static str {
    let [zh, en] = field.headers();
    match locale {
        Locale::Zh => zh,
        Locale::En => en,
    }
}

/// Build the Typst markup for one statement.
///
/// Layout, top to bottom: logo, title, date, salutation, note, component
/// table with a highlighted total row, confidentiality footer.
pub fn build_statement_source(
    request: &StatementRequest,
    logo: Option<&str>,
    locale: Locale,
    currency: &str,
    families: &[String],
) -> String {
    let labels: &Labels = locale.labels();
    let font_list = families
        .iter()
        .map(|f| quoted(f))
        .collect::<Vec<_>>()
        .join(", ");

    let mut src = String::new();
    let _ = writeln!(src, "#set page(paper: \"a4\", margin: (x: 2cm, y: 2.2cm))");
    let _ = writeln!(
        src,
        "#set text(font: ({font_list},), size: 11pt, lang: \"{}\")",
        locale.lang_tag()
    );
    let _ = writeln!(src, "#set par(justify: false)");

    if let Some(logo) = logo {
        let _ = writeln!(src, "#align(center, image({}, width: 30%))", quoted(logo));
    }
    let _ = writeln!(
        src,
        "#align(center, text(size: 18pt, weight: \"bold\", {}))",
        quoted(labels.title)
    );
    let _ = writeln!(
        src,
        "#align(right, text(size: 10pt, {}))",
        quoted(&format!(
            "{}: {}",
            labels.date_caption,
            locale.format_date(request.issued_on)
        ))
    );
    let _ = writeln!(src, "#v(0.8em)");

    if let Some(recipient) = request.recipient.as_deref().filter(|r| !r.trim().is_empty()) {
        let _ = writeln!(src, "#text({})", quoted(&labels.salutation_for(recipient)));
        let _ = writeln!(src, "#v(0.4em)");
    }
    let _ = writeln!(src, "#text(fill: luma(90), {})", quoted(labels.note));
    let _ = writeln!(src, "#v(0.8em)");

    let _ = writeln!(src, "#table(");
    let _ = writeln!(src, "  columns: (1fr, auto),");
    let _ = writeln!(src, "  align: (left, right),");
    let _ = writeln!(src, "  stroke: 0.5pt + luma(180),");
    let _ = writeln!(src, "  inset: 8pt,");
    let _ = writeln!(
        src,
        "  fill: (_, y) => if y == 0 {{ rgb(\"#2f5597\") }},"
    );
    let _ = writeln!(
        src,
        "  table.header(text(fill: white, weight: \"bold\", {}), text(fill: white, weight: \"bold\", {})),",
        quoted(labels.item_header),
        quoted(labels.amount_header)
    );

    for field in Field::MONETARY {
        let Some(amount) = request.row.amounts.get(field) else {
            continue;
        };
        let label = quoted(component_label(field, locale));
        let value = quoted(&format_currency(amount, currency));
        if field == Field::Total {
            let _ = writeln!(
                src,
                "  table.cell(fill: rgb(\"#dce6f4\"), strong({label})), table.cell(fill: rgb(\"#dce6f4\"), strong({value})),"
            );
        } else {
            let _ = writeln!(src, "  {label}, {value},");
        }
    }
    let _ = writeln!(src, ")");

    let _ = writeln!(src, "#v(1fr)");
    let _ = writeln!(
        src,
        "#align(center, text(size: 8pt, fill: luma(120), {}))",
        quoted(labels.footer)
    );
    src
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn request(recipient: Option<&str>) -> StatementRequest {
        let mut row = CompensationRow::default();
        row.name = Some("Alice".to_string());
        row.email = Some("alice@co.com".to_string());
        row.amounts.base = Decimal::from_str("12000").unwrap();
        row.amounts.deduction = Decimal::from_str("350.5").unwrap();
        row.amounts.total = Decimal::from_str("11649.5").unwrap();
        StatementRequest {
            row,
            recipient: recipient.map(str::to_string),
            logo: None,
            issued_on: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }
    }

    fn families() -> Vec<String> {
        vec!["Noto Sans CJK SC".to_string(), "Noto Sans SC".to_string()]
    }

    #[test]
    fn test_escape_typst_string() {
        assert_eq!(escape_typst_string(r#"a "b" \c"#), r#"a \"b\" \\c"#);
        assert_eq!(escape_typst_string("line\nbreak"), r"line\nbreak");
    }

    #[test]
    fn test_source_lists_components_in_order() {
        let src = build_statement_source(&request(None), None, Locale::Zh, "¥", &families());
        let base = src.find("\"基本工资\"").unwrap();
        let bonus = src.find("\"奖金\"").unwrap();
        let total = src.find("\"实发工资\"").unwrap();
        assert!(base < bonus && bonus < total);
        assert!(src.contains("\"¥12,000.00\""));
        assert!(src.contains("strong(\"¥11,649.50\")"));
        assert!(src.contains("font: (\"Noto Sans CJK SC\", \"Noto Sans SC\",)"));
    }

    #[test]
    fn test_salutation_is_optional() {
        let without = build_statement_source(&request(None), None, Locale::En, "$", &families());
        assert!(!without.contains("Dear"));

        let with = build_statement_source(&request(Some("Alice")), None, Locale::En, "$", &families());
        assert!(with.contains("\"Dear Alice,\""));
        assert!(with.contains("\"Date: 19 October 2026\""));
    }

    #[test]
    fn test_logo_is_placed_before_title() {
        let src = build_statement_source(&request(None), Some("logo.png"), Locale::En, "$", &families());
        let logo = src.find("image(\"logo.png\"").unwrap();
        let title = src.find("\"Salary Statement\"").unwrap();
        assert!(logo < title);
    }

    #[test]
    fn test_recipient_name_is_escaped() {
        let src = build_statement_source(
            &request(Some("O\"Brien")),
            None,
            Locale::En,
            "$",
            &families(),
        );
        assert!(src.contains(r#""Dear O\"Brien,""#));
    }

    #[test]
    fn test_missing_typst_binary_is_render_error() {
        let renderer = TypstStatementRenderer::new(
            "/nonexistent/typst",
            Arc::new(FontRegistry::default()),
            Locale::Zh,
            "¥",
        );
        let err = renderer.render(&request(None)).unwrap_err();
        assert!(matches!(err, PayrollError::Render(RenderError::TypstIo(_))));
    }

    #[test]
    fn test_renders_pdf_when_typst_installed() {
        if Command::new("typst").arg("--version").output().is_err() {
            return;
        }
        let renderer =
            TypstStatementRenderer::new("typst", Arc::new(FontRegistry::default()), Locale::En, "$");
        let artifact = renderer.render(&request(Some("Alice"))).unwrap();
        let bytes = artifact.read_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(artifact.state(), ArtifactState::Rendered);
    }
}
