//! Notification composition: template merge plus the protected attachment.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::Path;

use super::loader::CompensationRow;
use super::locale::Locale;
use super::PayrollError;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// The shared HTML template. Never modified; each row works on a copy.
#[derive(Debug, Clone)]
pub struct EmailTemplate {
    source: String,
}

impl EmailTemplate {
    pub async fn load(path: &Path) -> Result<Self, PayrollError> {
        tokio::fs::read_to_string(path)
            .await
            .map(Self::from_string)
            .map_err(|source| PayrollError::Template {
                path: path.display().to_string(),
                source,
            })
    }

    pub fn from_string(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A complete message for one recipient.
#[derive(Debug, Clone)]
pub struct Notification {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachment: MailAttachment,
}

pub struct NotificationComposer {
    sender: String,
    locale: Locale,
    placeholder: Regex,
    body_close: Regex,
}

impl NotificationComposer {
    pub fn new(sender: impl Into<String>, locale: Locale) -> Self {
        Self {
            sender: sender.into(),
            locale,
            placeholder: Regex::new(r"\{\{([^{}]+)\}\}").expect("static regex"),
            body_close: Regex::new(r"(?i)</body\s*>").expect("static regex"),
        }
    }

    /// Merge row values into a fresh copy of the template and add the password notice.
    pub fn personalize(
        &self,
        template: &EmailTemplate,
        row: &CompensationRow,
        password: &str,
    ) -> String {
        let merged = self.substitute(template.source(), &row.placeholders());
        let notice = format!(
            "<p>{}<b>{}</b></p>",
            self.locale.labels().password_notice,
            html_escape(password)
        );
        self.inject_before_body_close(&merged, &notice)
    }

    /// Insert `notice` before the last closing body tag, or append it.
    pub fn inject_before_body_close(&self, html: &str, notice: &str) -> String {
        match self.body_close.find_iter(html).last() {
            Some(tag) => {
                let mut out = String::with_capacity(html.len() + notice.len());
                out.push_str(&html[..tag.start()]);
                out.push_str(notice);
                out.push_str(&html[tag.start()..]);
                out
            }
            None => format!("{html}{notice}"),
        }
    }

    /// Replace every `{{key}}` with its HTML-escaped value in a single pass.
    /// Values are never rescanned; unknown placeholders are left as is.
    pub fn substitute(&self, template: &str, values: &[(String, String)]) -> String {
        let lookup: HashMap<&str, &str> = values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        self.placeholder
            .replace_all(template, |caps: &Captures| match lookup.get(&caps[1]) {
                Some(value) => html_escape(value),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn compose(
        &self,
        template: &EmailTemplate,
        row: &CompensationRow,
        recipient_email: &str,
        subject: &str,
        attachment_name: &str,
        attachment: Vec<u8>,
        password: &str,
    ) -> Notification {
        Notification {
            from: self.sender.clone(),
            to: recipient_email.to_string(),
            subject: subject.to_string(),
            html: self.personalize(template, row, password),
            attachment: MailAttachment {
                filename: attachment_name.to_string(),
                content_type: PDF_CONTENT_TYPE.to_string(),
                bytes: attachment,
            },
        }
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn row() -> CompensationRow {
        let mut row = CompensationRow::default();
        row.name = Some("Alice".to_string());
        row.email = Some("alice@co.com".to_string());
        row.amounts.total = Decimal::from_str("8400.5").unwrap();
        row.columns = vec![("姓名".to_string(), "Alice".to_string())];
        row
    }

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitutes_every_occurrence() {
        let composer = NotificationComposer::new("hr@co.com", Locale::Zh);
        assert_eq!(
            composer.substitute(
                "{{name}}, hi {{name}} {{unknown}}",
                &pairs(&[("name", "Alice")])
            ),
            "Alice, hi Alice {{unknown}}"
        );
    }

    #[test]
    fn test_substituted_values_are_not_expanded_again() {
        let composer = NotificationComposer::new("hr@co.com", Locale::Zh);
        let values = pairs(&[("name", "{{email}}"), ("email", "x@y.com")]);
        assert_eq!(composer.substitute("Hi {{name}}", &values), "Hi {{email}}");

        let reversed = pairs(&[("email", "x@y.com"), ("name", "{{email}}")]);
        assert_eq!(
            composer.substitute("Hi {{name}} <{{email}}>", &reversed),
            "Hi {{email}} <x@y.com>"
        );
    }

    #[test]
    fn test_values_are_html_escaped() {
        let composer = NotificationComposer::new("hr@co.com", Locale::En);
        let values = pairs(&[("name", "<script>alert(\"x\")</script> & Co")]);
        assert_eq!(
            composer.substitute("<p>{{name}}</p>", &values),
            "<p>&lt;script&gt;alert(&quot;x&quot;)&lt;/script&gt; &amp; Co</p>"
        );
    }

    #[test]
    fn test_personalize_uses_identifiers_and_headers() {
        let composer = NotificationComposer::new("hr@co.com", Locale::En);
        let template =
            EmailTemplate::from_string("<html><body>{{姓名}} / {{name}}: {{total}}</body></html>");
        let html = composer.personalize(&template, &row(), "aB3d5f7hij");
        assert!(html.starts_with("<html><body>Alice / Alice: 8400.50"));
        assert!(html.ends_with("<b>aB3d5f7hij</b></p></body></html>"));
    }

    #[test]
    fn test_notice_goes_before_last_body_close() {
        let composer = NotificationComposer::new("hr@co.com", Locale::Zh);
        let html = composer.inject_before_body_close("<BODY>a</BODY >x</body>", "N");
        assert_eq!(html, "<BODY>a</BODY >xN</body>");
    }

    #[test]
    fn test_notice_appended_without_body_tag() {
        let composer = NotificationComposer::new("hr@co.com", Locale::Zh);
        assert_eq!(composer.inject_before_body_close("<p>x</p>", "N"), "<p>x</p>N");
    }

    #[test]
    fn test_template_is_not_mutated_across_rows() {
        let composer = NotificationComposer::new("hr@co.com", Locale::En);
        let template = EmailTemplate::from_string("<body>{{name}}</body>");
        let first = composer.personalize(&template, &row(), "Pass111aaA");
        let second = composer.personalize(&template, &row(), "Pass222bbB");
        assert_eq!(template.source(), "<body>{{name}}</body>");
        assert!(first.contains("Pass111aaA"));
        assert!(!second.contains("Pass111aaA"));
        assert_eq!(second.matches("<p>").count(), 1);
    }

    #[test]
    fn test_compose_attaches_document() {
        let composer = NotificationComposer::new("hr@co.com", Locale::En);
        let template = EmailTemplate::from_string("<body>Hi {{name}}</body>");

        let message = composer.compose(
            &template,
            &row(),
            "alice@co.com",
            "Salary statement 19/10/2026",
            "payslip-2026-10.pdf",
            b"%PDF-encrypted".to_vec(),
            "aB3d5f7hij",
        );

        assert_eq!(message.from, "hr@co.com");
        assert_eq!(message.to, "alice@co.com");
        assert_eq!(message.attachment.filename, "payslip-2026-10.pdf");
        assert_eq!(message.attachment.content_type, PDF_CONTENT_TYPE);
        assert_eq!(message.attachment.bytes, b"%PDF-encrypted");
    }

    #[tokio::test]
    async fn test_missing_template_is_template_error() {
        let err = EmailTemplate::load(Path::new("/nonexistent/salary_email.html"))
            .await
            .unwrap_err();
        assert!(matches!(err, PayrollError::Template { .. }));
        assert!(err.is_batch_fatal());
    }
}
