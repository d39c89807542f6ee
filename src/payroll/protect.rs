//! Password protection of rendered statements via qpdf.

use log::debug;
use std::path::Path;
use std::process::Command;

use super::artifact::{ArtifactState, DocumentArtifact};
use super::{PayrollError, ProtectError};

/// qpdf exit code meaning "succeeded with warnings".
const QPDF_WARNINGS: i32 = 3;

/// Produces an encrypted copy of a rendered document.
///
/// The input is left untouched; the caller still owns it.
pub trait DocumentProtector: Send + Sync {
    fn protect(
        &self,
        document: &DocumentArtifact,
        password: &str,
    ) -> Result<DocumentArtifact, PayrollError>;
}

pub struct QpdfProtector {
    qpdf_bin: String,
}

impl QpdfProtector {
    pub fn new(qpdf_bin: impl Into<String>) -> Self {
        Self {
            qpdf_bin: qpdf_bin.into(),
        }
    }

    /// Whether `password` opens the PDF at `path`.
    pub fn can_open(&self, path: &Path, password: &str) -> Result<bool, ProtectError> {
        let output = Command::new(&self.qpdf_bin)
            .arg("--check")
            .arg(format!("--password={password}"))
            .arg(path)
            .output()
            .map_err(ProtectError::QpdfIo)?;
        Ok(matches!(output.status.code(), Some(0) | Some(QPDF_WARNINGS)))
    }
}

impl DocumentProtector for QpdfProtector {
    fn protect(
        &self,
        document: &DocumentArtifact,
        password: &str,
    ) -> Result<DocumentArtifact, PayrollError> {
        let protected =
            DocumentArtifact::create(ArtifactState::Protected).map_err(ProtectError::OutputFile)?;

        let output = Command::new(&self.qpdf_bin)
            .arg("--encrypt")
            .arg(password)
            .arg(password)
            .arg("256")
            .arg("--")
            .arg(document.path())
            .arg(protected.path())
            .output()
            .map_err(ProtectError::QpdfIo)?;

        match output.status.code() {
            Some(0) | Some(QPDF_WARNINGS) => {
                debug!("Protected statement written to {}", protected.path().display());
                Ok(protected)
            }
            code => Err(ProtectError::QpdfExit {
                code: code.unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into()),
        }
    }
}
