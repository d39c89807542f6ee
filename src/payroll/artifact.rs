//! Temporary PDF files owned by one row's pipeline.
//!
//! The backing file is removed when the artifact is dropped, so every exit
//! path of a row (success, early return, `?`) releases what it created.

use std::fs;
use std::io;
use std::path::Path;
use tempfile::{Builder, TempPath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    Rendered,
    Protected,
}

impl ArtifactState {
    fn prefix(self) -> &'static str {
        match self {
            Self::Rendered => "statement-",
            Self::Protected => "statement-protected-",
        }
    }
}

/// A PDF on disk, deleted on drop.
#[derive(Debug)]
pub struct DocumentArtifact {
    path: TempPath,
    state: ArtifactState,
}

impl DocumentArtifact {
    /// Reserve a uniquely named, empty PDF in the system temp directory.
    pub fn create(state: ArtifactState) -> io::Result<Self> {
        let file = Builder::new()
            .prefix(state.prefix())
            .suffix(".pdf")
            .tempfile()?;
        Ok(Self {
            path: file.into_temp_path(),
            state,
        })
    }

    /// Reserve a uniquely named, empty PDF inside `dir`.
    pub fn create_in(dir: &Path, state: ArtifactState) -> io::Result<Self> {
        let file = Builder::new()
            .prefix(state.prefix())
            .suffix(".pdf")
            .tempfile_in(dir)?;
        Ok(Self {
            path: file.into_temp_path(),
            state,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> ArtifactState {
        self.state
    }

    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Delete now and surface the error instead of ignoring it on drop.
    pub fn delete(self) -> io::Result<()> {
        self.path.close()
    }
}
