//! Analyzer that replays responses saved on disk.
//!
//! Expects one Textract-shaped JSON file per page named `page-<n>.json`
//! (1-based), matching the images written by the `split` command.

use super::{textract, AnalysisResponse, DocumentAnalyzer};
use crate::error::AnalysisError;
use crate::pages::PageImage;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RecordedAnalyzer {
    dir: PathBuf,
}

impl RecordedAnalyzer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Location of the recorded response for a 0-based page index.
    pub fn response_path(&self, page_index: usize) -> PathBuf {
        self.dir.join(format!("page-{}.json", page_index + 1))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DocumentAnalyzer for RecordedAnalyzer {
    fn analyze(&self, page: &PageImage) -> Result<AnalysisResponse, AnalysisError> {
        let path = self.response_path(page.index);
        debug!(path = %path.display(), "replaying recorded analysis");
        let body = std::fs::read(&path).map_err(|e| {
            AnalysisError::Transport(format!("cannot read '{}': {}", path.display(), e))
        })?;
        textract::parse(&body)
    }

    fn name(&self) -> &str {
        "Recorded"
    }
}
