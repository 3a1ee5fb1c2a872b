//! Per-agent JSON checkpoints written during a run

use crate::model::{Divergence, PageRecord, ProgramRecord};
use crate::output::OutputResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const PAGES_FILE: &str = "pages.json";
pub const PROGRAMS_FILE: &str = "programs.json";
pub const DIVERGENCES_FILE: &str = "divergences.json";

/// Artifact directory of one agent: `<artifacts_dir>/<agent>/`
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    dir: PathBuf,
}

impl RunArtifacts {
    /// Creates the agent's artifact directory if needed
    ///
    /// # Arguments
    ///
    /// * `artifacts_dir` - Root directory from `[output]`
    /// * `agent` - The agent's directory name
    pub fn create(artifacts_dir: &Path, agent: &str) -> OutputResult<Self> {
        let dir = artifacts_dir.join(agent);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes every page fetched this run
    pub fn write_pages(&self, pages: &[PageRecord]) -> OutputResult<PathBuf> {
        self.write_json(PAGES_FILE, pages)
    }

    /// Writes the final reconciled program list
    pub fn write_programs(&self, programs: &[ProgramRecord]) -> OutputResult<PathBuf> {
        self.write_json(PROGRAMS_FILE, programs)
    }

    pub fn write_divergences(&self, divergences: &[Divergence]) -> OutputResult<PathBuf> {
        self.write_json(DIVERGENCES_FILE, divergences)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> OutputResult<PathBuf> {
        let path = self.dir.join(file_name);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json)?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}
