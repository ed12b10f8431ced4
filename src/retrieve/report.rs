// src/retrieve/report.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fs, path::Path, path::PathBuf};
use tracing::{info, warn};

use crate::survey::Horizon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Fetch,
    Extract,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepOutcome {
    Ok { files: usize },
    Failed { error: String },
    Skipped { reason: String },
}

/// One fetch or extract of one archive.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub kind: StepKind,
    pub archive: String,
    /// `None` for the nationwide archives.
    pub state: Option<String>,
    pub outcome: StepOutcome,
}

impl StepRecord {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalReport {
    pub year: u16,
    pub horizon: Horizon,
    pub target_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<StepRecord>,
}

impl RetrievalReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// States with at least one failed or skipped step, in retrieval order.
    pub fn incomplete_states(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for step in &self.steps {
            if matches!(step.outcome, StepOutcome::Ok { .. }) {
                continue;
            }
            if let Some(state) = &step.state {
                if !out.contains(state) {
                    out.push(state.clone());
                }
            }
        }
        out
    }

    pub fn log_summary(&self) {
        let ok = self
            .steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Ok { .. }))
            .count();
        let failed = self.failures().count();
        let elapsed = self.finished_at - self.started_at;
        info!(
            dir = %self.target_dir.display(),
            steps = self.steps.len(),
            ok,
            failed,
            elapsed_s = elapsed.num_seconds(),
            "retrieval finished"
        );
        for step in self.failures() {
            if let StepOutcome::Failed { error } = &step.outcome {
                warn!(archive = %step.archive, kind = ?step.kind, %error, "step failed");
            }
        }
        let incomplete = self.incomplete_states();
        if !incomplete.is_empty() {
            warn!(states = %incomplete.join(","), "incomplete states");
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))
    }
}
