// src/retrieve/mod.rs
//! Bulk retrieval of every per-state archive of one PUMS release.
//!
//! For each state (in table order) the household archive is fetched and extracted,
//! then the person archive. Once every state is done the two nationwide archives are
//! fetched and left compressed. Failures are logged and recorded, never fatal.

pub mod backend;
pub mod report;

pub use backend::{Backend, HttpBackend};
pub use report::{RetrievalReport, StepKind, StepOutcome, StepRecord};

use anyhow::{Context, Result};
use chrono::Utc;
use futures::{stream, StreamExt};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};
use url::Url;

use crate::fetch::urls;
use crate::states::State;
use crate::survey::{self, Horizon, Survey};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub root_dir: PathBuf,
    pub year: u16,
    pub horizon: Horizon,
    pub states: Vec<&'static State>,
    pub base_url: Url,
    /// Number of states processed at once. 1 reproduces the strictly sequential order.
    pub jobs: usize,
}

pub struct BulkRetriever {
    config: RetrieverConfig,
}

impl BulkRetriever {
    pub fn new(config: RetrieverConfig) -> Self {
        BulkRetriever { config }
    }

    /// `{root}/{year}/{horizon}-Year`
    pub fn target_dir(&self) -> PathBuf {
        survey::data_dir(&self.config.root_dir, self.config.year, self.config.horizon)
    }

    /// Run both phases. Only failing to create the target directory is an error;
    /// everything else ends up in the report.
    #[instrument(level = "info", skip(self, backend), fields(year = self.config.year, horizon = %self.config.horizon))]
    pub async fn run<B: Backend>(&self, backend: &B) -> Result<RetrievalReport> {
        let started_at = Utc::now();
        let dir = self.target_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating download directory {}", dir.display()))?;

        let release = urls::release_url(&self.config.base_url, self.config.year, self.config.horizon)?;
        info!(release = %release, dir = %dir.display(), states = self.config.states.len(), "starting retrieval");

        // ─── 1) per-state archives ──────────────────────────────────────
        let per_state: Vec<Vec<StepRecord>> = stream::iter(self.config.states.iter().copied())
            .map(|state| self.retrieve_state(backend, &release, &dir, state))
            .buffered(self.config.jobs.max(1))
            .collect()
            .await;
        let mut steps: Vec<StepRecord> = per_state.into_iter().flatten().collect();

        // ─── 2) nationwide archives, kept compressed ─────────────────────
        for survey in [Survey::Person, Survey::Household] {
            let name = urls::nationwide_archive_name(survey);
            let (record, _) = self.fetch_step(backend, &release, &dir, None, &name).await;
            steps.push(record);
        }

        Ok(RetrievalReport {
            year: self.config.year,
            horizon: self.config.horizon,
            target_dir: dir,
            started_at,
            finished_at: Utc::now(),
            steps,
        })
    }

    async fn retrieve_state<B: Backend>(
        &self,
        backend: &B,
        release: &Url,
        dir: &Path,
        state: &'static State,
    ) -> Vec<StepRecord> {
        info!(state = state.code, "retrieving state");
        let mut steps = Vec::with_capacity(4);
        for survey in [Survey::Household, Survey::Person] {
            let name = urls::state_archive_name(survey, state);
            let (record, archive) = self
                .fetch_step(backend, release, dir, Some(state), &name)
                .await;
            steps.push(record);

            let outcome = match archive {
                Some(path) => match backend.extract(&path, dir).await {
                    Ok(files) => StepOutcome::Ok { files: files.len() },
                    Err(e) => {
                        let msg = format!("{:#}", e);
                        error!(archive = %name, error = %msg, "extract failed");
                        StepOutcome::Failed { error: msg }
                    }
                },
                None => StepOutcome::Skipped {
                    reason: "fetch failed".into(),
                },
            };
            steps.push(StepRecord {
                kind: StepKind::Extract,
                archive: name,
                state: Some(state.code.to_string()),
                outcome,
            });
        }
        steps
    }

    async fn fetch_step<B: Backend>(
        &self,
        backend: &B,
        release: &Url,
        dir: &Path,
        state: Option<&State>,
        name: &str,
    ) -> (StepRecord, Option<PathBuf>) {
        let fetched = match urls::archive_url(release, name) {
            Ok(url) => backend.fetch(&url, dir).await,
            Err(e) => Err(e),
        };
        let (outcome, path) = match fetched {
            Ok(path) => (StepOutcome::Ok { files: 1 }, Some(path)),
            Err(e) => {
                let msg = format!("{:#}", e);
                error!(archive = %name, error = %msg, "fetch failed");
                (StepOutcome::Failed { error: msg }, None)
            }
        };
        let record = StepRecord {
            kind: StepKind::Fetch,
            archive: name.to_string(),
            state: state.map(|s| s.code.to_string()),
            outcome,
        };
        (record, path)
    }
}
