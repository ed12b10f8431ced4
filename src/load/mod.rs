// src/load/mod.rs
//! ACS PUMS data source: resolves per-state CSVs under `{root}/{year}/{horizon}-Year`,
//! downloads the missing ones on request and loads a sample into an Arrow table.

pub mod resource;
pub mod sample;

pub use resource::AcsResource;
pub use sample::RowSelection;

use anyhow::{bail, Context, Result};
use arrow::record_batch::RecordBatch;
use futures::future::join_all;
use reqwest::Client;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tokio::fs;
use tracing::{error, info, instrument};
use url::Url;

use crate::extract::extract_file;
use crate::fetch::{urls, zips::download_to};
use crate::states::{self, State};
use crate::survey::{self, Horizon, Survey};
use crate::table;

/// Options for [`AcsDataSource::get_data`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Postal codes; empty means every region.
    pub states: Vec<String>,
    /// Probability of keeping each record.
    pub density: f64,
    pub random_seed: u64,
    /// Add household columns to person records.
    pub join_household: bool,
    /// Download missing files instead of failing.
    pub download: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            states: Vec::new(),
            density: 1.0,
            random_seed: 0,
            join_household: false,
            download: false,
        }
    }
}

pub struct AcsDataSource {
    year: u16,
    horizon: Horizon,
    survey: Survey,
    root_dir: PathBuf,
    base_url: Url,
    client: Client,
}

impl AcsDataSource {
    pub fn new(
        year: u16,
        horizon: Horizon,
        survey: Survey,
        root_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        survey::check_year(year)?;
        Ok(AcsDataSource {
            year,
            horizon,
            survey,
            root_dir: root_dir.into(),
            base_url: urls::parse_base(urls::ACS_BASE_URL)?,
            client: Client::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn data_dir(&self) -> PathBuf {
        survey::data_dir(&self.root_dir, self.year, self.horizon)
    }

    pub fn resources(&self, states: &[&'static State], survey: Survey) -> Result<Vec<AcsResource>> {
        let release = urls::release_url(&self.base_url, self.year, self.horizon)?;
        let dir = self.data_dir();
        states
            .iter()
            .map(|s| resource::build(&release, &dir, self.year, survey, *s))
            .collect()
    }

    /// Load a sample of the configured survey for the requested states.
    #[instrument(level = "info", skip(self, opts), fields(year = self.year, horizon = %self.horizon, survey = %self.survey))]
    pub async fn get_data(&self, opts: &LoadOptions) -> Result<RecordBatch> {
        if !(0.0..=1.0).contains(&opts.density) {
            bail!("density must be within [0, 1] (got {})", opts.density);
        }
        if opts.join_household && self.survey != Survey::Person {
            bail!("join_household requires the person survey");
        }
        let states = states::resolve(&opts.states)?;

        let selection = RowSelection::Density {
            density: opts.density,
            seed: opts.random_seed,
        };
        let data = self
            .load(&states, self.survey, selection, opts.download)
            .await?;
        if !opts.join_household {
            return Ok(data);
        }

        let orig_len = data.num_rows();
        let serials: HashSet<String> = table::string_column(&data, "SERIALNO")?
            .iter()
            .flatten()
            .map(str::to_string)
            .collect();
        let household = self
            .load(
                &states,
                Survey::Household,
                RowSelection::Serials(serials),
                opts.download,
            )
            .await?;

        let joined = table::join_on(&data, &household, "SERIALNO")?;
        if joined.num_rows() != orig_len {
            bail!(
                "Lengths do not match after join: {} vs {}",
                joined.num_rows(),
                orig_len
            );
        }
        Ok(joined)
    }

    async fn load(
        &self,
        states: &[&'static State],
        survey: Survey,
        selection: RowSelection,
        download: bool,
    ) -> Result<RecordBatch> {
        let dir = self.data_dir();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;

        let resources = self.resources(states, survey)?;
        let missing = resource::files_to_download(&resources, download)?;
        if !missing.is_empty() {
            self.download(&missing).await?;
        }

        let paths: Vec<PathBuf> = resources.iter().map(|r| r.file_path.clone()).collect();
        tokio::task::spawn_blocking(move || {
            let text = sample::sample_files(&paths, &selection)?;
            table::from_csv_text(&text)
        })
        .await
        .context("load task panicked")?
    }

    /// Fetch the archives concurrently, pull the one CSV out of each and drop the zip.
    async fn download(&self, missing: &[&AcsResource]) -> Result<()> {
        let names: Vec<&str> = missing.iter().map(|r| r.file_name.as_str()).collect();
        info!("Downloading {} file(s): {}", missing.len(), names.join(" "));

        // every transfer runs to completion so none is abandoned mid-write
        let results = join_all(missing.iter().map(|r| self.download_one(r))).await;
        let mut first_err = None;
        let mut failed = 0;
        for (resource, result) in missing.iter().zip(results) {
            if let Err(e) = result {
                error!(file = %resource.file_name, error = %format!("{:#}", e), "download failed");
                failed += 1;
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e.context(format!("{} of {} download(s) failed", failed, missing.len()))),
            None => Ok(()),
        }
    }

    async fn download_one(&self, resource: &AcsResource) -> Result<()> {
        download_to(&self.client, &resource.url, &resource.download_path).await?;

        let zip_path = resource.download_path.clone();
        let member = resource.file_name.clone();
        let dir = resource
            .file_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tokio::task::spawn_blocking(move || -> Result<()> {
            extract_file(&zip_path, &member, &dir).with_context(|| {
                format!(
                    "{} may be corrupted. Please try deleting it and rerunning this command.",
                    zip_path.display()
                )
            })?;
            if zip_path != dir.join(&member) {
                std::fs::remove_file(&zip_path)
                    .with_context(|| format!("removing {}", zip_path.display()))?;
            }
            Ok(())
        })
        .await
        .context("extract task panicked")?
    }
}
