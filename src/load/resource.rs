// src/load/resource.rs
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use url::Url;

use crate::fetch::urls;
use crate::states::State;
use crate::survey::{Survey, FIPS_NAMING_YEAR};

/// Where one state's CSV comes from and where it lives locally.
#[derive(Debug, Clone, PartialEq)]
pub struct AcsResource {
    pub state: &'static State,
    /// Remote archive, e.g. `.../2018/1-Year/csv_pca.zip`.
    pub url: Url,
    /// Where the archive is saved before extraction.
    pub download_path: PathBuf,
    /// CSV member inside the archive, e.g. `psam_p06.csv`.
    pub file_name: String,
    /// Extracted CSV location.
    pub file_path: PathBuf,
}

/// `psam_{p|h}{fips}.csv` from 2017, `ss{yy}{p|h}{state}.csv` before.
pub fn csv_file_name(year: u16, survey: Survey, state: &State) -> String {
    if year >= FIPS_NAMING_YEAR {
        format!("psam_{}{}.csv", survey.code(), state.fips)
    } else {
        format!("ss{:02}{}{}.csv", year % 100, survey.code(), state.lower())
    }
}

pub fn build(
    release: &Url,
    data_dir: &Path,
    year: u16,
    survey: Survey,
    state: &'static State,
) -> Result<AcsResource> {
    let zip_name = urls::state_archive_name(survey, state);
    let file_name = csv_file_name(year, survey, state);
    Ok(AcsResource {
        state,
        url: urls::archive_url(release, &zip_name)?,
        download_path: data_dir.join(&zip_name),
        file_path: data_dir.join(&file_name),
        file_name,
    })
}

/// Resources whose CSV is not on disk yet. Missing files are an error unless
/// `download` is set.
pub fn files_to_download(resources: &[AcsResource], download: bool) -> Result<Vec<&AcsResource>> {
    let mut missing = Vec::new();
    for resource in resources {
        if resource.file_path.is_file() {
            continue;
        }
        if !download {
            bail!(
                "Could not find the file {} in {}. Call get_data with download enabled to download the dataset.",
                resource.file_name,
                resource
                    .file_path
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            );
        }
        missing.push(resource);
    }
    Ok(missing)
}
