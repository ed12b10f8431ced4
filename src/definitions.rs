// src/definitions.rs
//! PUMS data dictionary: download, parse and turn into categorical encodings.

use anyhow::{bail, Context, Result};
use csv::{ByteRecord, ReaderBuilder};
use reqwest::Client;
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info, instrument};
use url::Url;

use crate::fetch::{urls, zips::download_to};
use crate::survey::{self, Horizon, FIPS_NAMING_YEAR};

pub const DEFINITIONS_FILE: &str = "definition.csv";
const FIELDS: usize = 7;

/// Rows of the dictionary, each padded or cut to seven text fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    rows: Vec<[String; FIELDS]>,
}

impl Definitions {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes);
        let mut rows = Vec::new();
        let mut record = ByteRecord::new();
        while rdr
            .read_byte_record(&mut record)
            .with_context(|| format!("parsing dictionary row {}", rows.len() + 1))?
        {
            let row: [String; FIELDS] = std::array::from_fn(|i| {
                record
                    .get(i)
                    .map(|f| String::from_utf8_lossy(f).trim().to_string())
                    .unwrap_or_default()
            });
            rows.push(row);
        }
        Ok(Definitions { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `VAL` rows describing `feature`.
    fn values<'a>(&'a self, feature: &'a str) -> impl Iterator<Item = &'a [String; FIELDS]> + 'a {
        self.rows
            .iter()
            .filter(move |r| r[0] == "VAL" && r[1] == feature)
    }
}

/// Code to label mapping for one categorical feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMap {
    /// Keyed by the code as written in the dictionary after numeric normalisation.
    pub codes: BTreeMap<String, String>,
    /// Label for missing values (blank cells and non-numeric codes).
    pub missing: String,
}

impl CategoryMap {
    pub fn label(&self, code: f64) -> &str {
        if code.is_nan() {
            return &self.missing;
        }
        self.codes
            .get(&code_key(code))
            .map(String::as_str)
            .unwrap_or(&self.missing)
    }
}

fn code_key(code: f64) -> String {
    if code.fract() == 0.0 && code.abs() < 1e15 {
        format!("{}", code as i64)
    } else {
        code.to_string()
    }
}

/// Category maps for the categorical features in `features`. PUMA-based features are
/// skipped since their codes are only unique together with the state; numeric
/// features (type `N`) are skipped too.
pub fn generate_categories<S: AsRef<str>>(
    features: &[S],
    definitions: &Definitions,
) -> Result<BTreeMap<String, CategoryMap>> {
    let mut categories = BTreeMap::new();
    for feature in features.iter().map(|f| f.as_ref()) {
        if feature.contains("PUMA") {
            continue;
        }
        let mut rows = definitions.values(feature).peekable();
        let first = match rows.peek() {
            Some(r) => r,
            None => bail!("no VAL rows for {} in the data dictionary", feature),
        };
        if first[2] == "N" {
            debug!(feature, "numeric, skipped");
            continue;
        }

        let mut codes = BTreeMap::new();
        let mut missing = None;
        for row in rows {
            match row[4].parse::<f64>() {
                Ok(code) if !code.is_nan() => {
                    codes.insert(code_key(code), row[6].clone());
                }
                _ => missing = Some(row[6].clone()),
            }
        }
        categories.insert(
            feature.to_string(),
            CategoryMap {
                codes,
                missing: missing.unwrap_or_else(|| "N/A".to_string()),
            },
        );
    }
    Ok(categories)
}

/// Read `{data_dir}/definition.csv`, downloading it from `base` first when it is
/// absent and `download` is set. Dictionaries exist from 2017 on.
#[instrument(level = "info", skip(client, base, data_dir), fields(dir = %data_dir.display()))]
pub async fn load_definitions(
    client: &Client,
    base: &Url,
    data_dir: &Path,
    year: u16,
    horizon: Horizon,
    download: bool,
) -> Result<Definitions> {
    survey::check_year(year)?;
    if year < FIPS_NAMING_YEAR {
        bail!(
            "the data dictionary is only available from {} (got {})",
            FIPS_NAMING_YEAR,
            year
        );
    }
    let path = data_dir.join(DEFINITIONS_FILE);
    if !path.is_file() {
        if !download {
            bail!(
                "Could not find {} {} attribute definition. Call get_definitions with download enabled to download the definitions.",
                year,
                horizon
            );
        }
        let url = urls::definitions_url(base, year, horizon)?;
        info!(%url, "Downloading the attribute definition file");
        download_to(client, &url, &path).await?;
    }
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let defs = Definitions::parse(&bytes)?;
    debug!(rows = defs.len(), "dictionary loaded");
    Ok(defs)
}
