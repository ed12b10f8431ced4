// src/config.rs
//! Command line and environment configuration.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

use crate::fetch::urls;
use crate::load::LoadOptions;
use crate::retrieve::RetrieverConfig;
use crate::states;
use crate::survey::{self, Horizon, Survey};

#[derive(Parser, Debug)]
#[command(
    name = "pumscraper",
    about = "Download and prepare ACS PUMS microdata from the Census Bureau",
    version
)]
pub struct Cli {
    /// Release year.
    #[arg(long, env = "PUMS_YEAR", default_value_t = 2018, global = true)]
    pub year: u16,

    /// Survey horizon: 1 or 5 (also accepts 1-Year / 5-Year).
    #[arg(long, env = "PUMS_HORIZON", default_value = "1", global = true)]
    pub horizon: Horizon,

    /// Root directory; data lands in {root}/{year}/{horizon}-Year.
    #[arg(long, env = "PUMS_ROOT", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Comma separated postal codes. Defaults to every state, DC and PR.
    #[arg(long, value_delimiter = ',', global = true)]
    pub states: Vec<String>,

    /// Base URL of the PUMS data tree.
    #[arg(long, env = "PUMS_BASE_URL", default_value = urls::ACS_BASE_URL, global = true)]
    pub base_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch and extract every per-state archive, then the nationwide archives.
    Retrieve(RetrieveArgs),
    /// Load a sample into a table and write it as parquet.
    Load(LoadArgs),
    /// Turn a sample into features, labels and groups for a predefined task.
    Export {
        /// Task name, e.g. ACSIncome.
        #[arg(long)]
        task: String,

        #[command(flatten)]
        load: LoadArgs,
    },
    /// List the predefined tasks.
    Tasks,
    /// Print category labels for features from the data dictionary, as JSON.
    Categories {
        /// Comma separated feature names; defaults to every feature of `--task`.
        #[arg(long, value_delimiter = ',')]
        features: Vec<String>,

        #[arg(long)]
        task: Option<String>,

        /// Use the labels bundled with `--task` instead of the data dictionary.
        #[arg(long, requires = "task")]
        builtin: bool,

        #[arg(long)]
        download: bool,

        /// Write the JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RetrieveArgs {
    /// States processed concurrently.
    #[arg(long, env = "PUMS_JOBS", default_value_t = 1)]
    pub jobs: usize,

    /// Extra attempts per download, with exponential backoff.
    #[arg(long, env = "PUMS_RETRIES", default_value_t = 0)]
    pub retries: u32,

    /// Write the retrieval report as JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Exit non-zero when any step failed.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LoadArgs {
    /// person or household.
    #[arg(long, default_value = "person")]
    pub survey: Survey,

    /// Probability of keeping each record.
    #[arg(long, default_value_t = 1.0)]
    pub density: f64,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Add household columns to person records.
    #[arg(long)]
    pub join_household: bool,

    /// Download missing state files.
    #[arg(long)]
    pub download: bool,

    /// Parquet output path.
    #[arg(long)]
    pub output: PathBuf,
}

impl Cli {
    pub fn base_url(&self) -> Result<Url> {
        urls::parse_base(&self.base_url)
    }

    pub fn data_dir(&self) -> PathBuf {
        survey::data_dir(&self.root, self.year, self.horizon)
    }

    /// Any release year is accepted here; the loader enforces its own floor.
    pub fn retriever_config(&self, args: &RetrieveArgs) -> Result<RetrieverConfig> {
        Ok(RetrieverConfig {
            root_dir: self.root.clone(),
            year: self.year,
            horizon: self.horizon,
            states: states::resolve(&self.states)?,
            base_url: self.base_url()?,
            jobs: args.jobs.max(1),
        })
    }

    pub fn load_options(&self, args: &LoadArgs) -> LoadOptions {
        LoadOptions {
            states: self.states.clone(),
            density: args.density,
            random_seed: args.seed,
            join_household: args.join_household,
            download: args.download,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::BulkRetriever;

    #[test]
    fn test_defaults() -> Result<()> {
        let cli = Cli::try_parse_from(["pumscraper", "retrieve"])?;
        assert_eq!(cli.year, 2018);
        assert_eq!(cli.horizon, Horizon::OneYear);
        assert_eq!(cli.data_dir(), PathBuf::from("./2018/1-Year"));
        let Command::Retrieve(args) = &cli.command else {
            panic!("expected retrieve");
        };
        let cfg = cli.retriever_config(args)?;
        assert_eq!(cfg.states.len(), 52);
        assert_eq!(cfg.jobs, 1);
        assert!(!args.strict);
        Ok(())
    }

    #[test]
    fn test_retrieve_flags() -> Result<()> {
        let cli = Cli::try_parse_from([
            "pumscraper",
            "retrieve",
            "--year",
            "2021",
            "--horizon",
            "5-Year",
            "--states",
            "ca,ny",
            "--jobs",
            "4",
            "--retries",
            "2",
            "--base-url",
            "http://127.0.0.1:9000/pums",
            "--strict",
        ])?;
        let Command::Retrieve(args) = &cli.command else {
            panic!("expected retrieve");
        };
        let cfg = cli.retriever_config(args)?;
        assert_eq!(cfg.horizon, Horizon::FiveYear);
        assert_eq!(
            cfg.states.iter().map(|s| s.code).collect::<Vec<_>>(),
            vec!["CA", "NY"]
        );
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:9000/pums/");
        assert_eq!(args.retries, 2);
        assert!(args.strict);
        Ok(())
    }

    #[test]
    fn test_bad_values_rejected() -> Result<()> {
        assert!(Cli::try_parse_from(["pumscraper", "--horizon", "3", "tasks"]).is_err());
        let cli = Cli::try_parse_from(["pumscraper", "retrieve", "--states", "XX"])?;
        let Command::Retrieve(args) = &cli.command else {
            panic!("expected retrieve");
        };
        assert!(cli.retriever_config(args).is_err());
        Ok(())
    }

    #[test]
    fn test_retrieve_accepts_early_years() -> Result<()> {
        let cli = Cli::try_parse_from(["pumscraper", "retrieve", "--year", "2010", "--states", "ak"])?;
        let Command::Retrieve(args) = &cli.command else {
            panic!("expected retrieve");
        };
        let cfg = cli.retriever_config(args)?;
        assert_eq!(cfg.year, 2010);
        assert_eq!(cfg.states.len(), 1);
        assert_eq!(
            BulkRetriever::new(cfg).target_dir(),
            PathBuf::from("./2010/1-Year")
        );
        Ok(())
    }

    #[test]
    fn test_builtin_categories_need_task() -> Result<()> {
        assert!(Cli::try_parse_from(["pumscraper", "categories", "--builtin"]).is_err());
        let cli = Cli::try_parse_from(["pumscraper", "categories", "--builtin", "--task", "income"])?;
        let Command::Categories { builtin, task, .. } = &cli.command else {
            panic!("expected categories");
        };
        assert!(*builtin);
        assert_eq!(task.as_deref(), Some("income"));
        Ok(())
    }

    #[test]
    fn test_export_flags() -> Result<()> {
        let cli = Cli::try_parse_from([
            "pumscraper",
            "export",
            "--task",
            "ACSIncome",
            "--density",
            "0.5",
            "--seed",
            "7",
            "--output",
            "out.parquet",
            "--states",
            "AL",
        ])?;
        let Command::Export { task, load } = &cli.command else {
            panic!("expected export");
        };
        assert_eq!(task, "ACSIncome");
        assert_eq!(load.survey, Survey::Person);
        let opts = cli.load_options(load);
        assert_eq!(opts.density, 0.5);
        assert_eq!(opts.random_seed, 7);
        assert_eq!(opts.states, vec!["AL"]);
        Ok(())
    }
}
