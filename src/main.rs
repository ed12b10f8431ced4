use anyhow::{bail, Context, Result};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use pumscraper::{
    config::{Cli, Command, LoadArgs, RetrieveArgs},
    definitions,
    fetch::urls,
    load::AcsDataSource,
    retrieve::{BulkRetriever, HttpBackend},
    table, tasks,
};
use reqwest::Client;
use std::{fs, path::PathBuf};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    // ─── 2) parse configuration ──────────────────────────────────────
    let cli = Cli::parse();
    let client = Client::new();
    info!(year = cli.year, horizon = %cli.horizon, root = %cli.root.display(), "startup");

    // ─── 3) dispatch ─────────────────────────────────────────────────
    match &cli.command {
        Command::Retrieve(args) => retrieve(&cli, args, client).await,
        Command::Load(args) => {
            let data = load(&cli, args, client).await?;
            write(data, args.output.clone()).await
        }
        Command::Export { task, load: args } => {
            let problem = tasks::by_name(task)?;
            let data = load(&cli, args, client).await?;
            let arrays = problem.df_to_arrays(&data)?;
            let positives = arrays.labels.iter().filter(|l| **l == 1.0).count();
            info!(
                task = problem.name(),
                rows = arrays.num_rows(),
                features = arrays.num_features(),
                positives,
                "built task arrays"
            );
            write(arrays.to_record_batch()?, args.output.clone()).await
        }
        Command::Tasks => {
            for problem in tasks::all() {
                println!(
                    "{}\ttarget={}\tgroup={}\tfeatures={}",
                    problem.name(),
                    problem.target(),
                    problem.group_column().unwrap_or("-"),
                    problem.features().join(",")
                );
            }
            Ok(())
        }
        Command::Categories {
            features,
            task,
            builtin,
            download,
            output,
        } => {
            let features = match (features.is_empty(), task) {
                (false, _) => features.clone(),
                (true, Some(name)) => tasks::by_name(name)?.features().to_vec(),
                (true, None) => bail!("pass --features or --task"),
            };
            let categories = match (*builtin, task) {
                (true, Some(name)) => {
                    let Some(mut all) = tasks::builtin_categories(name)? else {
                        bail!("{} has no built-in category labels", name);
                    };
                    all.retain(|feature, _| features.contains(feature));
                    all
                }
                _ => {
                    let dict_base = urls::parse_base(urls::DATA_DICT_BASE_URL)?;
                    let defs = definitions::load_definitions(
                        &client,
                        &dict_base,
                        &cli.data_dir(),
                        cli.year,
                        cli.horizon,
                        *download,
                    )
                    .await?;
                    definitions::generate_categories(&features, &defs)?
                }
            };
            let json = serde_json::to_string_pretty(&categories)?;
            match output {
                Some(path) => fs::write(path, json)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", json),
            }
            Ok(())
        }
    }
}

async fn retrieve(cli: &Cli, args: &RetrieveArgs, client: Client) -> Result<()> {
    let config = cli.retriever_config(args)?;
    let backend = HttpBackend::new(client).with_retries(args.retries, 500);
    let retriever = BulkRetriever::new(config);

    let report = retriever.run(&backend).await?;
    report.log_summary();
    if let Some(path) = &args.report {
        report.write_json(path)?;
        info!(path = %path.display(), "wrote report");
    }
    if args.strict && report.has_failures() {
        bail!(
            "{} step(s) failed; incomplete states: {}",
            report.failures().count(),
            report.incomplete_states().join(",")
        );
    }
    Ok(())
}

async fn load(cli: &Cli, args: &LoadArgs, client: Client) -> Result<RecordBatch> {
    let source = AcsDataSource::new(cli.year, cli.horizon, args.survey, &cli.root)?
        .with_base_url(cli.base_url()?)
        .with_client(client);
    let start = Instant::now();
    let data = source.get_data(&cli.load_options(args)).await?;
    if data.num_rows() == 0 {
        warn!("sample is empty");
    }
    info!(rows = data.num_rows(), columns = data.num_columns(), elapsed = ?start.elapsed(), "loaded");
    Ok(data)
}

async fn write(batch: RecordBatch, path: PathBuf) -> Result<()> {
    let rows = batch.num_rows();
    let out = path.clone();
    tokio::task::spawn_blocking(move || table::write_parquet(&batch, &out))
        .await
        .context("parquet writer panicked")??;
    info!(path = %path.display(), rows, "wrote parquet");
    Ok(())
}
