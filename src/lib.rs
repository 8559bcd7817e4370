pub mod audit;
pub mod cli;
pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod io_utils;
pub mod loader;
pub mod normalize;
pub mod pipeline;
pub mod query;
pub mod registry;
pub mod store;
pub mod table;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use itertools::Itertools;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, ConfigArgs, ConfigSource, PipelineArgs},
    config::{Pacing, PipelineConfig},
    pipeline::{LoadOutcome, Pipeline},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("dsload", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(&args.pipeline, None),
        Commands::Load(args) => handle_run(&args.pipeline, Some(&args.table)),
        Commands::Tables(source) => handle_tables(&source),
        Commands::Config(args) => handle_config(&args),
    }
}

fn load_config(source: &ConfigSource) -> Result<PipelineConfig> {
    let mut config = match &source.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Loading pipeline config from {path:?}"))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &source.data_dir {
        config.rebase_paths(dir);
    }
    Ok(config)
}

fn apply_overrides(config: &mut PipelineConfig, args: &PipelineArgs) {
    if let Some(url) = &args.database_url {
        config.database_url = Some(url.clone());
    }
    if let Some(path) = &args.audit_log {
        config.audit_log = path.clone();
    }
    if let Some(delimiter) = args.delimiter {
        config.delimiter = (delimiter as char).to_string();
    }
    if !args.input_encodings.is_empty() {
        config.encodings = args.input_encodings.clone();
    }
    if args.no_pacing {
        config.pacing = Pacing::disabled();
    }
}

fn handle_run(args: &PipelineArgs, only: Option<&str>) -> Result<()> {
    let mut config = load_config(&args.source)?;
    apply_overrides(&mut config, args);
    let url = config
        .database_url
        .clone()
        .ok_or_else(|| anyhow!("No database URL configured; pass --database-url or set DATABASE_URL"))?;
    let pipeline = Pipeline::new(config)?;

    info!(
        "Connecting to {} (delimiter '{}')",
        store::redact_url(&url),
        printable_delimiter(pipeline.config().delimiter_byte()?)
    );
    let mut store = store::open(&url)?;
    let outcomes: Vec<LoadOutcome> = match only {
        Some(name) => vec![pipeline.run_table(store.as_mut(), name)?],
        None => pipeline.run(store.as_mut()),
    };
    print!("{}", table::render_outcomes(&outcomes));
    info!("Load complete");

    let failed = outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| o.entry.table.as_str())
        .collect::<Vec<_>>();
    if args.fail_on_error && !failed.is_empty() {
        bail!("{} table load(s) failed: {}", failed.len(), failed.iter().join(", "));
    }
    Ok(())
}

fn handle_tables(source: &ConfigSource) -> Result<()> {
    let config = load_config(source)?;
    let headers = ["table", "mode", "keys", "validation", "path"].map(str::to_string);
    let rows = config
        .tables
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                t.mode().to_string(),
                t.keys.join(", "),
                t.validation
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                t.path.display().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    print!("{}", table::render_table(&headers, &rows));
    Ok(())
}

fn handle_config(args: &ConfigArgs) -> Result<()> {
    let config = load_config(&args.source)?;
    match &args.output {
        Some(path) => {
            config
                .save(path)
                .with_context(|| format!("Writing pipeline config to {path:?}"))?;
            info!("Pipeline config for {} table(s) written to {:?}", config.tables.len(), path);
        }
        None => print!("{}", config.to_yaml()?),
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
