use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Load delimited extracts into relational tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load every configured table once, in configured order
    Run(RunArgs),
    /// Load a single configured table
    Load(LoadArgs),
    /// List configured tables with their keys and validation rules
    Tables(ConfigSource),
    /// Print or write the effective pipeline configuration as YAML
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConfigSource {
    /// Pipeline YAML file (built-in table set if omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Directory that relative table paths are resolved against
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub source: ConfigSource,
    /// Database URL (postgres://..., sqlite://path or sqlite::memory:)
    #[arg(long = "database-url", env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,
    /// Audit log for rejected rows (overrides the configured path)
    #[arg(long = "audit-log")]
    pub audit_log: Option<PathBuf>,
    /// Field delimiter of the input files (supports ';', ',', 'tab', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Input encodings to try in order (repeatable, overrides the configured list)
    #[arg(long = "input-encoding", action = clap::ArgAction::Append)]
    pub input_encodings: Vec<String>,
    /// Skip the fixed pauses around each table load
    #[arg(long = "no-pacing")]
    pub no_pacing: bool,
    /// Exit with a non-zero status when any table load fails
    #[arg(long = "fail-on-error")]
    pub fail_on_error: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Destination table name as configured (e.g. ds.md_currency_d)
    pub table: String,
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(flatten)]
    pub source: ConfigSource,
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
