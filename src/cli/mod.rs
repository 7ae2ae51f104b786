use clap::Parser;
use clap::Subcommand;
use duration_string::DurationString;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[clap(version, about = "Runs a Kubernetes Job to completion and removes it afterwards")]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) subcommand: SubCommands,

    /// YAML configuration file
    #[clap(short, long, global = true)]
    pub(crate) config: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum SubCommands {
    /// Submit a Job manifest, wait for it to finish and delete it
    Run {
        /// Path to a YAML Job manifest
        manifest: PathBuf,

        /// Namespace for manifests that do not set one
        #[clap(short, long)]
        namespace: Option<String>,

        /// Give up after this long, e.g. "90s" or "10m"
        #[clap(short, long, value_parser = parse_duration)]
        timeout: Option<Duration>,
    },
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    value
        .parse::<DurationString>()
        .map(Duration::from)
        .map_err(|e| format!("invalid duration '{value}': {e}"))
}
