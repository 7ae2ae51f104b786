use self::cli::{Cli, SubCommands};
use self::cluster::KubeCluster;
use self::config::Config;
use self::context::RunContext;
use self::kubernetes_objects::job::{parse_manifest, prepare_manifest};
use self::kubernetes_objects::JobManifestError;
use self::runner::JobRunner;
use self::runner::error::JobRunError;
use clap::Parser;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use tracing_error::ExtractSpanTrace;
use tracing_error::SpanTrace;

pub(crate) mod cli;
pub mod cluster;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod kubernetes_objects;
pub mod runner;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to load config.\n{0}")]
    ConfigError(#[from] config::ConfigLoadError),

    #[error("Failed to read Job manifest '{0}': {1}")]
    ManifestRead(PathBuf, std::io::Error),

    #[error("Invalid Job manifest '{0}': {1}")]
    ManifestInvalid(PathBuf, JobManifestError),

    #[error("Failed to initialize kubernetes client.\n{0}")]
    KubeClientError(#[from] kube::Error),

    #[error("Job run failed:\n{0}")]
    JobRunError(#[from] JobRunError),
}

impl ExtractSpanTrace for AppError {
    fn span_trace(&self) -> Option<&SpanTrace> {
        match self {
            AppError::JobRunError(e) => e.span_trace(),
            _ => None,
        }
    }
}

async fn load_manifest(
    path: &Path,
    default_namespace: &str,
) -> Result<k8s_openapi::api::batch::v1::Job, AppError> {
    let yaml = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| AppError::ManifestRead(path.to_path_buf(), e))?;
    parse_manifest(&yaml)
        .and_then(|job| prepare_manifest(job, default_namespace))
        .map_err(|e| AppError::ManifestInvalid(path.to_path_buf(), e))
}

pub async fn app() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::new_from_file(path).await?,
        None => Config::default(),
    };

    info!("Config Loaded.");

    match cli.subcommand {
        SubCommands::Run {
            manifest,
            namespace,
            timeout,
        } => {
            let namespace = namespace.unwrap_or_else(|| config.namespace.clone());
            let job = load_manifest(&manifest, &namespace).await?;

            let client = kube::Client::try_default().await?;

            info!("Kubernetes Client Initialized.");

            let mut ctx = RunContext::from_signals();
            if let Some(timeout) = timeout.or(config.timeout) {
                ctx = ctx.with_timeout(timeout);
            }

            let runner = JobRunner::new(KubeCluster::new(client, &config))
                .with_cleanup_grace(config.cleanup_grace);
            runner.run(&ctx, job).await?;
        }
    }

    Ok(())
}
