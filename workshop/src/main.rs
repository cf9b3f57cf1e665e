use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod run;

use config::Config;

const DOWNLOADS_DIR: &str = "downloads";

/// Provisions an FME workshop tenant and packages the workshop pages.
#[derive(Parser)]
struct Cli {
    /// Directory holding the parameter file, flag definitions and page templates.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Parameter file. Discovered in --dir when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the archive is written. Defaults to <dir>/downloads.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "could not load parameters");
            std::process::exit(1);
        }
    };

    let out_dir = cli.out_dir.unwrap_or_else(|| cli.dir.join(DOWNLOADS_DIR));

    match run::run(&config, &cli.dir, &out_dir).await {
        Ok(summary) => {
            tracing::info!(
                workspace = summary.context.workspace_id().unwrap_or("none"),
                steps = summary.report.steps().len(),
                degraded = summary.report.degraded().count(),
                pages = summary.pages.len(),
                "workshop run finished"
            );
            if let Some(path) = summary.archive {
                println!("{}", path.display());
            }
            println!("{}", summary.recipients);
        }
        Err(e) => {
            tracing::error!(error = %e, "could not build the HTTP client");
            std::process::exit(1);
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::discover(&cli.dir)?,
    };
    tracing::info!(path = %path.display(), "loading parameters");

    Config::from_file(&path)
}
