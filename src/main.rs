use anyhow::Result;
use clap::Parser;
use initiative_tracker_lib::config::AppConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about = "Initiative tracker API server")]
struct Cli {
    #[arg(long, help = "Path to a tracker.toml configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Override the configured bind address")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    initiative_tracker_lib::run(config).await
}
