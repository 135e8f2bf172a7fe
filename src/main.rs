use advisory_digest::{AppConfig, DigestRunner, RunArgs};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "advisory-digest", version, about = "Security advisory feed digest")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Compute the digest without publishing or notifying
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_file(&cli.config)?;

    info!(
        "Loaded {} feeds from {}",
        config.feeds.len(),
        cli.config.display()
    );

    let runner = DigestRunner::new(config);
    let result = runner
        .execute(RunArgs {
            dry_run: cli.dry_run,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
