use clap::Parser;
use tracing::info;

use panel_host::cli::Cli;
use panel_host::config::HostConfig;
use panel_host::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let root = std::env::current_dir()?;
    let mut config = match &cli.config {
        Some(path) => HostConfig::load_file(&root, path),
        None => HostConfig::load(&root),
    };
    cli.apply(&mut config);

    info!("Starting panel-host");
    server::run(tokio::io::stdin(), tokio::io::stdout(), &config).await
}
