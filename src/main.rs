use clap::Parser;
use p2000::{cli::Cli, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "p2000=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    p2000::cli::run(Cli::parse()).await
}
