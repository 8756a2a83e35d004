use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use anilist_client::AnilistClient;
use pushshift_client::PushshiftClient;
use reddit_client::RedditClient;
use toron_common::Config;
use toron_scout::{driver, ScoutConfig, Toron};
use toron_store::RedisStore;

#[derive(Parser)]
#[command(about = "Ingest forum discussion threads and link them to shows")]
struct Cli {
    /// Run a single cycle and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("toron=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("Toron scout starting...");

    let config = Config::from_env()?;
    config.log_redacted();

    let store = Arc::new(RedisStore::connect(&config.redis_url).await?);
    let forum = Arc::new(RedditClient::new(&config.reddit_user_agent, &config.subreddit)?);
    let history = Arc::new(PushshiftClient::new(&config.subreddit));
    let shows = Arc::new(AnilistClient::new());

    let toron = Toron::new(store, forum, history, shows, ScoutConfig::from_config(&config));

    if cli.once {
        let stats = toron.run_cycle().await?;
        info!(?stats, "Single cycle complete");
        return Ok(());
    }

    driver::run_forever(&toron, config.cycle_interval, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("Received ctrl-c");
    })
    .await;

    Ok(())
}
