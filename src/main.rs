mod config;
mod error;
mod services;
mod sources;
mod types;

use std::sync::Arc;

use config::Config;
use services::{
    CandleChart, Cataloger, Messages, Schedule, SignalRunner, SignalTracker, SystemClock,
};
use sources::{IqOptionClient, TelegramClient};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "augury=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!(
        "Starting Augury: gateway {}, market timezone {}",
        config.gateway_url, config.timezone
    );

    // Transient chart artifacts live here
    std::fs::create_dir_all(&config.chart_dir)?;

    // Establish the market gateway session before anything else
    let gateway = IqOptionClient::new(
        config.gateway_url.clone(),
        config.gateway_email.clone(),
        config.gateway_password.clone(),
    );
    gateway.connect().await;

    // Shared collaborators
    let clock = Arc::new(SystemClock::new(config.timezone));
    let schedule = Schedule::new(clock.clone());
    let feed = Arc::new(gateway);
    let notifier = Arc::new(TelegramClient::new(
        config.telegram.bot_token.clone(),
        config.telegram.chat_id.clone(),
    ));
    let charts = Arc::new(CandleChart::new(config.chart_dir.clone()));
    let messages = Messages::new(config.brand.clone());

    // Wire the pipeline
    let cataloger = Cataloger::new(feed.clone(), clock);
    let tracker = SignalTracker::new(
        feed,
        notifier.clone(),
        charts,
        schedule.clone(),
        messages.clone(),
        config.telegram.stickers.clone(),
    );
    let runner = SignalRunner::new(cataloger, tracker, notifier, schedule, messages, config);

    // Run catalogation cycles until the process is killed
    runner.run().await;

    Ok(())
}
