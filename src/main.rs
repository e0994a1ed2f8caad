use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod alert;
mod api;
mod config;
mod engine;
mod models;
mod probe;
mod store;

use crate::alert::{
    Alerter, AlertPlayer, BellPlayer, CommandPlayer, FanoutNotifier, Notifier, TraceNotifier,
    WebhookNotifier,
};
use crate::config::MonitorConfig;
use crate::engine::Controller;
use crate::probe::NetProber;
use crate::store::LogStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_ansi(true)
        .init();

    let config_path = "config.json";
    let config_content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path))?;
    let config: MonitorConfig =
        serde_json::from_str(&config_content).with_context(|| "Failed to parse config")?;

    let store = Arc::new(LogStore::new(&config.log_path));
    store.prune(config.retention);

    let player: Arc<dyn AlertPlayer> = match &config.alert_sound {
        Some(command) => Arc::new(CommandPlayer::new(command.clone())),
        None => Arc::new(BellPlayer),
    };
    let mut sinks: Vec<Arc<dyn Notifier>> = vec![
        Arc::new(TraceNotifier),
        Arc::new(Alerter::new(player, config.alert_repeat)),
    ];
    if let Some(url) = &config.webhook_url {
        sinks.push(Arc::new(WebhookNotifier::new(url.clone())));
    }
    let notifier = Arc::new(FanoutNotifier::new(sinks));

    let api_port = config.api_port;
    let controller = Arc::new(Controller::new(
        config,
        Arc::clone(&store),
        Arc::new(NetProber::new()),
        notifier,
    ));

    controller.start().await?;

    let api_state = api::ApiState {
        controller: Arc::clone(&controller),
        store,
    };
    tokio::spawn(async move {
        api::start_server(api_port, api_state).await;
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping monitor...");
    controller.stop().await;

    Ok(())
}
