//! # nomad_relay
//!
//! Watches the Nomad event stream and posts allocation task events to Discord.
//!
//! ```bash
//! NOMAD_ADDR=http://nomad.service:4646 \
//! DISCORD_WEBHOOK_URL=https://discord.com/api/webhooks/... \
//! TASK_EVENT_TYPE_DENYLIST="Received,Task Setup" \
//! HEARTBEAT_TIMEOUT_SECS=120 \
//! nomad_relay
//! ```

#![forbid(unsafe_code)]

mod cli;
mod discord;
mod nomad;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nomad_events::{EventFilter, EventRelay, Liveness, UnixNanos, Watchdog};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;
use crate::discord::DiscordNotifier;
use crate::nomad::NomadClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let http = reqwest::Client::new();
    let nomad = NomadClient::new(
        http.clone(),
        &args.nomad_addr,
        args.nomad_token.clone(),
        args.namespace.clone(),
    );
    let notifier = DiscordNotifier::new(http, args.webhook_urls());
    if notifier.destinations() == 0 {
        tracing::warn!("no webhook configured; notifications will only be logged");
    }

    let starting_index = nomad
        .last_log_index()
        .await
        .context("failed to read the starting index from the Nomad agent")?;
    let started_at = UnixNanos::now();
    tracing::info!(starting_index, %started_at, "starting relay");

    let liveness = Liveness::new(started_at);
    if let Some(timeout) = args.heartbeat_timeout() {
        let watchdog = Watchdog::new(liveness.clone(), timeout).spawn();
        tokio::spawn(async move {
            if let Ok(silence) = watchdog.await {
                tracing::error!(
                    silence_secs = silence.as_secs(),
                    "event stream stopped sending heartbeats; exiting"
                );
                std::process::exit(1);
            }
        });
    }

    let filter = EventFilter::new(args.filter_config(), starting_index, started_at)
        .with_liveness(liveness);
    let mut relay = EventRelay::new(filter);

    let mut stream = nomad
        .event_stream()
        .await
        .context("failed to open the Nomad event stream")?;
    while let Some(chunk) = stream
        .chunk()
        .await
        .context("failed reading the Nomad event stream")?
    {
        for notification in relay.feed_bytes(&chunk)? {
            tracing::info!(
                task = %notification.task,
                event_type = %notification.event_type,
                criticality = notification.criticality.as_str(),
                "task event"
            );
            notifier.notify(&notification).await;
        }
    }

    let summary = relay.summary();
    tracing::info!(?summary, "event stream ended");
    bail!("event stream closed by {}", args.nomad_addr)
}
