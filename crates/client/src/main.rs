//! StockMaster Client - Main entry point
//!
//! Connects to the event server and logs inventory events until interrupted.
//!
//! Usage: `stockmaster-client [room]`. Without an argument the logged-in
//! user's id is used as the room.

use anyhow::{Context, Result};
use stockmaster_client::{logging, ApiClient, ClientConfig, EventClient};
use stockmaster_shared::{events, HasId};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = ClientConfig::from_env();
    tracing::info!(
        api = %config.api_base_url,
        socket = %config.socket_url,
        "Starting StockMaster client"
    );

    let api = ApiClient::new(&config)
        .on_session_expired(|| tracing::warn!("Session expired, please log in again"));

    let room = std::env::args()
        .nth(1)
        .or_else(|| api.stored_user().and_then(|user| user.id().map(str::to_string)));
    if room.is_none() {
        tracing::warn!("No room given and no stored login; listening without a room");
    }

    let events_client = EventClient::from_config(&config);
    for &event in events::DOMAIN_EVENTS {
        events_client.on(event, move |payload| {
            tracing::info!(event, %payload, "Inventory event");
        });
    }
    events_client.on(events::CONNECT, |_| tracing::info!("Live updates enabled"));
    events_client.on(events::DISCONNECT, |reason| {
        tracing::info!(%reason, "Live updates paused");
    });
    events_client.on(events::RECONNECT_FAILED, |_| {
        tracing::error!("Could not reach the event server; live updates are off");
    });

    events_client.connect(room.as_deref());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    events_client.disconnect();
    Ok(())
}
