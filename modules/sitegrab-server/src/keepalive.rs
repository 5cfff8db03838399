// Periodic self-ping that keeps idle hosting platforms from suspending the process.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Spawn the heartbeat. The first ping goes out one `interval` after start.
pub fn spawn_heartbeat(
    client: reqwest::Client,
    url: String,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(%url, interval_secs = interval.as_secs(), "Keep-alive heartbeat started");
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => ping(&client, &url).await,
            }
        }
        debug!("Keep-alive heartbeat stopped");
    })
}

async fn ping(client: &reqwest::Client, url: &str) {
    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => debug!(status = resp.status().as_u16(), "Keep-alive ok"),
        Ok(resp) => warn!(status = resp.status().as_u16(), "Keep-alive got non-success status"),
        Err(e) => warn!(error = %e, "Keep-alive request failed"),
    }
}
