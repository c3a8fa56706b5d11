use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use pingora_core::server::ShutdownWatch;
use pingora_core::services::background::BackgroundService;
use reqwest::Client;

/// Reports this balancer's liveness by pinging the supervising balancer.
pub struct Heartbeat {
    ping_url: String,
    interval: Duration,
    client: Client,
}

impl Heartbeat {
    pub fn new(supervisor_api: &str, interval: Duration) -> Self {
        Self {
            ping_url: format!("{}/ping", supervisor_api),
            interval,
            client: Client::new(),
        }
    }

    pub fn ping_url(&self) -> &str {
        &self.ping_url
    }

    pub async fn ping(&self) -> Result<(), reqwest::Error> {
        self.client.get(&self.ping_url).send().await?;
        Ok(())
    }
}

#[async_trait]
impl BackgroundService for Heartbeat {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        info!(
            "💓 Starting heartbeat to {} (interval: {}s)",
            self.ping_url(),
            self.interval.as_secs()
        );

        loop {
            match self.ping().await {
                Ok(()) => info!("💓 Successfully pinged loadbalancer at {}", self.ping_url()),
                Err(e) => warn!("⚠️ Error pinging loadbalancer: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => return,
            }
        }
    }
}
