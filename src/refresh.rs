use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use pingora_core::server::ShutdownWatch;
use pingora_core::services::background::BackgroundService;

use crate::backend::Backend;
use crate::probe::MetricsProber;
use crate::selector::{Selection, Selector};

/// Background service that re-elects the best backend on a fixed interval.
pub struct RefreshLoop {
    backends: Vec<Backend>,
    prober: MetricsProber,
    selector: Arc<Selector>,
    interval: Duration,
}

impl RefreshLoop {
    pub fn new(
        backends: Vec<Backend>,
        prober: MetricsProber,
        selector: Arc<Selector>,
        interval: Duration,
    ) -> Self {
        Self {
            backends,
            prober,
            selector,
            interval,
        }
    }

    /// One full probe and select pass.
    pub async fn run_cycle(&self) -> Option<Selection> {
        let results = self.prober.probe_all(&self.backends).await;
        self.selector.update(&results)
    }
}

#[async_trait]
impl BackgroundService for RefreshLoop {
    async fn start(&self, mut shutdown: ShutdownWatch) {
        info!(
            "🔄 Starting best API refresh for {} backends (interval: {}s)",
            self.backends.len(),
            self.interval.as_secs()
        );

        loop {
            self.run_cycle().await;

            // The sleep starts only after the cycle finished, so cycles never overlap.
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => {
                    info!("🛑 Best API refresh stopped");
                    return;
                }
            }
        }
    }
}
