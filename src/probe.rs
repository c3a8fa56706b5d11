use std::time::Duration;

use futures::future::join_all;
use log::debug;
use reqwest::Client;

use crate::backend::Backend;
use crate::error::{ConfigError, ProbeError};
use crate::metrics::{self, MetricsSample};

/// Outcome of one backend's metrics fetch within a refresh cycle.
#[derive(Debug)]
pub struct ProbeResult {
    pub backend: Backend,
    pub sample: Result<MetricsSample, ProbeError>,
}

/// Fetches `/metrics` from every configured backend in parallel.
pub struct MetricsProber {
    client: Client,
}

impl MetricsProber {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// One task per backend, joined before returning. The result has one
    /// entry per backend, in the order given.
    pub async fn probe_all(&self, backends: &[Backend]) -> Vec<ProbeResult> {
        let handles: Vec<_> = backends
            .iter()
            .cloned()
            .map(|backend| {
                let client = self.client.clone();
                tokio::spawn(async move { fetch_sample(&client, &backend.metrics_url()).await })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .zip(backends)
            .map(|(joined, backend)| {
                let sample = joined.unwrap_or_else(|e| {
                    Err(ProbeError::Task {
                        url: backend.metrics_url(),
                        reason: e.to_string(),
                    })
                });
                ProbeResult {
                    backend: backend.clone(),
                    sample,
                }
            })
            .collect()
    }
}

async fn fetch_sample(client: &Client, url: &str) -> Result<MetricsSample, ProbeError> {
    let response = client.get(url).send().await.map_err(|source| ProbeError::Request {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|source| ProbeError::Body {
        url: url.to_string(),
        source,
    })?;
    debug!("📈 {} returned {} bytes of metrics", url, body.len());

    Ok(metrics::parse(&body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prober() -> MetricsProber {
        MetricsProber::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn collects_one_result_per_backend_in_order() {
        let mut fast = mockito::Server::new_async().await;
        let mut failing = mockito::Server::new_async().await;
        fast.mock("GET", "/metrics")
            .with_status(200)
            .with_body("process_cpu_seconds_total 4\nhttp_active_connections 3\n")
            .create_async()
            .await;
        failing
            .mock("GET", "/metrics")
            .with_status(500)
            .create_async()
            .await;

        let backends = vec![
            Backend::new(format!("{}/metrics", fast.url())),
            Backend::new(format!("{}/metrics", failing.url())),
            Backend::new("http://127.0.0.1:1/metrics"),
        ];
        let results = prober().probe_all(&backends).await;

        assert_eq!(results.len(), 3);
        for (result, backend) in results.iter().zip(&backends) {
            assert_eq!(&result.backend, backend);
        }

        let sample = results[0].sample.as_ref().unwrap();
        assert_eq!(sample.cpu_usage, 4.0);
        assert_eq!(sample.active_conns, 3.0);
        assert!(matches!(
            results[1].sample,
            Err(ProbeError::Status { status: 500, .. })
        ));
        assert!(matches!(results[2].sample, Err(ProbeError::Request { .. })));
    }

    #[tokio::test]
    async fn bare_base_url_is_probed_on_metrics_path() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/metrics")
            .with_status(200)
            .with_body("process_resident_memory_bytes 1000\n")
            .expect(1)
            .create_async()
            .await;

        let results = prober().probe_all(&[Backend::new(server.url())]).await;

        mock.assert_async().await;
        assert_eq!(results[0].sample.as_ref().unwrap().memory_usage, 1000.0);
    }

    /// Accepts connections and holds them open without ever answering.
    async fn silent_backend() -> (Backend, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        (Backend::new(format!("http://{}/metrics", addr)), handle)
    }

    #[tokio::test]
    async fn slow_backends_time_out_in_parallel() {
        let (first, first_handle) = silent_backend().await;
        let (second, second_handle) = silent_backend().await;
        let prober = MetricsProber::new(Duration::from_secs(1)).unwrap();

        let started = std::time::Instant::now();
        let results = prober.probe_all(&[first, second]).await;
        let elapsed = started.elapsed();

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.sample.is_err()));
        assert!(elapsed < Duration::from_millis(1800), "took {:?}", elapsed);

        first_handle.abort();
        second_handle.abort();
    }

    #[tokio::test]
    async fn slow_backend_does_not_hold_up_healthy_one() {
        let (slow, handle) = silent_backend().await;
        let mut healthy = mockito::Server::new_async().await;
        healthy
            .mock("GET", "/metrics")
            .with_status(200)
            .with_body("http_active_connections 5\n")
            .create_async()
            .await;
        let prober = MetricsProber::new(Duration::from_secs(1)).unwrap();

        let results = prober
            .probe_all(&[slow, Backend::new(format!("{}/metrics", healthy.url()))])
            .await;

        assert!(matches!(results[0].sample, Err(ProbeError::Request { .. })));
        assert_eq!(results[1].sample.as_ref().unwrap().active_conns, 5.0);
        handle.abort();
    }

    #[tokio::test]
    async fn empty_pool_yields_no_results() {
        assert!(prober().probe_all(&[]).await.is_empty());
    }
}
