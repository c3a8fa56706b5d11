//! Extraction of the load signals a backend publishes on its Prometheus
//! text endpoint.

/// Snapshot of one backend, valid for a single refresh cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MetricsSample {
    /// Mean request duration in seconds.
    pub response_time: f64,
    pub cpu_usage: f64,
    /// Resident memory in bytes.
    pub memory_usage: f64,
    pub active_conns: f64,
    pub requests_total: f64,
}

/// Parses exposition text into a [`MetricsSample`].
///
/// Only lines of the shape `name value` or `name{labels} value` with exactly
/// two space-separated tokens are considered. A later line for the same
/// signal overwrites an earlier one. Values that do not parse count as 0.
pub fn parse(raw: &str) -> MetricsSample {
    let mut sample = MetricsSample::default();
    let mut duration_sum = 0.0;
    let mut duration_count = 0.0;

    for line in raw.split('\n') {
        let slot = if line.contains("http_request_duration_seconds_sum") {
            &mut duration_sum
        } else if line.contains("http_request_duration_seconds_count") {
            &mut duration_count
        } else if line.contains("process_cpu_seconds_total") {
            &mut sample.cpu_usage
        } else if line.contains("process_resident_memory_bytes") {
            &mut sample.memory_usage
        } else if line.contains("http_active_connections") {
            &mut sample.active_conns
        } else if line.contains("http_requests_total") {
            &mut sample.requests_total
        } else {
            continue;
        };

        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() == 2 {
            *slot = parts[1].parse().unwrap_or(0.0);
        }
    }

    if duration_count > 0.0 {
        sample.response_time = duration_sum / duration_count;
    }

    sample
}
