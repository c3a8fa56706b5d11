const METRICS_PATH: &str = "/metrics";

/// One configured service replica. Configured as its metrics URL
/// (`http://host:port/metrics`) or as a bare base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backend {
    pub url: String,
}

impl Backend {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// URL the prober fetches.
    pub fn metrics_url(&self) -> String {
        if self.url.ends_with(METRICS_PATH) {
            self.url.clone()
        } else {
            format!("{}{}", self.url, METRICS_PATH)
        }
    }

    /// URL forwarded requests are built on: the configured URL with a
    /// trailing `/metrics` removed.
    pub fn base_url(&self) -> &str {
        self.url.strip_suffix(METRICS_PATH).unwrap_or(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_url_is_kept_when_configured() {
        let b = Backend::new("http://10.0.0.1:8080/metrics");
        assert_eq!(b.metrics_url(), "http://10.0.0.1:8080/metrics");
        assert_eq!(b.base_url(), "http://10.0.0.1:8080");
    }

    #[test]
    fn bare_base_url_gets_metrics_path() {
        let b = Backend::new("http://10.0.0.1:8080");
        assert_eq!(b.metrics_url(), "http://10.0.0.1:8080/metrics");
        assert_eq!(b.base_url(), "http://10.0.0.1:8080");
    }

    #[test]
    fn only_trailing_suffix_is_stripped() {
        let b = Backend::new("http://host/metrics/v2");
        assert_eq!(b.base_url(), "http://host/metrics/v2");
    }
}
