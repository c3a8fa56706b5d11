use crate::metrics::MetricsSample;

const RESPONSE_TIME_WEIGHT: f64 = 0.35;
const CPU_USAGE_WEIGHT: f64 = 0.25;
const MEMORY_USAGE_WEIGHT: f64 = 0.20;
const ACTIVE_CONNS_WEIGHT: f64 = 0.10;
const REQUESTS_WEIGHT: f64 = 0.10;

/// Fitness of a backend, lower is better.
///
/// The requests term is `1 - requests / 10000` and is not clamped, so it goes
/// negative past 10000 requests.
pub fn score(sample: &MetricsSample) -> f64 {
    let response_time = sample.response_time / 1.0;
    let cpu = sample.cpu_usage / 100.0;
    let memory = sample.memory_usage / 1_000_000_000.0;
    let conns = sample.active_conns / 1000.0;
    let requests = 1.0 - (sample.requests_total / 10_000.0);

    response_time * RESPONSE_TIME_WEIGHT
        + cpu * CPU_USAGE_WEIGHT
        + memory * MEMORY_USAGE_WEIGHT
        + conns * ACTIVE_CONNS_WEIGHT
        + requests * REQUESTS_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> MetricsSample {
        MetricsSample {
            response_time: 0.2,
            cpu_usage: 10.0,
            memory_usage: 2.0e8,
            active_conns: 40.0,
            requests_total: 500.0,
        }
    }

    #[test]
    fn worked_example_scores_0_805() {
        let s = MetricsSample {
            response_time: 2.0,
            cpu_usage: 2.0,
            ..Default::default()
        };
        assert!((score(&s) - 0.805).abs() < 1e-9);
    }

    #[test]
    fn empty_sample_scores_requests_weight() {
        assert!((score(&MetricsSample::default()) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn score_is_deterministic() {
        let s = base();
        assert_eq!(score(&s).to_bits(), score(&s).to_bits());
    }

    #[test]
    fn load_signals_raise_the_score() {
        let b = score(&base());
        assert!(score(&MetricsSample { response_time: 0.9, ..base() }) > b);
        assert!(score(&MetricsSample { cpu_usage: 90.0, ..base() }) > b);
        assert!(score(&MetricsSample { memory_usage: 9.0e8, ..base() }) > b);
        assert!(score(&MetricsSample { active_conns: 900.0, ..base() }) > b);
    }

    #[test]
    fn served_requests_lower_the_score() {
        let b = score(&base());
        assert!(score(&MetricsSample { requests_total: 5000.0, ..base() }) < b);
    }

    #[test]
    fn requests_term_is_not_clamped() {
        let s = MetricsSample {
            requests_total: 50_000.0,
            ..Default::default()
        };
        assert!((score(&s) - (-0.4)).abs() < 1e-12);
    }
}
