use std::sync::{PoisonError, RwLock};

use log::{info, warn};

use crate::backend::Backend;
use crate::probe::ProbeResult;
use crate::scoring;

/// Winner of a refresh cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection {
    pub backend: Backend,
    pub score: f64,
}

/// Picks the lowest-scoring backend among successful probes. Failed probes
/// are skipped. On a tie the earliest result wins.
pub fn select_best(results: &[ProbeResult]) -> Option<Selection> {
    let mut best: Option<Selection> = None;

    for result in results {
        let sample = match &result.sample {
            Ok(sample) => sample,
            Err(e) => {
                warn!("⚠️ Failed to get metrics from {}: {}", result.backend.url, e);
                continue;
            }
        };

        let score = scoring::score(sample);
        if best.as_ref().map_or(true, |b| score < b.score) {
            best = Some(Selection {
                backend: result.backend.clone(),
                score,
            });
        }
    }

    best
}

/// Holds the base URL every forwarded request currently goes to.
///
/// Starts empty and only ever changes to a new winner; a cycle in which
/// every probe failed leaves the previous value in place.
#[derive(Debug, Default)]
pub struct Selector {
    current_best: RwLock<Option<String>>,
}

impl Selector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_best(&self) -> Option<String> {
        self.current_best
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scores the cycle's results and stores the winner's base URL.
    /// Returns the winner, if any.
    pub fn update(&self, results: &[ProbeResult]) -> Option<Selection> {
        let Some(selection) = select_best(results) else {
            warn!("🚨 No available APIs found");
            return None;
        };

        let base_url = selection.backend.base_url().to_string();
        info!("🏆 Best API found: {} (score: {:.2})", base_url, selection.score);

        *self
            .current_best
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(base_url);

        Some(selection)
    }
}
