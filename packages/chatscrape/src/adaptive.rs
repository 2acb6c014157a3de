//! Adaptive strategy selection.
//!
//! Re-ranks strategy order per platform from recorded outcomes. Ranking
//! is recomputed on demand from the latest log state; there is no
//! background recomputation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::outcome::OutcomeLog;
use crate::platform::Platform;
use crate::strategies::StrategyKind;

/// Outcomes required before a strategy's stats can promote it to the
/// front of the order.
const MIN_SAMPLES: usize = 3;

/// Score weights: success dominates, speed matters, cost breaks ties.
const SUCCESS_WEIGHT: f64 = 0.5;
const SPEED_WEIGHT: f64 = 0.3;
const COST_WEIGHT: f64 = 0.2;

/// Fixed relative unit costs per strategy. Static fetches are nearly
/// free; a rendering session and an LLM call are not.
fn unit_cost(kind: StrategyKind) -> f64 {
    match kind {
        StrategyKind::StaticMarkup => 1.0,
        StrategyKind::StructuredEndpoint => 1.5,
        StrategyKind::CommunityRules => 2.5,
        StrategyKind::RenderedDom => 20.0,
        StrategyKind::SemanticFallback => 40.0,
    }
}

/// Per-strategy rolling stats derived from the outcome log.
#[derive(Debug, Clone)]
pub struct StrategyStats {
    pub kind: StrategyKind,
    pub samples: usize,
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub score: f64,
}

/// Ranks strategies per platform from the shared outcome log.
pub struct AdaptiveSelector {
    outcomes: Arc<OutcomeLog>,
}

impl AdaptiveSelector {
    pub fn new(outcomes: Arc<OutcomeLog>) -> Self {
        Self { outcomes }
    }

    /// Ordered strategy list for a platform: the best-scoring strategy
    /// with enough data first, then the remaining strategies in the
    /// fixed default priority. With no usable data the default priority
    /// applies unchanged.
    pub fn rank(&self, platform: Platform) -> Vec<StrategyKind> {
        let stats = self.stats(platform);

        let best = stats
            .iter()
            .filter(|s| s.samples >= MIN_SAMPLES)
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|s| s.kind);

        match best {
            Some(first) => {
                debug!(platform = %platform, first = %first, "adaptive ranking promoted a strategy");
                let mut order = vec![first];
                order.extend(
                    StrategyKind::DEFAULT_PRIORITY
                        .iter()
                        .copied()
                        .filter(|k| *k != first),
                );
                order
            }
            None => StrategyKind::DEFAULT_PRIORITY.to_vec(),
        }
    }

    /// Current per-strategy stats for a platform, computed from the log
    /// snapshot. Exposed for diagnostics and tests of the score formula.
    pub fn stats(&self, platform: Platform) -> Vec<StrategyStats> {
        let snapshot = self.outcomes.snapshot();

        let mut successes: HashMap<StrategyKind, usize> = HashMap::new();
        let mut totals: HashMap<StrategyKind, usize> = HashMap::new();
        let mut latency_sums: HashMap<StrategyKind, f64> = HashMap::new();

        for outcome in snapshot.iter().filter(|o| o.platform == platform) {
            *totals.entry(outcome.strategy).or_default() += 1;
            if outcome.succeeded {
                *successes.entry(outcome.strategy).or_default() += 1;
            }
            *latency_sums.entry(outcome.strategy).or_default() +=
                outcome.latency.as_secs_f64() * 1000.0;
        }

        let observed: Vec<StrategyKind> = StrategyKind::DEFAULT_PRIORITY
            .iter()
            .copied()
            .filter(|k| totals.contains_key(k))
            .collect();

        let mean_latency = |kind: StrategyKind| -> f64 {
            let total = totals.get(&kind).copied().unwrap_or(0);
            if total == 0 {
                return 0.0;
            }
            latency_sums.get(&kind).copied().unwrap_or(0.0) / total as f64
        };

        let rate = |kind: StrategyKind| -> f64 {
            let total = totals.get(&kind).copied().unwrap_or(0);
            if total == 0 {
                return 0.0;
            }
            successes.get(&kind).copied().unwrap_or(0) as f64 / total as f64
        };

        // Normalize speed and cost efficiency min-max against the sibling
        // strategies observed for this platform; higher is better. Cost
        // efficiency is success yield per unit cost, so an expensive
        // strategy must actually succeed to earn its keep.
        let latencies: Vec<f64> = observed.iter().map(|k| mean_latency(*k)).collect();
        let efficiencies: Vec<f64> = observed.iter().map(|k| rate(*k) / unit_cost(*k)).collect();
        let speed_score = |value: f64| normalize_inverted(value, &latencies);
        let cost_score = |value: f64| normalize(value, &efficiencies);

        observed
            .into_iter()
            .map(|kind| {
                let samples = totals[&kind];
                let success_rate = rate(kind);
                let mean_latency_ms = mean_latency(kind);
                let score = SUCCESS_WEIGHT * success_rate
                    + SPEED_WEIGHT * speed_score(mean_latency_ms)
                    + COST_WEIGHT * cost_score(success_rate / unit_cost(kind));
                StrategyStats {
                    kind,
                    samples,
                    success_rate,
                    mean_latency_ms,
                    score,
                }
            })
            .collect()
    }
}

/// Min-max normalize where larger raw values are better. A lone value
/// (or all-equal values) scores 1.0.
fn normalize(value: f64, all: &[f64]) -> f64 {
    let min = all.iter().copied().fold(f64::INFINITY, f64::min);
    let max = all.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f64::EPSILON {
        return 1.0;
    }
    (value - min) / (max - min)
}

/// Min-max normalize where smaller raw values are better.
fn normalize_inverted(value: f64, all: &[f64]) -> f64 {
    let min = all.iter().copied().fold(f64::INFINITY, f64::min);
    let max = all.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f64::EPSILON {
        return 1.0;
    }
    (max - value) / (max - min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::StrategyOutcome;
    use std::time::Duration;

    fn record(
        log: &OutcomeLog,
        strategy: StrategyKind,
        succeeded: bool,
        latency_ms: u64,
        times: usize,
    ) {
        for _ in 0..times {
            log.record(StrategyOutcome {
                platform: Platform::ChatGpt,
                strategy,
                succeeded,
                latency: Duration::from_millis(latency_ms),
                error_class: if succeeded { None } else { Some("no_match") },
            });
        }
    }

    #[test]
    fn no_data_yields_the_default_priority() {
        let selector = AdaptiveSelector::new(Arc::new(OutcomeLog::new()));
        assert_eq!(
            selector.rank(Platform::ChatGpt),
            StrategyKind::DEFAULT_PRIORITY.to_vec()
        );
    }

    #[test]
    fn ranking_adapts_to_recorded_outcomes() {
        let log = Arc::new(OutcomeLog::new());
        record(&log, StrategyKind::RenderedDom, true, 900, 10);
        record(&log, StrategyKind::StaticMarkup, false, 150, 10);

        let selector = AdaptiveSelector::new(log);
        let order = selector.rank(Platform::ChatGpt);

        let rendered = order
            .iter()
            .position(|k| *k == StrategyKind::RenderedDom)
            .unwrap();
        let static_markup = order
            .iter()
            .position(|k| *k == StrategyKind::StaticMarkup)
            .unwrap();
        assert!(rendered < static_markup, "10 successes must outrank 10 failures");
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn sparse_data_does_not_promote() {
        let log = Arc::new(OutcomeLog::new());
        record(&log, StrategyKind::SemanticFallback, true, 4000, MIN_SAMPLES - 1);

        let selector = AdaptiveSelector::new(log);
        assert_eq!(
            selector.rank(Platform::ChatGpt),
            StrategyKind::DEFAULT_PRIORITY.to_vec()
        );
    }

    #[test]
    fn outcomes_for_other_platforms_are_ignored() {
        let log = Arc::new(OutcomeLog::new());
        record(&log, StrategyKind::SemanticFallback, true, 100, 10);

        let selector = AdaptiveSelector::new(log.clone());
        // All outcomes above are for ChatGPT; Claude stays on defaults.
        assert_eq!(
            selector.rank(Platform::Claude),
            StrategyKind::DEFAULT_PRIORITY.to_vec()
        );
    }

    #[test]
    fn score_blends_success_speed_and_cost() {
        let log = Arc::new(OutcomeLog::new());
        // Same success rate; static is faster and cheaper.
        record(&log, StrategyKind::StaticMarkup, true, 100, 5);
        record(&log, StrategyKind::RenderedDom, true, 2000, 5);

        let selector = AdaptiveSelector::new(log);
        let stats = selector.stats(Platform::ChatGpt);

        let get = |kind| stats.iter().find(|s| s.kind == kind).unwrap().score;
        assert!(get(StrategyKind::StaticMarkup) > get(StrategyKind::RenderedDom));

        // Both components maxed: 0.5 + 0.3 + 0.2 = 1.0 for static.
        assert!((get(StrategyKind::StaticMarkup) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn every_strategy_appears_exactly_once_in_a_ranking() {
        let log = Arc::new(OutcomeLog::new());
        record(&log, StrategyKind::CommunityRules, true, 100, 10);

        let selector = AdaptiveSelector::new(log);
        let order = selector.rank(Platform::ChatGpt);
        assert_eq!(order.len(), 5);
        let unique: std::collections::HashSet<_> = order.iter().collect();
        assert_eq!(unique.len(), 5);
        assert_eq!(order[0], StrategyKind::CommunityRules);
    }
}
