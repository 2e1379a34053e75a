use crate::analysis::{AlertLevel, ClusterAnalysis, RuleResult};
use crate::models::Configuration;

/// Estimates how far a configuration is from optimal, folding in the depth
/// `g` already spent reaching it so that equally-bad configurations prefer
/// shorter paths. Any optimal configuration must evaluate to exactly `g`.
pub trait HeuristicFunction: Send + Sync {
    /// Name of this heuristic, recorded in plan metadata.
    fn name(&self) -> &str;

    fn evaluate(&self, config: &Configuration, g: u32) -> u64;
}

/// Baseline heuristic: `g` when optimal, `g + 1` otherwise.
pub struct LeastInformedHeuristic;

impl HeuristicFunction for LeastInformedHeuristic {
    fn name(&self) -> &str {
        "LeastInformedHeuristic"
    }

    fn evaluate(&self, config: &Configuration, g: u32) -> u64 {
        let analysis = ClusterAnalysis::new(config);
        if analysis.is_optimal() {
            g as u64
        } else {
            g as u64 + 1
        }
    }
}

/// Adds up every non-optimal result, weighting higher levels exponentially so
/// the search clears hard violations before polishing lesser ones:
///
/// ```text
/// LOW      4
/// MEDIUM   8
/// HIGH     16
/// CRITICAL 1024
/// ```
///
/// The fold is local to each call, so one instance may serve any number of
/// concurrent searches.
pub struct ExponentialHeuristic;

fn alert_weight(level: AlertLevel) -> u64 {
    match level {
        // The floor filters NONE out before the fold; seeing one here means
        // the analyzer is broken.
        AlertLevel::None => panic!("analyzer emitted a NONE result above the LOW floor"),
        AlertLevel::Low => 4,
        AlertLevel::Medium => 8,
        AlertLevel::High => 16,
        AlertLevel::Critical => 1024,
    }
}

impl HeuristicFunction for ExponentialHeuristic {
    fn name(&self) -> &str {
        "ExponentialHeuristic"
    }

    fn evaluate(&self, config: &Configuration, g: u32) -> u64 {
        let analysis = ClusterAnalysis::new(config);
        let mut total = g as u64;
        analysis.all_results(
            &mut |result: RuleResult| {
                total += alert_weight(result.level);
                true
            },
            AlertLevel::Low,
        );
        total
    }
}
