// VM Placement Rebalancer Library
// Analyzes a cluster of hypervisor hosts and searches for a reconfiguration
// path that clears every resource, capability, and failover violation.

pub mod models;
pub mod analysis;
pub mod heuristics;
pub mod moves;
pub mod generator;
pub mod optimizer;

pub use models::{Cluster, Configuration, Dom0, Dom0Disk, DomU, DomUDisk};
pub use analysis::{AlertLevel, ClusterAnalysis, ResultSink, ResultValue, RuleResult};
pub use heuristics::{ExponentialHeuristic, HeuristicFunction, LeastInformedHeuristic};
pub use moves::{MigrationPlan, Move, PlanSummary};
pub use optimizer::{CancellationToken, OptimizeOptions, OptimizeOutcome, Optimizer};

use std::sync::Arc;

/// Main entry point for generating reconfiguration plans
pub struct ClusterPlanner {
    optimizer: Optimizer,
}

impl ClusterPlanner {
    pub fn new(heuristic: Box<dyn HeuristicFunction>) -> Self {
        Self {
            optimizer: Optimizer::new(heuristic),
        }
    }

    pub fn with_options(heuristic: Box<dyn HeuristicFunction>, options: OptimizeOptions) -> Self {
        Self {
            optimizer: Optimizer::with_options(heuristic, options),
        }
    }

    /// Search for a reconfiguration path from the given placement to an
    /// optimal one.
    pub fn generate_plan(&self, initial: &Arc<Configuration>) -> OptimizeOutcome {
        self.optimizer.optimize(initial.clone())
    }

    /// Check what the analyzer dislikes about a placement
    pub fn check_violations(&self, config: &Configuration) -> Vec<RuleResult> {
        ClusterAnalysis::new(config).collect_results(AlertLevel::Low)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid move: {0}")]
    InvalidMove(String),
}
