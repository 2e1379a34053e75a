use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::analysis::{AlertLevel, ClusterAnalysis};
use crate::generator::successors;
use crate::heuristics::HeuristicFunction;
use crate::models::Configuration;
use crate::moves::{ClusterStats, MigrationPlan, Move};

/// Cooperative cancellation flag, checked once per node expansion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Bounds on a single optimization run.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Floor for the goal test: a configuration is done when no rule at or
    /// above this level reports anything.
    pub goal_level: AlertLevel,
    /// Cap on expanded nodes; None is unbounded.
    pub max_expanded_nodes: Option<usize>,
    pub cancellation: CancellationToken,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            goal_level: AlertLevel::Low,
            max_expanded_nodes: None,
            cancellation: CancellationToken::new(),
        }
    }
}

/// How an optimization run ended. Everything here is a normal outcome;
/// running out of frontier or allotted work is not an error.
#[derive(Debug)]
pub enum OptimizeOutcome {
    /// An optimal configuration was reached; the plan holds the path.
    Plan(MigrationPlan),
    /// The frontier emptied without reaching an optimal configuration.
    Exhausted { expanded_nodes: usize },
    /// The expanded-node cap cut the run short.
    NodeCapReached { expanded_nodes: usize },
    /// The caller cancelled the run.
    Cancelled { expanded_nodes: usize },
}

impl OptimizeOutcome {
    pub fn plan(self) -> Option<MigrationPlan> {
        match self {
            OptimizeOutcome::Plan(plan) => Some(plan),
            _ => None,
        }
    }
}

struct PathNode {
    config: Arc<Configuration>,
    /// The move that produced this configuration; None on the initial node.
    step: Option<Move>,
    parent: Option<Arc<PathNode>>,
    depth: u32,
}

struct FrontierEntry {
    f: u64,
    depth: u32,
    sequence: u64,
    node: Arc<PathNode>,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.depth == other.depth && self.sequence == other.sequence
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the maximum, so compare reversed: lowest f first,
        // then shallower nodes, then earlier generation.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Best-first search over configurations.
///
/// The frontier is ordered by `f = h(c, g)`; the closed set and the
/// best-seen table are keyed by configuration fingerprints rather than whole
/// configurations, which keeps the dominant allocation compact.
pub struct Optimizer {
    heuristic: Box<dyn HeuristicFunction>,
    options: OptimizeOptions,
}

impl Optimizer {
    pub fn new(heuristic: Box<dyn HeuristicFunction>) -> Self {
        Self {
            heuristic,
            options: OptimizeOptions::default(),
        }
    }

    pub fn with_options(heuristic: Box<dyn HeuristicFunction>, options: OptimizeOptions) -> Self {
        Self { heuristic, options }
    }

    pub fn heuristic(&self) -> &dyn HeuristicFunction {
        self.heuristic.as_ref()
    }

    pub fn optimize(&self, initial: Arc<Configuration>) -> OptimizeOutcome {
        let mut frontier = BinaryHeap::new();
        let mut best_f: HashMap<Vec<u8>, u64> = HashMap::new();
        let mut closed: HashSet<Vec<u8>> = HashSet::new();
        let mut sequence = 0u64;
        let mut expanded_nodes = 0usize;

        let f = self.heuristic.evaluate(&initial, 0);
        best_f.insert(initial.fingerprint(), f);
        frontier.push(FrontierEntry {
            f,
            depth: 0,
            sequence,
            node: Arc::new(PathNode {
                config: initial,
                step: None,
                parent: None,
                depth: 0,
            }),
        });

        while let Some(entry) = frontier.pop() {
            let fingerprint = entry.node.config.fingerprint();
            if closed.contains(&fingerprint) {
                // A better route to this placement was already expanded.
                continue;
            }

            let analysis = ClusterAnalysis::new(&entry.node.config);
            if analysis.is_optimal_at(self.options.goal_level) {
                log::debug!(
                    "optimal configuration found at depth {} after {} expansions",
                    entry.node.depth,
                    expanded_nodes
                );
                return OptimizeOutcome::Plan(self.build_plan(&entry.node, expanded_nodes));
            }

            if self.options.cancellation.is_cancelled() {
                log::debug!("search cancelled after {} expansions", expanded_nodes);
                return OptimizeOutcome::Cancelled { expanded_nodes };
            }
            if let Some(cap) = self.options.max_expanded_nodes {
                if expanded_nodes >= cap {
                    log::debug!("node cap of {} reached", cap);
                    return OptimizeOutcome::NodeCapReached { expanded_nodes };
                }
            }

            closed.insert(fingerprint);
            expanded_nodes += 1;
            log::trace!(
                "expanding depth {} with f = {} ({} nodes so far)",
                entry.node.depth,
                entry.f,
                expanded_nodes
            );

            let depth = entry.node.depth + 1;
            for (step, config) in successors(&entry.node.config) {
                let fingerprint = config.fingerprint();
                if closed.contains(&fingerprint) {
                    continue;
                }
                let f = self.heuristic.evaluate(&config, depth);
                if let Some(&seen) = best_f.get(&fingerprint) {
                    if seen <= f {
                        continue;
                    }
                }
                best_f.insert(fingerprint, f);
                sequence += 1;
                frontier.push(FrontierEntry {
                    f,
                    depth,
                    sequence,
                    node: Arc::new(PathNode {
                        config,
                        step: Some(step),
                        parent: Some(entry.node.clone()),
                        depth,
                    }),
                });
            }
        }

        log::debug!("frontier exhausted after {} expansions", expanded_nodes);
        OptimizeOutcome::Exhausted { expanded_nodes }
    }

    fn build_plan(&self, node: &Arc<PathNode>, expanded_nodes: usize) -> MigrationPlan {
        let mut moves = Vec::new();
        let mut configurations = Vec::new();
        let mut current = Some(node.clone());
        while let Some(path_node) = current {
            configurations.push(path_node.config.clone());
            if let Some(step) = &path_node.step {
                moves.push(step.clone());
            }
            current = path_node.parent.clone();
        }
        moves.reverse();
        configurations.reverse();

        let mut plan = MigrationPlan::new(moves, configurations);
        plan.metadata.heuristic = self.heuristic.name().to_string();
        plan.metadata.expanded_nodes = expanded_nodes;
        plan.metadata.cluster_stats = Some(ClusterStats::of(plan.initial_configuration()));
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::apply;
    use crate::heuristics::{ExponentialHeuristic, LeastInformedHeuristic};
    use crate::models::{
        Cluster, Dom0, DomU, DomUPlacement, ProcessorArchitecture, ProcessorType,
    };
    use std::collections::BTreeMap;

    fn host(hostname: &str, ram: u32) -> Dom0 {
        Dom0::new(
            hostname,
            ram,
            ProcessorType::Xeon,
            ProcessorArchitecture::X86_64,
            2400,
            4,
            true,
        )
    }

    fn diskless_guest(hostname: &str, primary_ram: u32, secondary_ram: i32) -> DomU {
        DomU::new(
            hostname,
            primary_ram,
            secondary_ram,
            1,
            512,
            None,
            ProcessorArchitecture::I686,
            -1,
            false,
        )
    }

    fn place(primary: &str, secondary: Option<&str>) -> DomUPlacement {
        DomUPlacement {
            primary_host: primary.to_string(),
            secondary_host: secondary.map(str::to_string),
            disks: BTreeMap::new(),
        }
    }

    /// Guest overcommits its small primary; swapping roles fixes it.
    fn swap_fixes_it() -> Arc<Configuration> {
        let mut cluster = Cluster::new("test");
        cluster.add_host(host("small", 8192));
        cluster.add_host(host("big", 16384));
        cluster.add_guest(diskless_guest("www1", 12288, 2048));
        let mut placements = BTreeMap::new();
        placements.insert("www1".to_string(), place("small", Some("big")));
        Arc::new(Configuration::new(Arc::new(cluster), placements).unwrap())
    }

    /// Swapping fixes the primary overcommit but leaves the old primary as an
    /// overloaded failover target; the secondary must then move on.
    fn two_moves_needed() -> Arc<Configuration> {
        let mut cluster = Cluster::new("test");
        cluster.add_host(host("a", 8192));
        cluster.add_host(host("b", 16384));
        cluster.add_host(host("c", 16384));
        cluster.add_guest(diskless_guest("www1", 12288, 12288));
        let mut placements = BTreeMap::new();
        placements.insert("www1".to_string(), place("a", Some("b")));
        Arc::new(Configuration::new(Arc::new(cluster), placements).unwrap())
    }

    #[test]
    fn test_critical_violation_fixed_by_swap() {
        let initial = swap_fixes_it();
        assert!(!ClusterAnalysis::new(&initial).is_optimal());

        let optimizer = Optimizer::new(Box::new(ExponentialHeuristic));
        let plan = optimizer.optimize(initial.clone()).plan().expect("plan expected");

        assert!(!plan.is_empty());
        assert_eq!(plan.initial_configuration().fingerprint(), initial.fingerprint());
        assert!(ClusterAnalysis::new(plan.final_configuration()).is_optimal());
        assert_eq!(plan.moves.len(), 1);
        assert!(matches!(plan.moves[0], Move::SwapRoles { .. }));
        assert_eq!(plan.metadata.heuristic, "ExponentialHeuristic");
    }

    #[test]
    fn test_violation_scores_decrease_along_path() {
        let initial = two_moves_needed();
        let optimizer = Optimizer::new(Box::new(ExponentialHeuristic));
        let plan = optimizer.optimize(initial).plan().expect("plan expected");

        assert_eq!(plan.moves.len(), 2);
        assert!(ClusterAnalysis::new(plan.final_configuration()).is_optimal());

        // Violation weight (h at depth zero) falls strictly along this path.
        let scores: Vec<u64> = plan
            .configurations
            .iter()
            .map(|config| ExponentialHeuristic.evaluate(config, 0))
            .collect();
        for pair in scores.windows(2) {
            assert!(pair[1] < pair[0], "scores did not decrease: {:?}", scores);
        }
        assert_eq!(*scores.last().unwrap(), 0);
    }

    #[test]
    fn test_replaying_the_plan_reaches_the_final_configuration() {
        let initial = two_moves_needed();
        let optimizer = Optimizer::new(Box::new(ExponentialHeuristic));
        let plan = optimizer.optimize(initial.clone()).plan().expect("plan expected");

        let mut current = (*initial).clone();
        for step in &plan.moves {
            current = apply(&current, step).expect("every plan step must be legal");
        }
        assert_eq!(current.fingerprint(), plan.final_configuration().fingerprint());
    }

    #[test]
    fn test_search_is_deterministic() {
        let first = Optimizer::new(Box::new(ExponentialHeuristic))
            .optimize(two_moves_needed())
            .plan()
            .expect("plan expected");
        let second = Optimizer::new(Box::new(ExponentialHeuristic))
            .optimize(two_moves_needed())
            .plan()
            .expect("plan expected");
        assert_eq!(first.moves, second.moves);
    }

    #[test]
    fn test_optimal_initial_yields_empty_plan() {
        let mut cluster = Cluster::new("test");
        cluster.add_host(host("alpha", 16384));
        cluster.add_guest(diskless_guest("www1", 4096, -1));
        let mut placements = BTreeMap::new();
        placements.insert("www1".to_string(), place("alpha", None));
        let initial = Arc::new(Configuration::new(Arc::new(cluster), placements).unwrap());

        let plan = Optimizer::new(Box::new(LeastInformedHeuristic))
            .optimize(initial)
            .plan()
            .expect("plan expected");
        assert!(plan.is_empty());
        assert_eq!(plan.configurations.len(), 1);
    }

    #[test]
    fn test_unfixable_cluster_exhausts() {
        // A single host with no failover options has no moves at all.
        let mut cluster = Cluster::new("test");
        cluster.add_host(host("alpha", 8192));
        cluster.add_guest(diskless_guest("www1", 12288, -1));
        let mut placements = BTreeMap::new();
        placements.insert("www1".to_string(), place("alpha", None));
        let initial = Arc::new(Configuration::new(Arc::new(cluster), placements).unwrap());

        let outcome = Optimizer::new(Box::new(ExponentialHeuristic)).optimize(initial);
        assert!(matches!(outcome, OptimizeOutcome::Exhausted { expanded_nodes: 1 }));
    }

    #[test]
    fn test_node_cap_bounds_the_run() {
        let options = OptimizeOptions {
            max_expanded_nodes: Some(0),
            ..Default::default()
        };
        let outcome = Optimizer::with_options(Box::new(ExponentialHeuristic), options)
            .optimize(swap_fixes_it());
        assert!(matches!(outcome, OptimizeOutcome::NodeCapReached { .. }));
    }

    #[test]
    fn test_cancellation_stops_the_run() {
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let options = OptimizeOptions {
            cancellation,
            ..Default::default()
        };
        let outcome = Optimizer::with_options(Box::new(ExponentialHeuristic), options)
            .optimize(swap_fixes_it());
        assert!(matches!(outcome, OptimizeOutcome::Cancelled { .. }));
    }
}
