use serde::{Deserialize, Serialize};

use crate::models::{
    Configuration, DomU, DomUPlacement, ProcessorArchitecture, ProcessorType,
};

/// Severity attached to each rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertLevel {
    None,
    Low,
    Medium,
    High,
    Critical,
}

/// Rule-specific payload carried by a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultValue {
    Int(Option<i64>),
    Bool(bool),
    Processor(Option<ProcessorType>),
    Architecture(ProcessorArchitecture),
}

/// One rule evaluation against one resource.
///
/// The deviation summarizes observed versus expected as a signed ratio:
/// negative is overcommit, positive is shortfall toward the limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub label: String,
    pub value: ResultValue,
    pub deviation: f64,
    pub level: AlertLevel,
}

/// Receives results as the analyzer produces them.
///
/// Returning false stops the current analyzer invocation; the sink is not
/// called again until the next invocation.
pub trait ResultSink {
    fn accept(&mut self, result: RuleResult) -> bool;
}

impl<F: FnMut(RuleResult) -> bool> ResultSink for F {
    fn accept(&mut self, result: RuleResult) -> bool {
        self(result)
    }
}

/// Retains every result it sees; never stops the analyzer.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub results: Vec<RuleResult>,
}

impl ResultSink for CollectingSink {
    fn accept(&mut self, result: RuleResult) -> bool {
        self.results.push(result);
        true
    }
}

/// Counts results without retaining them.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub count: usize,
}

impl ResultSink for CountingSink {
    fn accept(&mut self, _result: RuleResult) -> bool {
        self.count += 1;
        true
    }
}

// Module declarations
mod host;
mod disk;

// Re-exports
pub use host::Dom0Analysis;
pub use disk::Dom0DiskAnalysis;

/// Evaluates a configuration against the full rule catalogue.
///
/// The analyzer is pure: it holds no state beyond the borrowed configuration
/// and produces the same result stream for the same inputs. Rules run in a
/// fixed order, host by host, so streams are deterministic.
pub struct ClusterAnalysis<'a> {
    config: &'a Configuration,
}

impl<'a> ClusterAnalysis<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    pub fn configuration(&self) -> &'a Configuration {
        self.config
    }

    pub fn host_analyses(&self) -> impl Iterator<Item = Dom0Analysis<'a>> {
        let config = self.config;
        config.cluster().hosts().map(move |host| Dom0Analysis::new(config, host))
    }

    /// Drives every rule, host by host, stopping early when the sink asks to.
    ///
    /// Returns true when the rules were exhausted, false when the sink
    /// stopped the run.
    pub fn all_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        for host_analysis in self.host_analyses() {
            if !host_analysis.all_results(sink, minimum_alert_level) {
                return false;
            }
        }
        true
    }

    /// Materializes the result stream at the given floor, for reporting.
    pub fn collect_results(&self, minimum_alert_level: AlertLevel) -> Vec<RuleResult> {
        let mut sink = CollectingSink::default();
        self.all_results(&mut sink, minimum_alert_level);
        sink.results
    }

    /// True when no rule at the LOW floor reports anything above NONE.
    pub fn is_optimal(&self) -> bool {
        self.is_optimal_at(AlertLevel::Low)
    }

    /// True when no rule at the given floor reports anything above NONE.
    pub fn is_optimal_at(&self, minimum_alert_level: AlertLevel) -> bool {
        let mut found = false;
        self.all_results(
            &mut |result: RuleResult| {
                if result.level > AlertLevel::None {
                    found = true;
                    return false;
                }
                true
            },
            minimum_alert_level,
        );
        !found
    }
}

/// Placements joined with their guests, in guest hostname order.
pub(crate) fn guest_placements(
    config: &Configuration,
) -> impl Iterator<Item = (&DomU, &DomUPlacement)> {
    config.placements().iter().map(move |(name, placement)| {
        let guest = config
            .cluster()
            .get_guest(name)
            .expect("placement references a guest missing from the cluster");
        (guest, placement)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cluster, Dom0, Dom0Disk, DomU, DomUDisk, DomUDiskPlacement, DomUPlacement, PhysicalVolumeAllocation};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// Two hosts, two guests; alpha is overcommitted on RAM (CRITICAL) and
    /// the guest on beta wants a better processor than beta carries (LOW).
    fn strained_config() -> Configuration {
        let mut cluster = Cluster::new("test");

        let mut alpha = Dom0::new(
            "alpha",
            8192,
            ProcessorType::Core2,
            ProcessorArchitecture::X86_64,
            2400,
            4,
            true,
        );
        alpha.add_disk(Dom0Disk::new("/dev/sda", 7200));
        cluster.add_host(alpha);

        let mut beta = Dom0::new(
            "beta",
            16384,
            ProcessorType::Core,
            ProcessorArchitecture::X86_64,
            2400,
            4,
            true,
        );
        beta.add_disk(Dom0Disk::new("/dev/sda", 7200));
        cluster.add_host(beta);

        let mut big = DomU::new(
            "big",
            12288,
            -1,
            2,
            512,
            None,
            ProcessorArchitecture::I686,
            -1,
            false,
        );
        big.add_disk(DomUDisk::new("/dev/xvda", 50, -1, 256));
        cluster.add_guest(big);

        let mut picky = DomU::new(
            "picky",
            2048,
            -1,
            1,
            256,
            Some(ProcessorType::Xeon),
            ProcessorArchitecture::I686,
            -1,
            false,
        );
        picky.add_disk(DomUDisk::new("/dev/xvda", 50, -1, 256));
        cluster.add_guest(picky);

        let cluster = Arc::new(cluster);
        let mut placements = BTreeMap::new();
        for (guest, host) in [("big", "alpha"), ("picky", "beta")] {
            let mut disks = BTreeMap::new();
            disks.insert(
                "/dev/xvda".to_string(),
                DomUDiskPlacement {
                    primary_volumes: vec![PhysicalVolumeAllocation::new(host, "/dev/sda", 50)],
                    secondary_volumes: vec![],
                },
            );
            placements.insert(
                guest.to_string(),
                DomUPlacement {
                    primary_host: host.to_string(),
                    secondary_host: None,
                    disks,
                },
            );
        }
        Configuration::new(cluster, placements).unwrap()
    }

    #[test]
    fn test_analysis_is_pure() {
        let config = strained_config();
        let analysis = ClusterAnalysis::new(&config);
        let first = analysis.collect_results(AlertLevel::None);
        let second = analysis.collect_results(AlertLevel::None);
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_floor_monotonicity() {
        let config = strained_config();
        let analysis = ClusterAnalysis::new(&config);
        let at_low = analysis.collect_results(AlertLevel::Low);
        let at_high = analysis.collect_results(AlertLevel::High);

        // Everything at the higher floor appears at the lower floor, in order.
        let mut low_iter = at_low.iter();
        for result in &at_high {
            assert!(low_iter.any(|r| r == result));
        }
        // And the higher floor filtered out exactly the lesser levels.
        let filtered: Vec<_> = at_low
            .iter()
            .filter(|r| r.level >= AlertLevel::High)
            .cloned()
            .collect();
        assert_eq!(filtered, at_high);
    }

    #[test]
    fn test_optimal_iff_no_results_above_none() {
        let config = strained_config();
        let analysis = ClusterAnalysis::new(&config);
        assert!(!analysis.is_optimal());
        let results = analysis.collect_results(AlertLevel::Low);
        assert!(results.iter().any(|r| r.level > AlertLevel::None));

        // CRITICAL RAM on alpha and a LOW processor-type result on beta.
        assert!(results
            .iter()
            .any(|r| r.label == "Available RAM" && r.level == AlertLevel::Critical));
        assert!(results
            .iter()
            .any(|r| r.label == "picky" && r.level == AlertLevel::Low));
    }

    #[test]
    fn test_sink_short_circuit() {
        let config = strained_config();
        let analysis = ClusterAnalysis::new(&config);
        let total = analysis.collect_results(AlertLevel::None).len();
        assert!(total >= 2);

        let mut calls = 0usize;
        let exhausted = analysis.all_results(
            &mut |_: RuleResult| {
                calls += 1;
                false
            },
            AlertLevel::None,
        );
        assert!(!exhausted);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_counting_sink() {
        let config = strained_config();
        let analysis = ClusterAnalysis::new(&config);
        let mut counting = CountingSink::default();
        assert!(analysis.all_results(&mut counting, AlertLevel::Low));
        assert_eq!(counting.count, analysis.collect_results(AlertLevel::Low).len());
    }

    #[test]
    fn test_goal_floor_above_violation_reads_optimal() {
        let config = strained_config();
        let analysis = ClusterAnalysis::new(&config);
        // The worst problem is CRITICAL, so every floor at or below it sees it.
        assert!(!analysis.is_optimal_at(AlertLevel::Critical));
        // The LOW processor-type result disappears above its level.
        let at_medium = analysis.collect_results(AlertLevel::Medium);
        assert!(at_medium.iter().all(|r| r.level >= AlertLevel::Medium));
    }
}
