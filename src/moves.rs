use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{Configuration, DevicePath, Hostname};

/// A single legal transition between configurations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    /// Swap the primary and secondary roles of a guest; its volumes stay
    /// where they are and trade roles with the hosts.
    SwapRoles { guest: Hostname },

    /// Point a guest's failover at a different host, relocating the
    /// secondary copy of every guest disk onto it.
    ReassignSecondary {
        guest: Hostname,
        new_secondary: Hostname,
        extents: u64,
    },

    /// Re-lay the secondary volumes of one guest disk onto a different drive
    /// of the same secondary host.
    MigrateSecondaryVolumes {
        guest: Hostname,
        disk: DevicePath,
        target_disk: DevicePath,
        extents: u64,
    },
}

impl Move {
    /// Estimate the cost/impact of this move.
    pub fn cost(&self) -> MoveCost {
        match self {
            Move::SwapRoles { .. } => MoveCost {
                extents_copied: 0,
                // Suspend, final sync, resume on the other host.
                estimated_duration_secs: 30,
            },
            Move::ReassignSecondary { extents, .. } => MoveCost {
                extents_copied: *extents,
                estimated_duration_secs: extents / 256 + 60,
            },
            Move::MigrateSecondaryVolumes { extents, .. } => MoveCost {
                extents_copied: *extents,
                estimated_duration_secs: extents / 256 + 10,
            },
        }
    }

    /// The guest this move touches.
    pub fn guest(&self) -> &str {
        match self {
            Move::SwapRoles { guest }
            | Move::ReassignSecondary { guest, .. }
            | Move::MigrateSecondaryVolumes { guest, .. } => guest,
        }
    }

    /// Hosts whose load changes when this move is applied to `before`.
    pub fn affected_hosts(&self, before: &Configuration) -> Vec<Hostname> {
        let placement = match before.placement(self.guest()) {
            Some(placement) => placement,
            None => return Vec::new(),
        };
        match self {
            Move::SwapRoles { .. } | Move::MigrateSecondaryVolumes { .. } => {
                let mut hosts = vec![placement.primary_host.clone()];
                hosts.extend(placement.secondary_host.clone());
                hosts
            }
            Move::ReassignSecondary { new_secondary, .. } => {
                let mut hosts = vec![placement.primary_host.clone()];
                hosts.extend(placement.secondary_host.clone());
                hosts.push(new_secondary.clone());
                hosts
            }
        }
    }

    /// Get a human-readable description.
    pub fn description(&self) -> String {
        match self {
            Move::SwapRoles { guest } => {
                format!("Swap primary and secondary roles of {}", guest)
            }
            Move::ReassignSecondary {
                guest,
                new_secondary,
                extents,
            } => format!(
                "Reassign secondary of {} to {} ({} extents)",
                guest, new_secondary, extents
            ),
            Move::MigrateSecondaryVolumes {
                guest,
                disk,
                target_disk,
                extents,
            } => format!(
                "Migrate secondary volumes of {}:{} to {} ({} extents)",
                guest, disk, target_disk, extents
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MoveCost {
    pub extents_copied: u64,
    pub estimated_duration_secs: u64,
}

/// An ordered reconfiguration path from the initial placement to an optimal
/// one. `configurations[0]` is the initial configuration and each move maps
/// `configurations[i]` to `configurations[i + 1]`.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub moves: Vec<Move>,
    pub configurations: Vec<Arc<Configuration>>,
    pub metadata: PlanMetadata,
}

impl MigrationPlan {
    pub fn new(moves: Vec<Move>, configurations: Vec<Arc<Configuration>>) -> Self {
        Self {
            moves,
            configurations,
            metadata: PlanMetadata::default(),
        }
    }

    pub fn initial_configuration(&self) -> &Arc<Configuration> {
        &self.configurations[0]
    }

    pub fn final_configuration(&self) -> &Arc<Configuration> {
        self.configurations
            .last()
            .expect("a plan always holds the initial configuration")
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn total_extents_copied(&self) -> u64 {
        self.moves.iter().map(|m| m.cost().extents_copied).sum()
    }

    pub fn estimated_duration_secs(&self) -> u64 {
        self.moves.iter().map(|m| m.cost().estimated_duration_secs).sum()
    }

    /// Group consecutive moves whose affected hosts are disjoint, so they can
    /// run concurrently without reordering the plan.
    pub fn batch_moves(&self, max_concurrent: usize) -> Vec<Vec<&Move>> {
        let mut batches = Vec::new();
        let mut current_batch: Vec<&Move> = Vec::new();
        let mut affected_hosts: HashSet<Hostname> = HashSet::new();

        for (index, step) in self.moves.iter().enumerate() {
            let step_hosts = step.affected_hosts(&self.configurations[index]);

            let has_conflict = step_hosts.iter().any(|h| affected_hosts.contains(h));
            if has_conflict || current_batch.len() >= max_concurrent {
                if !current_batch.is_empty() {
                    batches.push(current_batch);
                    current_batch = Vec::new();
                    affected_hosts.clear();
                }
            }

            current_batch.push(step);
            affected_hosts.extend(step_hosts);
        }

        if !current_batch.is_empty() {
            batches.push(current_batch);
        }

        batches
    }

    /// Get summary statistics.
    pub fn summary(&self) -> PlanSummary {
        let mut swap_count = 0;
        let mut reassign_count = 0;
        let mut migrate_count = 0;

        for step in &self.moves {
            match step {
                Move::SwapRoles { .. } => swap_count += 1,
                Move::ReassignSecondary { .. } => reassign_count += 1,
                Move::MigrateSecondaryVolumes { .. } => migrate_count += 1,
            }
        }

        PlanSummary {
            total_moves: self.moves.len(),
            swap_count,
            reassign_count,
            migrate_count,
            total_extents_copied: self.total_extents_copied(),
            estimated_duration_secs: self.estimated_duration_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub heuristic: String,
    pub expanded_nodes: usize,
    pub cluster_stats: Option<ClusterStats>,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            created_at: Some(chrono::Utc::now()),
            heuristic: String::new(),
            expanded_nodes: 0,
            cluster_stats: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStats {
    pub host_count: usize,
    pub guest_count: usize,
    pub guest_disk_count: usize,
}

impl ClusterStats {
    pub fn of(config: &Configuration) -> Self {
        let cluster = config.cluster();
        Self {
            host_count: cluster.hosts.len(),
            guest_count: cluster.guests.len(),
            guest_disk_count: cluster.guests().map(|g| g.disks.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_moves: usize,
    pub swap_count: usize,
    pub reassign_count: usize,
    pub migrate_count: usize,
    pub total_extents_copied: u64,
    pub estimated_duration_secs: u64,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total Moves: {}, Swaps: {}, Secondary Reassignments: {}, Volume Migrations: {}, Extents Copied: {}, Duration: {}s",
            self.total_moves,
            self.swap_count,
            self.reassign_count,
            self.migrate_count,
            self.total_extents_copied,
            self.estimated_duration_secs
        )
    }
}
