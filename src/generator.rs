use std::sync::Arc;

use crate::models::{Configuration, DomUPlacement, PhysicalVolumeAllocation};
use crate::moves::Move;
use crate::PlannerError;

/// Applies one move to a configuration, producing the next configuration.
///
/// The result passes the same structural validation as any hand-built
/// configuration; a move that cannot be applied legally is an error, not a
/// silently unchanged placement.
pub fn apply(config: &Configuration, step: &Move) -> Result<Configuration, PlannerError> {
    let invalid = |msg: String| PlannerError::InvalidMove(msg);
    let guest_name = step.guest();
    let placement = config
        .placement(guest_name)
        .ok_or_else(|| invalid(format!("move references unknown guest {}", guest_name)))?;

    let mut next = placement.clone();
    match step {
        Move::SwapRoles { .. } => {
            let secondary = placement
                .secondary_host
                .clone()
                .ok_or_else(|| invalid(format!("guest {} has no secondary to swap", guest_name)))?;
            next.primary_host = secondary;
            next.secondary_host = Some(placement.primary_host.clone());
            for disk in next.disks.values_mut() {
                std::mem::swap(&mut disk.primary_volumes, &mut disk.secondary_volumes);
            }
        }
        Move::ReassignSecondary { new_secondary, .. } => {
            if placement.secondary_host.is_none() {
                return Err(invalid(format!(
                    "guest {} has no secondary to reassign",
                    guest_name
                )));
            }
            if *new_secondary == placement.primary_host {
                return Err(invalid(format!(
                    "guest {} cannot fail over to its own primary host {}",
                    guest_name, new_secondary
                )));
            }
            if placement.secondary_host.as_deref() == Some(new_secondary.as_str()) {
                return Err(invalid(format!(
                    "guest {} already fails over to {}",
                    guest_name, new_secondary
                )));
            }
            let host = config
                .cluster()
                .get_host(new_secondary)
                .ok_or_else(|| invalid(format!("unknown secondary host {}", new_secondary)))?;
            let guest = config
                .cluster()
                .get_guest(guest_name)
                .expect("placement references a guest missing from the cluster");
            // Land every disk on the new host's first drive; volume migration
            // moves refine the layout from there.
            let first_device = host.disks.keys().next();
            next.secondary_host = Some(new_secondary.clone());
            for (device, disk_placement) in next.disks.iter_mut() {
                let extents = guest
                    .disks
                    .get(device)
                    .expect("placement references a disk missing from the guest")
                    .extents;
                let target = first_device.ok_or_else(|| {
                    invalid(format!("host {} has no drives for guest storage", new_secondary))
                })?;
                disk_placement.secondary_volumes =
                    vec![PhysicalVolumeAllocation::new(new_secondary.clone(), target.clone(), extents)];
            }
        }
        Move::MigrateSecondaryVolumes { disk, target_disk, .. } => {
            let secondary = placement
                .secondary_host
                .clone()
                .ok_or_else(|| invalid(format!("guest {} has no secondary storage", guest_name)))?;
            let host = config
                .cluster()
                .get_host(&secondary)
                .expect("placement references a host missing from the cluster");
            if host.get_disk(target_disk).is_none() {
                return Err(invalid(format!(
                    "host {} has no drive {}",
                    secondary, target_disk
                )));
            }
            let guest = config
                .cluster()
                .get_guest(guest_name)
                .expect("placement references a guest missing from the cluster");
            let extents = guest
                .disks
                .get(disk)
                .ok_or_else(|| invalid(format!("guest {} has no disk {}", guest_name, disk)))?
                .extents;
            let disk_placement = next
                .disks
                .get_mut(disk)
                .ok_or_else(|| invalid(format!("guest {} disk {} is not placed", guest_name, disk)))?;
            disk_placement.secondary_volumes =
                vec![PhysicalVolumeAllocation::new(secondary, target_disk.clone(), extents)];
        }
    }

    let mut placements = config.placements().clone();
    placements.insert(guest_name.to_string(), next);
    Configuration::new(config.cluster().clone(), placements)
}

/// Enumerates every legal single-step transition from a configuration.
///
/// The order is fixed: guests by hostname; for each guest a role swap, then
/// secondary reassignment to each other host by hostname, then secondary
/// volume migration of each guest disk to each other drive by device path.
/// Candidates failing structural validation are filtered here, before the
/// analyzer ever sees them.
pub fn successors(config: &Configuration) -> Vec<(Move, Arc<Configuration>)> {
    let mut result = Vec::new();
    let cluster = config.cluster();

    for (guest_name, placement) in config.placements() {
        let current_secondary = match &placement.secondary_host {
            Some(secondary) => secondary,
            None => continue,
        };

        push_if_legal(config, Move::SwapRoles { guest: guest_name.clone() }, &mut result);

        let guest = cluster
            .get_guest(guest_name)
            .expect("placement references a guest missing from the cluster");
        let total_extents: u64 = guest.disks.values().map(|d| d.extents).sum();
        for hostname in cluster.hosts.keys() {
            if *hostname == placement.primary_host || hostname == current_secondary {
                continue;
            }
            push_if_legal(
                config,
                Move::ReassignSecondary {
                    guest: guest_name.clone(),
                    new_secondary: hostname.clone(),
                    extents: total_extents,
                },
                &mut result,
            );
        }

        let secondary_host = cluster
            .get_host(current_secondary)
            .expect("placement references a host missing from the cluster");
        for (device, disk_placement) in &placement.disks {
            if disk_placement.secondary_volumes.is_empty() {
                continue;
            }
            let extents = guest
                .disks
                .get(device)
                .expect("placement references a disk missing from the guest")
                .extents;
            for target_device in secondary_host.disks.keys() {
                if is_single_volume_on(placement, device, target_device) {
                    continue;
                }
                push_if_legal(
                    config,
                    Move::MigrateSecondaryVolumes {
                        guest: guest_name.clone(),
                        disk: device.clone(),
                        target_disk: target_device.clone(),
                        extents,
                    },
                    &mut result,
                );
            }
        }
    }

    result
}

fn is_single_volume_on(placement: &DomUPlacement, disk: &str, device: &str) -> bool {
    let volumes = &placement.disks[disk].secondary_volumes;
    volumes.len() == 1 && volumes[0].device == device
}

fn push_if_legal(
    config: &Configuration,
    step: Move,
    out: &mut Vec<(Move, Arc<Configuration>)>,
) {
    if let Ok(next) = apply(config, &step) {
        out.push((step, Arc::new(next)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Cluster, Dom0, Dom0Disk, DomU, DomUDisk, DomUDiskPlacement, DomUPlacement,
        PhysicalVolumeAllocation, ProcessorArchitecture, ProcessorType,
    };
    use std::collections::BTreeMap;

    fn three_host_config() -> Configuration {
        let mut cluster = Cluster::new("test");
        for hostname in ["a", "b", "c"] {
            let mut host = Dom0::new(
                hostname,
                16384,
                ProcessorType::Xeon,
                ProcessorArchitecture::X86_64,
                2400,
                4,
                true,
            );
            host.add_disk(Dom0Disk::new("/dev/sda", 7200));
            host.add_disk(Dom0Disk::new("/dev/sdb", 7200));
            cluster.add_host(host);
        }
        let mut guest = DomU::new(
            "www1",
            4096,
            4096,
            1,
            512,
            None,
            ProcessorArchitecture::I686,
            -1,
            false,
        );
        guest.add_disk(DomUDisk::new("/dev/xvda", 100, -1, 256));
        cluster.add_guest(guest);

        let mut disks = BTreeMap::new();
        disks.insert(
            "/dev/xvda".to_string(),
            DomUDiskPlacement {
                primary_volumes: vec![PhysicalVolumeAllocation::new("a", "/dev/sda", 100)],
                secondary_volumes: vec![PhysicalVolumeAllocation::new("b", "/dev/sda", 100)],
            },
        );
        let mut placements = BTreeMap::new();
        placements.insert(
            "www1".to_string(),
            DomUPlacement {
                primary_host: "a".to_string(),
                secondary_host: Some("b".to_string()),
                disks,
            },
        );
        Configuration::new(std::sync::Arc::new(cluster), placements).unwrap()
    }

    #[test]
    fn test_successor_enumeration() {
        let config = three_host_config();
        let successors = successors(&config);

        // One swap, one reassignment (to c), one volume migration (b:/dev/sdb).
        assert_eq!(successors.len(), 3);
        assert!(matches!(successors[0].0, Move::SwapRoles { .. }));
        assert!(
            matches!(&successors[1].0, Move::ReassignSecondary { new_secondary, .. } if new_secondary == "c")
        );
        assert!(
            matches!(&successors[2].0, Move::MigrateSecondaryVolumes { target_disk, .. } if target_disk == "/dev/sdb")
        );
    }

    #[test]
    fn test_successors_are_deterministic() {
        let config = three_host_config();
        let first = successors(&config);
        let second = successors(&config);
        assert_eq!(
            first.iter().map(|(m, _)| m.clone()).collect::<Vec<_>>(),
            second.iter().map(|(m, _)| m.clone()).collect::<Vec<_>>()
        );
        for ((_, a), (_, b)) in first.iter().zip(&second) {
            assert_eq!(a.fingerprint(), b.fingerprint());
        }
    }

    #[test]
    fn test_successors_differ_from_parent_and_replay() {
        let config = three_host_config();
        for (step, next) in successors(&config) {
            assert_ne!(next.fingerprint(), config.fingerprint());
            let replayed = apply(&config, &step).unwrap();
            assert_eq!(replayed.fingerprint(), next.fingerprint());
        }
    }

    #[test]
    fn test_swap_exchanges_roles_and_volumes() {
        let config = three_host_config();
        let swapped = apply(&config, &Move::SwapRoles { guest: "www1".to_string() }).unwrap();
        let placement = swapped.placement("www1").unwrap();
        assert_eq!(placement.primary_host, "b");
        assert_eq!(placement.secondary_host.as_deref(), Some("a"));
        let disk = &placement.disks["/dev/xvda"];
        assert_eq!(disk.primary_volumes[0].host, "b");
        assert_eq!(disk.secondary_volumes[0].host, "a");
    }

    #[test]
    fn test_reassign_relocates_secondary_volumes() {
        let config = three_host_config();
        let moved = apply(
            &config,
            &Move::ReassignSecondary {
                guest: "www1".to_string(),
                new_secondary: "c".to_string(),
                extents: 100,
            },
        )
        .unwrap();
        let placement = moved.placement("www1").unwrap();
        assert_eq!(placement.secondary_host.as_deref(), Some("c"));
        let disk = &placement.disks["/dev/xvda"];
        assert_eq!(disk.secondary_volumes.len(), 1);
        assert_eq!(disk.secondary_volumes[0].host, "c");
        assert_eq!(disk.secondary_volumes[0].extents, 100);
        // Primary volumes stay put.
        assert_eq!(disk.primary_volumes[0].host, "a");
    }

    #[test]
    fn test_reassign_to_primary_is_rejected() {
        let config = three_host_config();
        let result = apply(
            &config,
            &Move::ReassignSecondary {
                guest: "www1".to_string(),
                new_secondary: "a".to_string(),
                extents: 100,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_no_moves_without_secondary() {
        let mut cluster = Cluster::new("test");
        cluster.add_host(Dom0::new(
            "a",
            16384,
            ProcessorType::Xeon,
            ProcessorArchitecture::X86_64,
            2400,
            4,
            true,
        ));
        cluster.add_guest(DomU::new(
            "www1",
            4096,
            -1,
            1,
            512,
            None,
            ProcessorArchitecture::I686,
            -1,
            false,
        ));
        let mut placements = BTreeMap::new();
        placements.insert(
            "www1".to_string(),
            DomUPlacement {
                primary_host: "a".to_string(),
                secondary_host: None,
                disks: BTreeMap::new(),
            },
        );
        let config = Configuration::new(std::sync::Arc::new(cluster), placements).unwrap();
        assert!(successors(&config).is_empty());
    }

    #[test]
    fn test_migrate_rejects_unknown_drive() {
        let config = three_host_config();
        let result = apply(
            &config,
            &Move::MigrateSecondaryVolumes {
                guest: "www1".to_string(),
                disk: "/dev/xvda".to_string(),
                target_disk: "/dev/sdz".to_string(),
                extents: 100,
            },
        );
        assert!(result.is_err());
    }
}
