use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::PlannerError;

use super::{Cluster, DevicePath, Dom0, Hostname};

/// A run of extents consumed from a specific host disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalVolumeAllocation {
    pub host: Hostname,
    pub device: DevicePath,
    pub extents: u64,
}

impl PhysicalVolumeAllocation {
    pub fn new(host: impl Into<Hostname>, device: impl Into<DevicePath>, extents: u64) -> Self {
        Self {
            host: host.into(),
            device: device.into(),
            extents,
        }
    }
}

/// Primary and secondary backing volumes for one guest disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomUDiskPlacement {
    pub primary_volumes: Vec<PhysicalVolumeAllocation>,
    pub secondary_volumes: Vec<PhysicalVolumeAllocation>,
}

/// Where one guest runs and where its disks live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomUPlacement {
    pub primary_host: Hostname,
    pub secondary_host: Option<Hostname>,
    pub disks: BTreeMap<DevicePath, DomUDiskPlacement>,
}

/// A fully-assigned placement of every guest in the cluster.
///
/// Construction validates the structural invariants; a value of this type is
/// always safe to analyze. The search shares configurations freely and never
/// mutates one in place.
#[derive(Debug, Clone)]
pub struct Configuration {
    cluster: Arc<Cluster>,
    placements: BTreeMap<Hostname, DomUPlacement>,
}

impl Configuration {
    pub fn new(
        cluster: Arc<Cluster>,
        placements: BTreeMap<Hostname, DomUPlacement>,
    ) -> Result<Self, PlannerError> {
        let config = Self { cluster, placements };
        config.validate()?;
        Ok(config)
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub fn placements(&self) -> &BTreeMap<Hostname, DomUPlacement> {
        &self.placements
    }

    pub fn placement(&self, guest: &str) -> Option<&DomUPlacement> {
        self.placements.get(guest)
    }

    fn validate(&self) -> Result<(), PlannerError> {
        let invalid = |msg: String| Err(PlannerError::InvalidConfiguration(msg));

        for guest in self.cluster.guests.keys() {
            if !self.placements.contains_key(guest) {
                return invalid(format!("guest {} has no placement", guest));
            }
        }

        for (guest_name, placement) in &self.placements {
            let guest = match self.cluster.get_guest(guest_name) {
                Some(guest) => guest,
                None => return invalid(format!("placement references unknown guest {}", guest_name)),
            };

            let primary = match self.cluster.get_host(&placement.primary_host) {
                Some(host) => host,
                None => {
                    return invalid(format!(
                        "guest {} placed on unknown primary host {}",
                        guest_name, placement.primary_host
                    ))
                }
            };

            let secondary = match &placement.secondary_host {
                Some(hostname) => {
                    if *hostname == placement.primary_host {
                        return invalid(format!(
                            "guest {} has identical primary and secondary host {}",
                            guest_name, hostname
                        ));
                    }
                    match self.cluster.get_host(hostname) {
                        Some(host) => Some(host),
                        None => {
                            return invalid(format!(
                                "guest {} placed on unknown secondary host {}",
                                guest_name, hostname
                            ))
                        }
                    }
                }
                None => {
                    if guest.has_secondary_ram() {
                        return invalid(format!(
                            "guest {} reserves secondary RAM but has no secondary host",
                            guest_name
                        ));
                    }
                    None
                }
            };

            for device in placement.disks.keys() {
                if !guest.disks.contains_key(device) {
                    return invalid(format!(
                        "guest {} placement references unknown disk {}",
                        guest_name, device
                    ));
                }
            }

            for (device, disk) in &guest.disks {
                let disk_placement = match placement.disks.get(device) {
                    Some(disk_placement) => disk_placement,
                    None => {
                        return invalid(format!(
                            "guest {} disk {} has no volume placement",
                            guest_name, device
                        ))
                    }
                };

                let primary_extents = Self::check_volumes(
                    guest_name,
                    device,
                    &disk_placement.primary_volumes,
                    primary,
                    "primary",
                )?;
                if primary_extents != disk.extents {
                    return invalid(format!(
                        "guest {} disk {} primary volumes cover {} of {} extents",
                        guest_name, device, primary_extents, disk.extents
                    ));
                }

                match secondary {
                    Some(secondary) => {
                        let secondary_extents = Self::check_volumes(
                            guest_name,
                            device,
                            &disk_placement.secondary_volumes,
                            secondary,
                            "secondary",
                        )?;
                        if secondary_extents != disk.extents {
                            return invalid(format!(
                                "guest {} disk {} secondary volumes cover {} of {} extents",
                                guest_name, device, secondary_extents, disk.extents
                            ));
                        }
                    }
                    None => {
                        if !disk_placement.secondary_volumes.is_empty() {
                            return invalid(format!(
                                "guest {} disk {} has secondary volumes but no secondary host",
                                guest_name, device
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_volumes(
        guest: &str,
        device: &str,
        volumes: &[PhysicalVolumeAllocation],
        host: &Dom0,
        role: &str,
    ) -> Result<u64, PlannerError> {
        let mut total = 0u64;
        for volume in volumes {
            if volume.host != host.hostname {
                return Err(PlannerError::InvalidConfiguration(format!(
                    "guest {} disk {} {} volume on {} but {} host is {}",
                    guest, device, role, volume.host, role, host.hostname
                )));
            }
            if host.get_disk(&volume.device).is_none() {
                return Err(PlannerError::InvalidConfiguration(format!(
                    "guest {} disk {} {} volume on unknown device {}:{}",
                    guest, device, role, volume.host, volume.device
                )));
            }
            if volume.extents == 0 {
                return Err(PlannerError::InvalidConfiguration(format!(
                    "guest {} disk {} has an empty {} volume on {}:{}",
                    guest, device, role, volume.host, volume.device
                )));
            }
            total += volume.extents;
        }
        Ok(total)
    }

    /// Canonical byte encoding of the placement tuple.
    ///
    /// Two configurations of the same cluster are equal exactly when their
    /// fingerprints are equal; the search keys its closed set on this rather
    /// than retaining whole configurations.
    pub fn fingerprint(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for (guest, placement) in &self.placements {
            buf.extend_from_slice(guest.as_bytes());
            buf.push(0);
            buf.extend_from_slice(placement.primary_host.as_bytes());
            buf.push(0);
            if let Some(secondary) = &placement.secondary_host {
                buf.extend_from_slice(secondary.as_bytes());
            }
            buf.push(0);
            for (device, disk) in &placement.disks {
                buf.extend_from_slice(device.as_bytes());
                buf.push(0);
                for volume in &disk.primary_volumes {
                    buf.extend_from_slice(volume.host.as_bytes());
                    buf.push(0);
                    buf.extend_from_slice(volume.device.as_bytes());
                    buf.push(0);
                    buf.extend_from_slice(&volume.extents.to_be_bytes());
                }
                buf.push(1);
                for volume in &disk.secondary_volumes {
                    buf.extend_from_slice(volume.host.as_bytes());
                    buf.push(0);
                    buf.extend_from_slice(volume.device.as_bytes());
                    buf.push(0);
                    buf.extend_from_slice(&volume.extents.to_be_bytes());
                }
                buf.push(2);
            }
            buf.push(3);
        }
        buf
    }
}

impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.cluster.name == other.cluster.name && self.placements == other.placements
    }
}

impl Eq for Configuration {}

impl Hash for Configuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cluster.name.hash(state);
        self.placements.hash(state);
    }
}
