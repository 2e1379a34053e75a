use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DevicePath, Hostname, ProcessorArchitecture, ProcessorType};

/// A guest virtual machine scheduled onto the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomU {
    pub hostname: Hostname,
    /// RAM in MiB reserved on the primary host.
    pub primary_ram: u32,
    /// RAM in MiB reserved on the secondary host; -1 when the guest keeps no
    /// failover RAM reservation.
    pub secondary_ram: i32,
    pub processor_cores: u16,
    /// Processor entitlement on the 0-1024 scale; 1024 is one whole core.
    pub processor_weight: u16,
    pub minimum_processor_type: Option<ProcessorType>,
    pub minimum_processor_architecture: ProcessorArchitecture,
    /// Minimum processor speed in MHz; -1 when none.
    pub minimum_processor_speed: i32,
    pub requires_hvm: bool,
    /// Logical disks keyed by device path.
    pub disks: BTreeMap<DevicePath, DomUDisk>,
}

impl DomU {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hostname: impl Into<Hostname>,
        primary_ram: u32,
        secondary_ram: i32,
        processor_cores: u16,
        processor_weight: u16,
        minimum_processor_type: Option<ProcessorType>,
        minimum_processor_architecture: ProcessorArchitecture,
        minimum_processor_speed: i32,
        requires_hvm: bool,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            primary_ram,
            secondary_ram,
            processor_cores,
            processor_weight,
            minimum_processor_type,
            minimum_processor_architecture,
            minimum_processor_speed,
            requires_hvm,
            disks: BTreeMap::new(),
        }
    }

    pub fn add_disk(&mut self, disk: DomUDisk) {
        self.disks.insert(disk.device.clone(), disk);
    }

    /// Whether the guest reserves RAM on its secondary host.
    pub fn has_secondary_ram(&self) -> bool {
        self.secondary_ram != -1
    }

    /// Processor weight allocated on the primary host.
    pub fn allocated_processor_weight(&self) -> i64 {
        self.processor_cores as i64 * self.processor_weight as i64
    }
}

/// A logical disk attached to a guest, backed by physical volumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomUDisk {
    pub device: DevicePath,
    /// Total size in fixed-size extents.
    pub extents: u64,
    /// Minimum acceptable disk speed; -1 when none.
    pub minimum_disk_speed: i32,
    /// Share of the backing disk's bandwidth on the 0-1024 scale.
    pub weight: u16,
}

impl DomUDisk {
    pub fn new(device: impl Into<DevicePath>, extents: u64, minimum_disk_speed: i32, weight: u16) -> Self {
        Self {
            device: device.into(),
            extents,
            minimum_disk_speed,
            weight,
        }
    }
}
