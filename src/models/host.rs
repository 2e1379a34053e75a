use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DevicePath, Hostname, ProcessorArchitecture, ProcessorType};

/// A physical hypervisor host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dom0 {
    pub hostname: Hostname,
    /// Installed RAM in MiB.
    pub ram: u32,
    pub processor_type: ProcessorType,
    pub processor_architecture: ProcessorArchitecture,
    /// Processor speed in MHz.
    pub processor_speed: i32,
    pub processor_cores: u16,
    pub supports_hvm: bool,
    /// Physical disks keyed by device path.
    pub disks: BTreeMap<DevicePath, Dom0Disk>,
}

impl Dom0 {
    pub fn new(
        hostname: impl Into<Hostname>,
        ram: u32,
        processor_type: ProcessorType,
        processor_architecture: ProcessorArchitecture,
        processor_speed: i32,
        processor_cores: u16,
        supports_hvm: bool,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            ram,
            processor_type,
            processor_architecture,
            processor_speed,
            processor_cores,
            supports_hvm,
            disks: BTreeMap::new(),
        }
    }

    pub fn add_disk(&mut self, disk: Dom0Disk) {
        self.disks.insert(disk.device.clone(), disk);
    }

    pub fn get_disk(&self, device: &str) -> Option<&Dom0Disk> {
        self.disks.get(device)
    }

    /// Total processor weight available for allocation, at 1024 per core.
    pub fn total_processor_weight(&self) -> i64 {
        self.processor_cores as i64 * 1024
    }
}

/// A physical disk on a Dom0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dom0Disk {
    pub device: DevicePath,
    /// Rotational speed indicator; -1 when unspecified.
    pub disk_speed: i32,
}

impl Dom0Disk {
    pub fn new(device: impl Into<DevicePath>, disk_speed: i32) -> Self {
        Self {
            device: device.into(),
            disk_speed,
        }
    }
}
