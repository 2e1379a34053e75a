// Type aliases used across models
pub type Hostname = String;
pub type DevicePath = String;

// Module declarations
mod processor;
mod host;
mod guest;
mod cluster;
mod placement;

// Re-exports
pub use processor::{ProcessorArchitecture, ProcessorType};
pub use host::{Dom0, Dom0Disk};
pub use guest::{DomU, DomUDisk};
pub use cluster::Cluster;
pub use placement::{
    Configuration, DomUDiskPlacement, DomUPlacement, PhysicalVolumeAllocation,
};
