use serde::{Deserialize, Serialize};

/// Processor families ordered from least to most capable.
///
/// The derived `Ord` is the capability ordering used when matching a guest's
/// minimum processor type against a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    Pentium4,
    Pentium4Xeon,
    Core,
    Core2,
    Xeon,
}

/// Processor architectures ordered from least to most capable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProcessorArchitecture {
    I586,
    I686,
    X86_64,
}
