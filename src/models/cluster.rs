use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Dom0, DomU, Hostname};

/// A named collection of hypervisor hosts and the guests scheduled on them.
///
/// Hosts and guests are kept in ordered maps so that analysis results and
/// successor enumeration come out in the same order on every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub hosts: BTreeMap<Hostname, Dom0>,
    pub guests: BTreeMap<Hostname, DomU>,
}

impl Cluster {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: BTreeMap::new(),
            guests: BTreeMap::new(),
        }
    }

    pub fn add_host(&mut self, host: Dom0) {
        self.hosts.insert(host.hostname.clone(), host);
    }

    pub fn add_guest(&mut self, guest: DomU) {
        self.guests.insert(guest.hostname.clone(), guest);
    }

    pub fn get_host(&self, hostname: &str) -> Option<&Dom0> {
        self.hosts.get(hostname)
    }

    pub fn get_guest(&self, hostname: &str) -> Option<&DomU> {
        self.guests.get(hostname)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Dom0> {
        self.hosts.values()
    }

    pub fn guests(&self) -> impl Iterator<Item = &DomU> {
        self.guests.values()
    }
}
