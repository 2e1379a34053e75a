use std::collections::BTreeMap;

use crate::models::{Configuration, Dom0};

use super::{guest_placements, AlertLevel, Dom0DiskAnalysis, ResultSink, ResultValue, RuleResult};

/// Evaluates one host against the per-host rule catalogue.
///
/// Each rule skips itself entirely when its highest possible severity falls
/// below the requested floor; the guard is part of the performance contract,
/// not just an output filter.
pub struct Dom0Analysis<'a> {
    config: &'a Configuration,
    host: &'a Dom0,
}

impl<'a> Dom0Analysis<'a> {
    pub fn new(config: &'a Configuration, host: &'a Dom0) -> Self {
        Self { config, host }
    }

    pub fn host(&self) -> &'a Dom0 {
        self.host
    }

    fn is_primary_here(&self, placement: &crate::models::DomUPlacement) -> bool {
        placement.primary_host == self.host.hostname
    }

    fn is_secondary_here(&self, placement: &crate::models::DomUPlacement) -> bool {
        placement.secondary_host.as_deref() == Some(self.host.hostname.as_str())
    }

    /// RAM left after the primary reservations of every guest running here.
    pub fn available_ram_result<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        let mut allocated_primary = 0i64;
        for (guest, placement) in guest_placements(self.config) {
            if self.is_primary_here(placement) {
                allocated_primary += guest.primary_ram as i64;
            }
        }
        let total = self.host.ram as i64;
        let free_primary = total - allocated_primary;
        let level = if free_primary < 0 {
            AlertLevel::Critical
        } else {
            AlertLevel::None
        };
        if level >= minimum_alert_level {
            return sink.accept(RuleResult {
                label: "Available RAM".to_string(),
                value: ResultValue::Int(Some(free_primary)),
                deviation: -(free_primary as f64 / total as f64),
                level,
            });
        }
        true
    }

    /// Whether this host could absorb the guests secondaried here, one result
    /// per origin host: if that host failed, its guests' secondary RAM must
    /// fit in our free primary RAM.
    pub fn allocated_secondary_ram_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if minimum_alert_level > AlertLevel::High {
            return true;
        }
        let mut allocated_primary = 0i64;
        let mut secondary_by_origin: BTreeMap<&str, i64> = BTreeMap::new();
        for (guest, placement) in guest_placements(self.config) {
            if self.is_primary_here(placement) {
                allocated_primary += guest.primary_ram as i64;
            } else if self.is_secondary_here(placement) && guest.secondary_ram != -1 {
                *secondary_by_origin
                    .entry(placement.primary_host.as_str())
                    .or_insert(0) += guest.secondary_ram as i64;
            }
        }
        let total = self.host.ram as i64;
        let free_primary = total - allocated_primary;

        for (origin, allocated_secondary) in secondary_by_origin {
            let level = if allocated_secondary > free_primary {
                AlertLevel::High
            } else {
                AlertLevel::None
            };
            if level >= minimum_alert_level {
                let accepted = sink.accept(RuleResult {
                    label: origin.to_string(),
                    value: ResultValue::Int(Some(allocated_secondary)),
                    deviation: (allocated_secondary - free_primary) as f64 / total as f64,
                    level,
                });
                if !accepted {
                    return false;
                }
            }
        }
        true
    }

    /// Minimum processor type, one result per guest active or failing over here.
    pub fn processor_type_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if minimum_alert_level > AlertLevel::Low {
            return true;
        }
        let processor_type = self.host.processor_type;
        for (guest, placement) in guest_placements(self.config) {
            if self.is_primary_here(placement)
                || (self.is_secondary_here(placement) && guest.secondary_ram != -1)
            {
                let level = match guest.minimum_processor_type {
                    Some(minimum) if processor_type < minimum => AlertLevel::Low,
                    _ => AlertLevel::None,
                };
                if level >= minimum_alert_level {
                    let accepted = sink.accept(RuleResult {
                        label: guest.hostname.clone(),
                        value: ResultValue::Processor(guest.minimum_processor_type),
                        deviation: 1.0,
                        level,
                    });
                    if !accepted {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Minimum processor architecture. An architecture below the guest's
    /// minimum cannot run it at all, so primaries are CRITICAL; a failover
    /// target that could not take over is HIGH.
    pub fn processor_architecture_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        let architecture = self.host.processor_architecture;
        for (guest, placement) in guest_placements(self.config) {
            let level = if self.is_primary_here(placement) {
                if architecture < guest.minimum_processor_architecture {
                    AlertLevel::Critical
                } else {
                    AlertLevel::None
                }
            } else if self.is_secondary_here(placement) && guest.secondary_ram != -1 {
                if architecture < guest.minimum_processor_architecture {
                    AlertLevel::High
                } else {
                    AlertLevel::None
                }
            } else {
                continue;
            };
            if level >= minimum_alert_level {
                let accepted = sink.accept(RuleResult {
                    label: guest.hostname.clone(),
                    value: ResultValue::Architecture(guest.minimum_processor_architecture),
                    deviation: 1.0,
                    level,
                });
                if !accepted {
                    return false;
                }
            }
        }
        true
    }

    /// Minimum processor speed, one result per guest active or failing over here.
    pub fn processor_speed_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if minimum_alert_level > AlertLevel::Low {
            return true;
        }
        let processor_speed = self.host.processor_speed;
        for (guest, placement) in guest_placements(self.config) {
            if self.is_primary_here(placement)
                || (self.is_secondary_here(placement) && guest.secondary_ram != -1)
            {
                let minimum_speed = guest.minimum_processor_speed;
                let level = if minimum_speed != -1 && processor_speed < minimum_speed {
                    AlertLevel::Low
                } else {
                    AlertLevel::None
                };
                if level >= minimum_alert_level {
                    let accepted = sink.accept(RuleResult {
                        label: guest.hostname.clone(),
                        value: ResultValue::Int(if minimum_speed == -1 {
                            None
                        } else {
                            Some(minimum_speed as i64)
                        }),
                        deviation: (minimum_speed - processor_speed) as f64 / minimum_speed as f64,
                        level,
                    });
                    if !accepted {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Required core count, one result per guest active or failing over here.
    pub fn processor_cores_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if minimum_alert_level > AlertLevel::Medium {
            return true;
        }
        let processor_cores = self.host.processor_cores;
        for (guest, placement) in guest_placements(self.config) {
            if self.is_primary_here(placement)
                || (self.is_secondary_here(placement) && guest.secondary_ram != -1)
            {
                let minimum_cores = guest.processor_cores;
                let level = if processor_cores < minimum_cores {
                    AlertLevel::Medium
                } else {
                    AlertLevel::None
                };
                if level >= minimum_alert_level {
                    let accepted = sink.accept(RuleResult {
                        label: guest.hostname.clone(),
                        value: ResultValue::Int(Some(minimum_cores as i64)),
                        deviation: (minimum_cores as f64 - processor_cores as f64)
                            / minimum_cores as f64,
                        level,
                    });
                    if !accepted {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Processor weight left after the primary entitlements of every guest
    /// running here, at 1024 per core.
    pub fn available_processor_weight_result<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if minimum_alert_level > AlertLevel::Medium {
            return true;
        }
        let mut allocated_primary = 0i64;
        for (guest, placement) in guest_placements(self.config) {
            if self.is_primary_here(placement) {
                allocated_primary += guest.allocated_processor_weight();
            }
        }
        let total = self.host.total_processor_weight();
        let free_primary = total - allocated_primary;
        let level = if free_primary < 0 {
            AlertLevel::Medium
        } else {
            AlertLevel::None
        };
        if level >= minimum_alert_level {
            return sink.accept(RuleResult {
                label: "Available Processor Weight".to_string(),
                value: ResultValue::Int(Some(free_primary)),
                deviation: -(free_primary as f64 / total as f64),
                level,
            });
        }
        true
    }

    /// HVM capability, one result per guest active or failing over here.
    pub fn requires_hvm_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        let supports_hvm = self.host.supports_hvm;
        for (guest, placement) in guest_placements(self.config) {
            let level = if self.is_primary_here(placement) {
                if guest.requires_hvm && !supports_hvm {
                    AlertLevel::Critical
                } else {
                    AlertLevel::None
                }
            } else if self.is_secondary_here(placement) && guest.secondary_ram != -1 {
                if guest.requires_hvm && !supports_hvm {
                    AlertLevel::High
                } else {
                    AlertLevel::None
                }
            } else {
                continue;
            };
            if level >= minimum_alert_level {
                let accepted = sink.accept(RuleResult {
                    label: guest.hostname.clone(),
                    value: ResultValue::Bool(guest.requires_hvm),
                    deviation: 1.0,
                    level,
                });
                if !accepted {
                    return false;
                }
            }
        }
        true
    }

    pub fn disk_analyses(&self) -> impl Iterator<Item = Dom0DiskAnalysis<'a>> {
        let config = self.config;
        let host = self.host;
        host.disks
            .values()
            .map(move |disk| Dom0DiskAnalysis::new(config, host, disk))
    }

    /// Runs the per-host rules in their fixed order, then each disk's rules.
    pub fn all_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if !self.available_ram_result(sink, minimum_alert_level) {
            return false;
        }
        if !self.allocated_secondary_ram_results(sink, minimum_alert_level) {
            return false;
        }
        if !self.processor_type_results(sink, minimum_alert_level) {
            return false;
        }
        if !self.processor_architecture_results(sink, minimum_alert_level) {
            return false;
        }
        if !self.processor_speed_results(sink, minimum_alert_level) {
            return false;
        }
        if !self.processor_cores_results(sink, minimum_alert_level) {
            return false;
        }
        if !self.available_processor_weight_result(sink, minimum_alert_level) {
            return false;
        }
        if !self.requires_hvm_results(sink, minimum_alert_level) {
            return false;
        }
        // Disk rules top out at MEDIUM.
        if minimum_alert_level <= AlertLevel::Medium {
            for disk_analysis in self.disk_analyses() {
                if !disk_analysis.all_results(sink, minimum_alert_level) {
                    return false;
                }
            }
        }
        true
    }
}
