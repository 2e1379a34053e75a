use crate::models::{Configuration, Dom0, Dom0Disk};

use super::{guest_placements, AlertLevel, ResultSink, ResultValue, RuleResult};

/// Evaluates one physical disk against the per-disk rule catalogue.
pub struct Dom0DiskAnalysis<'a> {
    config: &'a Configuration,
    host: &'a Dom0,
    disk: &'a Dom0Disk,
}

impl<'a> Dom0DiskAnalysis<'a> {
    pub fn new(config: &'a Configuration, host: &'a Dom0, disk: &'a Dom0Disk) -> Self {
        Self { config, host, disk }
    }

    pub fn disk(&self) -> &'a Dom0Disk {
        self.disk
    }

    /// Disk weight left after every guest disk with a volume on this drive.
    ///
    /// Each guest disk counts once no matter how many of its volumes land on
    /// the drive, hence the break on the first matching volume.
    pub fn available_weight_result<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if minimum_alert_level > AlertLevel::Medium {
            return true;
        }
        let mut allocated_weight = 0i64;
        for (guest, placement) in guest_placements(self.config) {
            let primary_role = if placement.primary_host == self.host.hostname {
                true
            } else if placement.secondary_host.as_deref() == Some(self.host.hostname.as_str()) {
                false
            } else {
                continue;
            };
            for (device, disk_placement) in &placement.disks {
                let volumes = if primary_role {
                    &disk_placement.primary_volumes
                } else {
                    &disk_placement.secondary_volumes
                };
                for volume in volumes {
                    if volume.device == self.disk.device {
                        let guest_disk = guest
                            .disks
                            .get(device)
                            .expect("placement references a disk missing from the guest");
                        allocated_weight += guest_disk.weight as i64;
                        break;
                    }
                }
            }
        }
        let free_weight = 1024 - allocated_weight;
        let level = if free_weight < 0 {
            AlertLevel::Medium
        } else {
            AlertLevel::None
        };
        if level >= minimum_alert_level {
            return sink.accept(RuleResult {
                label: "Available Weight".to_string(),
                value: ResultValue::Int(Some(free_weight)),
                deviation: -(free_weight as f64 / 1024.0),
                level,
            });
        }
        true
    }

    /// Minimum disk speed, one result per guest disk with a volume on this
    /// drive, counting the extents that sit below the guest's minimum. An
    /// unspecified drive speed is below any stated minimum.
    pub fn disk_speed_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if minimum_alert_level > AlertLevel::Medium {
            return true;
        }
        for (guest, placement) in guest_placements(self.config) {
            let primary_role = if placement.primary_host == self.host.hostname {
                true
            } else if placement.secondary_host.as_deref() == Some(self.host.hostname.as_str()) {
                false
            } else {
                continue;
            };
            for (device, disk_placement) in &placement.disks {
                let guest_disk = guest
                    .disks
                    .get(device)
                    .expect("placement references a disk missing from the guest");
                let minimum_disk_speed = guest_disk.minimum_disk_speed;
                let mut too_slow_extents = 0u64;
                let mut found_match = false;
                let volumes = if primary_role {
                    &disk_placement.primary_volumes
                } else {
                    &disk_placement.secondary_volumes
                };
                for volume in volumes {
                    if volume.device == self.disk.device {
                        found_match = true;
                        if minimum_disk_speed == -1 {
                            break;
                        }
                        if self.disk.disk_speed < minimum_disk_speed {
                            too_slow_extents += volume.extents;
                        }
                    }
                }
                if found_match {
                    let level = if minimum_disk_speed != -1 && too_slow_extents > 0 {
                        AlertLevel::Medium
                    } else {
                        AlertLevel::None
                    };
                    if level >= minimum_alert_level {
                        let accepted = sink.accept(RuleResult {
                            label: format!("{}:{}", guest.hostname, guest_disk.device),
                            value: ResultValue::Int(if minimum_disk_speed == -1 {
                                None
                            } else {
                                Some(minimum_disk_speed as i64)
                            }),
                            deviation: too_slow_extents as f64 / guest_disk.extents as f64,
                            level,
                        });
                        if !accepted {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Runs the per-disk rules in their fixed order.
    pub fn all_results<S: ResultSink + ?Sized>(
        &self,
        sink: &mut S,
        minimum_alert_level: AlertLevel,
    ) -> bool {
        if !self.available_weight_result(sink, minimum_alert_level) {
            return false;
        }
        if !self.disk_speed_results(sink, minimum_alert_level) {
            return false;
        }
        true
    }
}
