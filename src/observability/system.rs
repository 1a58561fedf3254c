//! System resource sampling.
//!
//! CPU usage is a delta between refreshes, so the sampler keeps one
//! [`System`] alive across monitoring cycles.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

/// A snapshot of system resource usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    /// Overall CPU usage percentage (0–100)
    pub cpu_percent: f64,
    /// Memory usage percentage (0–100)
    pub memory_percent: f64,
    /// Disk usage percentage across mounted disks (0–100)
    pub disk_percent: f64,
    /// Memory currently used in bytes
    pub memory_used_bytes: u64,
    /// Total memory in bytes
    pub memory_total_bytes: u64,
}

/// Samples CPU, memory, and disk usage
pub struct SystemSampler {
    system: Mutex<System>,
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
        }
    }

    /// Collect a single snapshot
    pub fn sample(&self) -> SystemMetrics {
        let (cpu_percent, memory_used_bytes, memory_total_bytes) = {
            let mut system = self.system.lock();
            system.refresh_cpu();
            system.refresh_memory();
            (
                system.global_cpu_info().cpu_usage() as f64,
                system.used_memory(),
                system.total_memory(),
            )
        };

        let disks = Disks::new_with_refreshed_list();
        let (total, available) = disks.list().iter().fold((0u64, 0u64), |(t, a), disk| {
            (
                t.saturating_add(disk.total_space()),
                a.saturating_add(disk.available_space()),
            )
        });

        SystemMetrics {
            cpu_percent,
            memory_percent: percent(memory_used_bytes, memory_total_bytes),
            disk_percent: percent(total.saturating_sub(available), total),
            memory_used_bytes,
            memory_total_bytes,
        }
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total > 0 {
        used as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}
