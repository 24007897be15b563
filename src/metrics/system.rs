use parking_lot::Mutex;
use sysinfo::System;

use super::line_protocol::MetricValue;

/// Host utilisation at one instant. Nothing here is aggregated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemSample {
    pub load_one: f64,
    pub logical_cores: usize,
    pub used_memory: u64,
    pub total_memory: u64,
}

impl SystemSample {
    /// One-minute load average per logical core, as a percentage.
    pub fn cpu_percentage(&self) -> MetricValue {
        MetricValue::ratio(self.load_one * 100.0, self.logical_cores as f64)
    }

    /// Used over total memory, as a percentage.
    pub fn memory_percentage(&self) -> MetricValue {
        MetricValue::ratio(
            self.used_memory as f64 * 100.0,
            self.total_memory as f64,
        )
    }
}

/// Reads CPU load and memory usage from the host.
///
/// Keeps one `sysinfo::System` around so refreshes reuse its buffers.
pub struct SystemSampler {
    sys: Mutex<System>,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }

    pub fn sample(&self) -> SystemSample {
        let mut sys = self.sys.lock();
        sys.refresh_memory();
        sys.refresh_cpu();

        SystemSample {
            load_one: System::load_average().one,
            logical_cores: sys.cpus().len(),
            used_memory: sys.used_memory(),
            total_memory: sys.total_memory(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_is_load_per_core_as_percentage() {
        let s = SystemSample {
            load_one: 1.0,
            logical_cores: 4,
            used_memory: 0,
            total_memory: 1,
        };
        assert_eq!(s.cpu_percentage().to_string(), "25.00");
    }

    #[test]
    fn memory_is_used_over_total() {
        let s = SystemSample {
            load_one: 0.0,
            logical_cores: 1,
            used_memory: 3,
            total_memory: 8,
        };
        assert_eq!(s.memory_percentage().to_string(), "37.50");
    }

    #[test]
    fn zero_denominators_render_literal_zero() {
        let s = SystemSample {
            load_one: 2.5,
            logical_cores: 0,
            used_memory: 10,
            total_memory: 0,
        };
        assert_eq!(s.cpu_percentage().to_string(), "0");
        assert_eq!(s.memory_percentage().to_string(), "0");
    }

    #[test]
    fn live_sample_is_sane() {
        let s = SystemSampler::new().sample();
        assert!(s.load_one >= 0.0);
        assert!(s.used_memory <= s.total_memory);
    }
}
