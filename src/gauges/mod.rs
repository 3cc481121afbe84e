use sysinfo::System;

/// Instantaneous host CPU and memory utilization, in percent.
pub trait ResourceGauges: Send {
    fn cpu_percent(&mut self) -> f64;
    fn memory_percent(&mut self) -> f64;
}

/// `sysinfo`-backed gauges.
///
/// CPU usage is a delta between refreshes, so the first reading after
/// construction covers the time since `new()`.
pub struct SystemGauges {
    system: System,
}

impl Default for SystemGauges {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemGauges {
    pub fn new() -> Self {
        let mut system = System::new();
        // Baseline for the first CPU delta
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl ResourceGauges for SystemGauges {
    fn cpu_percent(&mut self) -> f64 {
        self.system.refresh_cpu_usage();
        f64::from(self.system.global_cpu_usage())
    }

    #[allow(
        clippy::as_conversions,
        clippy::cast_precision_loss,
        reason = "a percentage does not need every bit of a byte count"
    )]
    fn memory_percent(&mut self) -> f64 {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return 0.0;
        }
        self.system.used_memory() as f64 / total as f64 * 100.0
    }
}

/// Clamp to [0, 100] and round to two decimals, as stored.
pub fn normalize_percent(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_percent() {
        assert!((normalize_percent(12.345_6) - 12.35).abs() < 1e-9);
        assert!((normalize_percent(-3.0)).abs() < f64::EPSILON);
        assert!((normalize_percent(140.0) - 100.0).abs() < f64::EPSILON);
        assert!((normalize_percent(f64::NAN)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_system_gauges_stay_in_range() {
        let mut gauges = SystemGauges::new();
        let cpu = normalize_percent(gauges.cpu_percent());
        let mem = normalize_percent(gauges.memory_percent());
        assert!((0.0..=100.0).contains(&cpu));
        assert!(mem > 0.0 && mem <= 100.0);
    }
}
