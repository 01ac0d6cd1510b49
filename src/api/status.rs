use sysinfo::System;

use super::models::{ModelSummary, SystemStatusResponse};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Sample host metrics; blocks for the CPU measurement interval
#[inline]
pub fn collect_system_status(models: ModelSummary) -> SystemStatusResponse {
    let mut system = System::new();
    system.refresh_memory();
    system.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();

    let total = system.total_memory() as f64;
    let used = system.used_memory() as f64;
    let ram_percent = if total > 0.0 { used / total * 100.0 } else { 0.0 };

    SystemStatusResponse {
        models,
        os: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
        os_version: System::os_version().unwrap_or_default(),
        cpu_count: system.cpus().len(),
        cpu_percent: round_to(f64::from(system.global_cpu_usage()), 1),
        ram_total_gb: round_to(total / BYTES_PER_GB, 2),
        ram_used_gb: round_to(used / BYTES_PER_GB, 2),
        ram_percent: round_to(ram_percent, 1),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
        backend: "axum + tokio".to_string(),
    }
}
