//! Host metrics poller for the relay agent
//!
//! Produces the [`DataVariable`]s of one poll, all filed under the local
//! hostname as device:
//! - CPU usage and load averages
//! - Memory and swap usage
//! - Disk usage per mounted filesystem
//! - Uptime
//! - OS facts (name, versions, architecture) as text samples

use relay_core::batch::{DataType, DataVariable};
use std::collections::HashMap;
use sysinfo::{Disks, System};
use tracing::debug;

/// Label descriptions attached to every batch
pub fn label_descriptions() -> HashMap<String, String> {
    [
        ("cpu_percent", "Global CPU usage (%)"),
        ("cpu_cores", "Logical CPU count"),
        ("load_average", "System load average"),
        ("memory_total_bytes", "Installed memory (bytes)"),
        ("memory_available_bytes", "Available memory (bytes)"),
        ("swap_used_bytes", "Swap in use (bytes)"),
        ("disk_total_bytes", "Filesystem size (bytes)"),
        ("disk_available_bytes", "Filesystem free space (bytes)"),
        ("uptime_seconds", "Seconds since boot"),
        ("os_name", "Operating system"),
        ("os_version", "Operating system version"),
        ("kernel_version", "Kernel version"),
        ("architecture", "CPU architecture"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Collect one poll worth of host metrics for `device`
pub async fn collect(device: &str) -> Vec<DataVariable> {
    debug!("Collecting host metrics...");

    let mut sys = System::new_all();
    sys.refresh_all();

    // Wait a moment for accurate CPU readings
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    sys.refresh_cpu_usage();

    let mut vars = Vec::new();
    cpu(&sys, device, &mut vars);
    memory(&sys, device, &mut vars);
    disks(device, &mut vars);

    vars.push(DataVariable::numeric(
        device,
        "uptime_seconds",
        "0",
        DataType::Counter64,
        System::uptime(),
    ));

    facts(device, &mut vars);
    debug!("Collected {} samples", vars.len());
    vars
}

fn cpu(sys: &System, device: &str, vars: &mut Vec<DataVariable>) {
    let usage = f64::from(sys.global_cpu_info().cpu_usage());
    if usage.is_finite() {
        vars.push(DataVariable::numeric(device, "cpu_percent", "0", DataType::Float, usage));
    }
    vars.push(DataVariable::numeric(
        device,
        "cpu_cores",
        "0",
        DataType::Integer,
        sys.cpus().len() as u64,
    ));

    // Load averages are only meaningful on Unix
    if cfg!(unix) {
        let load = System::load_average();
        for (index, value) in [("1m", load.one), ("5m", load.five), ("15m", load.fifteen)] {
            vars.push(DataVariable::numeric(
                device,
                "load_average",
                index,
                DataType::Float,
                value,
            ));
        }
    }
}

fn memory(sys: &System, device: &str, vars: &mut Vec<DataVariable>) {
    vars.push(DataVariable::numeric(
        device,
        "memory_total_bytes",
        "0",
        DataType::Integer,
        sys.total_memory(),
    ));
    vars.push(DataVariable::numeric(
        device,
        "memory_available_bytes",
        "0",
        DataType::Integer,
        sys.available_memory(),
    ));
    vars.push(DataVariable::numeric(
        device,
        "swap_used_bytes",
        "0",
        DataType::Integer,
        sys.used_swap(),
    ));
}

fn disks(device: &str, vars: &mut Vec<DataVariable>) {
    let disks = Disks::new_with_refreshed_list();
    for disk in disks.list() {
        let mount = disk.mount_point().to_string_lossy().to_string();
        vars.push(DataVariable::numeric(
            device,
            "disk_total_bytes",
            mount.clone(),
            DataType::Integer,
            disk.total_space(),
        ));
        vars.push(DataVariable::numeric(
            device,
            "disk_available_bytes",
            mount,
            DataType::Integer,
            disk.available_space(),
        ));
    }
}

fn facts(device: &str, vars: &mut Vec<DataVariable>) {
    let facts = [
        ("os_name", System::name()),
        ("os_version", System::os_version()),
        ("kernel_version", System::kernel_version()),
        ("architecture", Some(std::env::consts::ARCH.to_string())),
    ];
    for (label, value) in facts {
        if let Some(value) = value {
            vars.push(DataVariable::text(device, label, "0", value));
        }
    }
}
