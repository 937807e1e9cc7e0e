//! Identify command implementation.

use anyhow::Result;
use console::style;
use cxlctl::ops::identify;
use cxlctl::{DeviceSelector, LinuxTransport, for_each_device};

use super::{format_bytes, print_json};
use crate::Cli;

/// Identify command implementation.
pub(crate) fn cmd_identify(cli: &Cli, selector: &DeviceSelector) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let info = identify::identify(endpoint)?;
        results.push((endpoint.name().to_string(), info));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, info)| serde_json::json!({ "device": name, "identify": info }))
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, info) in &results {
        eprintln!("{}", style(name).cyan().bold());
        eprintln!("  FW revision:          {}", info.fw_revision);
        eprintln!(
            "  Total capacity:       {}",
            format_bytes(info.total_capacity)
        );
        eprintln!(
            "  Volatile-only:        {}",
            format_bytes(info.volatile_only_capacity)
        );
        eprintln!(
            "  Persistent-only:      {}",
            format_bytes(info.persistent_only_capacity)
        );
        eprintln!(
            "  Partition alignment:  {}",
            format_bytes(info.partition_align)
        );
        eprintln!(
            "  Event log sizes:      info {}, warning {}, failure {}, fatal {}",
            info.info_event_log_size,
            info.warning_event_log_size,
            info.failure_event_log_size,
            info.fatal_event_log_size
        );
        eprintln!("  LSA size:             {}", format_bytes(u64::from(info.lsa_size)));
        eprintln!(
            "  Poison list capacity: {} records",
            info.poison_list_max_records
        );
        eprintln!("  Poison inject limit:  {}", info.inject_poison_limit);
        eprintln!("  Poison caps:          0x{:02X}", info.poison_caps);
        eprintln!("  QoS telemetry caps:   0x{:02X}", info.qos_telemetry_caps);
    }

    Ok(())
}
