//! Event log command implementations.

use anyhow::Result;
use console::style;
use cxlctl::ops::events::{self, EventLogType, InterruptPolicy};
use cxlctl::ops::logs::format_uuid;
use cxlctl::{DeviceSelector, LinuxTransport, for_each_device};

use super::{confirm, hex_string, print_json};
use crate::Cli;

/// Get-event-records command implementation.
pub(crate) fn cmd_get_event_records(
    cli: &Cli,
    selector: &DeviceSelector,
    log: EventLogType,
) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let page = events::get_event_records(endpoint, log)?;
        results.push((endpoint.name().to_string(), page));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, page)| {
                let records: Vec<serde_json::Value> = page
                    .records
                    .iter()
                    .map(|record| {
                        serde_json::json!({
                            "uuid": format_uuid(&record.uuid),
                            "flags": record.flags,
                            "handle": record.handle,
                            "related_handle": record.related_handle,
                            "timestamp": record.timestamp,
                            "payload": hex_string(&record.payload),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "device": name,
                    "log": log.to_string(),
                    "overflowed": page.overflowed(),
                    "more_pending": page.more_pending(),
                    "overflow_error_count": page.overflow_error_count,
                    "records": records,
                })
            })
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, page) in &results {
        eprintln!(
            "{} ({} log, {} records)",
            style(name).cyan().bold(),
            log,
            page.records.len()
        );
        if page.overflowed() {
            eprintln!(
                "  {} log overflowed, {} events dropped",
                style("!").red().bold(),
                page.overflow_error_count
            );
        }
        if page.more_pending() {
            eprintln!("  {}", style("More records pending, run again").yellow());
        }
        if page.records.is_empty() {
            eprintln!("  {}", style("No records").dim());
            continue;
        }
        for record in &page.records {
            eprintln!(
                "  {} handle {:<5} timestamp {:<20} {}",
                style("•").green(),
                record.handle,
                record.timestamp,
                format_uuid(&record.uuid)
            );
            if record.related_handle != 0 {
                eprintln!("      related handle {}", record.related_handle);
            }
            eprintln!(
                "      flags 0x{:06X}, payload {} bytes",
                record.flags,
                record.payload.len()
            );
        }
    }

    Ok(())
}

/// Clear-event-records command implementation.
pub(crate) fn cmd_clear_event_records(
    cli: &Cli,
    selector: &DeviceSelector,
    log: EventLogType,
    handles: &[u16],
) -> Result<()> {
    let prompt = if handles.is_empty() {
        format!("Clear ALL records from the {log} event log of the selected devices?")
    } else {
        format!(
            "Clear {} record(s) from the {log} event log of the selected devices?",
            handles.len()
        )
    };
    if !confirm(cli, &prompt)? {
        eprintln!("{}", style("Cancelled").yellow());
        return Ok(());
    }

    let mut transport = LinuxTransport::new();
    let mut cleared = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        events::clear_event_records(endpoint, log, handles)?;
        cleared.push(endpoint.name().to_string());
        Ok(())
    })?;

    if cli.json {
        return print_json(serde_json::json!({
            "cleared": cleared,
            "log": log.to_string(),
            "handles": handles,
        }));
    }

    for name in &cleared {
        if handles.is_empty() {
            eprintln!(
                "{} {}: {log} event log cleared",
                style("✓").green(),
                style(name).cyan()
            );
        } else {
            eprintln!(
                "{} {}: {} record(s) cleared from the {log} event log",
                style("✓").green(),
                style(name).cyan(),
                handles.len()
            );
        }
    }
    if cleared.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
    }

    Ok(())
}

/// Get-event-interrupt-policy command implementation.
pub(crate) fn cmd_get_interrupt_policy(cli: &Cli, selector: &DeviceSelector) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let policy = events::get_event_interrupt_policy(endpoint)?;
        results.push((endpoint.name().to_string(), policy));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, policy)| serde_json::json!({ "device": name, "policy": policy }))
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, policy) in &results {
        eprintln!("{}", style(name).cyan().bold());
        eprintln!("  Info:    {}", interrupt_mode(policy.info));
        eprintln!("  Warning: {}", interrupt_mode(policy.warning));
        eprintln!("  Failure: {}", interrupt_mode(policy.failure));
        eprintln!("  Fatal:   {}", interrupt_mode(policy.fatal));
    }

    Ok(())
}

/// Set-event-interrupt-policy command implementation.
pub(crate) fn cmd_set_interrupt_policy(
    cli: &Cli,
    selector: &DeviceSelector,
    policy: InterruptPolicy,
) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut updated = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        events::set_event_interrupt_policy(endpoint, policy)?;
        updated.push(endpoint.name().to_string());
        Ok(())
    })?;

    if cli.json {
        return print_json(serde_json::json!({ "updated": updated, "policy": policy }));
    }

    for name in &updated {
        eprintln!(
            "{} {}: event interrupt policy updated",
            style("✓").green(),
            style(name).cyan()
        );
    }
    if updated.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
    }

    Ok(())
}

/// Describe one interrupt mode setting.
fn interrupt_mode(mode: u8) -> String {
    match mode & 0x03 {
        0 => "none".to_string(),
        1 => "MSI/MSI-X".to_string(),
        2 => "FW interrupt".to_string(),
        _ => format!("reserved (0x{mode:02X})"),
    }
}
