//! Device timestamp command implementations.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use console::style;
use cxlctl::ops::timestamp;
use cxlctl::{DeviceSelector, LinuxTransport, for_each_device};

use super::print_json;
use crate::Cli;

/// Get-timestamp command implementation.
pub(crate) fn cmd_get_timestamp(cli: &Cli, selector: &DeviceSelector) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let nanos = timestamp::get_timestamp(endpoint)?;
        results.push((endpoint.name().to_string(), nanos));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, nanos)| serde_json::json!({ "device": name, "timestamp_ns": nanos }))
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, nanos) in &results {
        eprintln!(
            "{} {} ns ({} s since the epoch)",
            style(name).cyan().bold(),
            nanos,
            nanos / 1_000_000_000
        );
    }

    Ok(())
}

/// Set-timestamp command implementation.
pub(crate) fn cmd_set_timestamp(
    cli: &Cli,
    selector: &DeviceSelector,
    nanos: Option<u64>,
) -> Result<()> {
    let nanos = match nanos {
        Some(nanos) => nanos,
        None => host_clock_nanos()?,
    };

    let mut transport = LinuxTransport::new();
    let mut updated = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        timestamp::set_timestamp(endpoint, nanos)?;
        updated.push(endpoint.name().to_string());
        Ok(())
    })?;

    if cli.json {
        return print_json(serde_json::json!({ "updated": updated, "timestamp_ns": nanos }));
    }

    for name in &updated {
        eprintln!(
            "{} {}: timestamp set to {nanos} ns",
            style("✓").green(),
            style(name).cyan()
        );
    }
    if updated.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
    }

    Ok(())
}

/// Host wall clock as nanoseconds since the epoch, saturating far futures.
fn host_clock_nanos() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the epoch")?;
    Ok(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_clock_is_past_2020() {
        // 2020-01-01 in nanoseconds since the epoch.
        let jan_2020 = 1_577_836_800u64 * 1_000_000_000;
        assert!(host_clock_nanos().unwrap() > jan_2020);
    }
}
