//! Health and alert threshold command implementations.

use anyhow::Result;
use console::style;
use cxlctl::ops::health::{self, AlertSettings, HealthInfo};
use cxlctl::{DeviceSelector, LinuxTransport, for_each_device};

use super::print_json;
use crate::{Cli, CliError};

/// Threshold arguments for `set-alert-config`.
pub(crate) struct AlertArgs {
    pub life_used: Option<u8>,
    pub over_temp: Option<i16>,
    pub under_temp: Option<i16>,
    pub volatile_errors: Option<u16>,
    pub persistent_errors: Option<u16>,
}

impl AlertArgs {
    /// Build the wire settings. Returns `None` when no threshold was given.
    ///
    /// Each provided threshold sets its action bit in both `valid_actions`
    /// and `enable_actions`, so devices only touch the requested alerts.
    fn to_settings(&self) -> Option<AlertSettings> {
        let mut settings = AlertSettings::default();
        let mut actions = 0u8;
        if let Some(v) = self.life_used {
            actions |= 1 << 0;
            settings.life_used_warning = v;
        }
        if let Some(v) = self.over_temp {
            actions |= 1 << 1;
            settings.over_temp_warning = v;
        }
        if let Some(v) = self.under_temp {
            actions |= 1 << 2;
            settings.under_temp_warning = v;
        }
        if let Some(v) = self.volatile_errors {
            actions |= 1 << 3;
            settings.volatile_error_warning = v;
        }
        if let Some(v) = self.persistent_errors {
            actions |= 1 << 4;
            settings.persistent_error_warning = v;
        }
        if actions == 0 {
            return None;
        }
        settings.valid_actions = actions;
        settings.enable_actions = actions;
        Some(settings)
    }
}

/// Names of the health status bits that are set.
fn health_flags(info: &HealthInfo) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if info.maintenance_needed() {
        flags.push("maintenance needed");
    }
    if info.performance_degraded() {
        flags.push("performance degraded");
    }
    if info.hardware_replacement_needed() {
        flags.push("hardware replacement needed");
    }
    flags
}

/// Get-health-info command implementation.
pub(crate) fn cmd_get_health_info(cli: &Cli, selector: &DeviceSelector) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let info = health::get_health_info(endpoint)?;
        results.push((endpoint.name().to_string(), info));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, info)| serde_json::json!({ "device": name, "health": info }))
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, info) in &results {
        eprintln!("{}", style(name).cyan().bold());

        let flags = health_flags(info);
        let status = if flags.is_empty() {
            style("ok").green().to_string()
        } else {
            style(flags.join(", ")).yellow().to_string()
        };
        eprintln!("  Health status:     0x{:02X} ({status})", info.health_status);
        eprintln!("  Media status:      0x{:02X}", info.media_status);
        eprintln!("  Additional status: 0x{:02X}", info.additional_status);
        match info.life_used_percent() {
            Some(pct) => eprintln!("  Life used:         {pct}%"),
            None => eprintln!("  Life used:         {}", style("not reported").dim()),
        }
        eprintln!("  Temperature:       {} C", info.device_temperature);
        eprintln!("  Dirty shutdowns:   {}", info.dirty_shutdown_count);
        eprintln!(
            "  Corrected errors:  volatile {}, persistent {}",
            info.corrected_volatile_error_count, info.corrected_persistent_error_count
        );
    }

    Ok(())
}

/// Get-alert-config command implementation.
pub(crate) fn cmd_get_alert_config(cli: &Cli, selector: &DeviceSelector) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let config = health::get_alert_config(endpoint)?;
        results.push((endpoint.name().to_string(), config));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, config)| serde_json::json!({ "device": name, "alerts": config }))
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, config) in &results {
        eprintln!("{}", style(name).cyan().bold());
        eprintln!("  Valid alerts:       0x{:02X}", config.valid_alerts);
        eprintln!("  Programmable:       0x{:02X}", config.programmable_alerts);
        eprintln!(
            "  Life used:          critical {}%, warning {}%",
            config.life_used_critical, config.life_used_warning
        );
        eprintln!(
            "  Over temperature:   critical {} C, warning {} C",
            config.over_temp_critical, config.over_temp_warning
        );
        eprintln!(
            "  Under temperature:  critical {} C, warning {} C",
            config.under_temp_critical, config.under_temp_warning
        );
        eprintln!(
            "  Volatile errors:    warning threshold {}",
            config.volatile_error_warning
        );
        eprintln!(
            "  Persistent errors:  warning threshold {}",
            config.persistent_error_warning
        );
    }

    Ok(())
}

/// Set-alert-config command implementation.
pub(crate) fn cmd_set_alert_config(
    cli: &Cli,
    selector: &DeviceSelector,
    args: &AlertArgs,
) -> Result<()> {
    let Some(settings) = args.to_settings() else {
        return Err(CliError::Usage(
            "no threshold given (see set-alert-config --help)".to_string(),
        )
        .into());
    };

    let mut transport = LinuxTransport::new();
    let mut updated = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        health::set_alert_config(endpoint, &settings)?;
        updated.push(endpoint.name().to_string());
        Ok(())
    })?;

    if cli.json {
        return print_json(serde_json::json!({ "updated": updated }));
    }

    for name in &updated {
        eprintln!(
            "{} {}: alert thresholds updated",
            style("✓").green(),
            style(name).cyan()
        );
    }
    if updated.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
    }

    Ok(())
}
