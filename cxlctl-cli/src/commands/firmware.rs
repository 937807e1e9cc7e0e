//! Firmware query, upload and activation command implementations.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use console::style;
use cxlctl::ops::firmware::{self, ActivateMethod, FwInfo};
use cxlctl::{
    DeviceSelector, FirmwareImage, FirmwareUpdate, FwFamily, LinuxTransport, TransferOutcome,
    UpdateParams, for_each_device, hbo_status,
};
use indicatif::{ProgressBar, ProgressStyle};

use super::{confirm, format_bytes, print_json};
use crate::config::Config;
use crate::{Cli, use_fancy_output};

/// Arguments for `update-fw`.
pub(crate) struct UpdateArgs {
    pub file: PathBuf,
    pub slot: u8,
    pub hbo: bool,
    pub os: bool,
    pub mock: bool,
    pub block_size: Option<usize>,
    pub max_retries: Option<u32>,
}

/// Get-fw-info command implementation.
pub(crate) fn cmd_get_fw_info(cli: &Cli, selector: &DeviceSelector, os: bool) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let info = if os {
            firmware::get_os_info(endpoint)?
        } else {
            firmware::get_fw_info(endpoint)?
        };
        results.push((endpoint.name().to_string(), info));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, info)| serde_json::json!({ "device": name, "firmware": info }))
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, info) in &results {
        eprintln!("{}", style(name).cyan().bold());
        eprintln!("  Slots supported:   {}", info.slots_supported);
        eprintln!("  Active slot:       {}", info.active_slot);
        eprintln!("  Staged slot:       {}", info.staged_slot);
        eprintln!(
            "  Online activation: {}",
            if info.online_activation {
                style("supported").green().to_string()
            } else {
                style("not supported").dim().to_string()
            }
        );
        eprintln!("  Slot revisions:");
        for (i, revision) in info.slot_revisions.iter().enumerate() {
            eprintln!(
                "    [{}] {}{}",
                i + 1,
                if revision.is_empty() { "-" } else { revision },
                slot_marker(info, i)
            );
        }
    }

    Ok(())
}

/// Marker text for a slot revision line (1-based slot numbering).
fn slot_marker(info: &FwInfo, index: usize) -> String {
    let slot = index + 1;
    if usize::from(info.active_slot) == slot {
        format!(" ({})", style("active").green())
    } else if usize::from(info.staged_slot) == slot {
        format!(" ({})", style("staged").yellow())
    } else {
        String::new()
    }
}

/// Update-fw command implementation.
pub(crate) fn cmd_update_fw(
    cli: &Cli,
    config: &Config,
    selector: &DeviceSelector,
    args: &UpdateArgs,
) -> Result<()> {
    // Cheap existence and size check before prompting.
    let meta = fs::metadata(&args.file)
        .with_context(|| format!("cannot read firmware image {}", args.file.display()))?;

    let family = FwFamily::from_flags(args.os, args.hbo);
    let prompt = format!(
        "Write {} ({}) to slot {} of the selected devices?",
        args.file.display(),
        format_bytes(meta.len()),
        args.slot
    );
    if !confirm(cli, &prompt)? {
        eprintln!("{}", style("Cancelled").yellow());
        return Ok(());
    }

    let mut transfer = config.transfer_config();
    if let Some(block_size) = args.block_size {
        transfer.block_size = block_size;
    }
    if let Some(max_retries) = args.max_retries {
        transfer.max_retries = max_retries;
    }

    let params = UpdateParams {
        slot: args.slot,
        family,
        mock: args.mock,
    };

    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let name = endpoint.name().to_string();
        // Fresh image read per device; transfers share no session state.
        let image = FirmwareImage::from_file(&args.file)?;

        let pb = transfer_progress_bar(cli, image.len() as u64);
        pb.set_message(name.clone());

        let outcome = FirmwareUpdate::with_config(endpoint, transfer.clone()).run(
            &image,
            &params,
            |sent, _total| {
                pb.set_position(sent as u64);
            },
        )?;
        pb.finish_and_clear();

        results.push((name, outcome));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, outcome)| {
                serde_json::json!({ "device": name, "outcome": outcome_str(*outcome) })
            })
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, outcome) in &results {
        match outcome {
            TransferOutcome::Completed => eprintln!(
                "{} {}: firmware written to slot {}",
                style("✓").green(),
                style(name).cyan(),
                args.slot
            ),
            TransferOutcome::Aborted => eprintln!(
                "{} {}: transfer aborted after first block (test mode)",
                style("✓").green(),
                style(name).cyan()
            ),
        }
    }

    Ok(())
}

/// Outcome as a plain string for JSON output.
fn outcome_str(outcome: TransferOutcome) -> &'static str {
    match outcome {
        TransferOutcome::Completed => "completed",
        TransferOutcome::Aborted => "aborted",
    }
}

/// Byte-count progress bar on stderr, hidden in quiet or plain mode.
fn transfer_progress_bar(cli: &Cli, total: u64) -> ProgressBar {
    if cli.quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(total);
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                )
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb
    }
}

/// Activate-fw command implementation.
pub(crate) fn cmd_activate_fw(
    cli: &Cli,
    selector: &DeviceSelector,
    slot: u8,
    online: bool,
    os: bool,
) -> Result<()> {
    let method = if online {
        ActivateMethod::Online
    } else {
        ActivateMethod::OnReset
    };

    let mut transport = LinuxTransport::new();
    let mut activated = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        if os {
            firmware::activate_os(endpoint, method, slot)?;
        } else {
            firmware::activate_fw(endpoint, method, slot)?;
        }
        activated.push(endpoint.name().to_string());
        Ok(())
    })?;

    if cli.json {
        return print_json(serde_json::json!({
            "activated": activated,
            "slot": slot,
            "method": if online { "online" } else { "on-reset" },
        }));
    }

    for name in &activated {
        if online {
            eprintln!(
                "{} {}: slot {slot} activation requested",
                style("✓").green(),
                style(name).cyan()
            );
        } else {
            eprintln!(
                "{} {}: slot {slot} staged for activation on next reset",
                style("✓").green(),
                style(name).cyan()
            );
        }
    }
    if activated.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
    }

    Ok(())
}

/// Hbo-status command implementation.
pub(crate) fn cmd_hbo_status(cli: &Cli, selector: &DeviceSelector) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let status = hbo_status(endpoint)?;
        results.push((endpoint.name().to_string(), status));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, status)| {
                serde_json::json!({
                    "device": name,
                    "status": {
                        "opcode": status.opcode.to_string(),
                        "percent_complete": status.percent_complete,
                        "is_running": status.is_running,
                        "return_code": status.return_code.to_string(),
                        "extended_status": status.extended_status,
                    },
                })
            })
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, status) in &results {
        eprintln!("{}", style(name).cyan().bold());
        eprintln!("  Background opcode: {}", status.opcode);
        if status.is_running {
            eprintln!(
                "  Running:           {} ({}% complete)",
                style("yes").yellow(),
                status.percent_complete
            );
        } else {
            eprintln!("  Running:           no");
            eprintln!("  Return code:       {}", status.return_code);
        }
        eprintln!("  Extended status:   0x{:04X}", status.extended_status);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_str() {
        assert_eq!(outcome_str(TransferOutcome::Completed), "completed");
        assert_eq!(outcome_str(TransferOutcome::Aborted), "aborted");
    }

    #[test]
    fn test_slot_marker_flags_active_and_staged() {
        let info = FwInfo {
            slots_supported: 4,
            active_slot: 1,
            staged_slot: 3,
            online_activation: false,
            slot_revisions: [
                "1.0.0".to_string(),
                String::new(),
                "1.1.0".to_string(),
                String::new(),
            ],
        };
        assert!(slot_marker(&info, 0).contains("active"));
        assert!(slot_marker(&info, 1).is_empty());
        assert!(slot_marker(&info, 2).contains("staged"));
        assert!(slot_marker(&info, 3).is_empty());
    }
}
