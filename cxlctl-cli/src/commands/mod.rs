//! Command implementations.
//!
//! Each subcommand is implemented in its own module for clean separation.

pub(crate) mod completions;
pub(crate) mod events;
pub(crate) mod firmware;
pub(crate) mod health;
pub(crate) mod identify;
pub(crate) mod list;
pub(crate) mod logs;
pub(crate) mod timestamp;

use anyhow::{Context, Result};
use dialoguer::{Confirm, theme::ColorfulTheme};

use crate::{Cli, use_fancy_output};

/// Print the standard JSON envelope to stdout.
pub(crate) fn print_json(data: serde_json::Value) -> Result<()> {
    let output = serde_json::json!({
        "ok": true,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Ask before a destructive step.
///
/// Returns `true` without prompting when `--yes` is given or stderr is not
/// an interactive terminal.
pub(crate) fn confirm(cli: &Cli, prompt: &str) -> Result<bool> {
    if cli.yes || !use_fancy_output() {
        return Ok(true);
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("confirmation prompt failed")
}

/// Lowercase hex rendering of a byte buffer, for JSON output.
pub(crate) fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// Format a byte count in a human-readable way.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    const GB: u64 = 1024 * 1024 * 1024;
    #[allow(clippy::cast_precision_loss)]
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
