//! Device listing command implementation.

use anyhow::Result;
use console::style;
use cxlctl::LinuxTransport;
use cxlctl::transport::Transport;

use super::print_json;
use crate::Cli;

/// List command implementation.
pub(crate) fn cmd_list(cli: &Cli) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let devices = transport.enumerate()?;

    if cli.json {
        return print_json(serde_json::json!({ "devices": devices }));
    }

    eprintln!("{}", style("Attached memory devices:").bold().underlined());
    if devices.is_empty() {
        eprintln!("  {}", style("No devices found").dim());
    } else {
        for name in &devices {
            eprintln!("  {} {}", style("•").green(), style(name).cyan());
        }
    }

    Ok(())
}
