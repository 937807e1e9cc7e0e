//! Log discovery and retrieval command implementations.

use anyhow::Result;
use console::style;
use cxlctl::ops::logs::{
    self, CEL_LOG_UUID, DEFAULT_LOG_CHUNK, VENDOR_DEBUG_LOG_UUID, format_uuid, parse_uuid,
};
use cxlctl::{DeviceSelector, Error, LinuxTransport, for_each_device};

use super::{format_bytes, hex_string, print_json};
use crate::Cli;

/// Friendly name for log identifiers this tool knows about.
fn log_name(uuid: &[u8; 16]) -> Option<&'static str> {
    if *uuid == CEL_LOG_UUID {
        Some("Command Effects Log")
    } else if *uuid == VENDOR_DEBUG_LOG_UUID {
        Some("Vendor Debug Log")
    } else {
        None
    }
}

/// Get-supported-logs command implementation.
pub(crate) fn cmd_get_supported_logs(cli: &Cli, selector: &DeviceSelector) -> Result<()> {
    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        let entries = logs::get_supported_logs(endpoint)?;
        results.push((endpoint.name().to_string(), entries));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, entries)| {
                let entries: Vec<serde_json::Value> = entries
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "uuid": format_uuid(&entry.uuid),
                            "size": entry.size,
                            "name": log_name(&entry.uuid),
                        })
                    })
                    .collect();
                serde_json::json!({ "device": name, "logs": entries })
            })
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, entries) in &results {
        eprintln!("{}", style(name).cyan().bold());
        if entries.is_empty() {
            eprintln!("  {}", style("No logs advertised").dim());
            continue;
        }
        for entry in entries {
            let label = match log_name(&entry.uuid) {
                Some(known) => format!("  {}", style(known).yellow()),
                None => String::new(),
            };
            eprintln!(
                "  {} {} ({}){label}",
                style("•").green(),
                format_uuid(&entry.uuid),
                format_bytes(u64::from(entry.size))
            );
        }
    }

    Ok(())
}

/// Get-log command implementation.
pub(crate) fn cmd_get_log(
    cli: &Cli,
    selector: &DeviceSelector,
    uuid_arg: Option<&str>,
    vendor_debug: bool,
) -> Result<()> {
    let uuid = match uuid_arg {
        Some(text) => parse_uuid(text)?,
        None if vendor_debug => VENDOR_DEBUG_LOG_UUID,
        None => CEL_LOG_UUID,
    };

    let mut transport = LinuxTransport::new();
    let mut results = Vec::new();

    for_each_device(&mut transport, selector, |endpoint| {
        // Size comes from the device's own advertisement.
        let entries = logs::get_supported_logs(endpoint)?;
        let Some(entry) = entries.iter().find(|entry| entry.uuid == uuid) else {
            return Err(Error::Unsupported(format!(
                "device does not advertise log {}",
                format_uuid(&uuid)
            )));
        };
        let data = logs::read_log(endpoint, &uuid, entry.size, DEFAULT_LOG_CHUNK)?;
        results.push((endpoint.name().to_string(), data));
        Ok(())
    })?;

    if cli.json {
        let data: Vec<serde_json::Value> = results
            .iter()
            .map(|(name, data)| {
                serde_json::json!({
                    "device": name,
                    "uuid": format_uuid(&uuid),
                    "length": data.len(),
                    "data": hex_string(data),
                })
            })
            .collect();
        return print_json(serde_json::json!(data));
    }

    if results.is_empty() {
        eprintln!("{}", style("No devices matched").dim());
        return Ok(());
    }

    for (name, data) in &results {
        eprintln!(
            "{} {} ({})",
            style(name).cyan().bold(),
            format_uuid(&uuid),
            format_bytes(data.len() as u64)
        );
        if data.is_empty() {
            eprintln!("  {}", style("Log is empty").dim());
        } else {
            eprint!("{}", hex_dump(data));
        }
    }

    Ok(())
}

/// Classic three-column hex dump: offset, bytes, printable ASCII.
#[allow(clippy::unwrap_used)] // Writing to String cannot fail
fn hex_dump(data: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (row, chunk) in data.chunks(16).enumerate() {
        let mut hex = String::with_capacity(49);
        for (i, byte) in chunk.iter().enumerate() {
            if i == 8 {
                hex.push(' ');
            }
            write!(hex, "{byte:02x} ").unwrap();
        }
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if (0x20..0x7F).contains(&b) {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        writeln!(out, "{:08x}  {hex:49} |{ascii}|", row * 16).unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_name_known_uuids() {
        assert_eq!(log_name(&CEL_LOG_UUID), Some("Command Effects Log"));
        assert_eq!(log_name(&VENDOR_DEBUG_LOG_UUID), Some("Vendor Debug Log"));
        assert_eq!(log_name(&[0u8; 16]), None);
    }

    #[test]
    fn test_hex_dump_empty() {
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn test_hex_dump_single_row() {
        let dump = hex_dump(b"Hello");
        assert!(dump.starts_with("00000000  48 65 6c 6c 6f"));
        assert!(dump.contains("|Hello|"));
        assert_eq!(dump.lines().count(), 1);
    }

    #[test]
    fn test_hex_dump_non_printable_as_dots() {
        let dump = hex_dump(&[0x00, 0x41, 0x7F]);
        assert!(dump.contains("|.A.|"));
    }

    #[test]
    fn test_hex_dump_rows_and_offsets() {
        let data = vec![0xAAu8; 20];
        let dump = hex_dump(&data);
        assert_eq!(dump.lines().count(), 2);
        assert!(dump.contains("\n00000010  "));
    }
}
