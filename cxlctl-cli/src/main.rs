//! cxlctl CLI - command-line tool for managing CXL memory devices.
//!
//! ## Features
//!
//! - Enumerate attached memory devices
//! - Query identity, health, alert and firmware-slot state
//! - Read and clear event records, read command and debug logs
//! - Chunked firmware and OS image upload with progress reporting
//! - Shell completion generation
//! - Environment variable support

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use console::style;
use cxlctl::DeviceSelector;
use cxlctl::ops::events::EventLogType;
use env_logger::Env;
use log::debug;

mod commands;
mod config;

use commands::firmware::UpdateArgs;
use commands::health::AlertArgs;
use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if prompts/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// CLI-level errors carrying their own exit code.
#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Invalid usage that clap cannot catch itself (exit code 2).
    #[error("{0}")]
    Usage(String),
}

/// cxlctl - diagnostic and management tool for CXL memory devices.
///
/// Environment variables:
///   CXLCTL_CONFIG           - Path to a configuration file
///   CXLCTL_NON_INTERACTIVE  - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "cxlctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "For more information, visit: https://github.com/cxl-tools/cxlctl")]
struct Cli {
    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output machine-readable JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Assume yes for confirmation prompts (non-interactive mode).
    #[arg(
        short = 'y',
        long = "yes",
        visible_alias = "non-interactive",
        global = true,
        env = "CXLCTL_NON_INTERACTIVE"
    )]
    yes: bool,

    /// Path to a configuration file.
    #[arg(
        long = "config",
        global = true,
        value_name = "PATH",
        env = "CXLCTL_CONFIG"
    )]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Event log selector mirrored onto the library's log types.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum EventLog {
    /// Informational events.
    Info,
    /// Warnings.
    Warning,
    /// Failures.
    Failure,
    /// Fatal events.
    Fatal,
}

impl From<EventLog> for EventLogType {
    fn from(log: EventLog) -> Self {
        match log {
            EventLog::Info => EventLogType::Info,
            EventLog::Warning => EventLogType::Warning,
            EventLog::Failure => EventLogType::Failure,
            EventLog::Fatal => EventLogType::Fatal,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// List attached memory devices.
    List,

    /// Show device identity and capacity information.
    Identify {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,
    },

    /// Show device health information.
    GetHealthInfo {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,
    },

    /// Show alert thresholds and their programmability.
    GetAlertConfig {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,
    },

    /// Program warning thresholds; only the given thresholds are touched.
    SetAlertConfig {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Life-used warning threshold, percent.
        #[arg(long, value_name = "PERCENT")]
        life_used: Option<u8>,

        /// Over-temperature warning threshold, degrees Celsius.
        #[arg(long, value_name = "DEGC")]
        over_temp: Option<i16>,

        /// Under-temperature warning threshold, degrees Celsius.
        #[arg(long, value_name = "DEGC")]
        under_temp: Option<i16>,

        /// Corrected volatile memory error count threshold.
        #[arg(long, value_name = "COUNT")]
        volatile_errors: Option<u16>,

        /// Corrected persistent memory error count threshold.
        #[arg(long, value_name = "COUNT")]
        persistent_errors: Option<u16>,
    },

    /// Show firmware slot information.
    GetFwInfo {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Query the OS (boot1) image slots instead.
        #[arg(short = 'z', long)]
        os: bool,
    },

    /// Upload a firmware image to a device slot.
    UpdateFw {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Path to the firmware image file.
        #[arg(short, long, value_name = "PATH")]
        file: PathBuf,

        /// Target firmware slot.
        #[arg(short, long, default_value_t = 1)]
        slot: u8,

        /// Use the vendor background-operation transfer command.
        #[arg(short = 'b', long)]
        hbo: bool,

        /// Treat the file as an OS (boot1) image.
        #[arg(short = 'z', long)]
        os: bool,

        /// Abort the transfer after the first block (test mode).
        #[arg(short, long)]
        mock: bool,

        /// Transfer block size in bytes (multiple of 128).
        #[arg(long, value_name = "BYTES")]
        block_size: Option<usize>,

        /// Retries allowed per block.
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,
    },

    /// Activate a staged firmware slot.
    ActivateFw {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Slot to activate.
        #[arg(short, long)]
        slot: u8,

        /// Activate immediately instead of on the next reset.
        #[arg(long)]
        online: bool,

        /// Activate the OS (boot1) image slot instead.
        #[arg(short = 'z', long)]
        os: bool,
    },

    /// Show the state of the device's background operation.
    HboStatus {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,
    },

    /// List the logs a device advertises.
    GetSupportedLogs {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,
    },

    /// Read a device log and dump its contents.
    GetLog {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Log identifier (defaults to the Command Effects Log).
        #[arg(long, value_name = "UUID", conflicts_with = "vendor_debug")]
        uuid: Option<String>,

        /// Read the vendor debug log.
        #[arg(long)]
        vendor_debug: bool,
    },

    /// Read event records from one event log.
    GetEventRecords {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Event log to read.
        #[arg(short = 't', long = "log", value_enum, default_value_t = EventLog::Info)]
        log: EventLog,
    },

    /// Clear event records (all of them, or by handle).
    ClearEventRecords {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Event log to clear.
        #[arg(short = 't', long = "log", value_enum, default_value_t = EventLog::Info)]
        log: EventLog,

        /// Clear only this record handle (can be repeated).
        #[arg(long = "handle", value_name = "HANDLE")]
        handles: Vec<u16>,
    },

    /// Show how event logs signal the host.
    GetEventInterruptPolicy {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,
    },

    /// Program how event logs signal the host.
    SetEventInterruptPolicy {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Interrupt setting for the informational log.
        #[arg(long, value_name = "MODE", default_value_t = 0)]
        info: u8,

        /// Interrupt setting for the warning log.
        #[arg(long, value_name = "MODE", default_value_t = 0)]
        warning: u8,

        /// Interrupt setting for the failure log.
        #[arg(long, value_name = "MODE", default_value_t = 0)]
        failure: u8,

        /// Interrupt setting for the fatal log.
        #[arg(long, value_name = "MODE", default_value_t = 0)]
        fatal: u8,
    },

    /// Read the device timestamp.
    GetTimestamp {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,
    },

    /// Set the device timestamp.
    SetTimestamp {
        /// Devices to operate on (mem<N> or all).
        #[arg(value_name = "DEVICE")]
        devices: Vec<String>,

        /// Nanoseconds since the epoch (defaults to the host clock).
        #[arg(long, value_name = "NANOS")]
        nanos: Option<u64>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions (auto-detected if not specified with --install).
        #[arg(value_enum)]
        shell: Option<Shell>,

        /// Automatically install completions to your shell configuration.
        #[arg(long)]
        install: bool,
    },
}

fn main() {
    let mut cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);
    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "cxlctl v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    // Config may supply output defaults the flags did not.
    if config.output.json {
        cli.json = true;
    }
    if config.output.color == Some(false) {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    if let Err(err) = run(&cli, &config) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::List => commands::list::cmd_list(cli),
        Commands::Identify { devices } => {
            commands::identify::cmd_identify(cli, &resolve_selector(config, devices)?)
        }
        Commands::GetHealthInfo { devices } => {
            commands::health::cmd_get_health_info(cli, &resolve_selector(config, devices)?)
        }
        Commands::GetAlertConfig { devices } => {
            commands::health::cmd_get_alert_config(cli, &resolve_selector(config, devices)?)
        }
        Commands::SetAlertConfig {
            devices,
            life_used,
            over_temp,
            under_temp,
            volatile_errors,
            persistent_errors,
        } => {
            let args = AlertArgs {
                life_used: *life_used,
                over_temp: *over_temp,
                under_temp: *under_temp,
                volatile_errors: *volatile_errors,
                persistent_errors: *persistent_errors,
            };
            commands::health::cmd_set_alert_config(cli, &resolve_selector(config, devices)?, &args)
        }
        Commands::GetFwInfo { devices, os } => {
            commands::firmware::cmd_get_fw_info(cli, &resolve_selector(config, devices)?, *os)
        }
        Commands::UpdateFw {
            devices,
            file,
            slot,
            hbo,
            os,
            mock,
            block_size,
            max_retries,
        } => {
            let args = UpdateArgs {
                file: file.clone(),
                slot: *slot,
                hbo: *hbo,
                os: *os,
                mock: *mock,
                block_size: *block_size,
                max_retries: *max_retries,
            };
            commands::firmware::cmd_update_fw(
                cli,
                config,
                &resolve_selector(config, devices)?,
                &args,
            )
        }
        Commands::ActivateFw {
            devices,
            slot,
            online,
            os,
        } => commands::firmware::cmd_activate_fw(
            cli,
            &resolve_selector(config, devices)?,
            *slot,
            *online,
            *os,
        ),
        Commands::HboStatus { devices } => {
            commands::firmware::cmd_hbo_status(cli, &resolve_selector(config, devices)?)
        }
        Commands::GetSupportedLogs { devices } => {
            commands::logs::cmd_get_supported_logs(cli, &resolve_selector(config, devices)?)
        }
        Commands::GetLog {
            devices,
            uuid,
            vendor_debug,
        } => commands::logs::cmd_get_log(
            cli,
            &resolve_selector(config, devices)?,
            uuid.as_deref(),
            *vendor_debug,
        ),
        Commands::GetEventRecords { devices, log } => commands::events::cmd_get_event_records(
            cli,
            &resolve_selector(config, devices)?,
            (*log).into(),
        ),
        Commands::ClearEventRecords {
            devices,
            log,
            handles,
        } => commands::events::cmd_clear_event_records(
            cli,
            &resolve_selector(config, devices)?,
            (*log).into(),
            handles,
        ),
        Commands::GetEventInterruptPolicy { devices } => {
            commands::events::cmd_get_interrupt_policy(cli, &resolve_selector(config, devices)?)
        }
        Commands::SetEventInterruptPolicy {
            devices,
            info,
            warning,
            failure,
            fatal,
        } => {
            let policy = cxlctl::ops::events::InterruptPolicy {
                info: *info,
                warning: *warning,
                failure: *failure,
                fatal: *fatal,
            };
            commands::events::cmd_set_interrupt_policy(
                cli,
                &resolve_selector(config, devices)?,
                policy,
            )
        }
        Commands::GetTimestamp { devices } => {
            commands::timestamp::cmd_get_timestamp(cli, &resolve_selector(config, devices)?)
        }
        Commands::SetTimestamp { devices, nanos } => {
            commands::timestamp::cmd_set_timestamp(cli, &resolve_selector(config, devices)?, *nanos)
        }
        Commands::Completions { shell, install } => {
            if *install {
                commands::completions::cmd_completions_install(*shell)
            } else {
                let Some(shell) = *shell else {
                    eprintln!(
                        "{} specify a shell type, e.g.: cxlctl completions bash",
                        style("Error:").red().bold()
                    );
                    eprintln!(
                        "  Or use {} to auto-install completions.",
                        style("cxlctl completions --install").cyan()
                    );
                    std::process::exit(2);
                };
                commands::completions::cmd_completions(shell);
                Ok(())
            }
        }
    }
}

/// Resolve the device selector from CLI arguments or the configured default.
fn resolve_selector(config: &Config, devices: &[String]) -> Result<DeviceSelector> {
    let fallback = config.device.selector.clone().unwrap_or_default();
    let tokens = if devices.is_empty() {
        &fallback
    } else {
        devices
    };
    if tokens.is_empty() {
        return Err(
            CliError::Usage("no device specified (expected mem<N> or all)".to_string()).into(),
        );
    }
    Ok(DeviceSelector::parse(tokens)?)
}

/// Map an error to the process exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<CliError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<cxlctl::Error>() {
        Some(cxlctl::Error::InvalidSelector(_)) => 2,
        Some(cxlctl::Error::DeviceNotFound) => 4,
        _ => 1,
    }
}
