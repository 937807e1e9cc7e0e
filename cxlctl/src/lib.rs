//! # cxlctl
//!
//! A library for managing CXL memory devices through the mailbox command
//! interface.
//!
//! This crate provides the core functionality behind the `cxlctl` command
//! line tool, including:
//!
//! - Device selector parsing (`mem<N>` tokens and `all`)
//! - Multi-device command dispatch with per-device open/close discipline
//! - Typed mailbox commands (identify, health, alerts, firmware info,
//!   event logs, command logs, timestamps)
//! - A chunked firmware transfer engine with bounded retries, background
//!   operation polling and an abort path
//!
//! ## Features
//!
//! - `native` (default): Linux character device transport backed by the
//!   kernel CXL mailbox ioctl
//! - `serde`: serialization support for decoded command outputs
//!
//! ## Example
//!
//! ```rust,no_run
//! use cxlctl::ops::identify::identify;
//! use cxlctl::{DeviceSelector, LinuxTransport, for_each_device};
//!
//! fn main() -> cxlctl::Result<()> {
//!     let mut transport = LinuxTransport::new();
//!     let selector = DeviceSelector::parse(&["all"])?;
//!     let count = for_each_device(&mut transport, &selector, |endpoint| {
//!         let info = identify(endpoint)?;
//!         println!("{}: firmware {}", endpoint.name(), info.fw_revision);
//!         Ok(())
//!     })?;
//!     println!("{count} device(s) reported");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod error;
pub mod firmware;
pub mod ops;
pub mod protocol;
pub mod selector;
pub mod transport;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use transport::LinuxTransport;
pub use {
    dispatch::for_each_device,
    error::{Error, Result, ReturnCode},
    firmware::{
        FirmwareImage, FirmwareUpdate, FwFamily, TransferConfig, TransferOutcome, UpdateParams,
        hbo_status,
    },
    protocol::{Opcode, hbo::HboStatus},
    selector::{DeviceSelector, SelectorToken},
    transport::{Endpoint, Request, Response, Transport},
};
