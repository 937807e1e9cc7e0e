//! Error types for cxlctl.

use std::io;
use thiserror::Error;

/// Result type for cxlctl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for cxlctl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (character device, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No selector token named a recognized device.
    #[error("Invalid device selector: {0}")]
    InvalidSelector(String),

    /// Device reported a non-success mailbox return code.
    #[error("Device error: {0}")]
    Device(ReturnCode),

    /// Mailbox response was shorter or differently shaped than expected.
    #[error("Malformed response for {opcode:#06x}: {reason}")]
    MalformedResponse {
        /// Opcode of the request the response belongs to.
        opcode: u16,
        /// What was wrong with the payload.
        reason: String,
    },

    /// Background operation did not finish within the polling budget.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// No matching device is attached.
    #[error("Device not found")]
    DeviceNotFound,

    /// Firmware image cannot be transferred.
    #[error("Invalid firmware image: {0}")]
    InvalidImage(String),

    /// Endpoint is closed or otherwise unusable.
    #[error("Endpoint unavailable: {0}")]
    Endpoint(String),

    /// Unsupported operation for this device or transport.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Mailbox command return codes as defined by the device management
/// protocol. The numeric values travel on the wire in the response status
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReturnCode {
    /// Command completed successfully.
    Success = 0x0000,
    /// Command started as a background operation; poll for completion.
    Background = 0x0001,
    /// Invalid input parameter.
    InvalidInput = 0x0002,
    /// Command not supported by this device.
    Unsupported = 0x0003,
    /// Internal device error.
    Internal = 0x0004,
    /// Transient failure, retry is reasonable.
    Retry = 0x0005,
    /// Device busy.
    Busy = 0x0006,
    /// Media is disabled.
    MediaDisabled = 0x0007,
    /// A firmware transfer is already in progress.
    FwInProgress = 0x0008,
    /// Firmware transfer block received out of order.
    FwOutOfOrder = 0x0009,
    /// Firmware authentication failed.
    FwAuth = 0x000A,
    /// Transfer targeted an invalid firmware slot.
    FwSlot = 0x000B,
    /// Firmware rollback rejected.
    FwRollback = 0x000C,
    /// Firmware activation requires a reset.
    FwReset = 0x000D,
    /// Invalid handle.
    InvalidHandle = 0x000E,
    /// Invalid physical address.
    InvalidAddress = 0x000F,
    /// Injected poison limit reached.
    PoisonLimit = 0x0010,
    /// Media failure.
    MediaFailure = 0x0011,
    /// Operation aborted by the device.
    Aborted = 0x0012,
    /// Invalid security state for this command.
    Security = 0x0013,
    /// Incorrect passphrase.
    Passphrase = 0x0014,
    /// Unsupported mailbox for this command.
    InvalidMailbox = 0x0015,
    /// Invalid payload length.
    InvalidPayloadLength = 0x0016,
    /// Any code this library does not know by name.
    Unknown(u16),
}

impl ReturnCode {
    /// Map a raw 16-bit status field to a return code.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x0000 => Self::Success,
            0x0001 => Self::Background,
            0x0002 => Self::InvalidInput,
            0x0003 => Self::Unsupported,
            0x0004 => Self::Internal,
            0x0005 => Self::Retry,
            0x0006 => Self::Busy,
            0x0007 => Self::MediaDisabled,
            0x0008 => Self::FwInProgress,
            0x0009 => Self::FwOutOfOrder,
            0x000A => Self::FwAuth,
            0x000B => Self::FwSlot,
            0x000C => Self::FwRollback,
            0x000D => Self::FwReset,
            0x000E => Self::InvalidHandle,
            0x000F => Self::InvalidAddress,
            0x0010 => Self::PoisonLimit,
            0x0011 => Self::MediaFailure,
            0x0012 => Self::Aborted,
            0x0013 => Self::Security,
            0x0014 => Self::Passphrase,
            0x0015 => Self::InvalidMailbox,
            0x0016 => Self::InvalidPayloadLength,
            other => Self::Unknown(other),
        }
    }

    /// Raw 16-bit wire value of this code.
    #[must_use]
    pub fn as_raw(self) -> u16 {
        match self {
            Self::Success => 0x0000,
            Self::Background => 0x0001,
            Self::InvalidInput => 0x0002,
            Self::Unsupported => 0x0003,
            Self::Internal => 0x0004,
            Self::Retry => 0x0005,
            Self::Busy => 0x0006,
            Self::MediaDisabled => 0x0007,
            Self::FwInProgress => 0x0008,
            Self::FwOutOfOrder => 0x0009,
            Self::FwAuth => 0x000A,
            Self::FwSlot => 0x000B,
            Self::FwRollback => 0x000C,
            Self::FwReset => 0x000D,
            Self::InvalidHandle => 0x000E,
            Self::InvalidAddress => 0x000F,
            Self::PoisonLimit => 0x0010,
            Self::MediaFailure => 0x0011,
            Self::Aborted => 0x0012,
            Self::Security => 0x0013,
            Self::Passphrase => 0x0014,
            Self::InvalidMailbox => 0x0015,
            Self::InvalidPayloadLength => 0x0016,
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether this code means "command ran to completion".
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether this code means "background operation still running".
    ///
    /// Never a terminal failure; callers are expected to poll again.
    #[must_use]
    pub fn is_background(self) -> bool {
        matches!(self, Self::Background)
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Success => "success",
            Self::Background => "background operation started",
            Self::InvalidInput => "invalid input",
            Self::Unsupported => "unsupported command",
            Self::Internal => "internal device error",
            Self::Retry => "retry required",
            Self::Busy => "device busy",
            Self::MediaDisabled => "media disabled",
            Self::FwInProgress => "firmware transfer in progress",
            Self::FwOutOfOrder => "firmware block out of order",
            Self::FwAuth => "firmware authentication failed",
            Self::FwSlot => "invalid firmware slot",
            Self::FwRollback => "firmware rollback rejected",
            Self::FwReset => "firmware requires reset",
            Self::InvalidHandle => "invalid handle",
            Self::InvalidAddress => "invalid physical address",
            Self::PoisonLimit => "poison limit reached",
            Self::MediaFailure => "media failure",
            Self::Aborted => "aborted by device",
            Self::Security => "invalid security state",
            Self::Passphrase => "incorrect passphrase",
            Self::InvalidMailbox => "unsupported mailbox",
            Self::InvalidPayloadLength => "invalid payload length",
            Self::Unknown(raw) => return write!(f, "unknown status {raw:#06x}"),
        };
        write!(f, "{name} ({:#06x})", self.as_raw())
    }
}
