//! Background-operation status word decoding.
//!
//! The vendor HBO status query returns one packed little-endian 64-bit
//! word describing the hidden background operation the device is working
//! on:
//!
//! ```text
//! +-----------------+-------------+---------+---------+-------------+
//! |     opcode      |   percent   | running |  return |  extended   |
//! +-----------------+-------------+---------+---------+-------------+
//! |    bits 0-15    |  bits 16-22 | bit 23  | 32-47   |   48-63     |
//! +-----------------+-------------+---------+---------+-------------+
//! ```

use crate::error::ReturnCode;
use crate::protocol::Opcode;

const OPCODE_SHIFT: u64 = 0;
const PERCENT_SHIFT: u64 = 16;
const RUNNING_SHIFT: u64 = 23;
const RETCODE_SHIFT: u64 = 32;
const EXTENDED_SHIFT: u64 = 48;

const PERCENT_MASK: u64 = 0x7F;

/// Decoded background-operation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HboStatus {
    /// Opcode of the command running in the background.
    pub opcode: Opcode,
    /// Percent complete, 0-100.
    pub percent_complete: u8,
    /// Whether the operation is still running.
    pub is_running: bool,
    /// Return code of the operation (valid once `is_running` is false).
    pub return_code: ReturnCode,
    /// Vendor-specific extended status.
    pub extended_status: u16,
}

impl HboStatus {
    /// Decode a packed status word.
    #[allow(clippy::cast_possible_truncation)] // each field is masked to width
    #[must_use]
    pub fn from_raw(word: u64) -> Self {
        Self {
            opcode: Opcode((word >> OPCODE_SHIFT) as u16),
            percent_complete: ((word >> PERCENT_SHIFT) & PERCENT_MASK) as u8,
            is_running: (word >> RUNNING_SHIFT) & 0x1 != 0,
            return_code: ReturnCode::from_raw((word >> RETCODE_SHIFT) as u16),
            extended_status: (word >> EXTENDED_SHIFT) as u16,
        }
    }

    /// Pack this status back into the wire word.
    #[must_use]
    pub fn to_raw(self) -> u64 {
        u64::from(self.opcode.as_u16()) << OPCODE_SHIFT
            | (u64::from(self.percent_complete) & PERCENT_MASK) << PERCENT_SHIFT
            | u64::from(self.is_running) << RUNNING_SHIFT
            | u64::from(self.return_code.as_raw()) << RETCODE_SHIFT
            | u64::from(self.extended_status) << EXTENDED_SHIFT
    }

    /// Whether the operation finished successfully.
    #[must_use]
    pub fn completed_ok(self) -> bool {
        !self.is_running && self.return_code.is_success()
    }
}
