//! Mailbox command-set and opcode definitions.
//!
//! Every request carries a 16-bit opcode made of a command-set byte and a
//! command byte:
//!
//! ```text
//! +-------------+-----------+
//! | command set |  command  |
//! +-------------+-----------+
//! |  bits 15-8  |  bits 7-0 |
//! +-------------+-----------+
//! ```
//!
//! Command sets below 0xC0 are defined by the CXL specification; sets 0xC0
//! and above are vendor-defined. The vendor OEM management set (0xCD)
//! carries the background-operation status query and the alternate firmware
//! transfer encodings used for OS images and background-capable controllers.

pub mod hbo;

use std::fmt;

/// A 16-bit mailbox command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub u16);

/// Vendor command set for DDR/DIMM management.
pub const VENDOR_SET_DDR_DIMM: u8 = 0xC5;

/// Vendor command set for OEM management (firmware and background ops).
pub const VENDOR_SET_OEM: u8 = 0xCD;

/// Vendor command set for health management.
pub const VENDOR_SET_HEALTH: u8 = 0xCE;

/// Vendor command set for everything that fits nowhere else.
pub const VENDOR_SET_OTHERS: u8 = 0xFB;

impl Opcode {
    /// Get Event Records (spec command set 0x01).
    pub const GET_EVENT_RECORDS: Self = Self(0x0100);
    /// Clear Event Records.
    pub const CLEAR_EVENT_RECORDS: Self = Self(0x0101);
    /// Get Event Interrupt Policy.
    pub const GET_EVENT_INTERRUPT_POLICY: Self = Self(0x0102);
    /// Set Event Interrupt Policy.
    pub const SET_EVENT_INTERRUPT_POLICY: Self = Self(0x0103);

    /// Get FW Info (spec command set 0x02).
    pub const GET_FW_INFO: Self = Self(0x0200);
    /// Transfer FW, one block per request.
    pub const TRANSFER_FW: Self = Self(0x0201);
    /// Activate FW.
    pub const ACTIVATE_FW: Self = Self(0x0202);

    /// Get Timestamp (spec command set 0x03).
    pub const GET_TIMESTAMP: Self = Self(0x0300);
    /// Set Timestamp.
    pub const SET_TIMESTAMP: Self = Self(0x0301);

    /// Get Supported Logs (spec command set 0x04).
    pub const GET_SUPPORTED_LOGS: Self = Self(0x0400);
    /// Get Log.
    pub const GET_LOG: Self = Self(0x0401);

    /// Identify Memory Device (spec command set 0x40).
    pub const IDENTIFY: Self = Self(0x4000);

    /// Get Health Info (spec command set 0x42).
    pub const GET_HEALTH_INFO: Self = Self(0x4200);
    /// Get Alert Configuration.
    pub const GET_ALERT_CONFIG: Self = Self(0x4201);
    /// Set Alert Configuration.
    pub const SET_ALERT_CONFIG: Self = Self(0x4202);

    /// Vendor: background-operation status word query.
    pub const OEM_HBO_STATUS: Self = Self(0xCD00);
    /// Vendor: Transfer FW variant completing as a background operation.
    pub const OEM_TRANSFER_FW: Self = Self(0xCD01);
    /// Vendor: Activate FW variant completing as a background operation.
    pub const OEM_ACTIVATE_FW: Self = Self(0xCD02);
    /// Vendor: Get OS image info.
    pub const OEM_GET_OS_INFO: Self = Self(0xCD03);
    /// Vendor: Transfer OS image.
    pub const OEM_TRANSFER_OS: Self = Self(0xCD04);

    /// Build an opcode from its command-set and command bytes.
    #[must_use]
    pub fn from_parts(set: u8, command: u8) -> Self {
        Self(u16::from(set) << 8 | u16::from(command))
    }

    /// Command-set byte (bits 15-8).
    #[must_use]
    pub fn command_set(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Command byte (bits 7-0).
    #[must_use]
    pub fn command(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Whether this opcode belongs to a vendor-defined command set.
    #[must_use]
    pub fn is_vendor(self) -> bool {
        self.command_set() >= 0xC0
    }

    /// Raw 16-bit value.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for Opcode {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}
