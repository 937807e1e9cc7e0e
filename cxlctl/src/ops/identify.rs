//! Device identification.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::Result;
use crate::ops::{ascii_field, require_len};
use crate::protocol::Opcode;
use crate::transport::{Endpoint, Request};

/// Capacity fields in the IDENTIFY payload are in units of this many bytes.
pub const CAPACITY_MULTIPLIER: u64 = 256 * 1024 * 1024;

/// Fixed length of the IDENTIFY output payload.
const IDENTIFY_LEN: usize = 67;

/// Decoded IDENTIFY output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IdentifyInfo {
    /// Active firmware revision.
    pub fw_revision: String,
    /// Total usable capacity in bytes.
    pub total_capacity: u64,
    /// Volatile-only capacity in bytes.
    pub volatile_only_capacity: u64,
    /// Persistent-only capacity in bytes.
    pub persistent_only_capacity: u64,
    /// Partition alignment in bytes.
    pub partition_align: u64,
    /// Informational event log capacity, in records.
    pub info_event_log_size: u16,
    /// Warning event log capacity, in records.
    pub warning_event_log_size: u16,
    /// Failure event log capacity, in records.
    pub failure_event_log_size: u16,
    /// Fatal event log capacity, in records.
    pub fatal_event_log_size: u16,
    /// Label storage area size in bytes.
    pub lsa_size: u32,
    /// Maximum poison list records (24-bit on the wire).
    pub poison_list_max_records: u32,
    /// Injected poison limit.
    pub inject_poison_limit: u16,
    /// Poison handling capability bits.
    pub poison_caps: u8,
    /// QoS telemetry capability bits.
    pub qos_telemetry_caps: u8,
}

/// Issue IDENTIFY and decode the reply.
pub fn identify(endpoint: &mut dyn Endpoint) -> Result<IdentifyInfo> {
    let payload = endpoint
        .send(&Request::new(Opcode::IDENTIFY))?
        .into_payload()?;
    parse(&payload)
}

fn parse(payload: &[u8]) -> Result<IdentifyInfo> {
    require_len(Opcode::IDENTIFY, payload, IDENTIFY_LEN)?;

    let mut rest = &payload[16..];
    let total_capacity = rest.read_u64::<LittleEndian>()?;
    let volatile_only_capacity = rest.read_u64::<LittleEndian>()?;
    let persistent_only_capacity = rest.read_u64::<LittleEndian>()?;
    let partition_align = rest.read_u64::<LittleEndian>()?;
    let info_event_log_size = rest.read_u16::<LittleEndian>()?;
    let warning_event_log_size = rest.read_u16::<LittleEndian>()?;
    let failure_event_log_size = rest.read_u16::<LittleEndian>()?;
    let fatal_event_log_size = rest.read_u16::<LittleEndian>()?;
    let lsa_size = rest.read_u32::<LittleEndian>()?;
    let poison_list_max_records = rest.read_u24::<LittleEndian>()?;
    let inject_poison_limit = rest.read_u16::<LittleEndian>()?;
    let poison_caps = rest.read_u8()?;
    let qos_telemetry_caps = rest.read_u8()?;

    Ok(IdentifyInfo {
        fw_revision: ascii_field(&payload[..16]),
        total_capacity: total_capacity * CAPACITY_MULTIPLIER,
        volatile_only_capacity: volatile_only_capacity * CAPACITY_MULTIPLIER,
        persistent_only_capacity: persistent_only_capacity * CAPACITY_MULTIPLIER,
        partition_align: partition_align * CAPACITY_MULTIPLIER,
        info_event_log_size,
        warning_event_log_size,
        failure_event_log_size,
        fatal_event_log_size,
        lsa_size,
        poison_list_max_records,
        inject_poison_limit,
        poison_caps,
        qos_telemetry_caps,
    })
}
