//! Event log records and interrupt policy.

use std::fmt;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, Result};
use crate::ops::require_len;
use crate::protocol::Opcode;
use crate::transport::{Endpoint, Request};

const RECORDS_HEADER_LEN: usize = 0x20;
const RECORD_LEN: usize = 0x80;
const RECORD_FIXED_LEN: usize = 0x30;

/// The four severity-ordered event logs a device keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventLogType {
    /// Informational events.
    Info = 0,
    /// Warnings.
    Warning = 1,
    /// Failures.
    Failure = 2,
    /// Fatal events.
    Fatal = 3,
}

impl fmt::Display for EventLogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Failure => "failure",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// One event record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventRecord {
    /// Record type identifier.
    pub uuid: [u8; 16],
    /// Record flags (three bytes, packed little-endian).
    pub flags: u32,
    /// Handle for clearing this record.
    pub handle: u16,
    /// Handle of a related record, 0 when none.
    pub related_handle: u16,
    /// Device timestamp when the event was logged.
    pub timestamp: u64,
    /// Type-specific payload, undecoded.
    pub payload: Vec<u8>,
}

/// One page of GET_EVENT_RECORDS output.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventRecords {
    /// Page flags.
    pub flags: u8,
    /// Events dropped since the log last overflowed.
    pub overflow_error_count: u16,
    /// Timestamp of the first overflowed event.
    pub first_overflow_timestamp: u64,
    /// Timestamp of the last overflowed event.
    pub last_overflow_timestamp: u64,
    /// Records in this page.
    pub records: Vec<EventRecord>,
}

impl EventRecords {
    /// The log overflowed and dropped events.
    #[must_use]
    pub fn overflowed(&self) -> bool {
        self.flags & 0x01 != 0
    }

    /// More records remain beyond this page.
    #[must_use]
    pub fn more_pending(&self) -> bool {
        self.flags & 0x02 != 0
    }
}

/// Issue GET_EVENT_RECORDS for one log and decode the page.
pub fn get_event_records(
    endpoint: &mut dyn Endpoint,
    log: EventLogType,
) -> Result<EventRecords> {
    let payload = endpoint
        .send(&Request::with_payload(
            Opcode::GET_EVENT_RECORDS,
            vec![log as u8],
        ))?
        .into_payload()?;
    parse_event_records(&payload)
}

fn parse_event_records(payload: &[u8]) -> Result<EventRecords> {
    require_len(Opcode::GET_EVENT_RECORDS, payload, RECORDS_HEADER_LEN)?;

    let mut rest = payload;
    let flags = rest.read_u8()?;
    let _reserved = rest.read_u8()?;
    let overflow_error_count = rest.read_u16::<LittleEndian>()?;
    let first_overflow_timestamp = rest.read_u64::<LittleEndian>()?;
    let last_overflow_timestamp = rest.read_u64::<LittleEndian>()?;
    let count = usize::from(rest.read_u16::<LittleEndian>()?);

    require_len(
        Opcode::GET_EVENT_RECORDS,
        payload,
        RECORDS_HEADER_LEN + count * RECORD_LEN,
    )?;

    let mut records = Vec::with_capacity(count);
    for index in 0..count {
        let start = RECORDS_HEADER_LEN + index * RECORD_LEN;
        records.push(parse_record(&payload[start..start + RECORD_LEN])?);
    }

    Ok(EventRecords {
        flags,
        overflow_error_count,
        first_overflow_timestamp,
        last_overflow_timestamp,
        records,
    })
}

fn parse_record(record: &[u8]) -> Result<EventRecord> {
    let mut rest = record;
    let mut uuid = [0u8; 16];
    rest.read_exact(&mut uuid)?;
    let _length = rest.read_u8()?;
    let flags = rest.read_u24::<LittleEndian>()?;
    let handle = rest.read_u16::<LittleEndian>()?;
    let related_handle = rest.read_u16::<LittleEndian>()?;
    let timestamp = rest.read_u64::<LittleEndian>()?;

    Ok(EventRecord {
        uuid,
        flags,
        handle,
        related_handle,
        timestamp,
        payload: record[RECORD_FIXED_LEN..].to_vec(),
    })
}

/// Issue CLEAR_EVENT_RECORDS.
///
/// With an empty handle list the whole log is cleared; otherwise only the
/// named records are.
#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
pub fn clear_event_records(
    endpoint: &mut dyn Endpoint,
    log: EventLogType,
    handles: &[u16],
) -> Result<()> {
    let count = u8::try_from(handles.len())
        .map_err(|_| Error::Config("at most 255 event handles per clear".into()))?;

    let mut payload = Vec::with_capacity(6 + handles.len() * 2);
    payload.write_u8(log as u8).unwrap();
    payload.write_u8(u8::from(handles.is_empty())).unwrap(); // clear-all flag
    payload.write_u8(count).unwrap();
    payload.extend_from_slice(&[0; 3]);
    for handle in handles {
        payload.write_u16::<LittleEndian>(*handle).unwrap();
    }

    endpoint
        .send(&Request::with_payload(Opcode::CLEAR_EVENT_RECORDS, payload))?
        .into_payload()?;
    Ok(())
}

/// Interrupt delivery settings, one byte per event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct InterruptPolicy {
    /// Informational event log settings.
    pub info: u8,
    /// Warning event log settings.
    pub warning: u8,
    /// Failure event log settings.
    pub failure: u8,
    /// Fatal event log settings.
    pub fatal: u8,
}

/// Issue GET_EVENT_INTERRUPT_POLICY and decode the reply.
pub fn get_event_interrupt_policy(endpoint: &mut dyn Endpoint) -> Result<InterruptPolicy> {
    let payload = endpoint
        .send(&Request::new(Opcode::GET_EVENT_INTERRUPT_POLICY))?
        .into_payload()?;
    require_len(Opcode::GET_EVENT_INTERRUPT_POLICY, &payload, 4)?;

    Ok(InterruptPolicy {
        info: payload[0],
        warning: payload[1],
        failure: payload[2],
        fatal: payload[3],
    })
}

/// Issue SET_EVENT_INTERRUPT_POLICY.
pub fn set_event_interrupt_policy(
    endpoint: &mut dyn Endpoint,
    policy: InterruptPolicy,
) -> Result<()> {
    let payload = vec![policy.info, policy.warning, policy.failure, policy.fatal];
    endpoint
        .send(&Request::with_payload(
            Opcode::SET_EVENT_INTERRUPT_POLICY,
            payload,
        ))?
        .into_payload()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReturnCode;
    use crate::transport::Transport;
    use crate::transport::mock::{Event, MockDevice, MockTransport, Script};

    fn record_bytes(handle: u16, timestamp: u64) -> Vec<u8> {
        let mut r = Vec::new();
        r.extend_from_slice(&[0x11; 16]); // uuid
        r.push(0x80); // length
        r.extend_from_slice(&[0x01, 0x00, 0x00]); // flags
        r.extend_from_slice(&handle.to_le_bytes());
        r.extend_from_slice(&0u16.to_le_bytes());
        r.extend_from_slice(&timestamp.to_le_bytes());
        r.extend_from_slice(&[0; 16]); // reserved
        r.extend_from_slice(&[0xAB; 0x50]); // payload
        assert_eq!(r.len(), RECORD_LEN);
        r
    }

    fn page_bytes(flags: u8, records: &[Vec<u8>]) -> Vec<u8> {
        let mut p = Vec::new();
        p.push(flags);
        p.push(0);
        p.extend_from_slice(&3u16.to_le_bytes()); // overflow count
        p.extend_from_slice(&111u64.to_le_bytes());
        p.extend_from_slice(&222u64.to_le_bytes());
        p.extend_from_slice(&u16::try_from(records.len()).unwrap().to_le_bytes());
        p.extend_from_slice(&[0; 10]);
        for r in records {
            p.extend_from_slice(r);
        }
        p
    }

    #[test]
    fn test_parse_event_page() {
        let payload = page_bytes(0x03, &[record_bytes(7, 1000), record_bytes(8, 2000)]);
        let page = parse_event_records(&payload).unwrap();

        assert!(page.overflowed());
        assert!(page.more_pending());
        assert_eq!(page.overflow_error_count, 3);
        assert_eq!(page.first_overflow_timestamp, 111);
        assert_eq!(page.last_overflow_timestamp, 222);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].handle, 7);
        assert_eq!(page.records[0].flags, 1);
        assert_eq!(page.records[1].timestamp, 2000);
        assert_eq!(page.records[1].payload.len(), 0x50);
    }

    #[test]
    fn test_parse_event_page_empty() {
        let payload = page_bytes(0, &[]);
        let page = parse_event_records(&payload).unwrap();
        assert!(!page.overflowed());
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_parse_rejects_truncated_records() {
        let mut payload = page_bytes(0, &[record_bytes(1, 1)]);
        payload.truncate(RECORDS_HEADER_LEN + 10);
        assert!(matches!(
            parse_event_records(&payload),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_clear_all_sets_flag() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        let mut ep = transport.open("mem0").unwrap();
        clear_event_records(ep.as_mut(), EventLogType::Failure, &[]).unwrap();
        ep.close().unwrap();

        let events = transport.events();
        let sent = events
            .iter()
            .find_map(|e| match e {
                Event::Send { opcode, payload, .. }
                    if *opcode == Opcode::CLEAR_EVENT_RECORDS =>
                {
                    Some(payload.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(sent, [2, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_clear_specific_handles() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        let mut ep = transport.open("mem0").unwrap();
        clear_event_records(ep.as_mut(), EventLogType::Info, &[0x1234, 0x0002]).unwrap();
        ep.close().unwrap();

        let events = transport.events();
        let sent = events
            .iter()
            .find_map(|e| match e {
                Event::Send { opcode, payload, .. }
                    if *opcode == Opcode::CLEAR_EVENT_RECORDS =>
                {
                    Some(payload.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(sent, [0, 0, 2, 0, 0, 0, 0x34, 0x12, 0x02, 0x00]);
    }

    #[test]
    fn test_interrupt_policy_round_trip_wire() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0").script(
            Opcode::GET_EVENT_INTERRUPT_POLICY,
            vec![Script::Respond(ReturnCode::Success, vec![1, 0, 2, 1])],
        )]);
        let mut ep = transport.open("mem0").unwrap();
        let policy = get_event_interrupt_policy(ep.as_mut()).unwrap();
        assert_eq!(policy.info, 1);
        assert_eq!(policy.failure, 2);

        set_event_interrupt_policy(ep.as_mut(), policy).unwrap();
        ep.close().unwrap();

        let events = transport.events();
        let sent = events
            .iter()
            .find_map(|e| match e {
                Event::Send { opcode, payload, .. }
                    if *opcode == Opcode::SET_EVENT_INTERRUPT_POLICY =>
                {
                    Some(payload.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(sent, [1, 0, 2, 1]);
    }
}
