//! Log enumeration and retrieval.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;

use crate::error::{Error, Result};
use crate::ops::require_len;
use crate::protocol::Opcode;
use crate::transport::{Endpoint, Request};

/// Command Effects Log.
pub const CEL_LOG_UUID: [u8; 16] = [
    0x0d, 0xa9, 0xc0, 0xb5, 0xbf, 0x41, 0x4b, 0x78, 0x8f, 0x79, 0x96, 0xb1, 0x62, 0x3b, 0x3f,
    0x17,
];

/// Vendor debug log.
pub const VENDOR_DEBUG_LOG_UUID: [u8; 16] = [
    0x5e, 0x18, 0x19, 0xd9, 0x11, 0xa9, 0x40, 0x0c, 0x81, 0x1f, 0xd6, 0x07, 0x19, 0x40, 0x3d,
    0x86,
];

const SUPPORTED_LOGS_HEADER_LEN: usize = 8;
const SUPPORTED_LOG_ENTRY_LEN: usize = 20;

/// Default chunk size for [`read_log`].
pub const DEFAULT_LOG_CHUNK: u32 = 1024;

/// One entry of the supported-logs list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SupportedLog {
    /// Log identifier.
    pub uuid: [u8; 16],
    /// Log size in bytes.
    pub size: u32,
}

/// Issue GET_SUPPORTED_LOGS and decode the entry list.
pub fn get_supported_logs(endpoint: &mut dyn Endpoint) -> Result<Vec<SupportedLog>> {
    let payload = endpoint
        .send(&Request::new(Opcode::GET_SUPPORTED_LOGS))?
        .into_payload()?;
    parse_supported_logs(&payload)
}

fn parse_supported_logs(payload: &[u8]) -> Result<Vec<SupportedLog>> {
    require_len(Opcode::GET_SUPPORTED_LOGS, payload, SUPPORTED_LOGS_HEADER_LEN)?;

    let count = usize::from((&payload[..2]).read_u16::<LittleEndian>()?);
    require_len(
        Opcode::GET_SUPPORTED_LOGS,
        payload,
        SUPPORTED_LOGS_HEADER_LEN + count * SUPPORTED_LOG_ENTRY_LEN,
    )?;

    let mut rest = &payload[SUPPORTED_LOGS_HEADER_LEN..];
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let mut uuid = [0u8; 16];
        rest.read_exact(&mut uuid)?;
        let size = rest.read_u32::<LittleEndian>()?;
        entries.push(SupportedLog { uuid, size });
    }
    Ok(entries)
}

/// Issue one GET_LOG exchange for a byte range of a log.
#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
pub fn get_log(
    endpoint: &mut dyn Endpoint,
    uuid: &[u8; 16],
    offset: u32,
    length: u32,
) -> Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(24);
    payload.extend_from_slice(uuid);
    payload.write_u32::<LittleEndian>(offset).unwrap();
    payload.write_u32::<LittleEndian>(length).unwrap();

    endpoint
        .send(&Request::with_payload(Opcode::GET_LOG, payload))?
        .into_payload()
}

/// Read a whole log in bounded chunks.
pub fn read_log(
    endpoint: &mut dyn Endpoint,
    uuid: &[u8; 16],
    size: u32,
    chunk_size: u32,
) -> Result<Vec<u8>> {
    if chunk_size == 0 {
        return Err(Error::Config("log chunk size must be nonzero".into()));
    }

    let mut data = Vec::with_capacity(size as usize);
    let mut offset = 0u32;
    while offset < size {
        let length = chunk_size.min(size - offset);
        debug!("Reading log chunk at {offset}, {length} bytes");
        let chunk = get_log(endpoint, uuid, offset, length)?;
        if chunk.is_empty() {
            // Device returned less than asked; stop rather than spin.
            break;
        }
        let got = u32::try_from(chunk.len()).map_err(|_| Error::MalformedResponse {
            opcode: Opcode::GET_LOG.as_u16(),
            reason: "chunk larger than the 32-bit log space".into(),
        })?;
        offset = offset.saturating_add(got);
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Hyphenated lowercase rendering of a log identifier.
#[must_use]
pub fn format_uuid(uuid: &[u8; 16]) -> String {
    let hex: Vec<String> = uuid.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        hex[..4].join(""),
        hex[4..6].join(""),
        hex[6..8].join(""),
        hex[8..10].join(""),
        hex[10..].join("")
    )
}

/// Parse a hyphenated log identifier.
pub fn parse_uuid(text: &str) -> Result<[u8; 16]> {
    let hex: String = text.chars().filter(|c| *c != '-').collect();
    if hex.len() != 32 || text.split('-').count() != 5 {
        return Err(Error::Config(format!("invalid log UUID {text:?}")));
    }

    let mut uuid = [0u8; 16];
    for (i, byte) in uuid.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *byte = u8::from_str_radix(pair, 16)
            .map_err(|_| Error::Config(format!("invalid log UUID {text:?}")))?;
    }
    Ok(uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReturnCode;
    use crate::transport::Transport;
    use crate::transport::mock::{MockDevice, MockTransport, Script};

    #[test]
    fn test_parse_supported_logs() {
        let mut p = Vec::new();
        p.extend_from_slice(&2u16.to_le_bytes());
        p.extend_from_slice(&[0; 6]);
        p.extend_from_slice(&CEL_LOG_UUID);
        p.extend_from_slice(&512u32.to_le_bytes());
        p.extend_from_slice(&VENDOR_DEBUG_LOG_UUID);
        p.extend_from_slice(&4096u32.to_le_bytes());

        let logs = parse_supported_logs(&p).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].uuid, CEL_LOG_UUID);
        assert_eq!(logs[0].size, 512);
        assert_eq!(logs[1].uuid, VENDOR_DEBUG_LOG_UUID);
        assert_eq!(logs[1].size, 4096);
    }

    #[test]
    fn test_parse_supported_logs_truncated_entries() {
        let mut p = Vec::new();
        p.extend_from_slice(&3u16.to_le_bytes());
        p.extend_from_slice(&[0; 6]);
        p.extend_from_slice(&[0; SUPPORTED_LOG_ENTRY_LEN]); // only one entry present
        assert!(matches!(
            parse_supported_logs(&p),
            Err(crate::error::Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_get_log_request_layout() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0").script(
            Opcode::GET_LOG,
            vec![Script::Respond(ReturnCode::Success, vec![0xEE; 8])],
        )]);
        let mut ep = transport.open("mem0").unwrap();
        let data = get_log(ep.as_mut(), &CEL_LOG_UUID, 0x100, 8).unwrap();
        ep.close().unwrap();

        assert_eq!(data, vec![0xEE; 8]);
        let events = transport.events();
        let sent = events
            .iter()
            .find_map(|e| match e {
                crate::transport::mock::Event::Send { opcode, payload, .. }
                    if *opcode == Opcode::GET_LOG =>
                {
                    Some(payload.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(&sent[..16], CEL_LOG_UUID);
        assert_eq!(&sent[16..20], 0x100u32.to_le_bytes());
        assert_eq!(&sent[20..24], 8u32.to_le_bytes());
    }

    #[test]
    fn test_read_log_chunks_until_size() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0").script(
            Opcode::GET_LOG,
            vec![
                Script::Respond(ReturnCode::Success, vec![1; 4]),
                Script::Respond(ReturnCode::Success, vec![2; 4]),
                Script::Respond(ReturnCode::Success, vec![3; 2]),
            ],
        )]);
        let mut ep = transport.open("mem0").unwrap();
        let data = read_log(ep.as_mut(), &CEL_LOG_UUID, 10, 4).unwrap();
        ep.close().unwrap();

        assert_eq!(data, [1, 1, 1, 1, 2, 2, 2, 2, 3, 3]);
    }

    #[test]
    fn test_uuid_round_trip() {
        let text = format_uuid(&CEL_LOG_UUID);
        assert_eq!(text, "0da9c0b5-bf41-4b78-8f79-96b1623b3f17");
        assert_eq!(parse_uuid(&text).unwrap(), CEL_LOG_UUID);
        assert_eq!(
            format_uuid(&VENDOR_DEBUG_LOG_UUID),
            "5e1819d9-11a9-400c-811f-d60719403d86"
        );
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(parse_uuid("not-a-uuid").is_err());
        assert!(parse_uuid("0da9c0b5bf414b788f7996b1623b3f17").is_err());
        assert!(parse_uuid("0da9c0b5-bf41-4b78-8f79-96b1623b3fzz").is_err());
    }
}
