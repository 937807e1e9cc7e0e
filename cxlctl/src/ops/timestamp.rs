//! Device timestamp.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::Result;
use crate::ops::require_len;
use crate::protocol::Opcode;
use crate::transport::{Endpoint, Request};

/// Read the device clock, in nanoseconds since the epoch it was set to.
pub fn get_timestamp(endpoint: &mut dyn Endpoint) -> Result<u64> {
    let payload = endpoint
        .send(&Request::new(Opcode::GET_TIMESTAMP))?
        .into_payload()?;
    require_len(Opcode::GET_TIMESTAMP, &payload, 8)?;
    Ok((&payload[..]).read_u64::<LittleEndian>()?)
}

/// Set the device clock.
#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
pub fn set_timestamp(endpoint: &mut dyn Endpoint, nanos: u64) -> Result<()> {
    let mut payload = Vec::with_capacity(8);
    payload.write_u64::<LittleEndian>(nanos).unwrap();
    endpoint
        .send(&Request::with_payload(Opcode::SET_TIMESTAMP, payload))?
        .into_payload()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ReturnCode};
    use crate::transport::Transport;
    use crate::transport::mock::{Event, MockDevice, MockTransport, Script};

    #[test]
    fn test_get_timestamp_decodes_word() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0").script(
            Opcode::GET_TIMESTAMP,
            vec![Script::Respond(
                ReturnCode::Success,
                0x0102_0304_0506_0708u64.to_le_bytes().to_vec(),
            )],
        )]);
        let mut ep = transport.open("mem0").unwrap();
        let ts = get_timestamp(ep.as_mut()).unwrap();
        ep.close().unwrap();
        assert_eq!(ts, 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_get_timestamp_rejects_short_reply() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0").script(
            Opcode::GET_TIMESTAMP,
            vec![Script::Respond(ReturnCode::Success, vec![0; 2])],
        )]);
        let mut ep = transport.open("mem0").unwrap();
        let err = get_timestamp(ep.as_mut()).unwrap_err();
        ep.close().unwrap();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[test]
    fn test_set_timestamp_encodes_word() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        let mut ep = transport.open("mem0").unwrap();
        set_timestamp(ep.as_mut(), 0xDEAD_BEEF).unwrap();
        ep.close().unwrap();

        let events = transport.events();
        let sent = events
            .iter()
            .find_map(|e| match e {
                Event::Send { opcode, payload, .. } if *opcode == Opcode::SET_TIMESTAMP => {
                    Some(payload.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(sent, 0xDEAD_BEEFu64.to_le_bytes());
    }
}
