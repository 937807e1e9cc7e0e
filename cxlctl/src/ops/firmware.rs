//! Firmware slot inspection and activation.

use byteorder::WriteBytesExt;

use crate::error::Result;
use crate::ops::{ascii_field, require_len};
use crate::protocol::Opcode;
use crate::transport::{Endpoint, Request};

const FW_INFO_LEN: usize = 80;
const REVISION_LEN: usize = 16;

/// Decoded firmware slot information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FwInfo {
    /// Number of firmware slots the device carries.
    pub slots_supported: u8,
    /// Slot holding the running firmware.
    pub active_slot: u8,
    /// Slot staged for activation, 0 when none.
    pub staged_slot: u8,
    /// Whether the device can activate new firmware without a reset.
    pub online_activation: bool,
    /// Revision string per slot; empty for unused slots.
    pub slot_revisions: [String; 4],
}

impl FwInfo {
    /// Revision of the running firmware, when the active slot is valid.
    #[must_use]
    pub fn active_revision(&self) -> Option<&str> {
        let index = usize::from(self.active_slot).checked_sub(1)?;
        self.slot_revisions.get(index).map(String::as_str)
    }
}

/// Issue GET_FW_INFO and decode the reply.
pub fn get_fw_info(endpoint: &mut dyn Endpoint) -> Result<FwInfo> {
    fetch_fw_info(endpoint, Opcode::GET_FW_INFO)
}

/// Vendor variant reporting the OS (boot1) image slots.
pub fn get_os_info(endpoint: &mut dyn Endpoint) -> Result<FwInfo> {
    fetch_fw_info(endpoint, Opcode::OEM_GET_OS_INFO)
}

fn fetch_fw_info(endpoint: &mut dyn Endpoint, opcode: Opcode) -> Result<FwInfo> {
    let payload = endpoint.send(&Request::new(opcode))?.into_payload()?;
    parse_fw_info(opcode, &payload)
}

fn parse_fw_info(opcode: Opcode, payload: &[u8]) -> Result<FwInfo> {
    require_len(opcode, payload, FW_INFO_LEN)?;

    // Slot numbers are packed three bits each into the info byte.
    let slot_info = payload[1];
    let revisions = |slot: usize| {
        let start = 16 + slot * REVISION_LEN;
        ascii_field(&payload[start..start + REVISION_LEN])
    };

    Ok(FwInfo {
        slots_supported: payload[0],
        active_slot: slot_info & 0x7,
        staged_slot: (slot_info >> 3) & 0x7,
        online_activation: payload[2] & 0x01 != 0,
        slot_revisions: [revisions(0), revisions(1), revisions(2), revisions(3)],
    })
}

/// When the new firmware takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActivateMethod {
    /// Activate immediately, without a reset.
    Online = 0,
    /// Activate on the next device reset.
    OnReset = 1,
}

/// Issue ACTIVATE_FW for a slot.
pub fn activate_fw(
    endpoint: &mut dyn Endpoint,
    method: ActivateMethod,
    slot: u8,
) -> Result<()> {
    activate(endpoint, Opcode::ACTIVATE_FW, method, slot)
}

/// Vendor variant activating a staged OS (boot1) image.
pub fn activate_os(
    endpoint: &mut dyn Endpoint,
    method: ActivateMethod,
    slot: u8,
) -> Result<()> {
    activate(endpoint, Opcode::OEM_ACTIVATE_FW, method, slot)
}

#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
fn activate(
    endpoint: &mut dyn Endpoint,
    opcode: Opcode,
    method: ActivateMethod,
    slot: u8,
) -> Result<()> {
    let mut payload = Vec::with_capacity(2);
    payload.write_u8(method as u8).unwrap();
    payload.write_u8(slot).unwrap();

    endpoint
        .send(&Request::with_payload(opcode, payload))?
        .into_payload()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ReturnCode};
    use crate::transport::Transport;
    use crate::transport::mock::{MockDevice, MockTransport, Script};

    fn fw_info_payload() -> Vec<u8> {
        let mut p = vec![
            4,          // slots supported
            0x02 | 0x18, // active slot 2, staged slot 3
            0x01,       // online activation
        ];
        p.extend_from_slice(&[0; 13]); // reserved
        p.extend_from_slice(b"slotA-1.0\0\0\0\0\0\0\0");
        p.extend_from_slice(b"slotB-1.1\0\0\0\0\0\0\0");
        p.extend_from_slice(b"slotC-2.0\0\0\0\0\0\0\0");
        p.extend_from_slice(&[0; 16]); // slot 4 unused
        assert_eq!(p.len(), FW_INFO_LEN);
        p
    }

    #[test]
    fn test_parse_fw_info() {
        let info = parse_fw_info(Opcode::GET_FW_INFO, &fw_info_payload()).unwrap();
        assert_eq!(info.slots_supported, 4);
        assert_eq!(info.active_slot, 2);
        assert_eq!(info.staged_slot, 3);
        assert!(info.online_activation);
        assert_eq!(info.slot_revisions[0], "slotA-1.0");
        assert_eq!(info.slot_revisions[3], "");
        assert_eq!(info.active_revision(), Some("slotB-1.1"));
    }

    #[test]
    fn test_active_revision_none_when_no_active_slot() {
        let mut payload = fw_info_payload();
        payload[1] = 0;
        let info = parse_fw_info(Opcode::GET_FW_INFO, &payload).unwrap();
        assert_eq!(info.active_revision(), None);
    }

    #[test]
    fn test_parse_rejects_short_payload() {
        assert!(matches!(
            parse_fw_info(Opcode::GET_FW_INFO, &[0; 10]),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_activate_fw_payload() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        let mut ep = transport.open("mem0").unwrap();
        activate_fw(ep.as_mut(), ActivateMethod::OnReset, 2).unwrap();
        ep.close().unwrap();

        let events = transport.events();
        let sent = events
            .iter()
            .find_map(|e| match e {
                crate::transport::mock::Event::Send { opcode, payload, .. }
                    if *opcode == Opcode::ACTIVATE_FW =>
                {
                    Some(payload.clone())
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(sent, [1, 2]);
    }

    #[test]
    fn test_activate_os_uses_vendor_opcode() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        let mut ep = transport.open("mem0").unwrap();
        activate_os(ep.as_mut(), ActivateMethod::Online, 1).unwrap();
        ep.close().unwrap();

        assert_eq!(
            transport.sent_action_bytes(Opcode::OEM_ACTIVATE_FW),
            [0]
        );
        assert!(transport.sent_action_bytes(Opcode::ACTIVATE_FW).is_empty());
    }

    #[test]
    fn test_activate_fw_surfaces_device_error() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0").script(
            Opcode::ACTIVATE_FW,
            vec![Script::Respond(ReturnCode::FwSlot, Vec::new())],
        )]);
        let mut ep = transport.open("mem0").unwrap();
        let err = activate_fw(ep.as_mut(), ActivateMethod::Online, 9).unwrap_err();
        ep.close().unwrap();

        match err {
            Error::Device(code) => assert_eq!(code, ReturnCode::FwSlot),
            other => panic!("expected device error, got {other:?}"),
        }
    }
}
