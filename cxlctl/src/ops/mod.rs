//! Typed mailbox commands.
//!
//! Each submodule covers a group of related opcodes: it encodes the request
//! payload, performs one exchange through an [`Endpoint`], and decodes the
//! response into a plain struct. Nothing here retries or polls; the
//! stateful transfer flow lives in [`crate::firmware`].
//!
//! [`Endpoint`]: crate::transport::Endpoint

pub mod events;
pub mod firmware;
pub mod health;
pub mod identify;
pub mod logs;
pub mod timestamp;

use crate::error::{Error, Result};
use crate::protocol::Opcode;

/// Fail with a malformed-response error when the payload is shorter than
/// the fixed part of a command's output.
pub(crate) fn require_len(opcode: Opcode, payload: &[u8], need: usize) -> Result<()> {
    if payload.len() < need {
        return Err(Error::MalformedResponse {
            opcode: opcode.as_u16(),
            reason: format!("need {need} bytes, got {}", payload.len()),
        });
    }
    Ok(())
}

/// Render a fixed-width ASCII field, stopping at the first NUL and
/// replacing anything unprintable.
pub(crate) fn ascii_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect::<String>()
        .trim_end()
        .to_string()
}
