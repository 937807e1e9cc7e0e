//! Transport abstraction for the device management link.
//!
//! A transport knows how to find attached memory devices, open one of them
//! as an [`Endpoint`], and perform synchronous mailbox exchanges against it.
//! Exactly one request/response round trip happens per [`Endpoint::send`]
//! call; timeouts, retries and polling are the caller's responsibility
//! (see the firmware transfer engine).
//!
//! ```text
//! +--------------------+
//! |  dispatcher / ops  |
//! +---------+----------+
//!           |
//!           v
//! +---------+----------+
//! | Transport/Endpoint |
//! +---------+----------+
//!           |
//!           v
//! +---------+----------+
//! |   LinuxTransport   |
//! | (/dev/cxl/mem* via |
//! |   mailbox ioctl)   |
//! +--------------------+
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use cxlctl::protocol::Opcode;
//! use cxlctl::transport::{Request, Transport};
//!
//! fn probe(transport: &mut dyn Transport) -> cxlctl::Result<()> {
//!     let mut ep = transport.open("mem0")?;
//!     let resp = ep.send(&Request::new(Opcode::IDENTIFY))?;
//!     println!("identify payload: {} bytes", resp.payload.len());
//!     ep.close()?;
//!     Ok(())
//! }
//! ```

#[cfg(feature = "native")]
pub mod linux;

#[cfg(test)]
pub(crate) mod mock;

use crate::error::{Error, ReturnCode, Result};
use crate::protocol::Opcode;

/// One mailbox request: an opcode plus its input payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Command opcode.
    pub opcode: Opcode,
    /// Input payload bytes (may be empty).
    pub payload: Vec<u8>,
}

impl Request {
    /// Build a request with no input payload.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
        }
    }

    /// Build a request carrying an input payload.
    #[must_use]
    pub fn with_payload(opcode: Opcode, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }
}

/// One mailbox response: the device's return code plus output payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status reported by the device.
    pub return_code: ReturnCode,
    /// Output payload bytes (may be empty).
    pub payload: Vec<u8>,
}

impl Response {
    /// Build a successful response.
    #[must_use]
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            return_code: ReturnCode::Success,
            payload,
        }
    }

    /// Whether the device reported success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.return_code.is_success()
    }

    /// Unwrap the payload, mapping any non-success return code to
    /// [`Error::Device`].
    pub fn into_payload(self) -> Result<Vec<u8>> {
        if self.return_code.is_success() {
            Ok(self.payload)
        } else {
            Err(Error::Device(self.return_code))
        }
    }
}

/// An open handle to one attached memory device.
///
/// Obtained from [`Transport::open`]; the holder must call [`close`] once
/// it is done (closing twice is safe). Implementations release the
/// underlying descriptor on drop as a backstop, but the dispatcher closes
/// explicitly on every path.
///
/// [`close`]: Endpoint::close
pub trait Endpoint: Send {
    /// Device name this endpoint is bound to (e.g. "mem0").
    fn name(&self) -> &str;

    /// Perform one synchronous request/response exchange.
    ///
    /// No implicit retry: a transport-level failure surfaces as an error,
    /// and a device-level failure surfaces in the response's return code.
    fn send(&mut self, request: &Request) -> Result<Response>;

    /// Close the endpoint and release resources. Safe to call twice.
    fn close(&mut self) -> Result<()>;
}

/// Access to the set of attached memory devices.
pub trait Transport: Send {
    /// Open the named device.
    fn open(&mut self, name: &str) -> Result<Box<dyn Endpoint>>;

    /// Names of every attached device, in stable order.
    ///
    /// Backs the `all` device selector.
    fn enumerate(&mut self) -> Result<Vec<String>>;
}

#[cfg(feature = "native")]
pub use linux::LinuxTransport;
