//! Firmware transfer engine.
//!
//! Uploads a firmware image to one device slot as a sequence of fixed-size
//! blocks. Block 0 is sent with INITIATE, interior blocks with CONTINUE,
//! and the final block with END; after each accepted block the
//! background-operation status is polled until the device reports idle.
//! Transient failures are retried a bounded number of times, and once the
//! budget is exhausted the engine sends a single ABORT and returns the
//! last error it observed.

use std::fmt;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::Opcode;
use crate::protocol::hbo::HboStatus;
use crate::transport::{Endpoint, Request, Response};

/// Transfer offsets are expressed in units of this many bytes.
pub const OFFSET_UNIT: usize = 128;

/// Offset value carried by ABORT, never valid for a real block.
pub const ABORT_OFFSET: u32 = 0xFFFF_FFFF;

/// Block data starts at this offset in the request payload.
const HEADER_LEN: usize = 0x80;

/// Length of the packed background-operation status word.
const STATUS_WORD_LEN: usize = 8;

/// A firmware image buffered in memory for one transfer session.
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    data: Vec<u8>,
}

impl FirmwareImage {
    /// Read an image file into memory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        debug!("Read firmware image {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(data)
    }

    /// Wrap an in-memory image. Empty images are rejected.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidImage("image is empty".into()));
        }
        Ok(Self { data })
    }

    /// Image length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false; empty images cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of blocks at the given block size, rounding up.
    #[must_use]
    pub fn block_count(&self, block_size: usize) -> usize {
        self.data.len().div_ceil(block_size)
    }

    /// The bytes of one block; the final block may be short.
    #[must_use]
    pub fn block(&self, index: usize, block_size: usize) -> &[u8] {
        let start = index * block_size;
        let end = (start + block_size).min(self.data.len());
        &self.data[start..end]
    }
}

/// Wire codes for the four transfer actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferAction {
    /// First block of a new session.
    Initiate = 1,
    /// Interior block.
    Continue = 2,
    /// Final block; the device finalizes the image.
    End = 3,
    /// Cancel the session without finalizing.
    Abort = 4,
}

impl TransferAction {
    /// Action for a block given its position in the session.
    ///
    /// A single-block image sends INITIATE only; END is never emitted
    /// without at least one preceding block.
    #[must_use]
    pub fn for_block(index: usize, total_blocks: usize) -> Self {
        if index == 0 {
            Self::Initiate
        } else if index + 1 == total_blocks {
            Self::End
        } else {
            Self::Continue
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initiate => "INITIATE",
            Self::Continue => "CONTINUE",
            Self::End => "END",
            Self::Abort => "ABORT",
        };
        f.write_str(name)
    }
}

/// Which transfer command family to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FwFamily {
    /// The standards-defined TRANSFER_FW command.
    #[default]
    Standard,
    /// Vendor variant that runs the transfer as a background operation.
    OemHbo,
    /// Vendor OS (boot1) image transfer.
    Os,
}

impl FwFamily {
    /// Map the command-line flags to a family; the OS image flag wins
    /// when both are set.
    #[must_use]
    pub fn from_flags(is_os: bool, hbo: bool) -> Self {
        if is_os {
            Self::Os
        } else if hbo {
            Self::OemHbo
        } else {
            Self::Standard
        }
    }

    /// Transfer opcode for this family.
    #[must_use]
    pub fn opcode(self) -> Opcode {
        match self {
            Self::Standard => Opcode::TRANSFER_FW,
            Self::OemHbo => Opcode::OEM_TRANSFER_FW,
            Self::Os => Opcode::OEM_TRANSFER_OS,
        }
    }
}

/// Tunables for one transfer session.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Bytes per block; must be a nonzero multiple of [`OFFSET_UNIT`].
    pub block_size: usize,
    /// Retries allowed per block or poll, after the first attempt.
    pub max_retries: u32,
    /// Delay before each retry.
    pub retry_delay: Duration,
    /// Settle delay before sending ABORT.
    pub abort_delay: Duration,
    /// Delay between polls while the device reports the operation running.
    pub poll_interval: Duration,
    /// Polls allowed while an operation stays running, per block.
    pub max_status_polls: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            block_size: 128 * 1024,
            max_retries: 10,
            retry_delay: Duration::from_secs(10),
            abort_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            max_status_polls: 120,
        }
    }
}

/// Parameters of one firmware update invocation.
#[derive(Debug, Clone)]
pub struct UpdateParams {
    /// Target firmware slot.
    pub slot: u8,
    /// Command family to use.
    pub family: FwFamily,
    /// Deliberately abort after the first block (test hook).
    pub mock: bool,
}

/// How a transfer session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Every block was accepted and the session finalized.
    Completed,
    /// The session was aborted cleanly after the first block (mock runs).
    Aborted,
}

/// Fetch and decode the background-operation status word.
pub fn hbo_status(endpoint: &mut dyn Endpoint) -> Result<HboStatus> {
    let payload = endpoint
        .send(&Request::new(Opcode::OEM_HBO_STATUS))?
        .into_payload()?;
    if payload.len() < STATUS_WORD_LEN {
        return Err(Error::MalformedResponse {
            opcode: Opcode::OEM_HBO_STATUS.as_u16(),
            reason: format!(
                "status word needs {STATUS_WORD_LEN} bytes, got {}",
                payload.len()
            ),
        });
    }
    let word = (&payload[..]).read_u64::<LittleEndian>()?;
    Ok(HboStatus::from_raw(word))
}

/// Drives one firmware transfer session against one endpoint.
pub struct FirmwareUpdate<'a> {
    endpoint: &'a mut dyn Endpoint,
    config: TransferConfig,
    sleep: Box<dyn FnMut(Duration) + 'a>,
}

impl<'a> FirmwareUpdate<'a> {
    /// New session with default tunables.
    pub fn new(endpoint: &'a mut dyn Endpoint) -> Self {
        Self::with_config(endpoint, TransferConfig::default())
    }

    /// New session with custom tunables.
    pub fn with_config(endpoint: &'a mut dyn Endpoint, config: TransferConfig) -> Self {
        Self {
            endpoint,
            config,
            sleep: Box::new(thread::sleep),
        }
    }

    /// Replace the blocking sleep, letting tests run without real delays.
    #[must_use]
    pub fn with_sleep_fn(mut self, sleep: impl FnMut(Duration) + 'a) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    /// Transfer the image to the device.
    ///
    /// # Arguments
    ///
    /// * `image` - Firmware image to upload
    /// * `params` - Slot, command family, and test flags
    /// * `progress` - Progress callback (bytes sent, total bytes)
    pub fn run<F>(
        &mut self,
        image: &FirmwareImage,
        params: &UpdateParams,
        mut progress: F,
    ) -> Result<TransferOutcome>
    where
        F: FnMut(usize, usize),
    {
        let block_size = self.config.block_size;
        if block_size == 0 || block_size % OFFSET_UNIT != 0 {
            return Err(Error::Config(format!(
                "block size {block_size} is not a nonzero multiple of {OFFSET_UNIT}"
            )));
        }

        let opcode = params.family.opcode();
        let total_blocks = image.block_count(block_size);
        info!(
            "Transferring {} bytes to slot {} in {total_blocks} blocks via {opcode}",
            image.len(),
            params.slot
        );

        for index in 0..total_blocks {
            let action = TransferAction::for_block(index, total_blocks);
            let chunk = image.block(index, block_size);
            let offset = block_offset(index, block_size)?;
            debug!(
                "Block {}/{total_blocks}: {action}, {} bytes",
                index + 1,
                chunk.len()
            );

            if let Err(e) = self.send_with_retry(opcode, action, params.slot, offset, chunk) {
                return self.abort(opcode, params.slot, Some(e));
            }
            if let Err(e) = self.await_background() {
                return self.abort(opcode, params.slot, Some(e));
            }
            progress(index * block_size + chunk.len(), image.len());

            if params.mock {
                info!("Mock transfer requested, aborting after block {}", index + 1);
                return self.abort(opcode, params.slot, None);
            }
        }

        info!("Firmware transfer complete");
        Ok(TransferOutcome::Completed)
    }

    /// Send one block, retrying transient failures with a delay between
    /// attempts.
    fn send_with_retry(
        &mut self,
        opcode: Opcode,
        action: TransferAction,
        slot: u8,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        let request = transfer_request(opcode, action, slot, offset, data);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.endpoint.send(&request) {
                Ok(response) if accepted(&response) => return Ok(()),
                Ok(response) => {
                    warn!("Device rejected {action}: {}", response.return_code);
                    if attempt > self.config.max_retries {
                        return Err(Error::Device(response.return_code));
                    }
                }
                Err(e) => {
                    warn!("Transport error during {action}: {e}");
                    if attempt > self.config.max_retries {
                        return Err(e);
                    }
                }
            }
            debug!(
                "Retrying {action} (attempt {}/{})",
                attempt + 1,
                self.config.max_retries + 1
            );
            (self.sleep)(self.config.retry_delay);
        }
    }

    /// Poll the background-operation status until the device reports the
    /// operation finished.
    ///
    /// A running operation is not a failure: it is re-polled on the poll
    /// interval, bounded only by `max_status_polls`. Poll failures and
    /// terminal error codes consume the retry budget instead.
    fn await_background(&mut self) -> Result<()> {
        let mut polls = 0;
        let mut failures = 0;

        loop {
            match hbo_status(self.endpoint) {
                Ok(status) if status.is_running || status.return_code.is_background() => {
                    polls += 1;
                    if polls > self.config.max_status_polls {
                        return Err(Error::Timeout(format!(
                            "background operation still running after {} polls",
                            self.config.max_status_polls
                        )));
                    }
                    debug!("Background operation {}% complete", status.percent_complete);
                    (self.sleep)(self.config.poll_interval);
                }
                Ok(status) if status.completed_ok() => return Ok(()),
                Ok(status) => {
                    failures += 1;
                    warn!(
                        "Background operation failed: {} (extended 0x{:04X})",
                        status.return_code, status.extended_status
                    );
                    if failures > self.config.max_retries {
                        return Err(Error::Device(status.return_code));
                    }
                    (self.sleep)(self.config.retry_delay);
                }
                Err(e) => {
                    failures += 1;
                    warn!("Status poll failed: {e}");
                    if failures > self.config.max_retries {
                        return Err(e);
                    }
                    (self.sleep)(self.config.retry_delay);
                }
            }
        }
    }

    /// Send the single ABORT that ends an abnormal session.
    ///
    /// With a `cause` the session already failed and the abort is
    /// best-effort: the causing error is returned unless the abort send
    /// itself fails, in which case the later error wins. Without a cause
    /// (mock runs) a clean abort is the expected outcome.
    fn abort(
        &mut self,
        opcode: Opcode,
        slot: u8,
        cause: Option<Error>,
    ) -> Result<TransferOutcome> {
        match &cause {
            Some(e) => warn!("Aborting firmware transfer after error: {e}"),
            None => info!("Aborting firmware transfer"),
        }
        (self.sleep)(self.config.abort_delay);

        let request = transfer_request(opcode, TransferAction::Abort, slot, ABORT_OFFSET, &[]);
        let aborted = self.endpoint.send(&request).and_then(|response| {
            if accepted(&response) {
                Ok(())
            } else {
                Err(Error::Device(response.return_code))
            }
        });

        match (aborted, cause) {
            (Ok(()), Some(e)) => Err(e),
            (Ok(()), None) => Ok(TransferOutcome::Aborted),
            (Err(e), _) => {
                warn!("Abort request failed: {e}");
                Err(e)
            }
        }
    }
}

/// A transfer request is accepted when the device returns success or
/// reports the command continuing in the background.
fn accepted(response: &Response) -> bool {
    response.return_code.is_success() || response.return_code.is_background()
}

/// Offset field for a block, in 128-byte units.
fn block_offset(index: usize, block_size: usize) -> Result<u32> {
    let units = index * block_size / OFFSET_UNIT;
    u32::try_from(units).map_err(|_| {
        Error::InvalidImage(format!("block {index} offset exceeds the 32-bit offset field"))
    })
}

/// Build one transfer request.
///
/// Layout: action, slot, two reserved bytes, the little-endian offset,
/// then reserved padding up to 0x80 where the block data starts.
#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
fn transfer_request(
    opcode: Opcode,
    action: TransferAction,
    slot: u8,
    offset: u32,
    data: &[u8],
) -> Request {
    let mut payload = Vec::with_capacity(HEADER_LEN + data.len());
    payload.write_u8(action as u8).unwrap();
    payload.write_u8(slot).unwrap();
    payload.write_u16::<LittleEndian>(0).unwrap();
    payload.write_u32::<LittleEndian>(offset).unwrap();
    payload.resize(HEADER_LEN, 0);
    payload.extend_from_slice(data);
    Request::with_payload(opcode, payload)
}
