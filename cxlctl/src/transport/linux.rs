//! Linux transport over the kernel's CXL memory-device character devices.
//!
//! Devices are enumerated from `/sys/bus/cxl/devices` and opened through
//! `/dev/cxl/mem<N>`. Each mailbox exchange is one `CXL_MEM_SEND_COMMAND`
//! ioctl carrying a raw opcode plus input/output payload buffers; the
//! kernel fills in the device's return code and the output length.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use log::{debug, trace, warn};

use crate::error::{Error, ReturnCode, Result};
use crate::transport::{Endpoint, Request, Response, Transport};

/// Default sysfs directory listing attached devices.
const SYSFS_DEVICES: &str = "/sys/bus/cxl/devices";

/// Default directory holding the management character devices.
const DEV_DIR: &str = "/dev/cxl";

/// Response buffer handed to the kernel; the mailbox payload is capped at
/// 1 MiB, so every command's output fits.
const OUT_BUF_SIZE: usize = 1 << 20;

/// Command id selecting the raw passthrough (`CXL_MEM_COMMAND_ID_RAW`).
const COMMAND_ID_RAW: u32 = 2;

/// Mirror of the kernel's `struct cxl_send_command` payload descriptor.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct CommandIo {
    size: u32,
    rsvd: u32,
    payload: u64,
}

/// Mirror of the kernel's `struct cxl_send_command` (uapi/linux/cxl_mem.h).
/// The raw-opcode union arm is flattened; layout must stay 48 bytes.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct SendCommand {
    id: u32,
    flags: u32,
    opcode: u16,
    rsvd: u16,
    retval: u32,
    input: CommandIo,
    output: CommandIo,
}

const _: () = assert!(std::mem::size_of::<SendCommand>() == 48);

/// `CXL_MEM_SEND_COMMAND` = `_IOWR(0xCE, 2, struct cxl_send_command)`.
///
/// `_IOC(dir, type, nr, size) = (dir << 30) | (size << 16) | (type << 8) | nr`
/// with dir = read|write = 3.
#[allow(clippy::cast_possible_truncation)]
const SEND_COMMAND_IOCTL: libc::c_ulong =
    ((3u32 << 30) | ((std::mem::size_of::<SendCommand>() as u32) << 16) | (0xCEu32 << 8) | 2)
        as libc::c_ulong;

/// Transport over the Linux CXL character-device interface.
pub struct LinuxTransport {
    sysfs: PathBuf,
    dev_dir: PathBuf,
}

impl Default for LinuxTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LinuxTransport {
    /// Transport using the standard `/sys/bus/cxl/devices` and `/dev/cxl`
    /// locations.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sysfs: PathBuf::from(SYSFS_DEVICES),
            dev_dir: PathBuf::from(DEV_DIR),
        }
    }

    /// Transport rooted at alternate directories. Used by tests and by
    /// setups that bind-mount the device tree somewhere else.
    #[must_use]
    pub fn with_paths(sysfs: impl Into<PathBuf>, dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            sysfs: sysfs.into(),
            dev_dir: dev_dir.into(),
        }
    }
}

/// Parse the numeric index out of a `mem<N>` device name.
fn mem_index(name: &str) -> Option<u32> {
    name.strip_prefix("mem")?.parse().ok()
}

impl Transport for LinuxTransport {
    fn open(&mut self, name: &str) -> Result<Box<dyn Endpoint>> {
        if mem_index(name).is_none() {
            return Err(Error::Endpoint(format!("not a memory device: {name}")));
        }
        let path = self.dev_dir.join(name);
        debug!("opening {}", path.display());
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Box::new(LinuxEndpoint {
            name: name.to_string(),
            file: Some(file),
        }))
    }

    fn enumerate(&mut self) -> Result<Vec<String>> {
        let mut found: Vec<(u32, String)> = Vec::new();
        let entries = match std::fs::read_dir(&self.sysfs) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist, no devices", self.sysfs.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::Io(e)),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(index) = mem_index(&name) {
                found.push((index, name));
            }
        }
        found.sort_unstable();
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }
}

/// Open handle to one `/dev/cxl/mem<N>` character device.
pub struct LinuxEndpoint {
    name: String,
    file: Option<File>,
}

impl LinuxEndpoint {
    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| Error::Endpoint(format!("{} is closed", self.name)))
    }
}

impl Endpoint for LinuxEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(unsafe_code)] // raw ioctl against the management device
    #[allow(clippy::cast_possible_truncation)] // payload sizes are bounded below u32::MAX
    fn send(&mut self, request: &Request) -> Result<Response> {
        let fd = self.file()?.as_raw_fd();

        let mut out_buf = vec![0u8; OUT_BUF_SIZE];
        let mut cmd = SendCommand {
            id: COMMAND_ID_RAW,
            opcode: request.opcode.as_u16(),
            input: CommandIo {
                size: request.payload.len() as u32,
                rsvd: 0,
                payload: request.payload.as_ptr() as u64,
            },
            output: CommandIo {
                size: out_buf.len() as u32,
                rsvd: 0,
                payload: out_buf.as_mut_ptr() as u64,
            },
            ..Default::default()
        };

        trace!(
            "{}: sending {} ({} byte payload)",
            self.name,
            request.opcode,
            request.payload.len()
        );
        let ret = unsafe { libc::ioctl(fd, SEND_COMMAND_IOCTL, &raw mut cmd) };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            warn!("{}: mailbox ioctl failed: {err}", self.name);
            return Err(Error::Io(err));
        }

        let return_code = ReturnCode::from_raw(cmd.retval as u16);
        let out_len = (cmd.output.size as usize).min(out_buf.len());
        out_buf.truncate(out_len);
        trace!(
            "{}: {} -> {return_code} ({out_len} bytes out)",
            self.name,
            request.opcode
        );
        Ok(Response {
            return_code,
            payload: out_buf,
        })
    }

    fn close(&mut self) -> Result<()> {
        // Take ownership of the file and let it drop (close)
        self.file.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_mem_index() {
        assert_eq!(mem_index("mem0"), Some(0));
        assert_eq!(mem_index("mem12"), Some(12));
        assert_eq!(mem_index("memx"), None);
        assert_eq!(mem_index("decoder0.0"), None);
        assert_eq!(mem_index("root0"), None);
    }

    #[test]
    fn test_enumerate_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["mem2", "mem0", "mem10", "root0", "endpoint1", "port3"] {
            fs::create_dir(tmp.path().join(name)).unwrap();
        }
        let mut transport = LinuxTransport::with_paths(tmp.path(), "/dev/cxl");
        let names = transport.enumerate().unwrap();
        assert_eq!(names, vec!["mem0", "mem2", "mem10"]);
    }

    #[test]
    fn test_enumerate_missing_dir_is_empty() {
        let mut transport = LinuxTransport::with_paths("/nonexistent/cxl-bus", "/dev/cxl");
        assert!(transport.enumerate().unwrap().is_empty());
    }

    #[test]
    fn test_open_rejects_non_memdev_names() {
        let mut transport = LinuxTransport::new();
        assert!(transport.open("decoder0.0").is_err());
    }

    #[test]
    fn test_send_command_ioctl_number() {
        // _IOWR(0xCE, 2, 48-byte struct)
        assert_eq!(SEND_COMMAND_IOCTL, 0xC030_CE02);
    }
}
