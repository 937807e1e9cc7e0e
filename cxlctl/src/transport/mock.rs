//! Scripted in-memory transport used by the unit tests.
//!
//! Each mock device carries per-opcode reply queues plus optional default
//! replies, and every open/send/close is recorded in a shared event log so
//! tests can assert ordering and cleanup invariants without real hardware.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{Error, ReturnCode, Result};
use crate::protocol::Opcode;
use crate::transport::{Endpoint, Request, Response, Transport};

/// Observable transport activity, recorded in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// `open` succeeded for this device.
    Open(String),
    /// `open` was attempted and failed.
    OpenFailed(String),
    /// A request was handed to the endpoint (recorded even when the
    /// exchange is scripted to fail).
    Send {
        /// Canonical device name.
        device: String,
        /// Request opcode.
        opcode: Opcode,
        /// Request payload bytes.
        payload: Vec<u8>,
    },
    /// Explicit `close` call.
    Close(String),
    /// Endpoint dropped without being closed first.
    Dropped(String),
}

/// Scripted reply for one exchange.
#[derive(Debug, Clone)]
pub enum Script {
    /// Complete the exchange with this return code and payload.
    Respond(ReturnCode, Vec<u8>),
    /// Fail the exchange at the transport level.
    Fail,
}

impl Script {
    fn into_result(self) -> Result<Response> {
        match self {
            Self::Respond(return_code, payload) => Ok(Response {
                return_code,
                payload,
            }),
            Self::Fail => Err(Error::Endpoint("scripted transport failure".into())),
        }
    }
}

#[derive(Default)]
struct DeviceState {
    scripts: HashMap<Opcode, VecDeque<Script>>,
    defaults: HashMap<Opcode, Script>,
}

impl DeviceState {
    fn reply_for(&mut self, opcode: Opcode) -> Script {
        if let Some(queue) = self.scripts.get_mut(&opcode) {
            if let Some(reply) = queue.pop_front() {
                return reply;
            }
        }
        self.defaults
            .get(&opcode)
            .cloned()
            .unwrap_or(Script::Respond(ReturnCode::Success, Vec::new()))
    }
}

/// Builder for one mock device.
pub struct MockDevice {
    name: String,
    reported_name: Option<String>,
    fail_open: bool,
    state: DeviceState,
}

impl MockDevice {
    /// New device answering every request with an empty success.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reported_name: None,
            fail_open: false,
            state: DeviceState::default(),
        }
    }

    /// Make every `open` of this device fail.
    #[must_use]
    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Have the opened endpoint report this name instead of its own,
    /// simulating a loose open that matched the wrong device.
    #[must_use]
    pub fn reporting_as(mut self, name: &str) -> Self {
        self.reported_name = Some(name.to_string());
        self
    }

    /// Queue replies for one opcode, consumed in order across all opens.
    #[must_use]
    pub fn script(mut self, opcode: Opcode, replies: Vec<Script>) -> Self {
        self.state
            .scripts
            .entry(opcode)
            .or_default()
            .extend(replies);
        self
    }

    /// Reply used for an opcode once its queue is drained.
    #[must_use]
    pub fn default_reply(mut self, opcode: Opcode, reply: Script) -> Self {
        self.state.defaults.insert(opcode, reply);
        self
    }
}

struct SharedDevice {
    name: String,
    reported_name: String,
    fail_open: bool,
    state: Arc<Mutex<DeviceState>>,
}

type EventLog = Arc<Mutex<Vec<Event>>>;

/// In-memory transport over a fixed set of mock devices.
pub struct MockTransport {
    devices: Vec<SharedDevice>,
    events: EventLog,
}

impl MockTransport {
    /// Build a transport over the given devices, enumerated in order.
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let devices = devices
            .into_iter()
            .map(|d| SharedDevice {
                reported_name: d.reported_name.unwrap_or_else(|| d.name.clone()),
                name: d.name,
                fail_open: d.fail_open,
                state: Arc::new(Mutex::new(d.state)),
            })
            .collect();
        Self {
            devices,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Payload first bytes of every send with this opcode, in order.
    ///
    /// The transfer payloads put the action code first, so this is the
    /// emitted action sequence.
    pub fn sent_action_bytes(&self, opcode: Opcode) -> Vec<u8> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                Event::Send {
                    opcode: o, payload, ..
                } if *o == opcode => payload.first().copied(),
                _ => None,
            })
            .collect()
    }

    /// Number of `Open` events.
    pub fn open_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Open(_)))
            .count()
    }

    /// Number of `Close` events.
    pub fn close_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Close(_)))
            .count()
    }

    /// Whether any endpoint was dropped without an explicit close.
    pub fn leaked(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, Event::Dropped(_)))
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Transport for MockTransport {
    fn open(&mut self, name: &str) -> Result<Box<dyn Endpoint>> {
        let Some(device) = self.devices.iter().find(|d| d.name == name) else {
            self.record(Event::OpenFailed(name.to_string()));
            return Err(Error::DeviceNotFound);
        };
        if device.fail_open {
            self.record(Event::OpenFailed(name.to_string()));
            return Err(Error::Endpoint(format!("cannot open {name}")));
        }
        self.record(Event::Open(name.to_string()));
        Ok(Box::new(MockEndpoint {
            device_name: device.name.clone(),
            reported_name: device.reported_name.clone(),
            state: Arc::clone(&device.state),
            events: Arc::clone(&self.events),
            closed: false,
        }))
    }

    fn enumerate(&mut self) -> Result<Vec<String>> {
        Ok(self.devices.iter().map(|d| d.name.clone()).collect())
    }
}

/// Endpoint handle produced by [`MockTransport::open`].
pub struct MockEndpoint {
    device_name: String,
    reported_name: String,
    state: Arc<Mutex<DeviceState>>,
    events: EventLog,
    closed: bool,
}

impl Endpoint for MockEndpoint {
    fn name(&self) -> &str {
        &self.reported_name
    }

    fn send(&mut self, request: &Request) -> Result<Response> {
        if self.closed {
            return Err(Error::Endpoint("endpoint is closed".into()));
        }
        self.events.lock().unwrap().push(Event::Send {
            device: self.device_name.clone(),
            opcode: request.opcode,
            payload: request.payload.clone(),
        });
        let reply = self.state.lock().unwrap().reply_for(request.opcode);
        reply.into_result()
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.events
                .lock()
                .unwrap()
                .push(Event::Close(self.device_name.clone()));
        }
        Ok(())
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        if !self.closed {
            self.events
                .lock()
                .unwrap()
                .push(Event::Dropped(self.device_name.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reply_is_empty_success() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        let mut ep = transport.open("mem0").unwrap();
        let resp = ep.send(&Request::new(Opcode::IDENTIFY)).unwrap();
        assert!(resp.is_success());
        assert!(resp.payload.is_empty());
        ep.close().unwrap();
        assert!(!transport.leaked());
    }

    #[test]
    fn test_scripted_replies_consumed_in_order() {
        let mut transport = MockTransport::new(vec![
            MockDevice::new("mem0")
                .script(
                    Opcode::GET_TIMESTAMP,
                    vec![
                        Script::Fail,
                        Script::Respond(ReturnCode::Busy, Vec::new()),
                        Script::Respond(ReturnCode::Success, vec![9]),
                    ],
                ),
        ]);
        let mut ep = transport.open("mem0").unwrap();
        let req = Request::new(Opcode::GET_TIMESTAMP);
        assert!(ep.send(&req).is_err());
        assert_eq!(ep.send(&req).unwrap().return_code, ReturnCode::Busy);
        assert_eq!(ep.send(&req).unwrap().payload, vec![9]);
        // Queue drained, fallback applies.
        assert!(ep.send(&req).unwrap().is_success());
        ep.close().unwrap();
    }

    #[test]
    fn test_fail_open_records_event() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0").fail_open()]);
        assert!(transport.open("mem0").is_err());
        assert_eq!(transport.events(), vec![Event::OpenFailed("mem0".into())]);
    }

    #[test]
    fn test_unknown_device_open_fails() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        assert!(matches!(
            transport.open("mem7"),
            Err(Error::DeviceNotFound)
        ));
    }

    #[test]
    fn test_drop_without_close_is_flagged() {
        let mut transport = MockTransport::new(vec![MockDevice::new("mem0")]);
        {
            let _ep = transport.open("mem0").unwrap();
        }
        assert!(transport.leaked());
    }

    #[test]
    fn test_reported_name_differs() {
        let mut transport =
            MockTransport::new(vec![MockDevice::new("mem1").reporting_as("mem2")]);
        let ep = transport.open("mem1").unwrap();
        assert_eq!(ep.name(), "mem2");
    }
}
