//! Multi-device command dispatch.
//!
//! A command runs against every device named by the selector, in token
//! order. Each device is opened, handed to the action exactly once, and
//! closed again before the next device is touched, whatever the action
//! returned. The outcome is an aggregate: how many devices succeeded, and
//! the first action error when none did.

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::selector::{DeviceSelector, SelectorToken};
use crate::transport::{Endpoint, Transport};

/// Running tally over one dispatch.
#[derive(Debug, Default)]
struct Outcome {
    succeeded: usize,
    first_error: Option<Error>,
}

impl Outcome {
    fn record(&mut self, device: &str, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                warn!("Command failed on {device}: {e}");
                if self.first_error.is_none() {
                    self.first_error = Some(e);
                }
            }
        }
    }

    fn into_result(self) -> Result<usize> {
        if self.succeeded > 0 {
            return Ok(self.succeeded);
        }
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(0),
        }
    }
}

/// Run `action` once against every device the selector names.
///
/// `all` expands to the transport's live enumeration. A device that cannot
/// be opened is logged and skipped rather than failing the batch. Returns
/// the number of devices on which the action succeeded; if none did,
/// returns the first action error, or `Ok(0)` when no device matched at
/// all.
pub fn for_each_device<F>(
    transport: &mut dyn Transport,
    selector: &DeviceSelector,
    mut action: F,
) -> Result<usize>
where
    F: FnMut(&mut dyn Endpoint) -> Result<()>,
{
    let mut outcome = Outcome::default();

    for &token in selector.tokens() {
        match token {
            SelectorToken::All => match transport.enumerate() {
                Ok(names) => {
                    if names.is_empty() {
                        warn!("No devices found");
                    }
                    for name in &names {
                        run_on_device(transport, token, name, &mut action, &mut outcome);
                    }
                }
                Err(e) => warn!("Device enumeration failed: {e}"),
            },
            SelectorToken::Device(index) => {
                let name = format!("mem{index}");
                run_on_device(transport, token, &name, &mut action, &mut outcome);
            }
        }
    }

    outcome.into_result()
}

/// Open one device, guard its identity, run the action, and always close.
fn run_on_device<F>(
    transport: &mut dyn Transport,
    token: SelectorToken,
    name: &str,
    action: &mut F,
    outcome: &mut Outcome,
) where
    F: FnMut(&mut dyn Endpoint) -> Result<()>,
{
    let mut endpoint = match transport.open(name) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            warn!("Skipping {name}: {e}");
            return;
        }
    };

    if !token.matches(endpoint.name()) {
        warn!("Opened {name} but device reports {}, skipping", endpoint.name());
        close_endpoint(endpoint.as_mut());
        return;
    }

    debug!("Running command on {name}");
    let result = action(endpoint.as_mut());
    close_endpoint(endpoint.as_mut());
    outcome.record(name, result);
}

fn close_endpoint(endpoint: &mut dyn Endpoint) {
    if let Err(e) = endpoint.close() {
        warn!("Failed to close {}: {e}", endpoint.name());
    }
}
