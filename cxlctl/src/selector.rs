//! Device-selector parsing.
//!
//! Commands address devices through selector tokens: either `all` or a
//! device name of the form `mem<N>`. Tokens that match neither pattern are
//! dropped with a warning; the selector as a whole is rejected only when
//! nothing survives, so one typo does not kill a multi-device batch.

use log::warn;

use crate::error::{Error, Result};

/// One parsed selector token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorToken {
    /// Every device the transport can enumerate.
    All,
    /// The device with this index (`mem<N>`).
    Device(u32),
}

impl SelectorToken {
    /// Parse a raw token. Returns `None` for anything that is neither
    /// `all` nor a well-formed `mem<N>` name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "all" {
            return Some(Self::All);
        }
        device_index(raw).map(Self::Device)
    }

    /// Canonical device name for an explicit token; `None` for `all`.
    #[must_use]
    pub fn device_name(&self) -> Option<String> {
        match self {
            Self::All => None,
            Self::Device(index) => Some(format!("mem{index}")),
        }
    }

    /// Whether an endpoint with this name belongs to the token.
    ///
    /// Guards against a loose open handing back the wrong device: an
    /// explicit token only accepts its own index, and `all` accepts any
    /// well-formed device name.
    #[must_use]
    pub fn matches(&self, device_name: &str) -> bool {
        match self {
            Self::All => device_index(device_name).is_some(),
            Self::Device(index) => device_index(device_name) == Some(*index),
        }
    }
}

/// Strict `mem<N>` parse; the whole suffix must be a decimal index.
fn device_index(name: &str) -> Option<u32> {
    name.strip_prefix("mem")?.parse().ok()
}

/// An ordered, validated list of selector tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelector {
    tokens: Vec<SelectorToken>,
}

impl DeviceSelector {
    /// Parse raw tokens in order. Unrecognized tokens are logged and
    /// skipped; the call only fails when no token is usable.
    pub fn parse<S: AsRef<str>>(raw: &[S]) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::InvalidSelector("no device specified".into()));
        }

        let mut tokens = Vec::with_capacity(raw.len());
        for item in raw {
            let item = item.as_ref();
            match SelectorToken::parse(item) {
                Some(token) => tokens.push(token),
                None => warn!("ignoring unrecognized device selector {item:?}"),
            }
        }

        if tokens.is_empty() {
            let rejected = raw
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::InvalidSelector(format!(
                "no usable device in [{rejected}], expected mem<N> or all"
            )));
        }

        Ok(Self { tokens })
    }

    /// Tokens in the order the user gave them.
    #[must_use]
    pub fn tokens(&self) -> &[SelectorToken] {
        &self.tokens
    }
}
