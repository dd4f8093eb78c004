//! Key/value propagation of logical values and status.
//!
//! Every published entry is keyed `<device>/<field>` with field one of
//! `value`, `status` or `target`. The core only publishes; nothing in the
//! workspace reads its own keys back.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Published field of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Value,
    Status,
    Target,
}

impl Field {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::Status => "status",
            Self::Target => "target",
        }
    }
}

/// Namespaced key for `device` and `field`.
pub fn key(device: &str, field: Field) -> String {
    format!("{device}/{}", field.as_str())
}

/// Published payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ChannelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Outbound key/value channel.
pub trait Channel: Send + Sync {
    fn publish(&self, key: &str, value: ChannelValue);
}

/// Channel that only logs publications.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingChannel;

impl Channel for TracingChannel {
    fn publish(&self, key: &str, value: ChannelValue) {
        debug!(key, %value, "publish");
    }
}

/// Channel recording every publication in order.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    entries: Mutex<Vec<(String, ChannelValue)>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// All publications so far.
    pub fn entries(&self) -> Vec<(String, ChannelValue)> {
        self.entries.lock().clone()
    }

    /// Most recent value published under `key`.
    pub fn latest(&self, key: &str) -> Option<ChannelValue> {
        self.entries
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Every value published under `key`, oldest first.
    pub fn history(&self, key: &str) -> Vec<ChannelValue> {
        self.entries
            .lock()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Channel for MemoryChannel {
    fn publish(&self, key: &str, value: ChannelValue) {
        self.entries.lock().push((key.to_string(), value));
    }
}
