//! Data models shared across the workspace

use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity a monitor watches (a host, a peer, an API client key).
///
/// Carried through the hit feed purely for diagnostics: it shows up in
/// structured logs and exports, but detection logic never branches on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitorTarget {
    /// Stable identifier, e.g. an IP address or a client key
    pub id: String,
}

impl MonitorTarget {
    /// Create a target from any displayable identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl fmt::Display for MonitorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
