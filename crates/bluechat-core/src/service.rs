//! Well-known service record shared by host and join sides.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Standard Serial Port Profile UUID `00001101-0000-1000-8000-00805F9B34FB`.
pub const SERIAL_PORT_SERVICE_ID: Uuid = Uuid::from_u128(0x0000_1101_0000_1000_8000_0080_5F9B_34FB);

/// Service name registered by the host side.
pub const DEFAULT_SERVICE_NAME: &str = "BTChat";

/// The service a host listens on and a joiner connects to.
///
/// Both sides must agree on `id`; `name` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Human-readable service name
    pub name: String,

    /// Service identifier both sides agree on
    pub id: Uuid,
}

impl ServiceRecord {
    /// Creates a service record.
    pub fn new(name: impl Into<String>, id: Uuid) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

impl Default for ServiceRecord {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME, SERIAL_PORT_SERVICE_ID)
    }
}

impl fmt::Display for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.id)
    }
}
