//! Peer identity: the opaque identifier a bus assigns to each attached peer.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Peer ID: random v4 UUID handed out by the bus on attach. Used to address the group host.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn generate() -> Self {
        PeerId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Create a `PeerId` from raw bytes.
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        PeerId(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell peers apart in logs.
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}
