//! Contract with the bus: discovery, group join, remote object proxies.
//!
//! The client core never talks to a network itself. A host supplies a `Transport`;
//! every method on it is called from the worker thread only, one call at a time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_INTERFACE_NAME, PING_METHOD};
use crate::identity::PeerId;

/// Bitmask naming the transport(s) an advertisement was seen on.
pub type TransportMask = u16;

pub const TRANSPORT_LOCAL: TransportMask = 0x0001;

/// Interface a remote object must implement for the client to bind a handle to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceContract {
    pub name: String,
    pub methods: Vec<String>,
}

impl InterfaceContract {
    pub fn new(name: impl Into<String>, methods: &[&str]) -> Self {
        Self {
            name: name.into(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }
}

impl Default for InterfaceContract {
    fn default() -> Self {
        Self::new(DEFAULT_INTERFACE_NAME, &[PING_METHOD])
    }
}

/// Discovery callbacks. Called on a bus-internal thread, never the worker.
pub trait DiscoveryListener: Send + Sync {
    fn found(&self, group: &str, transport: TransportMask);
    fn lost(&self, group: &str);
}

/// The bus as seen by the client.
pub trait Transport: Send + 'static {
    /// Register `listener` for advertisements whose name starts with `group_prefix`.
    /// Groups already advertised are reported through `found` as well.
    fn start_discovery(
        &mut self,
        group_prefix: &str,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Result<(), TransportError>;

    fn join_group(&mut self, group: &str) -> Result<(), TransportError>;

    /// Leave a joined group. Leaving a group that was never joined is a no-op.
    fn leave_group(&mut self, group: &str);

    /// Peer that created (and hosts the objects of) `group`.
    fn host_peer(&self, group: &str) -> Result<PeerId, TransportError>;

    fn remote_handle(
        &self,
        host: PeerId,
        group: &str,
        object_path: &str,
        interface: &InterfaceContract,
    ) -> Result<Box<dyn RemoteHandle>, TransportError>;

    /// Release discovery registrations and leave all joined groups.
    fn teardown(&mut self);
}

/// Proxy for one remote object's interface.
pub trait RemoteHandle: Send {
    /// Blocks until the remote side replies or the call fails.
    fn invoke(&self, method: &str, argument: &str) -> Result<String, RemoteCallError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    #[error("discovery already started")]
    AlreadyDiscovering,
    #[error("group name already advertised: {0}")]
    NameTaken(String),
    #[error("no such group")]
    NoSuchGroup,
    #[error("join rejected by host")]
    Rejected,
    #[error("not a member of the group")]
    NotJoined,
    #[error("no object at {0}")]
    NoSuchObject(String),
    #[error("object does not implement {0}")]
    NoSuchInterface(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteCallError {
    #[error("no such method: {0}")]
    NoSuchMethod(String),
    #[error("session lost")]
    SessionLost,
    #[error("remote error: {0}")]
    Remote(String),
}
