//! Peer-group ping client core.
//! The UI queues commands; one worker thread runs them against a host-supplied transport
//! and reports outcomes back in order.

pub mod client;
pub mod command;
pub mod config;
pub mod identity;
pub mod loopback;
pub mod outcome;
pub mod session;
pub mod transport;

pub use client::{Client, ClientError};
pub use command::Command;
pub use config::ClientConfig;
pub use identity::PeerId;
pub use outcome::{Outcome, OutcomeReceiver};
pub use session::{BusHandler, SessionState};
pub use transport::{InterfaceContract, RemoteCallError, RemoteHandle, Transport, TransportError};
