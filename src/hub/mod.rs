//! Real-time board hub.
//!
//! This module provides live change propagation to connected clients:
//! - [`Hub`]: the per-board subscription registry, run as a single actor
//! - [`Connection`]: the reader/writer pair serving one client
//! - [`admit`]: authorization and initial snapshot before subscription
//! - [`BoardEvent`]: the `{"event", "payload"}` envelope

mod admission;
mod connection;
mod event;
mod registry;

pub use admission::{admit, AdmittedConnection, Principal};
pub use connection::{CloseReason, Connection};
pub use event::{BoardEvent, EventKind};
pub use registry::{ConnectionId, Delivery, Hub, OutboundReceiver, OutboundSender, Registry};
