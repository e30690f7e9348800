//! Communication session management
//!
//! This module defines the trait for tunneling messages between the
//! coordinator and connected clients (the display and the voters). The
//! tunnel abstraction allows for different communication mechanisms while
//! maintaining a consistent interface.

use super::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
///
/// This trait abstracts the communication mechanism used to send messages
/// to connected clients. Implementations might use WebSockets, Server-Sent
/// Events, or other real-time communication protocols.
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Update messages notify clients about round lifecycle changes that
    /// affect their current view.
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the client
    ///
    /// Sync messages describe the current coordinator state so that a
    /// client connecting or reconnecting mid-round sees the live state
    /// rather than a replay of past events.
    fn send_state(&self, state: &SyncMessage);

    /// Closes the communication tunnel
    ///
    /// This method should be called when the client disconnects or
    /// when the communication is no longer needed.
    fn close(self);
}
