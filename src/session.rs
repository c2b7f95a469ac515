//! Communication session management
//!
//! This module defines the trait for tunneling messages between the game
//! engine and connected clients (participants and operators). The tunnel
//! abstraction keeps the core independent of the transport; the runtime
//! provides a channel-backed implementation.

use super::UpdateMessage;

/// Trait for sending messages through a communication tunnel
///
/// Delivery is best-effort and ordered per connection. Implementations
/// must never block the caller.
pub trait Tunnel {
    /// Sends an event to the client
    fn send_message(&self, message: &UpdateMessage);

    /// Closes the communication tunnel
    ///
    /// The transport reports the resulting disconnect back to the game like
    /// any other disconnect.
    fn close(self);
}
