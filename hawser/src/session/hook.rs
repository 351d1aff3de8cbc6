//! Hooks into the transport's externally visible events.

use hawser_packet::trans::DisconnectReason;

use crate::algorithm::HostKey;

/// A set of callbacks into the session's lifecycle events.
///
/// The host-key hook runs synchronously inside the key-exchange, the
/// exchange does not complete before the application decided.
pub trait Hooks: Send {
    /// Decide whether the host key the server presented is trusted;
    /// returning `false` aborts the key-exchange.
    fn on_host_key(&mut self, _key: &HostKey) -> bool {
        true
    }

    /// A banner line was received, either before the server identified
    /// or as an authentication banner message.
    fn on_banner(&mut self, _message: &str) {}

    /// The peer sent a `SSH_MSG_DEBUG` message.
    fn on_debug(&mut self, _message: &str) {}

    /// The peer disconnected with the provided reason.
    fn on_disconnect(&mut self, _reason: &DisconnectReason, _description: &str) {}
}

/// Accept every host key and discard every event.
impl Hooks for () {}
