//! The incoming _global requests_ and their responses.

use hawser::{session::Hooks, Pipe};
use hawser_packet::connect;

use crate::{connect::Connect, Result};

#[doc(no_inline)]
pub use connect::GlobalRequestContext;

/// The outcome of an outgoing global request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalResponse {
    /// The request was accepted.
    Accepted,

    /// A `tcpip-forward` request with port `0` was accepted,
    /// with the actual bound port.
    AcceptedPort(u32),

    /// The request was rejected.
    Rejected,
}

/// A _global request_ received from the peer.
pub struct GlobalRequest<'c, IO: Pipe, H: Hooks> {
    connect: &'c Connect<IO, H>,

    inner: connect::GlobalRequest<'static>,
}

impl<'c, IO, H> GlobalRequest<'c, IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub(crate) fn new(connect: &'c Connect<IO, H>, inner: connect::GlobalRequest<'static>) -> Self {
        Self { connect, inner }
    }

    /// Access the _context_ of the global request.
    pub fn cx(&self) -> &connect::GlobalRequestContext<'_> {
        &self.inner.context
    }

    /// Accept the global request.
    pub async fn accept(self) -> Result<()> {
        if !*self.inner.want_reply {
            return Ok(());
        }

        self.connect
            .mux
            .send(&connect::RequestSuccess)
            .await
            .map_err(Into::into)
    }

    /// Accept a `tcpip-forward` global request for port `0`,
    /// reporting the actually bound port.
    pub async fn accept_with_port(self, bound_port: u32) -> Result<()> {
        if !*self.inner.want_reply {
            return Ok(());
        }

        self.connect
            .mux
            .send(&connect::ForwardingSuccess { bound_port })
            .await
            .map_err(Into::into)
    }

    /// Reject the global request.
    pub async fn reject(self) -> Result<()> {
        if !*self.inner.want_reply {
            return Ok(());
        }

        self.connect
            .mux
            .send(&connect::RequestFailure)
            .await
            .map_err(Into::into)
    }
}
