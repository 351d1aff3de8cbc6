//! The incoming _channel open requests_ and their responses.

use hawser::{session::Hooks, Pipe};
use hawser_packet::{arch::Utf8, connect};

use crate::{
    channel::{Channel, LocalWindow},
    connect::Connect,
    Result,
};

#[doc(no_inline)]
pub use connect::{ChannelOpenContext, ChannelOpenFailureReason};

/// A _channel open request_ received from the peer, such as a
/// `forwarded-tcpip` connection being relayed back to us.
pub struct ChannelOpen<'c, IO: Pipe, H: Hooks> {
    connect: &'c Connect<IO, H>,

    inner: connect::ChannelOpen<'static>,
}

impl<'c, IO, H> ChannelOpen<'c, IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub(crate) fn new(connect: &'c Connect<IO, H>, inner: connect::ChannelOpen<'static>) -> Self {
        Self { connect, inner }
    }

    /// Access the _context_ of the channel open request.
    pub fn cx(&self) -> &connect::ChannelOpenContext<'_> {
        &self.inner.context
    }

    /// Accept the channel open request, waiting on the session's
    /// channel semaphore for a free slot.
    pub async fn accept(self) -> Result<Channel<'c, IO, H>> {
        let slot = self.connect.slot().await?;

        let local_id = self.connect.next_channel_id();
        self.connect.channels.insert(local_id);

        self.connect
            .mux
            .send(&connect::ChannelOpenConfirmation {
                recipient_channel: self.inner.sender_channel,
                sender_channel: local_id,
                initial_window_size: LocalWindow::INITIAL_WINDOW_SIZE,
                maximum_packet_size: LocalWindow::MAXIMUM_PACKET_SIZE,
            })
            .await
            .map_err(crate::Error::from)?;

        Ok(Channel::new(
            self.connect,
            local_id,
            self.inner.sender_channel,
            self.inner.initial_window_size,
            self.inner.maximum_packet_size,
            slot,
        ))
    }

    /// Reject the channel open request.
    pub async fn reject(
        self,
        reason: ChannelOpenFailureReason,
        description: impl Into<Utf8<'_>>,
    ) -> Result<()> {
        self.connect
            .mux
            .send(&connect::ChannelOpenFailure {
                recipient_channel: self.inner.sender_channel,
                reason,
                description: description.into(),
                language: Default::default(),
            })
            .await
            .map_err(Into::into)
    }
}
