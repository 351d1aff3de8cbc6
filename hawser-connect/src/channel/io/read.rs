use std::{
    collections::VecDeque,
    io::{self, Read as _},
    num::NonZeroU32,
    pin::Pin,
    task,
};

use hawser::{session::Hooks, Pipe};
use hawser_packet::connect;

use crate::{channel::Channel, mux::Interest};

pub struct Read<'r, IO: Pipe, H: Hooks> {
    channel: &'r Channel<'r, IO, H>,
    stream_id: Option<NonZeroU32>,

    buffer: VecDeque<u8>,
}

impl<'r, IO, H> Read<'r, IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub fn new(channel: &'r Channel<'r, IO, H>, stream_id: Option<NonZeroU32>) -> Self {
        if !channel.is_remote_eof() {
            channel
                .mux()
                .register(Interest::ChannelData(channel.local_id(), stream_id));
        }

        Self {
            channel,
            stream_id,

            buffer: Default::default(),
        }
    }

    fn replenish_window(&mut self) {
        if let Some(bytes_to_add) = self.channel.local_window().adjustable() {
            self.channel.mux().push(&connect::ChannelWindowAdjust {
                recipient_channel: self.channel.remote_id(),
                bytes_to_add,
            });

            tracing::debug!(
                "Granted `{bytes_to_add}` bytes back on channel {}:{}",
                self.channel.local_id(),
                self.channel.remote_id(),
            );
        }
    }
}

impl<IO, H> futures::AsyncRead for Read<'_, IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &mut [u8],
    ) -> task::Poll<io::Result<usize>> {
        if self.buffer.is_empty() && !self.channel.is_remote_eof() {
            self.replenish_window();

            let interest = Interest::ChannelData(self.channel.local_id(), self.stream_id);
            let polled = futures::ready!(self.channel.poll_take(cx, &interest));

            if let Some(packet) = polled {
                let packet =
                    packet.map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))?;

                let data = if self.stream_id.is_none() {
                    packet
                        .to::<connect::ChannelData>()
                        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
                        .data
                } else {
                    packet
                        .to::<connect::ChannelExtendedData>()
                        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
                        .data
                };

                self.channel
                    .local_window()
                    .consume(data.len() as u32)
                    .map_err(|excess| {
                        io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("Peer overflowed the local window by {excess} bytes"),
                        )
                    })?;

                tracing::trace!(
                    "Received a data block for stream `{:?}` on channel {}:{} of size `{}`",
                    self.stream_id,
                    self.channel.local_id(),
                    self.channel.remote_id(),
                    data.len()
                );

                self.buffer.extend(data.as_ref());
            } else {
                tracing::trace!(
                    "End-of-file for stream `{:?}` on channel {}:{}",
                    self.stream_id,
                    self.channel.local_id(),
                    self.channel.remote_id(),
                );
            }
        }

        task::Poll::Ready(self.buffer.read(buf))
    }
}

impl<IO: Pipe, H: Hooks> Drop for Read<'_, IO, H> {
    fn drop(&mut self) {
        self.channel.mux().unregister(&Interest::ChannelData(
            self.channel.local_id(),
            self.stream_id,
        ));
    }
}
