use std::{io, num::NonZeroU32, pin::Pin, task};

use hawser::{session::Hooks, Pipe};
use hawser_packet::connect;

use crate::{channel::Channel, mux::Interest};

pub struct Write<'w, IO: Pipe, H: Hooks> {
    channel: &'w Channel<'w, IO, H>,
    stream_id: Option<NonZeroU32>,

    buffer: Vec<u8>,
}

impl<'w, IO, H> Write<'w, IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub fn new(channel: &'w Channel<'w, IO, H>, stream_id: Option<NonZeroU32>) -> Self {
        Self {
            channel,
            stream_id,

            buffer: Default::default(),
        }
    }

    /// Pack the buffered bytes into a data message and queue it,
    /// in submission order.
    fn enqueue(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let data = std::mem::take(&mut self.buffer);

        tracing::trace!(
            "Sending a data block for stream `{:?}` on channel {}:{} of size `{}`",
            self.stream_id,
            self.channel.local_id(),
            self.channel.remote_id(),
            data.len()
        );

        if let Some(data_type) = self.stream_id {
            self.channel.mux().push(&connect::ChannelExtendedData {
                recipient_channel: self.channel.remote_id(),
                data_type,
                data: data.into(),
            });
        } else {
            self.channel.mux().push(&connect::ChannelData {
                recipient_channel: self.channel.remote_id(),
                data: data.into(),
            });
        }
    }
}

impl<IO, H> futures::AsyncWrite for Write<'_, IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &[u8],
    ) -> task::Poll<io::Result<usize>> {
        loop {
            if self.channel.is_remote_closed() || self.channel.is_close_sent() {
                break task::Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    crate::Error::ChannelClosed,
                )));
            }

            let maxpack = self.channel.remote_maxpack() as usize;

            let room = maxpack - self.buffer.len();
            if room == 0 {
                futures::ready!(self.as_mut().poll_flush(cx))?;

                continue;
            }

            let want = buf.len().min(room) as u32;

            match self.channel.remote_window().try_reserve(want) {
                Some(granted) => {
                    self.buffer.extend_from_slice(&buf[..granted as usize]);

                    // Fragments leave as soon as they fill the peer's
                    // maximum packet size or drain its window.
                    if self.buffer.len() == maxpack || self.channel.remote_window().is_empty() {
                        self.enqueue();
                    }

                    break task::Poll::Ready(Ok(granted as usize));
                }
                None => {
                    // The window is exhausted, flush what we hold and
                    // park until the peer extends it.
                    self.enqueue();

                    self.channel.remote_window().register(cx);

                    // Adjusts (and closures) are serviced inside
                    // `poll_take`'s bookkeeping cascade, never handed
                    // back out; re-check the window before parking.
                    let interest = Interest::ChannelWindowAdjust(self.channel.local_id());
                    match self.channel.poll_take(cx, &interest) {
                        task::Poll::Ready(Some(Err(err))) => {
                            break task::Poll::Ready(Err(io::Error::new(
                                io::ErrorKind::BrokenPipe,
                                err,
                            )));
                        }
                        task::Poll::Ready(_) => continue,
                        task::Poll::Pending => {
                            if self.channel.remote_window().is_empty() {
                                break task::Poll::Pending;
                            }

                            continue;
                        }
                    }
                }
            }
        }
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<io::Result<()>> {
        self.enqueue();

        self.channel
            .mux()
            .poll_flush(cx)
            .map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}
