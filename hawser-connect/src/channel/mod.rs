//! Definition of the [`Channel`] struct that provides isolated I/O on SSH channels.

use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicBool, Ordering},
    task,
};

use futures::{lock::Mutex, AsyncRead, AsyncWrite};
use hawser::{session::Hooks, Pipe};
use hawser_packet::{connect, Packet};

use crate::{
    connect::{Connect, Slot},
    mux::Interest,
    Error, Result,
};

#[doc(no_inline)]
pub use connect::ChannelRequestContext;

mod io;

mod window;
pub(crate) use window::{LocalWindow, RemoteWindow};

/// The outcome of a [`Channel::request_wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// The peer reported success.
    Success,

    /// The peer reported failure.
    Failure,
}

/// A reference to an opened channel in the session.
pub struct Channel<'c, IO: Pipe, H: Hooks> {
    connect: &'c Connect<IO, H>,

    local_id: u32,
    local_window: LocalWindow,

    remote_id: u32,
    remote_window: RemoteWindow,
    remote_maxpack: u32,

    eof_sent: AtomicBool,
    close_sent: AtomicBool,
    remote_eof: AtomicBool,
    remote_closed: AtomicBool,

    /// Replies to `want_reply` requests arrive in emission order,
    /// this lock keeps waiters in the same order.
    replies: Mutex<()>,

    /// Held for the channel's lifetime to bound concurrent channels.
    _slot: Slot,
}

impl<'c, IO, H> Channel<'c, IO, H>
where
    IO: Pipe,
    H: Hooks,
{
    /// The identifier of the channel on our side.
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// The identifier of the channel on the peer's side.
    pub fn remote_id(&self) -> u32 {
        self.remote_id
    }

    pub(crate) fn mux(&self) -> &crate::mux::Mux<IO, H> {
        &self.connect.mux
    }

    pub(crate) fn local_window(&self) -> &LocalWindow {
        &self.local_window
    }

    pub(crate) fn remote_window(&self) -> &RemoteWindow {
        &self.remote_window
    }

    pub(crate) fn remote_maxpack(&self) -> u32 {
        self.remote_maxpack
    }

    pub(crate) fn is_remote_eof(&self) -> bool {
        self.remote_eof.load(Ordering::SeqCst)
    }

    pub(crate) fn is_remote_closed(&self) -> bool {
        self.remote_closed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_close_sent(&self) -> bool {
        self.close_sent.load(Ordering::SeqCst)
    }

    fn unregister(&self) {
        self.connect
            .mux
            .unregister_if(|interest| matches!(interest, Interest::ChannelData(id, _) if id == &self.local_id));
        self.connect
            .mux
            .unregister(&Interest::ChannelWindowAdjust(self.local_id));
        self.connect
            .mux
            .unregister(&Interest::ChannelEof(self.local_id));
        self.connect
            .mux
            .unregister(&Interest::ChannelClose(self.local_id));
    }

    /// Whether the peer sent its `CLOSE` already.
    pub fn is_closed(&self) -> bool {
        self.remote_closed.load(Ordering::SeqCst)
    }
}

impl<'c, IO, H> Channel<'c, IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub(crate) fn new(
        connect: &'c Connect<IO, H>,
        local_id: u32,
        remote_id: u32,
        remote_window: u32,
        remote_maxpack: u32,
        slot: Slot,
    ) -> Self {
        connect.mux.register(Interest::ChannelClose(local_id));
        connect.mux.register(Interest::ChannelEof(local_id));
        connect.mux.register(Interest::ChannelWindowAdjust(local_id));

        tracing::debug!("Opened channel {local_id}:{remote_id}, window {remote_window}, max packet {remote_maxpack}");

        Self {
            connect,

            local_id,
            local_window: Default::default(),

            remote_id,
            remote_window: RemoteWindow::from(remote_window),
            remote_maxpack,

            eof_sent: Default::default(),
            close_sent: Default::default(),
            remote_eof: Default::default(),
            remote_closed: Default::default(),

            replies: Default::default(),

            _slot: slot,
        }
    }

    /// Poll for a packet of `interest`, servicing the channel's
    /// bookkeeping messages (close, EOF, window adjusts) along the way.
    pub(crate) fn poll_take(
        &self,
        cx: &mut task::Context,
        interest: &Interest,
    ) -> task::Poll<Option<hawser::Result<Packet>>> {
        if self.remote_closed.load(Ordering::SeqCst) {
            return task::Poll::Ready(None);
        }

        if let task::Poll::Ready(Some(result)) = self
            .connect
            .mux
            .poll_interest(cx, &Interest::ChannelClose(self.local_id))
        {
            if let Err(err) = result {
                return task::Poll::Ready(Some(Err(err)));
            }

            self.remote_closed.store(true, Ordering::SeqCst);
            self.remote_eof.store(true, Ordering::SeqCst);
            self.unregister();

            tracing::debug!(
                "Peer closed channel {}:{}, unregistered all interests",
                self.local_id,
                self.remote_id
            );

            return task::Poll::Ready(None);
        }

        if let task::Poll::Ready(Some(result)) = self
            .connect
            .mux
            .poll_interest(cx, &Interest::ChannelEof(self.local_id))
        {
            if let Err(err) = result {
                return task::Poll::Ready(Some(Err(err)));
            }

            self.remote_eof.store(true, Ordering::SeqCst);
            self.connect.mux.unregister_if(
                |interest| matches!(interest, Interest::ChannelData(id, _) if id == &self.local_id),
            );

            tracing::debug!(
                "Peer sent an EOF for channel {}:{}, unregistered the data streams",
                self.local_id,
                self.remote_id
            );

            return self.poll_take(cx, interest);
        }

        if let task::Poll::Ready(Some(result)) = self
            .connect
            .mux
            .poll_interest(cx, &Interest::ChannelWindowAdjust(self.local_id))
        {
            let bytes = match result.and_then(|packet| {
                packet
                    .to::<connect::ChannelWindowAdjust>()
                    .map_err(Into::into)
            }) {
                Ok(message) => message.bytes_to_add,
                Err(err) => return task::Poll::Ready(Some(Err(err))),
            };

            self.remote_window.replenish(bytes);

            tracing::debug!(
                "Peer extended the window by `{bytes}` bytes for channel {}:{}",
                self.local_id,
                self.remote_id
            );

            return self.poll_take(cx, interest);
        }

        // Window adjusts are only ever consumed (and accounted) by the
        // cascade above; a caller waiting on one parks here.
        if matches!(interest, Interest::ChannelWindowAdjust(_)) {
            return task::Poll::Pending;
        }

        self.connect.mux.poll_interest(cx, interest)
    }

    /// Send a _channel request_ without asking for a reply.
    pub async fn request(&self, context: ChannelRequestContext<'_>) -> Result<()> {
        if self.close_sent.load(Ordering::SeqCst) || self.remote_closed.load(Ordering::SeqCst) {
            return Err(Error::ChannelClosed);
        }

        self.connect
            .mux
            .send(&connect::ChannelRequest {
                recipient_channel: self.remote_id,
                want_reply: false.into(),
                context,
            })
            .await
            .map_err(Into::into)
    }

    /// Send a _channel request_ and wait for the peer's reply; replies
    /// are matched to requests in emission order.
    pub async fn request_wait(&self, context: ChannelRequestContext<'_>) -> Result<Response> {
        if self.close_sent.load(Ordering::SeqCst) || self.remote_closed.load(Ordering::SeqCst) {
            return Err(Error::ChannelClosed);
        }

        let _fifo = self.replies.lock().await;

        let interest = Interest::ChannelResponse(self.local_id);
        self.connect.mux.register(interest);

        let result = async {
            self.connect
                .mux
                .send(&connect::ChannelRequest {
                    recipient_channel: self.remote_id,
                    want_reply: true.into(),
                    context,
                })
                .await?;

            let packet = futures::future::poll_fn(|cx| self.poll_take(cx, &interest))
                .await
                .ok_or(Error::ChannelClosed)??;

            if packet.to::<connect::ChannelSuccess>().is_ok() {
                Ok(Response::Success)
            } else if packet.to::<connect::ChannelFailure>().is_ok() {
                Ok(Response::Failure)
            } else {
                Err(Error::Transport(hawser::Error::UnexpectedMessage))
            }
        }
        .await;

        self.connect.mux.unregister(&interest);

        result
    }

    /// Make a reader for current channel's _data_ stream.
    #[must_use]
    pub fn as_reader(&self) -> impl AsyncRead + '_ {
        io::Read::new(self, None)
    }

    /// Make a reader for current channel's _extended data_ stream.
    #[must_use]
    pub fn as_reader_ext(&self, ext: NonZeroU32) -> impl AsyncRead + '_ {
        io::Read::new(self, Some(ext))
    }

    /// Make a writer for current channel's _data_ stream.
    ///
    /// ## Note:
    /// The writer does not flush on [`Drop`], the caller is responsible
    /// to call [`futures::AsyncWriteExt::flush`] before dropping.
    #[must_use]
    pub fn as_writer(&self) -> impl AsyncWrite + '_ {
        io::Write::new(self, None)
    }

    /// Make a writer for current channel's _extended data_ stream.
    ///
    /// ## Note:
    /// The writer does not flush on [`Drop`], the caller is responsible
    /// to call [`futures::AsyncWriteExt::flush`] before dropping.
    #[must_use]
    pub fn as_writer_ext(&self, ext: NonZeroU32) -> impl AsyncWrite + '_ {
        io::Write::new(self, Some(ext))
    }

    /// Signal to the peer we won't send any more data in the current channel.
    pub async fn eof(&self) -> Result<()> {
        if self.eof_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.connect
            .mux
            .send(&connect::ChannelEof {
                recipient_channel: self.remote_id,
            })
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Close the channel gracefully: signal EOF, send our `CLOSE` and
    /// hold the channel's resources until the peer's `CLOSE` crossed too.
    pub async fn close(self) -> Result<()> {
        self.eof().await.ok();

        if !self.close_sent.swap(true, Ordering::SeqCst) {
            self.connect
                .mux
                .send(&connect::ChannelClose {
                    recipient_channel: self.remote_id,
                })
                .await
                .map_err(|_| Error::ChannelClosed)?;
        }

        while !self.remote_closed.load(Ordering::SeqCst) {
            let polled = futures::future::poll_fn(|cx| {
                self.poll_take(cx, &Interest::ChannelClose(self.local_id))
            })
            .await;

            match polled {
                // `poll_take` records the close and unregisters for us.
                None => break,
                Some(Err(_)) => break,
                Some(Ok(_)) => {
                    self.remote_closed.store(true, Ordering::SeqCst);

                    break;
                }
            }
        }

        tracing::debug!(
            "Channel {}:{} fully closed on both sides",
            self.local_id,
            self.remote_id
        );

        Ok(())
    }
}

impl<IO: Pipe, H: Hooks> Drop for Channel<'_, IO, H> {
    fn drop(&mut self) {
        if !self.close_sent.swap(true, Ordering::SeqCst) {
            if !self.eof_sent.swap(true, Ordering::SeqCst) {
                self.connect.mux.push(&connect::ChannelEof {
                    recipient_channel: self.remote_id,
                });
            }

            self.connect.mux.push(&connect::ChannelClose {
                recipient_channel: self.remote_id,
            });
        }

        self.unregister();
        self.connect.channels.remove(&self.local_id);

        tracing::debug!(
            "Released channel {}:{}",
            self.local_id,
            self.remote_id
        );
    }
}
