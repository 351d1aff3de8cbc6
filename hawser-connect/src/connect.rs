//! Facilities to interract with the SSH _connect_ protocol.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashSet;
use futures::{lock::Mutex, TryStream};
use hawser::{session::Hooks, Pipe, Session};
use hawser_packet::connect;

use crate::{
    channel::{Channel, LocalWindow},
    channel_open,
    global_request::{self, GlobalResponse},
    mux::{Interest, Mux},
    Error, Result, MAXIMUM_CHANNELS,
};

#[doc(no_inline)]
pub use connect::{ChannelOpenContext, ChannelOpenFailureReason, GlobalRequestContext};

/// A token out of the session's channel semaphore, held for as long as
/// the channel lives.
pub(crate) struct Slot(flume::Sender<()>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.send(()).ok();
    }
}

/// Unregisters an [`Interest`] when the listening stream is dropped.
struct Unregister<'m, IO: Pipe, H: Hooks>(&'m Mux<IO, H>, Interest);

impl<IO: Pipe, H: Hooks> Drop for Unregister<'_, IO, H> {
    fn drop(&mut self) {
        self.0.unregister(&self.1);
    }
}

/// A wrapper around a [`Session`] to interract with the connect layer.
pub struct Connect<IO: Pipe, H: Hooks = ()> {
    pub(crate) mux: Mux<IO, H>,
    pub(crate) channels: DashSet<u32>,

    sequence: AtomicU32,
    slots: (flume::Sender<()>, flume::Receiver<()>),

    /// Global request replies arrive in emission order,
    /// this lock keeps waiters in the same order.
    replies: Mutex<()>,
}

impl<IO, H> Connect<IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub(crate) fn new(session: Session<IO, H>) -> Self {
        let slots = flume::bounded(MAXIMUM_CHANNELS);
        for _ in 0..MAXIMUM_CHANNELS {
            slots.0.send(()).expect("the semaphore can hold its tokens");
        }

        Self {
            mux: Mux::from(session),
            channels: Default::default(),

            sequence: AtomicU32::new(0),
            slots,

            replies: Default::default(),
        }
    }

    pub(crate) async fn slot(&self) -> Result<Slot> {
        self.slots
            .1
            .recv_async()
            .await
            .map_err(|_| Error::ChannelClosed)?;

        Ok(Slot(self.slots.0.clone()))
    }

    pub(crate) fn next_channel_id(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// Request a new channel with the provided `context`, waiting on the
    /// session's channel semaphore for a free slot.
    pub async fn open(&self, context: ChannelOpenContext<'_>) -> Result<Channel<'_, IO, H>> {
        let slot = self.slot().await?;

        let local_id = self.next_channel_id();
        self.channels.insert(local_id);

        let interest = Interest::ChannelOpenResponse(local_id);
        self.mux.register(interest);

        let result = async {
            self.mux
                .send(&connect::ChannelOpen {
                    sender_channel: local_id,
                    initial_window_size: LocalWindow::INITIAL_WINDOW_SIZE,
                    maximum_packet_size: LocalWindow::MAXIMUM_PACKET_SIZE,
                    context,
                })
                .await?;

            futures::future::poll_fn(|cx| self.mux.poll_interest(cx, &interest))
                .await
                .ok_or(Error::ChannelClosed)?
                .map_err(Error::from)
        }
        .await;

        self.mux.unregister(&interest);

        let packet = match result {
            Ok(packet) => packet,
            Err(err) => {
                self.channels.remove(&local_id);

                return Err(err);
            }
        };

        if let Ok(confirmation) = packet.to::<connect::ChannelOpenConfirmation>() {
            Ok(Channel::new(
                self,
                local_id,
                confirmation.sender_channel,
                confirmation.initial_window_size,
                confirmation.maximum_packet_size,
                slot,
            ))
        } else if let Ok(failure) = packet.to::<connect::ChannelOpenFailure>() {
            self.channels.remove(&local_id);

            Err(Error::ChannelOpenFailure {
                reason: failure.reason,
                message: failure.description.into_string(),
            })
        } else {
            self.channels.remove(&local_id);

            Err(Error::Transport(hawser::Error::UnexpectedMessage))
        }
    }

    /// Open a channel of type `session`.
    pub async fn open_session(&self) -> Result<Channel<'_, IO, H>> {
        self.open(ChannelOpenContext::Session).await
    }

    /// Open a channel of type `direct-tcpip` towards `address`:`port`.
    pub async fn open_direct_tcpip(
        &self,
        address: impl AsRef<str>,
        port: u32,
        originator_address: impl AsRef<str>,
        originator_port: u32,
    ) -> Result<Channel<'_, IO, H>> {
        self.open(ChannelOpenContext::DirectTcpip {
            address: address.as_ref().to_owned().into(),
            port,
            originator_address: originator_address.as_ref().to_owned().into(),
            originator_port,
        })
        .await
    }

    /// Iterate over the incoming _channel open requests_ from the peer,
    /// such as `forwarded-tcpip` channels.
    pub fn channel_opens(
        &self,
    ) -> impl TryStream<Ok = channel_open::ChannelOpen<'_, IO, H>, Error = Error> + '_ {
        const INTEREST: Interest = Interest::ChannelOpenRequest;

        self.mux.register(INTEREST);
        let unregister_on_drop = Unregister(&self.mux, INTEREST);

        futures::stream::poll_fn(move |cx| {
            let _moved = &unregister_on_drop;

            match futures::ready!(self.mux.poll_interest(cx, &INTEREST)) {
                Some(Ok(packet)) => match packet.to::<connect::ChannelOpen>() {
                    Ok(request) => std::task::Poll::Ready(Some(Ok(channel_open::ChannelOpen::new(
                        self, request,
                    )))),
                    Err(err) => std::task::Poll::Ready(Some(Err(hawser::Error::from(err).into()))),
                },
                Some(Err(err)) => std::task::Poll::Ready(Some(Err(err.into()))),
                None => std::task::Poll::Ready(None),
            }
        })
    }

    /// Iterate over the incoming _global requests_ from the peer.
    pub fn global_requests(
        &self,
    ) -> impl TryStream<Ok = global_request::GlobalRequest<'_, IO, H>, Error = Error> + '_ {
        const INTEREST: Interest = Interest::GlobalRequest;

        self.mux.register(INTEREST);
        let unregister_on_drop = Unregister(&self.mux, INTEREST);

        futures::stream::poll_fn(move |cx| {
            let _moved = &unregister_on_drop;

            match futures::ready!(self.mux.poll_interest(cx, &INTEREST)) {
                Some(Ok(packet)) => match packet.to::<connect::GlobalRequest>() {
                    Ok(request) => std::task::Poll::Ready(Some(Ok(
                        global_request::GlobalRequest::new(self, request),
                    ))),
                    Err(err) => std::task::Poll::Ready(Some(Err(hawser::Error::from(err).into()))),
                },
                Some(Err(err)) => std::task::Poll::Ready(Some(Err(err.into()))),
                None => std::task::Poll::Ready(None),
            }
        })
    }

    /// Make a _global request_ with the provided `context` and wait for
    /// the peer's reply; replies are matched to requests in emission order.
    pub async fn global_request(
        &self,
        context: GlobalRequestContext<'_>,
    ) -> Result<GlobalResponse> {
        let with_port =
            matches!(context, GlobalRequestContext::TcpipForward { bind_port, .. } if bind_port == 0);

        let _fifo = self.replies.lock().await;

        let interest = Interest::GlobalResponse;
        self.mux.register(interest);

        let result = async {
            self.mux
                .send(&connect::GlobalRequest {
                    want_reply: true.into(),
                    context,
                })
                .await?;

            let packet = futures::future::poll_fn(|cx| self.mux.poll_interest(cx, &interest))
                .await
                .ok_or(Error::ChannelClosed)??;

            if packet.to::<connect::RequestFailure>().is_ok() {
                Ok(GlobalResponse::Rejected)
            } else if with_port {
                if let Ok(connect::ForwardingSuccess { bound_port }) = packet.to() {
                    Ok(GlobalResponse::AcceptedPort(bound_port))
                } else {
                    Err(Error::Transport(hawser::Error::UnexpectedMessage))
                }
            } else if packet.to::<connect::RequestSuccess>().is_ok() {
                Ok(GlobalResponse::Accepted)
            } else {
                Err(Error::Transport(hawser::Error::UnexpectedMessage))
            }
        }
        .await;

        self.mux.unregister(&interest);

        result
    }

    /// Probe the peer's liveness with a `keepalive@openssh.com` global
    /// request; either reply proves the peer processes messages, while
    /// transport errors are fatal.
    pub async fn keepalive(&self) -> Result<()> {
        self.global_request(GlobalRequestContext::Keepalive)
            .await
            .map(|_| ())
    }

    /// Probe the peer on a fixed `interval`, returning the transport
    /// error that ends the session; meant to be raced against the rest
    /// of the application's work.
    pub async fn keepalive_every(&self, interval: std::time::Duration) -> Error {
        use futures::StreamExt;

        let mut ticks = futures_time::stream::interval(interval.into());

        loop {
            ticks.next().await;

            if let Err(err) = self.keepalive().await {
                break err;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_std::net::TcpStream;
    use futures::io::BufReader;

    #[test]
    fn assert_connect_is_send() {
        fn is_send<T: Send>() {}

        is_send::<Connect<BufReader<TcpStream>>>();
    }

    #[test]
    fn assert_connect_is_sync() {
        fn is_sync<T: Sync>() {}

        is_sync::<Connect<BufReader<TcpStream>>>();
    }
}
