use dashmap::DashMap;
use futures::{lock::Mutex, task, FutureExt};
use hawser::{session::Hooks, Pipe, Session};
use hawser_packet::{IntoPacket, Packet};

mod interest;
pub use interest::Interest;

mod poller;
use poller::Poller;

/// The packet router of the connect layer: a single [`Poller`] drives
/// the session while tasks subscribe to [`Interest`]s and steal the
/// packets classified for them.
pub struct Mux<IO: Pipe, H: Hooks> {
    queue: flume::Sender<Packet>,
    poller: Mutex<Poller<IO, H>>,
    interests: DashMap<Interest, task::AtomicWaker>,
}

impl<IO, H> From<Session<IO, H>> for Mux<IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    fn from(session: Session<IO, H>) -> Self {
        let (poller, queue) = Poller::new(session);

        Self {
            queue,
            poller: poller.into(),
            interests: Default::default(),
        }
    }
}

impl<IO, H> Mux<IO, H>
where
    IO: Pipe,
    H: Hooks,
{
    pub fn register(&self, interest: Interest) {
        // This is a genuine programming error from us if it happens,
        // as duplicate registrations would cause packet loss.
        #[allow(clippy::panic)]
        if self
            .interests
            .insert(interest, Default::default())
            .is_some()
        {
            panic!("Unable to register multiple concurrent interests for `{interest:?}`");
        }

        tracing::trace!("Registered interest for `{interest:?}`");
    }

    pub fn unregister(&self, interest: &Interest) {
        if let Some((interest, waker)) = self.interests.remove(interest) {
            tracing::trace!("Unregistered interest for `{interest:?}`");

            // Wake unregistered tasks to signal them to finish.
            waker.wake();
        }
    }

    pub fn unregister_if(&self, filter: impl Fn(&Interest) -> bool) {
        // NOTE: We collect here to remove reference to the DashMap
        // which would deadlock on calls to `remove` in `Self::unregister`.
        for interest in self
            .interests
            .iter()
            .map(|interest| *interest.key())
            .filter(filter)
            .collect::<Vec<_>>()
        {
            self.unregister(&interest);
        }
    }

    /// Queue a packet for sending, in submission order.
    pub fn push(&self, item: impl IntoPacket) {
        self.queue.send(item.into_packet()).ok();
    }
}

impl<IO, H> Mux<IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub fn poll_interest(
        &self,
        cx: &mut task::Context,
        interest: &Interest,
    ) -> task::Poll<Option<hawser::Result<Packet>>> {
        tracing::trace!("Polled with interest `{interest:?}`");

        if self
            .interests
            .get(interest)
            .as_deref()
            .map(|waker| waker.register(cx.waker()))
            .is_none()
        {
            tracing::trace!("{interest:?}: Polled for unregistered interest, returning `None`");

            return task::Poll::Ready(None);
        }

        let mut poller = futures::ready!(self.poller.lock().poll_unpin(cx));

        let buffer = match futures::ready!(poller.poll_peek(cx)) {
            Ok(buffer) => buffer,
            Err(err) => return task::Poll::Ready(Some(Err(err))),
        };

        match buffer.take() {
            None => {
                tracing::trace!(
                    "{interest:?}: Receiver dead, unregistering all interests, waking up tasks"
                );

                // Optimization for woken up tasks to return early `Ready(None)`.
                self.unregister_if(|_| true);

                task::Poll::Ready(None)
            }
            Some(packet) => {
                let Some(packet_interest) = Interest::parse(&packet) else {
                    return task::Poll::Ready(Some(Err(hawser::Error::UnexpectedMessage)));
                };

                if interest == &packet_interest {
                    tracing::trace!("{interest:?}: Matched, popping packet");

                    task::Poll::Ready(Some(Ok(packet)))
                } else {
                    match self.interests.get(&packet_interest).as_deref() {
                        Some(waker) => {
                            tracing::trace!(
                                "{interest:?} != {packet_interest:?}: Storing packet and waking task"
                            );

                            *buffer = Some(packet);
                            waker.wake();

                            task::Poll::Pending
                        }
                        None => {
                            tracing::warn!(
                                "!{packet_interest:?}: Dropping {}bytes, unregistered interest",
                                packet.payload.len()
                            );

                            cx.waker().wake_by_ref();
                            task::Poll::Pending
                        }
                    }
                }
            }
        }
    }

    /// Drive the queued packets through the transport.
    pub fn poll_flush(&self, cx: &mut task::Context) -> task::Poll<hawser::Result<()>> {
        let mut poller = futures::ready!(self.poller.lock().poll_unpin(cx));

        poller.poll_flush(cx)
    }

    /// Queue a packet and wait for it to reach the transport.
    pub async fn send(&self, item: impl IntoPacket) -> hawser::Result<()> {
        self.push(item);

        futures::future::poll_fn(|cx| self.poll_flush(cx)).await
    }

}
