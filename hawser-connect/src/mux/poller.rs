use futures::{future::BoxFuture, task, FutureExt};
use hawser::{session::Hooks, Pipe, Session};
use hawser_packet::Packet;

type SendFut<IO, H> = BoxFuture<'static, (hawser::Result<()>, Box<Session<IO, H>>)>;
type RecvFut<IO, H> = BoxFuture<'static, (hawser::Result<Packet>, Box<Session<IO, H>>)>;

enum State<IO: Pipe, H: Hooks> {
    /// Idling and waiting for tasks.
    Idle(Box<Session<IO, H>>),

    /// Polling to send a packet.
    Sending(SendFut<IO, H>),

    /// Polling to recv a packet.
    Recving(RecvFut<IO, H>),

    /// Dropped mid-transition, must never be observed.
    Poisoned,
}

/// Drives an owned [`Session`] from whichever task polls, multiplexing
/// queued sends with a peekable receive slot.
pub struct Poller<IO: Pipe, H: Hooks> {
    state: State<IO, H>,
    queue: flume::Receiver<Packet>,

    buffer: Option<Packet>,
    dead: bool,
}

impl<IO, H> Poller<IO, H>
where
    IO: Pipe + 'static,
    H: Hooks + 'static,
{
    pub fn new(session: Session<IO, H>) -> (Self, flume::Sender<Packet>) {
        let (sender, queue) = flume::unbounded();

        (
            Self {
                state: State::Idle(Box::new(session)),
                queue,
                buffer: None,
                dead: false,
            },
            sender,
        )
    }

    /// Drive the in-flight work as far as it goes without blocking;
    /// errors other than disconnection are surfaced to the caller.
    fn pump(&mut self, cx: &mut task::Context) -> hawser::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, State::Poisoned) {
                State::Sending(mut fut) => match fut.poll_unpin(cx) {
                    task::Poll::Ready((result, session)) => {
                        self.state = State::Idle(session);

                        match result {
                            Err(hawser::Error::Disconnected(_)) => self.dead = true,
                            result => result?,
                        }
                    }
                    task::Poll::Pending => {
                        self.state = State::Sending(fut);

                        break Ok(());
                    }
                },
                State::Recving(mut fut) => match fut.poll_unpin(cx) {
                    task::Poll::Ready((result, session)) => {
                        self.state = State::Idle(session);

                        match result {
                            Ok(packet) => self.buffer = Some(packet),
                            Err(hawser::Error::Disconnected(_)) => self.dead = true,
                            Err(err) => break Err(err),
                        }
                    }
                    task::Poll::Pending => {
                        self.state = State::Recving(fut);

                        break Ok(());
                    }
                },
                State::Idle(mut session) => {
                    if self.dead {
                        self.state = State::Idle(session);

                        break Ok(());
                    }

                    if let Ok(item) = self.queue.try_recv() {
                        self.state = State::Sending(
                            async move { (session.send_packet(item).await, session) }.boxed(),
                        );

                        continue;
                    }

                    if self.buffer.is_none() {
                        // Only commit to a receive when bytes await, so
                        // queued sends are never starved behind an idle
                        // socket; the probe registers the socket waker.
                        let readable = {
                            let mut probe = session.readable().boxed();

                            probe.poll_unpin(cx).is_ready()
                        };

                        if readable {
                            self.state = State::Recving(
                                async move { (session.recv().await, session) }.boxed(),
                            );

                            continue;
                        }
                    }

                    self.state = State::Idle(session);

                    break Ok(());
                }
                State::Poisoned => {
                    break Err(hawser::Error::UnexpectedMessage);
                }
            }
        }
    }

    /// Resolve once every queued packet has been handed to the transport.
    pub fn poll_flush(&mut self, cx: &mut task::Context) -> task::Poll<hawser::Result<()>> {
        self.pump(cx)?;

        if self.queue.is_empty() && !matches!(self.state, State::Sending(_)) {
            task::Poll::Ready(Ok(()))
        } else {
            task::Poll::Pending
        }
    }

    /// Resolve with the receive slot once a packet is buffered, or with
    /// an empty slot once the session is disconnected.
    pub fn poll_peek(
        &mut self,
        cx: &mut task::Context,
    ) -> task::Poll<hawser::Result<&mut Option<Packet>>> {
        self.pump(cx)?;

        if self.buffer.is_some() || self.dead {
            task::Poll::Ready(Ok(&mut self.buffer))
        } else {
            task::Poll::Pending
        }
    }
}
