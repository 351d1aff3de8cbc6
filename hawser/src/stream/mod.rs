//! Primitives to send and receive binary packets over a [`Pipe`] stream.

use std::collections::VecDeque;

use futures::{AsyncBufReadExt, AsyncWriteExt, FutureExt};
use futures_time::{future::FutureExt as _, time::Duration};
use hawser_packet::{
    binrw::{meta::ReadEndian, BinRead},
    IntoPacket, Packet,
};

use crate::{DisconnectedBy, DisconnectedError, Error, Pipe, Result};

mod counter;
use counter::IoCounter;

mod transport;
pub(crate) use transport::{Transport, TransportPair};

mod keys;
pub(crate) use keys::Keys;

/// Message numbers admissible between `KEXINIT` and `NEWKEYS`
/// when the strict key-exchange extension is active.
fn kex_message(msg: u8) -> bool {
    matches!(msg, 1 | 20 | 21 | 30..=49)
}

/// A wrapper around a [`Pipe`] to interface with the SSH binary protocol.
pub struct Stream<S> {
    inner: IoCounter<S>,
    timeout: Duration,

    /// The pair of transport algorithms and keys computed from the key exchange.
    transport: TransportPair,

    /// The session identifier derived from the first key exchange.
    session: Option<Vec<u8>>,

    /// Whether the peer negociated the strict key-exchange extension.
    strict: bool,

    /// Whether a key-exchange is currently in progress.
    kexing: bool,

    /// Re-key thresholds, in exchanged bytes and in elapsed time.
    rekey_bytes: usize,
    rekey_after: std::time::Duration,
    keyed_at: Option<std::time::Instant>,

    /// Sequence number for the `tx` side.
    txseq: u32,

    /// Sequence number for the `rx` side.
    rxseq: u32,

    /// A buffer for the `peek` method.
    buffer: Option<Packet>,

    /// Application packets crossed by an in-flight key-exchange,
    /// delivered once the exchange concluded.
    stashed: VecDeque<Packet>,
}

impl<S> Stream<S>
where
    S: Pipe,
{
    pub fn new(
        stream: S,
        timeout: Duration,
        rekey_bytes: usize,
        rekey_after: std::time::Duration,
    ) -> Self {
        Self {
            inner: IoCounter::new(stream),
            timeout,
            transport: Default::default(),
            session: None,
            strict: false,
            kexing: false,
            rekey_bytes,
            rekey_after,
            keyed_at: None,
            txseq: 0,
            rxseq: 0,
            buffer: None,
            stashed: VecDeque::new(),
        }
    }

    /// Whether the stream is due for a (re-)key-exchange, either because
    /// it has never been keyed, or because the byte or time thresholds
    /// have been crossed.
    pub fn is_rekeyable(&self) -> bool {
        self.session.is_none()
            || self.inner.count() > self.rekey_bytes
            || self
                .keyed_at
                .is_some_and(|at| at.elapsed() > self.rekey_after)
    }

    /// Install the freshly negociated algorithms and keys, carrying over
    /// the rolling compression state of the outgoing configuration.
    pub fn with_transport(&mut self, transport: TransportPair) {
        let TransportPair { tx, rx } = std::mem::replace(&mut self.transport, transport);

        self.transport.tx.inherit(tx);
        self.transport.rx.inherit(rx);

        self.inner.reset();
        self.keyed_at = Some(std::time::Instant::now());
    }

    /// Record the session identifier on the first exchange,
    /// later exchanges keep the first identifier for the session's life.
    pub fn with_session(&mut self, session: &[u8]) -> &[u8] {
        self.session.get_or_insert_with(|| session.to_vec())
    }

    pub fn session_id(&self) -> Option<&[u8]> {
        self.session.as_deref()
    }

    /// Turn on delayed compression algorithms once the user authenticated.
    pub fn activate_compression(&mut self) {
        self.transport.tx.activate_compression();
        self.transport.rx.activate_compression();
    }

    /// Flip the strict key-exchange switch; only ever evaluated
    /// from the *initial* `KEXINIT` exchange.
    pub fn with_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Mark the start and end of a key-exchange, which tightens the
    /// set of acceptable inbound messages under strict mode.
    pub fn kexing(&mut self, kexing: bool) {
        self.kexing = kexing;
    }

    pub fn rxseq(&self) -> u32 {
        self.rxseq
    }

    /// Poll the stream to detect whether data is immediately readable.
    pub async fn is_readable(&mut self) -> Result<bool> {
        if self.buffer.is_some() || !self.stashed.is_empty() {
            return Ok(true);
        }

        futures::select_biased! {
            buf = self.inner.fill_buf().fuse() => {
                buf?;

                Ok(true)
            }
            _ = futures::future::ready(()).fuse() => {
                Ok(false)
            }
        }
    }

    /// Receive and decrypt a _packet_ from the peer without removing it from the queue.
    pub async fn peek(&mut self) -> Result<&Packet> {
        let packet = self.recv().await?;

        Ok(self.buffer.insert(packet))
    }

    /// Pop a `T` from the stream if the next immediately available
    /// packet deserializes to it, leaving anything else buffered.
    pub async fn try_recv<T>(&mut self) -> Result<Option<T>>
    where
        T: for<'a> BinRead<Args<'a> = ()> + ReadEndian,
    {
        if self.buffer.is_none() && !self.is_readable().await? {
            return Ok(None);
        }

        let packet = self.peek().await?;

        Ok(match packet.to::<T>() {
            Ok(message) => {
                self.buffer.take();

                Some(message)
            }
            Err(_) => None,
        })
    }

    /// Receive and decrypt a _packet_ from the peer.
    pub async fn recv(&mut self) -> Result<Packet> {
        loop {
            if let Some(packet) = self.buffer.take() {
                break Ok(packet);
            }

            if !self.kexing {
                if let Some(packet) = self.stashed.pop_front() {
                    break Ok(packet);
                }
            }

            // A sequence wrap-around before the initial key-exchange
            // completed defeats the anti-truncation defences.
            if self.session.is_none() && self.rxseq == u32::MAX {
                break Err(Error::KexFailed);
            }

            let packet = Packet::from_reader(&mut self.inner, &mut self.transport.rx, self.rxseq)
                .timeout(self.timeout)
                .await??;

            let msg = packet.payload.first().copied().unwrap_or_default();

            tracing::trace!(
                "<~- #{}: ^{:#x} ({} bytes)",
                self.rxseq,
                msg,
                packet.payload.len(),
            );

            // NEWKEYS resets the inbound sequence under strict kex.
            if self.strict && msg == 21 {
                self.rxseq = 0;
            } else {
                self.rxseq = self.rxseq.wrapping_add(1);
            }

            if self.kexing && msg == 1 {
                let message: hawser_packet::trans::Disconnect = packet.to()?;

                break Err(Error::Disconnected(DisconnectedError {
                    by: DisconnectedBy::Them,
                    reason: message.reason,
                    description: message.description.into_string(),
                }));
            }

            if self.kexing && !kex_message(msg) {
                // Service acceptances and authentication banners may
                // legitimately cross an exchange already in flight;
                // hold on to them until it concluded.
                if matches!(msg, 6 | 53) {
                    self.stashed.push_back(packet);

                    continue;
                }

                if self.strict {
                    break Err(Error::StrictKexViolation);
                }

                // Outside of strict mode, transparent messages are
                // tolerated and skipped during the exchange.
                if matches!(msg, 2 | 4) {
                    continue;
                }

                break Err(Error::UnexpectedMessage);
            }

            break Ok(packet);
        }
    }

    /// Encrypt and send a _packet_ to the peer.
    pub async fn send(&mut self, packet: impl IntoPacket) -> Result<()> {
        let packet = packet.into_packet();

        if self.session.is_none() && self.txseq == u32::MAX {
            return Err(Error::KexFailed);
        }

        packet
            .to_writer(&mut self.inner, &mut self.transport.tx, self.txseq)
            .timeout(self.timeout)
            .await??;
        self.inner.flush().await?;

        let msg = packet.payload.first().copied().unwrap_or_default();

        tracing::trace!(
            "-~> #{}: ^{:#x} ({} bytes)",
            self.txseq,
            msg,
            packet.payload.len(),
        );

        // NEWKEYS resets the outbound sequence under strict kex.
        if self.strict && msg == 21 {
            self.txseq = 0;
        } else {
            self.txseq = self.txseq.wrapping_add(1);
        }

        Ok(())
    }
}
