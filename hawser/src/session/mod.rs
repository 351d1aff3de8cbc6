//! Session and transport handling mechanics.

use futures::AsyncWriteExt;
use futures_time::{future::FutureExt, time::Duration as TimeDuration};
use hawser_packet::{
    binrw::{meta::WriteEndian, BinWrite},
    trans::{Debug, Disconnect, DisconnectReason, Ignore, KexInit, NewKeys, Unimplemented},
    Id, IntoPacket, Packet,
};

use crate::{
    algorithm::{Kex, Negociate},
    client::{Client, STRICT_SERVER},
    stream::Stream,
    DisconnectedBy, DisconnectedError, Error, Pipe, Result,
};

mod hook;
pub use hook::Hooks;

/// A session wrapping a [`Pipe`] stream to handle **key-exchange**
/// and **`SSH-TRANS`** messages.
pub struct Session<I, H = ()> {
    stream: Option<Stream<I>>,
    config: Client,
    hooks: H,

    peer_id: Id,
    authenticated: bool,
}

impl<I, H> Session<I, H>
where
    I: Pipe,
    H: Hooks,
{
    /// Create a new [`Session`] from a [`Pipe`] stream and a configuration,
    /// performing the identification exchange.
    pub async fn new(mut stream: I, config: Client, mut hooks: H) -> Result<Self> {
        config.id.to_writer(&mut stream).await?;
        stream.flush().await?;

        let (peer_id, banner) = Id::from_reader(&mut stream)
            .timeout(TimeDuration::from(config.timeout))
            .await??;

        for line in &banner {
            hooks.on_banner(line);
        }

        let stream = Stream::new(
            stream,
            config.timeout.into(),
            config.rekey_bytes,
            config.rekey_after,
        );

        tracing::debug!("Session started with peer `{peer_id}`");

        Ok(Self {
            stream: Some(stream),
            config,
            hooks,
            peer_id,
            authenticated: false,
        })
    }

    /// Get the [`Id`] of the connected peer.
    pub fn peer_id(&self) -> &Id {
        &self.peer_id
    }

    /// The session identifier derived from the first key exchange,
    /// if one completed already.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.stream.as_ref().and_then(Stream::session_id)
    }

    /// Force the initial key-exchange; a no-op if the session is
    /// already keyed, which makes the call idempotent.
    pub async fn handshake(&mut self) -> Result<()> {
        if self.session_id().is_none() {
            if let Err(err) = self.kex(None).await {
                return Err(self.fail(err).await);
            }
        }

        Ok(())
    }

    /// Mark the session as authenticated, which activates
    /// authentication-delayed compression algorithms.
    pub fn authenticated(&mut self) {
        self.authenticated = true;

        if let Some(ref mut stream) = self.stream {
            stream.activate_compression();
        }
    }

    /// Receive a [`Packet`] from the `stream`, processing transport
    /// messages along the way.
    pub async fn recv(&mut self) -> Result<Packet> {
        loop {
            let Some(ref mut stream) = self.stream else {
                break Err(Error::Disconnected(DisconnectedError {
                    by: DisconnectedBy::Us,
                    reason: DisconnectReason::ByApplication,
                    description: "The session has been closed on this side".into(),
                }));
            };

            if stream.is_rekeyable() {
                if let Err(err) = self.kex(None).await {
                    break Err(self.fail(err).await);
                }

                continue;
            }

            let packet = match stream.recv().await {
                Ok(packet) => packet,
                Err(err) => break Err(self.fail(err).await),
            };
            let msg = packet.payload.first().copied().unwrap_or_default();

            match msg {
                // SSH_MSG_DISCONNECT
                1 => {
                    let message: Disconnect = packet.to()?;

                    self.hooks
                        .on_disconnect(&message.reason, &message.description);
                    drop(self.stream.take());

                    break Err(Error::Disconnected(DisconnectedError {
                        by: DisconnectedBy::Them,
                        reason: message.reason,
                        description: message.description.into_string(),
                    }));
                }

                // SSH_MSG_IGNORE
                2 => {
                    let _: Ignore = packet.to()?;

                    tracing::debug!("Received an 'ignore' message");
                }

                // SSH_MSG_UNIMPLEMENTED
                3 => {
                    let message: Unimplemented = packet.to()?;

                    tracing::debug!(
                        "Received an 'unimplemented' message about packet #{}",
                        message.seq
                    );
                }

                // SSH_MSG_DEBUG
                4 => {
                    let message: Debug = packet.to()?;

                    self.hooks.on_debug(&message.message);
                    tracing::debug!("Received a 'debug' message: {}", &*message.message);
                }

                // SSH_MSG_EXT_INFO, tolerated and ignored.
                7 => {
                    tracing::debug!("Received an 'ext-info' message");
                }

                // SSH_MSG_KEXINIT, the peer initiated a re-key.
                20 => {
                    let kexinit: KexInit = packet.to()?;

                    if let Err(err) = self.kex(Some(kexinit)).await {
                        break Err(self.fail(err).await);
                    }
                }

                // Service, authentication and connection messages are
                // the caller's to handle.
                5 | 6 | 50..=53 | 60..=79 | 80..=100 => break Ok(packet),

                // Anything else is answered with an 'unimplemented'.
                _ => {
                    let seq = stream.rxseq().wrapping_sub(1);

                    tracing::warn!("Unhandled message `{msg}` at #{seq}");
                    stream.send(&Unimplemented { seq }).await?;
                }
            }
        }
    }

    /// Send a message to the `stream`, completing any pending
    /// key-exchange beforehand.
    pub async fn send<T>(&mut self, message: &T) -> Result<()>
    where
        T: for<'a> BinWrite<Args<'a> = ()> + WriteEndian + std::fmt::Debug,
    {
        let Some(ref mut stream) = self.stream else {
            return Err(Error::Disconnected(DisconnectedError {
                by: DisconnectedBy::Us,
                reason: DisconnectReason::ByApplication,
                description: "The session has been closed on this side".into(),
            }));
        };

        if let Some(kexinit) = stream.try_recv::<KexInit>().await? {
            if let Err(err) = self.kex(Some(kexinit)).await {
                return Err(self.fail(err).await);
            }
        } else if stream.is_rekeyable() {
            if let Err(err) = self.kex(None).await {
                return Err(self.fail(err).await);
            }
        }

        match self.stream {
            Some(ref mut stream) => stream.send(message).await,
            None => Err(Error::UnexpectedMessage),
        }
    }

    /// Disconnect the session with the provided `reason` and `description`.
    pub async fn disconnect(
        &mut self,
        reason: DisconnectReason,
        description: impl Into<String>,
    ) -> Result<()> {
        let description = description.into();

        if let Some(mut stream) = self.stream.take() {
            stream
                .send(&Disconnect {
                    reason,
                    description: description.as_str().into(),
                    language: Default::default(),
                })
                .await?;
        }

        Ok(())
    }

    /// Tear the session down after a fatal error, sending a best-effort
    /// `DISCONNECT` whose reason matches the error class; failures at
    /// this point are logged and dropped to keep the original cause.
    async fn fail(&mut self, err: Error) -> Error {
        let reason = match &err {
            Error::Integrity(_) | Error::Cipher => Some(DisconnectReason::MacError),
            Error::KexFailed
            | Error::HostKeyRejected
            | Error::NoCommonKex
            | Error::NoCommonKey
            | Error::NoCommonCipher
            | Error::NoCommonHmac
            | Error::NoCommonCompression
            | Error::Signature(_) => Some(DisconnectReason::KeyExchangeFailed),
            Error::StrictKexViolation | Error::UnexpectedMessage | Error::Binary(_)
            | Error::Packet(_) => Some(DisconnectReason::ProtocolError),
            _ => None,
        };

        if let (Some(reason), Some(stream)) = (reason, self.stream.as_mut()) {
            if let Err(err) = stream
                .send(&Disconnect {
                    reason,
                    description: "An unrecoverable error happened in the transport".into(),
                    language: Default::default(),
                })
                .await
            {
                tracing::debug!("Dropped an error while already disconnecting: {err}");
            }
        }

        drop(self.stream.take());

        err
    }

    /// Run the key-exchange procedure, either self-initiated
    /// (`peerkexinit` is `None`) or responding to the peer's `KEXINIT`.
    async fn kex(&mut self, peerkexinit: Option<KexInit<'_>>) -> Result<()> {
        let Some(ref mut stream) = self.stream else {
            return Err(Error::UnexpectedMessage);
        };

        tracing::debug!("Starting key-exchange procedure");

        let initial = stream.session_id().is_none();
        let kexinit = self.config.kexinit(initial);

        stream.send(&kexinit).await?;

        let peerkexinit = match peerkexinit {
            Some(peerkexinit) => peerkexinit,
            None => loop {
                let packet = stream.recv().await?;

                match packet.payload.first() {
                    // Transparent messages are tolerated before the peer's `KEXINIT`.
                    Some(2 | 4) => continue,
                    _ => break packet.to::<KexInit>()?,
                }
            },
        };

        if initial {
            // Strict kex is only ever negociated on the initial exchange,
            // where the peer's `KEXINIT` must be its very first packet.
            let strict = peerkexinit.kex_algorithms.contains(STRICT_SERVER);
            stream.with_strict(strict);

            if strict {
                tracing::debug!("Peer negociated the strict key-exchange extension");

                if stream.rxseq() != 1 {
                    return Err(Error::StrictKexViolation);
                }
            }
        }

        stream.kexing(true);

        let kex = <Kex as Negociate>::negociate(&kexinit, &peerkexinit)?;

        tracing::debug!("Negociated key-exchange algorithm `{}`", kex.as_ref());

        let transport = kex
            .as_client(
                stream,
                &mut self.hooks,
                &self.config.id,
                &self.peer_id,
                &kexinit,
                &peerkexinit,
            )
            .await?;

        stream.send(&NewKeys).await?;
        stream.recv().await?.to::<NewKeys>()?;

        tracing::debug!(
            "Key exchange success, negociated algorithms:\nrx: {:?}\ntx: {:?}",
            transport.rx,
            transport.tx,
        );

        stream.with_transport(transport);

        if self.authenticated {
            stream.activate_compression();
        }

        stream.kexing(false);

        Ok(())
    }
}

impl<I, H> std::fmt::Debug for Session<I, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer_id", &self.peer_id)
            .field("authenticated", &self.authenticated)
            .finish_non_exhaustive()
    }
}

/// Keep `send` accepting both messages and pre-built packets.
impl<I, H> Session<I, H>
where
    I: Pipe,
    H: Hooks,
{
    /// Send a pre-assembled [`Packet`] to the `stream`, completing any
    /// pending key-exchange beforehand.
    pub async fn send_packet(&mut self, packet: Packet) -> Result<()> {
        let Some(ref mut stream) = self.stream else {
            return Err(Error::Disconnected(DisconnectedError {
                by: DisconnectedBy::Us,
                reason: DisconnectReason::ByApplication,
                description: "The session has been closed on this side".into(),
            }));
        };

        if let Some(kexinit) = stream.try_recv::<KexInit>().await? {
            if let Err(err) = self.kex(Some(kexinit)).await {
                return Err(self.fail(err).await);
            }
        } else if stream.is_rekeyable() {
            if let Err(err) = self.kex(None).await {
                return Err(self.fail(err).await);
            }
        }

        match self.stream {
            Some(ref mut stream) => stream.send(packet.into_packet()).await,
            None => Err(Error::UnexpectedMessage),
        }
    }

    /// Poll the stream to detect whether a packet is immediately readable.
    pub async fn readable(&mut self) -> Result<bool> {
        match self.stream {
            Some(ref mut stream) => stream.is_readable().await,
            None => Ok(true),
        }
    }
}
