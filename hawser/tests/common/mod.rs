//! A scripted server half of the wire, implementing just enough of the
//! server role over a loopback socket to exercise the client.

#![allow(clippy::unwrap_used, dead_code)]

use std::{collections::VecDeque, net::SocketAddr};

use async_std::net::{TcpListener, TcpStream};
use digest::Digest;
use futures::{io::BufReader, AsyncWriteExt};
use hmac::Mac as _;
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};

use hawser_packet::{
    arch::MpInt,
    binrw::{meta::ReadEndian, meta::WriteEndian, BinRead, BinWrite},
    kex,
    trans::{self, Ignore, KexEcdhInit, KexEcdhReply, KexInit, NewKeys},
    CipherCore, Id, IntoPacket, Mac, OpeningCipher, Packet, SealingCipher,
};

/// One direction of the scripted peer's transport: no encryption,
/// an optional `hmac-sha2-256`.
#[derive(Debug, Default)]
pub struct Plain {
    pub mac: Option<Vec<u8>>,
}

impl Mac for Plain {
    fn size(&self) -> usize {
        if self.mac.is_some() {
            32
        } else {
            0
        }
    }

    fn etm(&self) -> bool {
        false
    }
}

impl Plain {
    fn sign(&self, seq: u32, buf: &[u8]) -> Vec<u8> {
        match &self.mac {
            Some(key) => hmac::Hmac::<Sha256>::new_from_slice(key)
                .unwrap()
                .chain_update(seq.to_be_bytes())
                .chain_update(buf)
                .finalize()
                .into_bytes()
                .to_vec(),
            None => Vec::new(),
        }
    }
}

impl CipherCore for Plain {
    type Err = hawser_packet::Error;
    type Mac = Self;

    fn mac(&self) -> &Self {
        self
    }

    fn block_size(&self) -> usize {
        8
    }

    fn aead(&self) -> bool {
        false
    }
}

impl OpeningCipher for Plain {
    fn reveal(&mut self, buf: &mut [u8], _seq: u32) -> Result<u32, Self::Err> {
        Ok(u32::from_be_bytes(buf[..4].try_into().unwrap()))
    }

    fn open(&mut self, buf: &mut [u8], tag: Vec<u8>, seq: u32) -> Result<(), Self::Err> {
        if self.sign(seq, buf) != tag {
            return Err(hawser_packet::Error::MalformedPacket(
                "MAC verification failed on the scripted peer",
            ));
        }

        Ok(())
    }

    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err> {
        Ok(buf)
    }
}

impl SealingCipher for Plain {
    fn compress(&mut self, buf: &[u8]) -> Result<Vec<u8>, Self::Err> {
        Ok(buf.to_vec())
    }

    fn pad(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err> {
        let mut padding = 8 - (buf.len() + 5) % 8;
        if padding < 4 {
            padding += 8;
        }

        let mut padded = vec![padding as u8];
        padded.extend_from_slice(&buf);
        padded.resize(padded.len() + padding, 0);

        Ok(padded)
    }

    fn seal(&mut self, buf: &mut [u8], seq: u32) -> Result<Vec<u8>, Self::Err> {
        Ok(self.sign(seq, buf))
    }
}

/// Knobs for the scripted peer's behavior.
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Banner lines sent before the identification string.
    pub banner: Vec<&'static str>,

    /// Advertise `kex-strict-s-v00@openssh.com` in the initial `KEXINIT`.
    pub strict: bool,

    /// Send an `SSH_MSG_IGNORE` before the `KEXINIT`.
    pub ignore_first: bool,

    /// Negociate `hmac-sha2-256` instead of no MAC at all.
    pub mac: bool,
}

/// The scripted peer itself, sequence numbers and keys included.
pub struct Peer {
    pub stream: BufReader<TcpStream>,
    pub tx: Plain,
    pub rx: Plain,
    pub txseq: u32,
    pub rxseq: u32,

    pub key: ssh_key::PrivateKey,
    pub session_id: Option<Vec<u8>>,
    client_id: Id,

    /// Non-kex packets stashed while a re-key was in flight.
    pending: VecDeque<Packet>,
}

pub async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    (listener, addr)
}

impl Peer {
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().await.unwrap();

        Self {
            stream: BufReader::new(stream),
            tx: Plain::default(),
            rx: Plain::default(),
            txseq: 0,
            rxseq: 0,
            key: ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519)
                .unwrap(),
            session_id: None,
            client_id: Id::v2("unknown", None::<&str>),
            pending: VecDeque::new(),
        }
    }

    pub async fn send<T>(&mut self, message: &T)
    where
        T: for<'a> BinWrite<Args<'a> = ()> + WriteEndian,
    {
        let packet = message.into_packet();
        packet
            .to_writer(&mut self.stream, &mut self.tx, self.txseq)
            .await
            .unwrap();
        self.stream.flush().await.unwrap();

        self.txseq = self.txseq.wrapping_add(1);
    }

    pub async fn recv(&mut self) -> Packet {
        if let Some(packet) = self.pending.pop_front() {
            return packet;
        }

        let packet = Packet::from_reader(&mut self.stream, &mut self.rx, self.rxseq)
            .await
            .unwrap();

        self.rxseq = self.rxseq.wrapping_add(1);

        packet
    }

    pub async fn recv_as<T>(&mut self) -> T
    where
        T: for<'a> BinRead<Args<'a> = ()> + ReadEndian,
    {
        self.recv().await.to().unwrap()
    }

    /// Drive the identification exchange and the curve25519 key-exchange
    /// to completion, installing the MAC keys when so negociated.
    pub async fn handshake(&mut self, options: &Options) {
        for line in &options.banner {
            self.stream
                .write_all(format!("{line}\r\n").as_bytes())
                .await
                .unwrap();
        }

        let id = Id::v2("scripted_peer", None::<&str>);
        id.to_writer(&mut self.stream).await.unwrap();
        self.stream.flush().await.unwrap();

        self.client_id = Id::from_reader(&mut self.stream).await.unwrap().0;

        if options.ignore_first {
            self.send(&Ignore::default()).await;
        }

        self.kex(options, true).await;
    }

    /// Initiate a re-key from this side.
    pub async fn rekey(&mut self, options: &Options) {
        self.kex(options, false).await;
    }

    /// Run the identification exchange and the key-exchange up to the
    /// reply, then expect the client to abort with a kex failure.
    pub async fn handshake_expect_failure(&mut self) {
        let id = Id::v2("scripted_peer", None::<&str>);
        id.to_writer(&mut self.stream).await.unwrap();
        self.stream.flush().await.unwrap();

        self.client_id = Id::from_reader(&mut self.stream).await.unwrap().0;

        let options = Options::default();
        let kexinit = self.kexinit(&options, true);
        self.send(&kexinit).await;

        let client_kexinit: KexInit = self.recv_as().await;
        let ecdh_init: KexEcdhInit = self.recv_as().await;

        self.reply(&kexinit, &client_kexinit, &ecdh_init).await;

        let disconnect: trans::Disconnect = self.recv_as().await;
        assert_eq!(
            disconnect.reason,
            trans::DisconnectReason::KeyExchangeFailed
        );
    }

    /// One full `KEXINIT`-to-`NEWKEYS` exchange from the server side.
    async fn kex(&mut self, options: &Options, initial: bool) {
        let kexinit = self.kexinit(options, initial);
        self.send(&kexinit).await;

        // The client may have sent application packets before noticing
        // the re-key; stash them for after the exchange.
        let client_kexinit: KexInit = loop {
            let packet = self.recv().await;

            if packet.payload.first() == Some(&20) {
                break packet.to().unwrap();
            }

            self.pending.push_back(packet);
        };
        let ecdh_init: KexEcdhInit = self.recv_as().await;

        let (secret, hash) = self.reply(&kexinit, &client_kexinit, &ecdh_init).await;

        self.send(&NewKeys).await;
        self.recv_as::<NewKeys>().await;

        let session_id = self
            .session_id
            .get_or_insert_with(|| hash.clone())
            .clone();

        if options.strict {
            self.txseq = 0;
            self.rxseq = 0;
        }

        if options.mac {
            // 'E' keys the client-to-server integrity, 'F' the other way.
            self.rx.mac = Some(derive(&secret, &hash, b'E', &session_id, 32));
            self.tx.mac = Some(derive(&secret, &hash, b'F', &session_id, 32));
        }
    }

    /// Compute the shared secret and exchange hash, and send the
    /// `KEX_ECDH_REPLY`.
    async fn reply(
        &mut self,
        kexinit: &KexInit<'_>,
        client_kexinit: &KexInit<'_>,
        ecdh_init: &KexEcdhInit<'_>,
    ) -> (Vec<u8>, Vec<u8>) {
        let e_s = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
        let q_s = x25519_dalek::PublicKey::from(&e_s);
        let q_c =
            x25519_dalek::PublicKey::from(<[u8; 32]>::try_from(ecdh_init.q_c.as_ref()).unwrap());

        let shared = e_s.diffie_hellman(&q_c);
        let secret = MpInt::positive(shared.as_bytes()).into_vec();

        let k_s = self.key.public_key().to_bytes().unwrap();

        let hash = kex::Ecdh {
            v_c: self.client_id.to_string().into_bytes().into(),
            v_s: Id::v2("scripted_peer", None::<&str>).to_string().into_bytes().into(),
            i_c: client_kexinit.into(),
            i_s: kexinit.into(),
            k_s: k_s.as_slice().into(),
            q_c: ecdh_init.q_c.as_borrow(),
            q_s: q_s.as_ref().into(),
            k: secret.as_slice().into(),
        }
        .hash::<Sha256>()
        .to_vec();

        let signature: ssh_key::Signature = Signer::sign(&self.key, &hash);

        self.send(&KexEcdhReply {
            k_s: k_s.as_slice().into(),
            q_s: q_s.as_ref().into(),
            signature: signature.to_vec().as_slice().into(),
        })
        .await;

        (secret, hash)
    }

    fn kexinit(&self, options: &Options, initial: bool) -> KexInit<'static> {
        let kexs: &[&str] = if options.strict && initial {
            &["curve25519-sha256", "kex-strict-s-v00@openssh.com"]
        } else {
            &["curve25519-sha256"]
        };
        let macs: &[&str] = if options.mac {
            &["hmac-sha2-256"]
        } else {
            &["none"]
        };

        KexInit {
            cookie: [0x42; 16],
            kex_algorithms: kexs.iter().collect(),
            server_host_key_algorithms: ["ssh-ed25519"].into_iter().collect(),
            encryption_algorithms_client_to_server: ["none"].into_iter().collect(),
            encryption_algorithms_server_to_client: ["none"].into_iter().collect(),
            mac_algorithms_client_to_server: macs.iter().collect(),
            mac_algorithms_server_to_client: macs.iter().collect(),
            compression_algorithms_client_to_server: ["none"].into_iter().collect(),
            compression_algorithms_server_to_client: ["none"].into_iter().collect(),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false.into(),
        }
    }
}

/// The RFC4253 section 7.2 key stretching, server-side.
pub fn derive(secret: &[u8], hash: &[u8], kind: u8, session_id: &[u8], size: usize) -> Vec<u8> {
    let mut key: Vec<u8> = Sha256::new()
        .chain_update((secret.len() as u32).to_be_bytes())
        .chain_update(secret)
        .chain_update(hash)
        .chain_update([kind])
        .chain_update(session_id)
        .finalize()
        .to_vec();

    while key.len() < size {
        let more = Sha256::new()
            .chain_update((secret.len() as u32).to_be_bytes())
            .chain_update(secret)
            .chain_update(hash)
            .chain_update(&key)
            .finalize();

        key.extend_from_slice(&more);
    }

    key.truncate(size);
    key
}
