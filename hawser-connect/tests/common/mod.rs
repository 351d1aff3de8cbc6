//! A scripted server half of the wire, implementing just enough of the
//! server role over a loopback socket to exercise the connect layer.
//!
//! Algorithms are pinned to `none` encryption and no MAC so the channel
//! traffic stays directly scriptable.

#![allow(clippy::unwrap_used, dead_code)]

use std::net::SocketAddr;

use async_std::net::{TcpListener, TcpStream};
use futures::{io::BufReader, AsyncWriteExt};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};

use hawser_packet::{
    arch::MpInt,
    binrw::{meta::ReadEndian, meta::WriteEndian, BinRead, BinWrite},
    kex,
    trans::{KexEcdhInit, KexEcdhReply, KexInit, NewKeys, ServiceAccept, ServiceRequest},
    CipherCore, Id, IntoPacket, Mac, OpeningCipher, Packet, SealingCipher,
};

/// A cipher-less, mac-less transport configuration.
#[derive(Debug, Default)]
pub struct Clear;

impl Mac for Clear {
    fn size(&self) -> usize {
        0
    }

    fn etm(&self) -> bool {
        false
    }
}

impl CipherCore for Clear {
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

impl OpeningCipher for Clear {
    fn reveal(&mut self, buf: &mut [u8], _seq: u32) -> Result<u32, Self::Err> {
        Ok(u32::from_be_bytes(buf[..4].try_into().unwrap()))
    }

    fn open(&mut self, _buf: &mut [u8], _tag: Vec<u8>, _seq: u32) -> Result<(), Self::Err> {
        Ok(())
    }

    fn decompress(&mut self, buf: Vec<u8>) -> Result<Vec<u8>, Self::Err> {
        Ok(buf)
    }
}

impl SealingCipher for Clear {
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

    fn seal(&mut self, _buf: &mut [u8], _seq: u32) -> Result<Vec<u8>, Self::Err> {
        Ok(Vec::new())
    }
}

/// The scripted peer: accepts one connection, drives a curve25519
/// exchange and the `ssh-connection` service acceptance.
pub struct Peer {
    pub stream: BufReader<TcpStream>,
    pub seq: (u32, u32),

    key: ssh_key::PrivateKey,
}

pub async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    (listener, addr)
}

impl Peer {
    /// Accept a connection and bring the session up to the point where
    /// channel traffic can flow.
    pub async fn establish(listener: &TcpListener) -> Self {
        let (stream, _) = listener.accept().await.unwrap();

        let mut peer = Self {
            stream: BufReader::new(stream),
            seq: (0, 0),
            key: ssh_key::PrivateKey::random(&mut rand::thread_rng(), ssh_key::Algorithm::Ed25519)
                .unwrap(),
        };

        let id = Id::v2("scripted_peer", None::<&str>);
        id.to_writer(&mut peer.stream).await.unwrap();
        peer.stream.flush().await.unwrap();

        let client_id = Id::from_reader(&mut peer.stream).await.unwrap().0;

        let kexinit = kexinit();
        peer.send(&kexinit).await;

        let client_kexinit: KexInit = peer.recv_as().await;
        let ecdh_init: KexEcdhInit = peer.recv_as().await;

        let e_s = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
        let q_s = x25519_dalek::PublicKey::from(&e_s);
        let q_c =
            x25519_dalek::PublicKey::from(<[u8; 32]>::try_from(ecdh_init.q_c.as_ref()).unwrap());

        let shared = e_s.diffie_hellman(&q_c);
        let secret = MpInt::positive(shared.as_bytes()).into_vec();

        let k_s = peer.key.public_key().to_bytes().unwrap();

        let hash = kex::Ecdh {
            v_c: client_id.to_string().into_bytes().into(),
            v_s: id.to_string().into_bytes().into(),
            i_c: (&client_kexinit).into(),
            i_s: (&kexinit).into(),
            k_s: k_s.as_slice().into(),
            q_c: ecdh_init.q_c.as_borrow(),
            q_s: q_s.as_ref().into(),
            k: MpInt::positive(secret.as_slice()),
        }
        .hash::<Sha256>();

        let signature: ssh_key::Signature = Signer::sign(&peer.key, &hash);

        peer.send(&KexEcdhReply {
            k_s: k_s.as_slice().into(),
            q_s: q_s.as_ref().into(),
            signature: signature.to_vec().as_slice().into(),
        })
        .await;

        peer.send(&NewKeys).await;
        peer.recv_as::<NewKeys>().await;

        let request: ServiceRequest = peer.recv_as().await;
        assert_eq!(request.service_name.as_str(), "ssh-connection");

        peer.send(&ServiceAccept {
            service_name: request.service_name,
        })
        .await;

        peer
    }

    pub async fn send<T>(&mut self, message: &T)
    where
        T: for<'a> BinWrite<Args<'a> = ()> + WriteEndian,
    {
        let packet = message.into_packet();
        packet
            .to_writer(&mut self.stream, &mut Clear, self.seq.0)
            .await
            .unwrap();
        self.stream.flush().await.unwrap();

        self.seq.0 = self.seq.0.wrapping_add(1);
    }

    pub async fn recv(&mut self) -> Packet {
        let packet = Packet::from_reader(&mut self.stream, &mut Clear, self.seq.1)
            .await
            .unwrap();

        self.seq.1 = self.seq.1.wrapping_add(1);

        packet
    }

    pub async fn recv_as<T>(&mut self) -> T
    where
        T: for<'a> BinRead<Args<'a> = ()> + ReadEndian,
    {
        self.recv().await.to().unwrap()
    }
}

fn kexinit() -> KexInit<'static> {
    KexInit {
        cookie: [0x42; 16],
        kex_algorithms: ["curve25519-sha256"].into_iter().collect(),
        server_host_key_algorithms: ["ssh-ed25519"].into_iter().collect(),
        encryption_algorithms_client_to_server: ["none"].into_iter().collect(),
        encryption_algorithms_server_to_client: ["none"].into_iter().collect(),
        mac_algorithms_client_to_server: ["none"].into_iter().collect(),
        mac_algorithms_server_to_client: ["none"].into_iter().collect(),
        compression_algorithms_client_to_server: ["none"].into_iter().collect(),
        compression_algorithms_server_to_client: ["none"].into_iter().collect(),
        languages_client_to_server: Default::default(),
        languages_server_to_client: Default::default(),
        first_kex_packet_follows: false.into(),
    }
}

/// The client-side configuration matching the scripted peer.
pub fn client() -> hawser::Client {
    hawser::Client {
        algorithms: hawser::client::Algorithms {
            kexs: vec!["curve25519-sha256".parse().unwrap()],
            ciphers: vec!["none".parse().unwrap()],
            macs: vec!["none".parse().unwrap()],
            ..Default::default()
        },
        ..Default::default()
    }
}
