#![allow(clippy::unwrap_used)]

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_std::net::TcpStream;
use futures::io::BufReader;
use rstest::rstest;

use hawser::{
    algorithm::HostKey,
    client::{Algorithms, Client},
    session::Hooks,
    Error, Session,
};
use hawser_packet::trans::{DisconnectReason, ServiceAccept, ServiceRequest};

mod common;

fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

fn client() -> Client {
    Client {
        algorithms: Algorithms {
            kexs: vec!["curve25519-sha256".parse().unwrap()],
            ciphers: vec!["none".parse().unwrap()],
            macs: vec!["hmac-sha2-256".parse().unwrap(), "none".parse().unwrap()],
            ..Default::default()
        },
        ..Default::default()
    }
}

#[rstest]
#[case(false)]
#[case(true)]
#[async_std::test]
async fn it_completes_the_handshake(#[case] strict: bool) {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::accept(&listener).await;
        peer.handshake(&common::Options {
            strict,
            mac: true,
            ..Default::default()
        })
        .await;

        peer
    });

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(), ()).await.unwrap();

    session.handshake().await.unwrap();
    assert!(session.session_id().is_some());

    handle.await;
}

#[async_std::test]
async fn it_discards_banner_lines_before_the_identification() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::accept(&listener).await;
        peer.handshake(&common::Options {
            banner: vec!["Hello"],
            mac: true,
            ..Default::default()
        })
        .await;
    });

    struct Banners(Arc<std::sync::Mutex<Vec<String>>>);

    impl Hooks for Banners {
        fn on_banner(&mut self, message: &str) {
            self.0.lock().unwrap().push(message.to_owned());
        }
    }

    let lines = Arc::new(std::sync::Mutex::new(Vec::new()));

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(), Banners(lines.clone()))
        .await
        .unwrap();

    assert_eq!(session.peer_id().softwareversion, "scripted_peer");
    assert_eq!(*lines.lock().unwrap(), ["Hello"]);

    session.handshake().await.unwrap();

    handle.await;
}

#[async_std::test]
async fn it_enforces_kexinit_first_under_strict_kex() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::accept(&listener).await;

        // An `IGNORE` injected before the `KEXINIT` must abort the
        // exchange when the strict extension is advertised.
        let id = hawser_packet::Id::v2("scripted_peer", None::<&str>);
        id.to_writer(&mut peer.stream).await.unwrap();
        futures::AsyncWriteExt::flush(&mut peer.stream).await.unwrap();
        hawser_packet::Id::from_reader(&mut peer.stream).await.unwrap();

        peer.send(&hawser_packet::trans::Ignore::default()).await;
        peer.send(&hawser_packet::trans::KexInit {
            cookie: [0x42; 16],
            kex_algorithms: ["curve25519-sha256", "kex-strict-s-v00@openssh.com"]
                .into_iter()
                .collect(),
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
        })
        .await;

        // The client got to send its own `KEXINIT` before noticing,
        // then reacts with a protocol-error disconnect.
        let _: hawser_packet::trans::KexInit = peer.recv_as().await;
        let disconnect: hawser_packet::trans::Disconnect = peer.recv_as().await;
        assert_eq!(disconnect.reason, DisconnectReason::ProtocolError);
    });

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(), ()).await.unwrap();

    assert!(matches!(
        session.handshake().await,
        Err(Error::StrictKexViolation)
    ));

    handle.await;
}

#[async_std::test]
async fn it_resets_sequence_numbers_after_newkeys_under_strict_kex() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::accept(&listener).await;
        peer.handshake(&common::Options {
            strict: true,
            mac: true,
            ..Default::default()
        })
        .await;

        // Both sides restarted at sequence 0; the MACs only verify if
        // the client reset its counters too.
        assert_eq!(peer.rxseq, 0);
        let request: ServiceRequest = peer.recv_as().await;
        assert_eq!(request.service_name.as_str(), "ssh-userauth");

        peer.send(&ServiceAccept {
            service_name: request.service_name,
        })
        .await;
    });

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(), ()).await.unwrap();

    hawser::service::request(&mut session, "ssh-userauth")
        .await
        .unwrap();

    handle.await;
}

#[async_std::test]
async fn it_aborts_when_the_host_key_is_vetoed() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::accept(&listener).await;

        // The exchange stops after the reply, on the client's veto.
        peer.handshake_expect_failure().await;
    });

    struct Veto(Arc<AtomicBool>);

    impl Hooks for Veto {
        fn on_host_key(&mut self, _key: &HostKey) -> bool {
            self.0.store(true, Ordering::SeqCst);

            false
        }
    }

    let asked = Arc::new(AtomicBool::new(false));

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(), Veto(asked.clone()))
        .await
        .unwrap();

    assert!(matches!(
        session.handshake().await,
        Err(Error::HostKeyRejected)
    ));
    assert!(asked.load(Ordering::SeqCst));

    handle.await;
}

#[async_std::test]
async fn it_keeps_the_session_id_across_rekeys() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::accept(&listener).await;
        let options = common::Options {
            mac: true,
            ..Default::default()
        };

        peer.handshake(&options).await;
        let first = peer.session_id.clone().unwrap();

        // Initiate a re-key from the server side.
        peer.rekey(&options).await;
        let second = peer.session_id.clone().unwrap();

        assert_eq!(first, second);

        let request: ServiceRequest = peer.recv_as().await;
        peer.send(&ServiceAccept {
            service_name: request.service_name,
        })
        .await;
    });

    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let mut session = Session::new(stream, client(), ()).await.unwrap();

    session.handshake().await.unwrap();
    let first = session.session_id().unwrap().to_vec();

    hawser::service::request(&mut session, "ssh-userauth")
        .await
        .unwrap();

    assert_eq!(session.session_id().unwrap(), first);

    handle.await;
}
