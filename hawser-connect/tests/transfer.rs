#![allow(clippy::unwrap_used)]

use async_std::net::TcpStream;
use futures::{io::BufReader, AsyncReadExt, AsyncWriteExt};

use hawser::Session;
use hawser_connect::Error;
use hawser_packet::connect;

mod common;

fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();
}

async fn establish(
    addr: std::net::SocketAddr,
) -> hawser_connect::Connect<BufReader<TcpStream>> {
    let stream = BufReader::new(TcpStream::connect(addr).await.unwrap());
    let session = Session::new(stream, common::client(), ()).await.unwrap();

    hawser_connect::connect(session).await.unwrap()
}

#[async_std::test]
async fn it_fragments_writes_and_blocks_on_the_window() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::establish(&listener).await;

        let open: connect::ChannelOpen = peer.recv_as().await;
        peer.send(&connect::ChannelOpenConfirmation {
            recipient_channel: open.sender_channel,
            sender_channel: 7,
            initial_window_size: 16,
            maximum_packet_size: 10,
        })
        .await;

        // The 25-byte write leaves as a max-packet block and the
        // remainder of the window.
        let first: connect::ChannelData = peer.recv_as().await;
        assert_eq!(first.data.len(), 10);
        let second: connect::ChannelData = peer.recv_as().await;
        assert_eq!(second.data.len(), 6);

        // Granting 9 more bytes unblocks exactly 9 of them.
        peer.send(&connect::ChannelWindowAdjust {
            recipient_channel: open.sender_channel,
            bytes_to_add: 9,
        })
        .await;

        let third: connect::ChannelData = peer.recv_as().await;
        assert_eq!(third.data.len(), 9);
    });

    let connect = establish(addr).await;
    let channel = connect.open_session().await.unwrap();

    let mut writer = channel.as_writer();

    assert_eq!(writer.write(&[0x61; 25]).await.unwrap(), 10);
    writer.flush().await.unwrap();

    assert_eq!(writer.write(&[0x61; 15]).await.unwrap(), 6);
    writer.flush().await.unwrap();

    // The window is dry: this write parks until the peer's adjust.
    assert_eq!(writer.write(&[0x61; 9]).await.unwrap(), 9);
    writer.flush().await.unwrap();

    handle.await;
}

#[async_std::test]
async fn it_orders_data_eof_and_close() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::establish(&listener).await;

        let open: connect::ChannelOpen = peer.recv_as().await;
        peer.send(&connect::ChannelOpenConfirmation {
            recipient_channel: open.sender_channel,
            sender_channel: 7,
            initial_window_size: 1 << 20,
            maximum_packet_size: 0x8000,
        })
        .await;

        // The wire order is the last data block, then EOF, then CLOSE.
        let data: connect::ChannelData = peer.recv_as().await;
        assert_eq!(data.data.len(), 100);

        peer.recv_as::<connect::ChannelEof>().await;
        peer.recv_as::<connect::ChannelClose>().await;

        peer.send(&connect::ChannelClose {
            recipient_channel: open.sender_channel,
        })
        .await;
    });

    let connect = establish(addr).await;
    let channel = connect.open_session().await.unwrap();

    {
        let mut writer = channel.as_writer();
        writer.write_all(&[0x61; 100]).await.unwrap();
        writer.flush().await.unwrap();
    }

    // `close` resolves only once the peer's CLOSE crossed back.
    channel.close().await.unwrap();

    handle.await;
}

#[async_std::test]
async fn it_reads_until_eof() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::establish(&listener).await;

        let open: connect::ChannelOpen = peer.recv_as().await;
        peer.send(&connect::ChannelOpenConfirmation {
            recipient_channel: open.sender_channel,
            sender_channel: 7,
            initial_window_size: 1 << 20,
            maximum_packet_size: 0x8000,
        })
        .await;

        peer.send(&connect::ChannelData {
            recipient_channel: open.sender_channel,
            data: b"some output".as_slice().into(),
        })
        .await;
        peer.send(&connect::ChannelEof {
            recipient_channel: open.sender_channel,
        })
        .await;
    });

    let connect = establish(addr).await;
    let channel = connect.open_session().await.unwrap();

    let mut buffer = Vec::new();
    channel
        .as_reader()
        .read_to_end(&mut buffer)
        .await
        .unwrap();

    assert_eq!(buffer, b"some output");

    handle.await;
}

#[async_std::test]
async fn it_reports_channel_open_failures() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::establish(&listener).await;

        let open: connect::ChannelOpen = peer.recv_as().await;
        peer.send(&connect::ChannelOpenFailure {
            recipient_channel: open.sender_channel,
            reason: connect::ChannelOpenFailureReason::AdministrativelyProhibited,
            description: "not today".into(),
            language: Default::default(),
        })
        .await;
    });

    let connect = establish(addr).await;

    assert!(matches!(
        connect.open_session().await,
        Err(Error::ChannelOpenFailure {
            reason: connect::ChannelOpenFailureReason::AdministrativelyProhibited,
            ..
        })
    ));

    handle.await;
}

#[async_std::test]
async fn it_probes_liveness_with_keepalive() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::establish(&listener).await;

        let request: connect::GlobalRequest = peer.recv_as().await;
        assert!(*request.want_reply);
        assert!(matches!(
            request.context,
            connect::GlobalRequestContext::Keepalive
        ));

        peer.send(&connect::RequestSuccess).await;
    });

    let connect = establish(addr).await;
    connect.keepalive().await.unwrap();

    handle.await;
}

#[async_std::test]
async fn it_accepts_forwarded_channels() {
    init();

    let (listener, addr) = common::bind().await;
    let handle = async_std::task::spawn(async move {
        let mut peer = common::Peer::establish(&listener).await;

        peer.send(&connect::ChannelOpen {
            sender_channel: 3,
            initial_window_size: 1 << 20,
            maximum_packet_size: 0x8000,
            context: connect::ChannelOpenContext::ForwardedTcpip {
                address: "localhost".into(),
                port: 8080,
                originator_address: "10.0.0.1".into(),
                originator_port: 49152,
            },
        })
        .await;

        let confirmation: connect::ChannelOpenConfirmation = peer.recv_as().await;
        assert_eq!(confirmation.recipient_channel, 3);
    });

    let connect = establish(addr).await;

    use futures::TryStreamExt;

    let mut opens = Box::pin(connect.channel_opens().into_stream());
    let open = opens.try_next().await.unwrap().unwrap();

    assert!(matches!(
        open.cx(),
        connect::ChannelOpenContext::ForwardedTcpip { .. }
    ));

    let channel = open.accept().await.unwrap();
    assert_eq!(channel.remote_id(), 3);

    handle.await;
}
