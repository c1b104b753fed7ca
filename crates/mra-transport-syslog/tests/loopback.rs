//! 回环端到端测试：在本机监听 TCP/UDP，经 [`SyslogConnector`] 写出若干行并在对端校验。

use std::time::Duration;

use mra_core::{Classified, DeliveryTarget, TransportProtocol};
use mra_transport_syslog::{LineConnector, SyslogConnector};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};

fn target(port: u16, protocol: TransportProtocol) -> DeliveryTarget {
    DeliveryTarget {
        host: "127.0.0.1".into(),
        port,
        protocol,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_channel_frames_lines_with_newlines() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();

    let reader = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut received = String::new();
        socket
            .read_to_string(&mut received)
            .await
            .expect("read until close");
        received
    });

    let connector = SyslogConnector::new(target(port, TransportProtocol::Tcp));
    let mut sink = connector
        .open("MRAv2SyslogClient-test".into())
        .await
        .expect("connect");
    assert_eq!(sink.client_name(), "MRAv2SyslogClient-test");
    sink.send_line("first line").await.expect("write first");
    sink.send_line("second line").await.expect("write second");
    sink.close().await.expect("close");

    let received = reader.await.expect("reader task");
    assert_eq!(received, "first line\nsecond line\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn udp_channel_sends_one_datagram_per_line() {
    let server = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    let port = server.local_addr().expect("addr").port();

    let connector = SyslogConnector::new(target(port, TransportProtocol::Udp));
    let mut sink = connector.open("udp-client".into()).await.expect("connect");
    sink.send_line("alpha").await.expect("send alpha");
    sink.send_line("beta").await.expect("send beta");
    sink.close().await.expect("close");

    let mut buf = [0u8; 256];
    let n = server.recv(&mut buf).await.expect("recv alpha");
    assert_eq!(&buf[..n], b"alpha");
    let n = server.recv(&mut buf).await.expect("recv beta");
    assert_eq!(&buf[..n], b"beta");
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connection_is_transient() {
    // 绑定后立即释放，得到一个大概率无人监听的端口。
    let port = {
        let reserved = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        reserved.local_addr().expect("addr").port()
    };
    let connector = SyslogConnector::new(target(port, TransportProtocol::Tcp))
        .with_timeouts(Duration::from_secs(2), Duration::from_secs(2));
    let error = match connector.open("refused".into()).await {
        Ok(_) => panic!("connect should fail"),
        Err(error) => error,
    };
    assert!(error.is_transient(), "{error}");
    assert!(error.code().starts_with("mra.transport.syslog."));
}

#[test]
fn describe_renders_protocol_host_and_port() {
    let connector = SyslogConnector::new(target(514, TransportProtocol::Udp));
    assert_eq!(connector.describe(), "udp://127.0.0.1:514");
}
