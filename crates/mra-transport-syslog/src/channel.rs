use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use socket2::SockRef;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::{TcpStream, UdpSocket};

use crate::error::{CONFIGURE, CONNECT, SHUTDOWN, TransportError, WRITE, map_io_error};
use crate::util::run_with_timeout;

const NEWLINE: &[u8] = b"\n";
const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// 单批次使用的一条出站行通道。
///
/// # 契约 (What)
/// - `send_line`：写出一行文本（不含换行，由实现负责分帧）；
/// - `close`：刷新缓冲并关闭写方向；返回 `Ok` 即表示全部行已交给下游；
/// - `client_name`：诊断用标识，包含唯一令牌，便于在下游区分不同批次的连接。
#[async_trait]
pub trait LineSink: Send {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    async fn close(self: Box<Self>) -> Result<(), TransportError>;

    fn client_name(&self) -> &str;
}

/// 基于 TCP 的 syslog 行通道，每行以 `\n` 结尾。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// - 建连后通过 `socket2::SockRef` 打开 TCP keepalive 并关闭 Nagle，写入经 `BufWriter`
///   聚合；
/// - 每次 IO 都包裹在写超时内，超时映射为可重试错误；
/// - `close` 先 `flush` 再半关闭写方向，确保对端读到完整的最后一行。
///
/// ## 注意事项 (Trade-offs)
/// - 连接按批次新建、用完即弃，不做复用：长时间空闲后的陈旧连接不会被拿来投递。
#[derive(Debug)]
pub struct TcpLineChannel {
    writer: BufWriter<TcpStream>,
    name: String,
    peer: SocketAddr,
    write_timeout: Duration,
}

impl TcpLineChannel {
    pub async fn connect(
        name: String,
        addr: SocketAddr,
        connect_timeout: Duration,
        write_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let stream = run_with_timeout(CONNECT, connect_timeout, TcpStream::connect(addr)).await?;
        configure(&stream)?;
        let peer = stream
            .peer_addr()
            .map_err(|err| map_io_error(CONNECT, err))?;
        Ok(Self {
            writer: BufWriter::new(stream),
            name,
            peer,
            write_timeout,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

fn configure(stream: &TcpStream) -> Result<(), TransportError> {
    stream
        .set_nodelay(true)
        .map_err(|err| map_io_error(CONFIGURE, err))?;
    let keepalive = socket2::TcpKeepalive::new().with_time(TCP_KEEPALIVE);
    SockRef::from(stream)
        .set_tcp_keepalive(&keepalive)
        .map_err(|err| map_io_error(CONFIGURE, err))
}

#[async_trait]
impl LineSink for TcpLineChannel {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let timeout = self.write_timeout;
        let writer = &mut self.writer;
        run_with_timeout(WRITE, timeout, async move {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(NEWLINE).await
        })
        .await
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        let mut this = self;
        let timeout = this.write_timeout;
        let writer = &mut this.writer;
        run_with_timeout(SHUTDOWN, timeout, async move {
            writer.flush().await?;
            writer.shutdown().await
        })
        .await
    }

    fn client_name(&self) -> &str {
        &self.name
    }
}

/// 基于 UDP 的 syslog 行通道，每行一个数据报。
#[derive(Debug)]
pub struct UdpLineChannel {
    socket: UdpSocket,
    name: String,
    write_timeout: Duration,
}

impl UdpLineChannel {
    pub async fn connect(
        name: String,
        addr: SocketAddr,
        write_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let bind_addr: SocketAddr = if addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|err| map_io_error(CONNECT, err))?;
        socket
            .connect(addr)
            .await
            .map_err(|err| map_io_error(CONNECT, err))?;
        Ok(Self {
            socket,
            name,
            write_timeout,
        })
    }
}

#[async_trait]
impl LineSink for UdpLineChannel {
    async fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        run_with_timeout(WRITE, self.write_timeout, self.socket.send(line.as_bytes()))
            .await
            .map(|_| ())
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        Ok(())
    }

    fn client_name(&self) -> &str {
        &self.name
    }
}
