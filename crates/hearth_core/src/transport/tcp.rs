//! TCP transport carrying newline-delimited JSON [`Packet`] frames.
//!
//! Every accepted stream must send a `login` frame first. Logins are read in
//! a task per stream so a slow peer never holds up [`Listener::accept`].

use crate::error::NetworkError;
use crate::latch::CloseLatch;
use crate::network::{
    ClientData, Connection, GameData, IdentityData, Listener, ListenerSettings, Network, Packet,
};
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Time a peer has to send its login frame after connecting.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a peer has to answer the start-game frame.
pub const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted frame, newline included.
pub const MAX_FRAME_LEN: u64 = 1024 * 1024;

const BACKLOG: usize = 64;

/// Binds TCP listeners. Only the `"tcp"` transport is supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpNetwork;

#[async_trait]
impl Network for TcpNetwork {
    async fn listen(&self, settings: ListenerSettings) -> Result<Arc<dyn Listener>, NetworkError> {
        if settings.transport != "tcp" {
            return Err(NetworkError::UnsupportedTransport(settings.transport));
        }

        let listener = TcpListener::bind(&settings.address)
            .await
            .map_err(|source| NetworkError::Bind {
                address: settings.address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        debug!(
            "tcp listener for '{}' bound to {} (max players {})",
            settings.server_name, local_addr, settings.maximum_players
        );

        let (tx, rx) = mpsc::channel(BACKLOG);
        let latch = CloseLatch::new();
        tokio::spawn(accept_loop(listener, tx, latch.clone()));

        Ok(Arc::new(TcpListenerAdapter {
            local_addr,
            incoming: Mutex::new(rx),
            latch,
        }))
    }
}

async fn accept_loop(
    listener: TcpListener,
    backlog: mpsc::Sender<Arc<TcpConnection>>,
    latch: CloseLatch,
) {
    loop {
        let (stream, addr) = tokio::select! {
            _ = latch.closed() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("failed to accept tcp connection: {e}");
                    continue;
                }
            },
        };

        let backlog = backlog.clone();
        let latch = latch.clone();
        tokio::spawn(async move {
            let conn = match timeout(LOGIN_TIMEOUT, TcpConnection::login(stream, addr)).await {
                Ok(Ok(conn)) => Arc::new(conn),
                Ok(Err(e)) => {
                    debug!("connection {addr} failed login: {e}");
                    return;
                }
                Err(_) => {
                    debug!("connection {addr} timed out during login");
                    return;
                }
            };
            // Dropping the connection on close hangs up on the peer.
            tokio::select! {
                _ = latch.closed() => {}
                _ = backlog.send(conn) => {}
            }
        });
    }
    debug!("tcp accept loop stopped");
}

struct TcpListenerAdapter {
    local_addr: SocketAddr,
    incoming: Mutex<mpsc::Receiver<Arc<TcpConnection>>>,
    latch: CloseLatch,
}

#[async_trait]
impl Listener for TcpListenerAdapter {
    async fn accept(&self) -> Result<Arc<dyn Connection>, NetworkError> {
        if self.latch.is_closed() {
            return Err(NetworkError::Closed);
        }
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            biased;
            _ = self.latch.closed() => Err(NetworkError::Closed),
            conn = incoming.recv() => match conn {
                Some(conn) => Ok(conn as Arc<dyn Connection>),
                None => Err(NetworkError::Closed),
            },
        }
    }

    async fn close(&self) -> Result<(), NetworkError> {
        if self.latch.close() {
            Ok(())
        } else {
            Err(NetworkError::Closed)
        }
    }

    fn local_addr(&self) -> String {
        self.local_addr.to_string()
    }
}

async fn read_frame<R>(reader: &mut R) -> Result<Packet, NetworkError>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.take(MAX_FRAME_LEN).read_line(&mut line).await?;
    if read == 0 {
        return Err(NetworkError::Closed);
    }
    if !line.ends_with('\n') {
        if read as u64 >= MAX_FRAME_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large").into());
        }
        return Err(NetworkError::Closed);
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

async fn write_frame<W>(writer: &mut W, packet: &Packet) -> Result<(), NetworkError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut frame = serde_json::to_vec(packet)?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// A logged-in TCP peer.
pub struct TcpConnection {
    remote_addr: SocketAddr,
    identity: IdentityData,
    client: ClientData,
    reader: Mutex<BufReader<OwnedReadHalf>>,
    writer: Mutex<OwnedWriteHalf>,
    latch: CloseLatch,
}

impl TcpConnection {
    async fn login(stream: TcpStream, remote_addr: SocketAddr) -> Result<Self, NetworkError> {
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        let mut reader = BufReader::new(read);

        match read_frame(&mut reader).await? {
            Packet::Login { identity, client } => Ok(Self {
                remote_addr,
                identity,
                client,
                reader: Mutex::new(reader),
                writer: Mutex::new(write),
                latch: CloseLatch::new(),
            }),
            _ => Err(NetworkError::Negotiation(
                "expected login packet".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Connection for TcpConnection {
    fn remote_addr(&self) -> String {
        self.remote_addr.to_string()
    }

    fn identity_data(&self) -> &IdentityData {
        &self.identity
    }

    fn client_data(&self) -> &ClientData {
        &self.client
    }

    async fn start_game(&self, data: GameData) -> Result<(), NetworkError> {
        self.write_packet(Packet::StartGame(data)).await?;
        match timeout(NEGOTIATION_TIMEOUT, self.read_packet()).await {
            Ok(Ok(Packet::Ready)) => Ok(()),
            Ok(Ok(_)) => Err(NetworkError::Negotiation(
                "expected ready packet".to_string(),
            )),
            Ok(Err(e)) => Err(NetworkError::Negotiation(e.to_string())),
            Err(_) => Err(NetworkError::Negotiation(
                "timed out waiting for ready".to_string(),
            )),
        }
    }

    async fn read_packet(&self) -> Result<Packet, NetworkError> {
        if self.latch.is_closed() {
            return Err(NetworkError::Closed);
        }
        let mut reader = self.reader.lock().await;
        tokio::select! {
            biased;
            _ = self.latch.closed() => Err(NetworkError::Closed),
            packet = read_frame(&mut *reader) => packet,
        }
    }

    async fn write_packet(&self, packet: Packet) -> Result<(), NetworkError> {
        if self.latch.is_closed() {
            return Err(NetworkError::Closed);
        }
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &packet).await
    }

    async fn close(&self) -> Result<(), NetworkError> {
        if self.latch.close() {
            let mut writer = self.writer.lock().await;
            // The peer may have hung up first.
            let _ = writer.shutdown().await;
        }
        Ok(())
    }
}

/// Client side of the TCP transport, used by bots and tests.
pub struct TcpClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TcpClient {
    /// Connects to `address` and sends the login frame.
    pub async fn connect(
        address: &str,
        identity: IdentityData,
        client: ClientData,
    ) -> Result<Self, NetworkError> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        let (read, write) = stream.into_split();
        let mut client_conn = Self {
            reader: BufReader::new(read),
            writer: write,
        };
        client_conn
            .write_packet(&Packet::Login { identity, client })
            .await?;
        Ok(client_conn)
    }

    /// Waits for the game data and replies that the client is ready.
    pub async fn join(&mut self) -> Result<GameData, NetworkError> {
        match self.read_packet().await? {
            Packet::StartGame(data) => {
                self.write_packet(&Packet::Ready).await?;
                Ok(data)
            }
            _ => Err(NetworkError::Negotiation(
                "expected start game packet".to_string(),
            )),
        }
    }

    pub async fn read_packet(&mut self) -> Result<Packet, NetworkError> {
        read_frame(&mut self.reader).await
    }

    pub async fn write_packet(&mut self, packet: &Packet) -> Result<(), NetworkError> {
        write_frame(&mut self.writer, packet).await
    }
}
