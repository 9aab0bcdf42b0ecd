use crate::error::ClientError;
use log::{debug, info};
use shared::{ClientMessage, ServerMessage};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

pub struct QuizClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    server_addr: SocketAddr,
    name: Option<String>,
    /// Bytes of a reply line read so far; survives a cancelled `recv`
    pending: Vec<u8>,
}

impl QuizClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        let server_addr = stream.peer_addr()?;
        info!("Connected to {}", server_addr);

        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            server_addr,
            name: None,
            pending: Vec::new(),
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Name the server accepted, once joined
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Performs the join handshake and returns the name the server accepted
    pub async fn join(&mut self, name: &str) -> Result<String, ClientError> {
        self.send_raw(&ClientMessage::join(name).encode()).await?;

        match self.recv().await? {
            Some(ServerMessage::JoinAccepted { name }) => {
                info!("Joined as '{}'", name);
                self.name = Some(name.clone());
                Ok(name)
            }
            Some(ServerMessage::JoinRejected(reason)) => Err(ClientError::Rejected(reason)),
            None => Err(ClientError::ConnectionClosed),
        }
    }

    /// Sends one free-form line
    pub async fn send(&mut self, text: &str) -> Result<(), ClientError> {
        self.send_raw(&ClientMessage::Text(text.to_string()).encode())
            .await
    }

    /// Writes `data` exactly as given, without adding a terminator
    pub async fn send_raw(&mut self, data: &str) -> Result<(), ClientError> {
        self.writer.write_all(data.as_bytes()).await?;
        Ok(())
    }

    /// Waits for the next server message. Returns `None` once the server
    /// has closed the connection.
    ///
    /// Cancel safe: bytes of a partially received line are kept and the next
    /// call picks up where this one stopped, so `recv` can sit in a
    /// `tokio::select!` loop.
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        let read = self.reader.read_until(b'\n', &mut self.pending).await?;
        if read == 0 && self.pending.is_empty() {
            return Ok(None);
        }

        let bytes = std::mem::take(&mut self.pending);
        let line = String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        debug!("Received: {}", line.trim_end());
        ServerMessage::parse(&line)
            .map(Some)
            .map_err(|unknown| ClientError::UnexpectedResponse(unknown.0))
    }

    /// Closes the sending side and waits for the server to close its side
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.writer.shutdown().await?;

        let mut rest = String::new();
        while self.reader.read_line(&mut rest).await? > 0 {
            rest.clear();
        }
        info!("Disconnected");
        Ok(())
    }
}
