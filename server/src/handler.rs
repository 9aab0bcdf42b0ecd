//! Per-connection protocol state machine
//!
//! Each accepted connection gets its own [`ConnectionHandler`], which walks
//! the connection through three states:
//!
//! - `AwaitingJoin`: read one line, validate `JOIN|<name>`, claim the name in
//!   the registry and reply with `JOIN_OK` or `JOIN_ERROR`
//! - `Joined`: read lines until the peer goes away, handing each one to the
//!   installed [`MessageObserver`]
//! - `Disconnected`: terminal; give the name back if this connection owns it
//!   and release the socket
//!
//! Read failures of any kind (peer close, reset, invalid UTF-8, an oversized
//! line, or a close request from the listener) all lead to `Disconnected`.
//! They never propagate past the handler.

use crate::connection::{CloseSignal, ConnectionHandle};
use crate::observer::MessageObserver;
use crate::registry::PlayerRegistry;
use log::{debug, info, warn};
use shared::{parse_join, JoinError, ServerMessage};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingJoin,
    Joined,
    Disconnected,
}

/// Result of waiting for the next line from the peer
enum Inbound {
    Message(String),
    Closed,
}

pub struct ConnectionHandler {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    connection: ConnectionHandle,
    close_signal: CloseSignal,
    registry: Arc<PlayerRegistry>,
    observer: Arc<dyn MessageObserver>,
    max_message_len: usize,
    name: Option<String>,
    state: State,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        connection: ConnectionHandle,
        close_signal: CloseSignal,
        registry: Arc<PlayerRegistry>,
        observer: Arc<dyn MessageObserver>,
        max_message_len: usize,
    ) -> Self {
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
            connection,
            close_signal,
            registry,
            observer,
            max_message_len,
            name: None,
            state: State::AwaitingJoin,
        }
    }

    /// Drives the connection to completion
    ///
    /// Returns the name the connection joined under, if the handshake
    /// succeeded. Cleanup runs exactly once, after the state machine reaches
    /// `Disconnected`.
    pub async fn run(mut self) -> Option<String> {
        loop {
            self.state = match self.state {
                State::AwaitingJoin => self.await_join().await,
                State::Joined => self.serve_joined().await,
                State::Disconnected => break,
            };
        }

        self.disconnect().await;
        self.name
    }

    async fn await_join(&mut self) -> State {
        let line = match self.read_message().await {
            Inbound::Message(line) => line,
            Inbound::Closed => return State::Disconnected,
        };

        let name = match parse_join(&line) {
            Ok(name) => name,
            Err(reason) => {
                warn!(
                    "Invalid join message from {}: {:?}",
                    self.connection.peer(),
                    line
                );
                return self.reject(reason).await;
            }
        };

        if let Err(reason) = self.registry.join(&name, &self.connection).await {
            warn!(
                "Rejected duplicate name '{}' from {}",
                name,
                self.connection.peer()
            );
            return self.reject(reason).await;
        }

        // Set before replying so a failed write still releases the name.
        self.name = Some(name.clone());
        match self.send(&ServerMessage::JoinAccepted { name }).await {
            Ok(()) => State::Joined,
            Err(e) => {
                debug!("Failed to send welcome on {}: {}", self.connection.id(), e);
                State::Disconnected
            }
        }
    }

    async fn reject(&mut self, reason: JoinError) -> State {
        if let Err(e) = self.send(&ServerMessage::JoinRejected(reason)).await {
            debug!("Failed to send rejection on {}: {}", self.connection.id(), e);
        }
        State::Disconnected
    }

    async fn serve_joined(&mut self) -> State {
        let Some(name) = self.name.clone() else {
            return State::Disconnected;
        };

        loop {
            match self.read_message().await {
                Inbound::Message(message) if message.is_empty() => continue,
                Inbound::Message(message) => self.observer.on_message(&name, &message),
                Inbound::Closed => return State::Disconnected,
            }
        }
    }

    async fn disconnect(&mut self) {
        if let Some(name) = &self.name {
            self.registry.leave(name, &self.connection).await;
            info!("Player '{}' disconnected", name);
        } else {
            debug!(
                "Connection {} from {} closed before joining",
                self.connection.id(),
                self.connection.peer()
            );
        }

        if let Err(e) = self.writer.shutdown().await {
            debug!("Shutdown of {} failed: {}", self.connection.id(), e);
        }
    }

    async fn send(&mut self, message: &ServerMessage) -> std::io::Result<()> {
        self.writer.write_all(message.encode().as_bytes()).await
    }

    /// Reads one newline-terminated line, trimmed
    ///
    /// A final line without terminator is still returned if the peer closes
    /// right after it. The length limit applies to the message body; the
    /// `\n` or `\r\n` terminator does not count against it.
    async fn read_message(&mut self) -> Inbound {
        let mut line = String::new();
        let limit = self.max_message_len as u64 + 2;
        let mut limited = (&mut self.reader).take(limit);
        let read = limited.read_line(&mut line);

        tokio::select! {
            result = read => match result {
                Ok(0) => Inbound::Closed,
                Ok(_) if body_len(&line) > self.max_message_len => {
                    warn!(
                        "Message from {} exceeds {} bytes, dropping connection",
                        self.connection.peer(),
                        self.max_message_len
                    );
                    Inbound::Closed
                }
                Ok(_) => Inbound::Message(line.trim().to_string()),
                Err(e) => {
                    debug!("Read on {} failed: {}", self.connection.id(), e);
                    Inbound::Closed
                }
            },
            _ = self.close_signal.closed() => {
                debug!("Connection {} closed by server", self.connection.id());
                Inbound::Closed
            }
        }
    }
}

/// Length of `line` without its line terminator
fn body_len(line: &str) -> usize {
    let body = line.strip_suffix('\n').unwrap_or(line);
    body.strip_suffix('\r').unwrap_or(body).len()
}
