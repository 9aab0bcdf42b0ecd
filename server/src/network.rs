//! Server network layer: TCP listener, accept loop and shutdown

use crate::connection::ConnectionTracker;
use crate::error::ServerError;
use crate::handler::ConnectionHandler;
use crate::observer::{LoggingObserver, MessageObserver};
use crate::registry::PlayerRegistry;
use log::{error, info};
use shared::{QuestionRecord, MAX_MESSAGE_LEN};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};

/// Shared state the accept loop hands to every handler it spawns
struct HandlerContext {
    registry: Arc<PlayerRegistry>,
    connections: Arc<ConnectionTracker>,
    observer: Arc<dyn MessageObserver>,
    max_message_len: usize,
}

impl HandlerContext {
    async fn spawn_handler(&self, stream: TcpStream, peer: SocketAddr, handlers: &mut JoinSet<()>) {
        let (connection, close_signal) = self.connections.register(peer).await;
        let handler = ConnectionHandler::new(
            stream,
            connection.clone(),
            close_signal,
            Arc::clone(&self.registry),
            Arc::clone(&self.observer),
            self.max_message_len,
        );

        let connections = Arc::clone(&self.connections);
        handlers.spawn(async move {
            handler.run().await;
            connections.release(&connection).await;
        });
    }
}

/// Quiz server front end
///
/// Owns the player registry and the set of live connections. Every accepted
/// connection gets its own task with no admission limit.
pub struct Server {
    addr: String,
    registry: Arc<PlayerRegistry>,
    connections: Arc<ConnectionTracker>,
    observer: Arc<dyn MessageObserver>,
    questions: Arc<[QuestionRecord]>,
    max_message_len: usize,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: Option<JoinHandle<JoinSet<()>>>,
    local_addr: Option<SocketAddr>,
}

impl Server {
    pub fn new(addr: impl Into<String>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            addr: addr.into(),
            registry: Arc::new(PlayerRegistry::new()),
            connections: Arc::new(ConnectionTracker::new()),
            observer: Arc::new(LoggingObserver),
            questions: Arc::from(Vec::new()),
            max_message_len: MAX_MESSAGE_LEN,
            shutdown_tx,
            accept_task: None,
            local_addr: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<PlayerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Installs the observer that receives messages from joined players
    pub fn with_observer(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Attaches the quiz loaded at startup. Read-only from here on.
    pub fn with_questions(mut self, questions: Vec<QuestionRecord>) -> Self {
        self.questions = Arc::from(questions);
        self
    }

    /// Loads the quiz file at `path`, mirroring `with_questions`
    pub fn load_question_file(self, path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let questions = shared::load_questions(path)?;
        info!("Loaded {} questions from {}", questions.len(), path.display());
        Ok(self.with_questions(questions))
    }

    pub fn with_max_message_len(mut self, max_message_len: usize) -> Self {
        self.max_message_len = max_message_len;
        self
    }

    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    /// Address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.accept_task.is_some()
    }

    /// Number of open connections, joined or not
    pub async fn connection_count(&self) -> usize {
        self.connections.len().await
    }

    /// Binds the listening socket and starts accepting in the background
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.accept_task.is_some() {
            return Err(ServerError::AlreadyRunning);
        }

        let bind_error = |source| ServerError::Bind {
            addr: self.addr.clone(),
            source,
        };
        let listener = TcpListener::bind(&self.addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;
        info!("Server listening on {}", local_addr);

        let context = HandlerContext {
            registry: Arc::clone(&self.registry),
            connections: Arc::clone(&self.connections),
            observer: Arc::clone(&self.observer),
            max_message_len: self.max_message_len,
        };
        let shutdown_rx = self.shutdown_tx.subscribe();

        self.accept_task = Some(tokio::spawn(accept_loop(listener, context, shutdown_rx)));
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Stops accepting, closes every live connection and waits for their
    /// handlers to finish cleanup. Does nothing if the server is not running.
    pub async fn stop(&mut self) {
        let Some(accept_task) = self.accept_task.take() else {
            return;
        };

        // Ignored: the receiver is gone only if the accept loop already exited.
        let _ = self.shutdown_tx.send(());
        let mut handlers = match accept_task.await {
            Ok(handlers) => handlers,
            Err(e) => {
                error!("Accept loop panicked: {}", e);
                JoinSet::new()
            }
        };

        let closed = self.connections.close_all().await;
        let players = self.registry.snapshot().await;
        for connection in &players {
            connection.close();
        }

        while let Some(result) = handlers.join_next().await {
            if let Err(e) = result {
                error!("Connection handler panicked: {}", e);
            }
        }

        self.local_addr = None;
        info!(
            "Server stopped ({} connections closed, {} of them joined)",
            closed,
            players.len()
        );
    }
}

/// Accepts until shutdown is signalled, then hands back the live handlers
///
/// The listener is dropped on return, so the socket is closed before
/// `Server::stop` starts closing connections.
async fn accept_loop(
    listener: TcpListener,
    context: HandlerContext,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinSet<()> {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    info!("New connection from {}", peer);
                    context.spawn_handler(stream, peer, &mut handlers).await;
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },

            // Reap finished handlers so the set only holds live connections.
            Some(result) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = result {
                    error!("Connection handler panicked: {}", e);
                }
            },

            signal = shutdown_rx.recv() => {
                info!("Listener on {:?} shutting down", listener.local_addr().ok());
                if signal.is_err() {
                    // The server was dropped without `stop`. Dropping the set
                    // would abort live handlers before they leave the registry.
                    tokio::spawn(async move { while handlers.join_next().await.is_some() {} });
                    return JoinSet::new();
                }
                break;
            }
        }
    }

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::parse_questions;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::timeout;
    use tokio_test::{assert_err, assert_ok};

    async fn start_server() -> (Server, SocketAddr) {
        let mut server = Server::new("127.0.0.1:0");
        let addr = server.start().await.unwrap();
        (server, addr)
    }

    async fn join(addr: SocketAddr, name: &str) -> (BufReader<TcpStream>, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("JOIN|{name}\n").as_bytes())
            .await
            .unwrap();

        let mut reader = BufReader::new(stream);
        let mut reply = String::new();
        timeout(Duration::from_secs(2), reader.read_line(&mut reply))
            .await
            .unwrap()
            .unwrap();
        (reader, reply)
    }

    async fn read_eof(reader: &mut BufReader<TcpStream>) {
        let mut line = String::new();
        let read = timeout(Duration::from_secs(2), reader.read_line(&mut line))
            .await
            .expect("connection should be closed");
        assert_eq!(read.unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn test_start_reports_bound_address() {
        let (mut server, addr) = start_server().await;
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));
        assert!(server.is_running());

        server.stop().await;
        assert!(!server.is_running());
        assert_eq!(server.local_addr(), None);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (mut server, _) = start_server().await;
        assert!(matches!(
            server.start().await,
            Err(ServerError::AlreadyRunning)
        ));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_bind_error_when_address_in_use() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap();

        let mut server = Server::new(addr.to_string());
        match server.start().await {
            Err(ServerError::Bind { addr: reported, .. }) => assert_eq!(reported, addr.to_string()),
            other => panic!("expected bind error, got {other:?}"),
        }
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_bind_error_for_bad_address() {
        let mut server = Server::new("not-an-address");
        assert_err!(server.start().await);
    }

    #[tokio::test]
    async fn test_join_through_server() {
        let (mut server, addr) = start_server().await;

        let (_alice, reply) = join(addr, "Alice").await;
        assert_eq!(reply, "JOIN_OK|Welcome, Alice\n");
        assert!(server.registry().contains("Alice").await);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_stop_closes_all_connections() {
        let (mut server, addr) = start_server().await;

        let (mut alice, _) = join(addr, "Alice").await;
        let mut idle = BufReader::new(TcpStream::connect(addr).await.unwrap());

        // Give the accept loop a moment to pick up the idle connection.
        for _ in 0..100 {
            if server.connection_count().await == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(server.connection_count().await, 2);

        server.stop().await;

        read_eof(&mut alice).await;
        read_eof(&mut idle).await;
        assert!(server.registry().is_empty().await);
        assert_eq!(server.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_accepts_after_stop() {
        let (mut server, addr) = start_server().await;
        server.stop().await;

        assert_err!(TcpStream::connect(addr).await);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut server = Server::new("127.0.0.1:0");
        server.stop().await;
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let (mut server, _) = start_server().await;
        server.stop().await;

        let addr = assert_ok!(server.start().await);
        let (_bob, reply) = join(addr, "Bob").await;
        assert_eq!(reply, "JOIN_OK|Welcome, Bob\n");
        server.stop().await;
    }

    #[tokio::test]
    async fn test_questions_are_kept() {
        let questions = parse_questions("Q?\nA - 1\nB - 2\nC - 3\nAnswer: C\n").unwrap();
        let server = Server::new("127.0.0.1:0").with_questions(questions.clone());
        assert_eq!(server.questions(), questions.as_slice());
    }

    #[test]
    fn test_load_question_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quiz.txt");
        std::fs::write(&path, "Q?\nA - 1\nB - 2\n").unwrap();

        let result = Server::new("127.0.0.1:0").load_question_file(&path);
        assert!(matches!(result, Err(ServerError::Questions(_))));

        std::fs::write(&path, "Q?\nA - 1\nB - 2\nC - 3\nAnswer: A\n").unwrap();
        let server = Server::new("127.0.0.1:0").load_question_file(&path).unwrap();
        assert_eq!(server.questions().len(), 1);
    }

    #[tokio::test]
    async fn test_independent_registries() {
        let shared_registry = Arc::new(PlayerRegistry::new());
        let mut first = Server::new("127.0.0.1:0").with_registry(Arc::clone(&shared_registry));
        let mut second = Server::new("127.0.0.1:0");
        let first_addr = first.start().await.unwrap();
        let second_addr = second.start().await.unwrap();

        let (_a, reply_a) = join(first_addr, "Alice").await;
        let (_b, reply_b) = join(second_addr, "Alice").await;
        assert_eq!(reply_a, "JOIN_OK|Welcome, Alice\n");
        assert_eq!(reply_b, "JOIN_OK|Welcome, Alice\n");
        assert!(shared_registry.contains("Alice").await);

        first.stop().await;
        second.stop().await;
    }
}
