//! # Quiz Server Library
//!
//! This library provides the network core of the multiplayer quiz game: a TCP
//! server that registers each client under a unique display name and keeps a
//! shared registry of active players.
//!
//! ## Core Responsibilities
//!
//! ### Join Handshake
//! The first line a client sends must be `JOIN|<name>`. The server answers
//! with `JOIN_OK|Welcome, <name>` or with `JOIN_ERROR|<reason>` and closes the
//! connection. Names are unique among connected players.
//!
//! ### Player Registry
//! The registry is the only shared mutable state. Joins are a single
//! check-then-insert and leaves only remove an entry still owned by the
//! leaving connection, so concurrent handlers always agree on who holds a name.
//!
//! ### Lifecycle
//! A player leaves the registry when its connection closes, for whatever
//! reason. Stopping the server closes the listening socket and every live
//! connection, which drives each handler through its cleanup.
//!
//! ## Architecture Design
//!
//! ### Task Per Connection
//! The accept loop spawns one tokio task per accepted connection, with no
//! admission limit. Registry locks are only held for the map operation
//! itself, never across a network read or write, so a stalled client cannot
//! block other handlers.
//!
//! ### Line Framing
//! Messages are newline-terminated UTF-8 lines (see the `shared` crate). A
//! line longer than the configured maximum drops the connection.
//!
//! ## Module Organization
//!
//! ### Connection Module (`connection`)
//! Connection identity and close signalling for shutdown.
//!
//! ### Handler Module (`handler`)
//! The per-connection state machine: `AwaitingJoin`, `Joined`, `Disconnected`.
//!
//! ### Network Module (`network`)
//! The [`Server`]: binding, the accept loop, and shutdown.
//!
//! ### Observer Module (`observer`)
//! Extension point for messages sent after joining.
//!
//! ### Registry Module (`registry`)
//! The [`PlayerRegistry`].
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("0.0.0.0:5000").load_question_file("quiz_qa.txt")?;
//!     let addr = server.start().await?;
//!     println!("Listening on {addr}");
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod handler;
pub mod network;
pub mod observer;
pub mod registry;

pub use connection::{ConnectionHandle, ConnectionId};
pub use error::ServerError;
pub use network::Server;
pub use observer::{LoggingObserver, MessageObserver};
pub use registry::{Player, PlayerRegistry};
