//! # Quiz Client Library
//!
//! A small protocol client for the quiz server. It speaks the same
//! newline-framed protocol as the server (see the `shared` crate):
//!
//! 1. Connect over TCP
//! 2. Send `JOIN|<name>` and wait for `JOIN_OK` or `JOIN_ERROR`
//! 3. After a successful join, send free-form lines until done
//!
//! The client binary drives this from the command line; the integration
//! tests use it to play several players against one server.

pub mod error;
pub mod network;

pub use error::ClientError;
pub use network::QuizClient;
