//! Wire protocol and quiz data shared by the quiz server and client.
//!
//! Every message is a single UTF-8 line terminated by `\n`, with fields
//! separated by `|`. Surrounding whitespace is not significant.

pub mod quiz;

pub use quiz::{load_questions, parse_questions, Choice, FormatError, QuestionRecord};

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;
pub const MAX_MESSAGE_LEN: usize = 1024;
pub const FIELD_SEPARATOR: char = '|';

const JOIN: &str = "JOIN";
const JOIN_OK: &str = "JOIN_OK";
const JOIN_ERROR: &str = "JOIN_ERROR";
const WELCOME_PREFIX: &str = "Welcome, ";

/// Reasons a handshake can be refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    #[error("invalid_join_format")]
    InvalidFormat,
    #[error("empty_name")]
    EmptyName,
    #[error("name_taken")]
    NameTaken,
}

impl JoinError {
    /// Reason string carried in a `JOIN_ERROR` reply.
    pub fn reason(&self) -> &'static str {
        match self {
            JoinError::InvalidFormat => "invalid_join_format",
            JoinError::EmptyName => "empty_name",
            JoinError::NameTaken => "name_taken",
        }
    }

    pub fn from_reason(reason: &str) -> Option<Self> {
        match reason {
            "invalid_join_format" => Some(JoinError::InvalidFormat),
            "empty_name" => Some(JoinError::EmptyName),
            "name_taken" => Some(JoinError::NameTaken),
            _ => None,
        }
    }
}

/// Parses a handshake line of the form `JOIN|<name>` and returns the trimmed name.
///
/// Only the first separator splits the line, so a name may itself contain `|`.
pub fn parse_join(line: &str) -> Result<String, JoinError> {
    let (command, name) = line
        .trim()
        .split_once(FIELD_SEPARATOR)
        .ok_or(JoinError::InvalidFormat)?;

    if command != JOIN {
        return Err(JoinError::InvalidFormat);
    }

    let name = name.trim();
    if name.is_empty() {
        return Err(JoinError::EmptyName);
    }

    Ok(name.to_string())
}

/// Messages a client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join { name: String },
    Text(String),
}

impl ClientMessage {
    pub fn join(name: impl Into<String>) -> Self {
        ClientMessage::Join { name: name.into() }
    }

    /// Encodes the message as one newline-terminated line.
    pub fn encode(&self) -> String {
        match self {
            ClientMessage::Join { name } => format!("{JOIN}{FIELD_SEPARATOR}{name}\n"),
            ClientMessage::Text(text) => format!("{}\n", text.trim_end_matches(['\r', '\n'])),
        }
    }
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    JoinAccepted { name: String },
    JoinRejected(JoinError),
}

/// A server line that does not match any known reply.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognised server message: {0}")]
pub struct UnknownMessage(pub String);

impl ServerMessage {
    pub fn encode(&self) -> String {
        match self {
            ServerMessage::JoinAccepted { name } => {
                format!("{JOIN_OK}{FIELD_SEPARATOR}{WELCOME_PREFIX}{name}\n")
            }
            ServerMessage::JoinRejected(err) => {
                format!("{JOIN_ERROR}{FIELD_SEPARATOR}{}\n", err.reason())
            }
        }
    }

    pub fn parse(line: &str) -> Result<Self, UnknownMessage> {
        let line = line.trim();
        let unknown = || UnknownMessage(line.to_string());

        let (kind, body) = line.split_once(FIELD_SEPARATOR).ok_or_else(unknown)?;
        match kind {
            JOIN_OK => {
                let name = body.strip_prefix(WELCOME_PREFIX).ok_or_else(unknown)?;
                Ok(ServerMessage::JoinAccepted {
                    name: name.to_string(),
                })
            }
            JOIN_ERROR => JoinError::from_reason(body)
                .map(ServerMessage::JoinRejected)
                .ok_or_else(unknown),
            _ => Err(unknown()),
        }
    }
}
