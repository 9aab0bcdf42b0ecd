//! Hook for messages received after a successful join.
//!
//! The handler keeps reading until the peer goes away and hands every
//! non-blank line to the installed observer. Quiz play (answer submission
//! and scoring) plugs in here.

use log::info;

pub trait MessageObserver: Send + Sync {
    /// Called once per non-blank message from a joined player.
    fn on_message(&self, player: &str, message: &str);
}

/// Default observer: logs every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl MessageObserver for LoggingObserver {
    fn on_message(&self, player: &str, message: &str) {
        info!("From {}: {}", player, message);
    }
}
