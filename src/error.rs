//! Error types for ShmChat

use std::io;
use thiserror::Error;

/// Result type for ShmChat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Errors that can occur while setting up or running a chat session
#[derive(Debug, Error)]
pub enum ChatError {
    /// Failed to create or open shared memory
    #[error("Failed to open shared memory '{name}': {source}")]
    ShmCreate {
        name: String,
        #[source]
        source: io::Error,
    },

    /// Failed to map memory
    #[error("Failed to map memory: {0}")]
    Mmap(#[source] io::Error),

    /// Failed to truncate shared memory
    #[error("Failed to set shared memory size: {0}")]
    Truncate(#[source] io::Error),

    /// Region name too long for the shm namespace
    #[error("Region name too long: max {max} chars, got {got}")]
    NameTooLong { max: usize, got: usize },

    /// Region name is not a valid shm name
    #[error("Invalid region name '{0}'")]
    InvalidName(String),

    /// Region cannot hold a sentinel byte and a terminator
    #[error("Region too small: min {min} bytes, got {got} bytes")]
    RegionTooSmall { min: usize, got: usize },

    /// The peer has not drained the previous message yet
    #[error("Mailbox is still occupied")]
    MailboxOccupied,

    /// Message has no bytes before its terminator
    #[error("Message is empty")]
    EmptyMessage,

    /// Delivering a notification to the peer failed
    #[error("Failed to notify process {peer}: {source}")]
    Notify {
        peer: u32,
        #[source]
        source: io::Error,
    },

    /// Blocking or waiting on notification signals failed
    #[error("Failed to set up signal handling: {0}")]
    SignalSetup(#[source] io::Error),

    /// Standard input ended before the peer identity was known
    #[error("Input closed before a peer process ID was entered")]
    InputClosed,

    /// The notification listener thread went away
    #[error("Notification listener stopped")]
    ListenerClosed,

    /// The session has already been torn down
    #[error("Session is closed")]
    SessionClosed,

    /// Console I/O failure
    #[error(transparent)]
    Io(#[from] io::Error),
}
