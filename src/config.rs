//! Session configuration

use crate::peer::PeerId;
use std::time::Duration;

/// Size of each peer's inbox region in bytes
pub const REGION_SIZE: usize = 4096;

/// Default interval between delivery checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Chat session configuration
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// Size of each inbox region; both peers must agree on it
    pub region_size: usize,
    /// How often the sender checks whether the peer drained its message
    pub poll_interval: Duration,
    /// Remote peer, when known up front instead of prompted for
    pub peer: Option<PeerId>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            region_size: REGION_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            peer: None,
        }
    }
}
