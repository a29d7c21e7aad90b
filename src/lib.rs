//! ShmChat - two-peer chat over POSIX shared memory
//!
//! Each peer owns one 4 KiB shared memory region named after its pid and
//! maps the other peer's region too. A message is written straight into the
//! peer's region and announced with a signal; the sender then waits until the
//! peer has drained it before sending the next one.
//!
//! # Architecture
//!
//! - **Shared regions** (`shm`): named segments, unlinked only by their owner
//! - **Mailbox** (`mailbox`): a single message slot guarded by an atomic sentinel byte
//! - **Notifications** (`notify`): SIGUSR1 / SIGTERM / SIGINT, collected on a listener thread
//! - **Session** (`session`): handshake, exchange loop and teardown

pub mod error;
pub mod peer;
pub mod shm;
pub mod mailbox;
pub mod notify;
pub mod input;
pub mod config;
pub mod session;

pub use error::{ChatError, Result};
pub use config::ChatConfig;
pub use mailbox::Mailbox;
pub use notify::{Notification, NotificationListener, Notifier, SignalNotifier};
pub use peer::PeerId;
pub use session::{Session, SessionState, Shutdown};
