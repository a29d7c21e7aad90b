//! Chat session: peer handshake, message exchange and teardown
//!
//! # States
//! ```text
//! AwaitingPeerIdentity -> Established -> Terminating -> Closed
//! ```
//!
//! While established the session waits on two channels at once: lines from
//! the input reader and notifications from the listener. After each send it
//! polls the peer's inbox until the peer has drained it, still handling
//! incoming notifications in between, so at most one message per direction
//! is ever in flight.

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::input::InputEvent;
use crate::mailbox::Mailbox;
use crate::notify::{Notification, Notifier};
use crate::peer::PeerId;
use crossbeam_channel::{select, Receiver, RecvError};
use std::io::Write;
use std::time::Duration;

pub const PEER_PROMPT: &str = "Enter other process ID: ";
pub const MESSAGE_PROMPT: &str = "Enter a message (Ctrl+D to quit): ";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingPeerIdentity,
    Established,
    Terminating,
    Closed,
}

/// Why a session ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// Local input closed; the peer was told to terminate
    EndOfInput,
    /// Local interrupt; the peer is told to terminate after teardown
    Interrupted,
    /// The peer asked us to terminate
    PeerTerminated,
}

/// Prompt until a usable peer identity is entered
///
/// Returns `Ok(None)` when a termination notification arrives first; there is
/// no peer to tell yet, so the caller just exits.
pub fn await_peer_identity<W: Write>(
    input: &Receiver<InputEvent>,
    notifications: &Receiver<Notification>,
    out: &mut W,
) -> Result<Option<PeerId>> {
    let mut prompt = true;
    loop {
        if prompt {
            write!(out, "{}", PEER_PROMPT)?;
            out.flush()?;
            prompt = false;
        }

        select! {
            recv(input) -> event => match event {
                Ok(InputEvent::Line(line)) => {
                    if let Some(peer) = PeerId::parse(&line) {
                        return Ok(Some(peer));
                    }
                    log::debug!("rejected peer id {:?}", line.trim_end());
                    prompt = true;
                }
                Ok(InputEvent::Failed(kind)) => return Err(ChatError::Io(kind.into())),
                Ok(InputEvent::Eof) | Err(_) => return Err(ChatError::InputClosed),
            },
            recv(notifications) -> kind => match kind {
                // Our inbox is cleared when the session is established, so
                // whatever the peer sent this early is lost
                Ok(Notification::MessageReady) => {
                    log::warn!("message arrived before a peer was chosen and is discarded");
                }
                Ok(kind) => {
                    log::info!("{:?} while awaiting peer identity", kind);
                    return Ok(None);
                }
                Err(_) => return Err(ChatError::ListenerClosed),
            },
        }
    }
}

/// Our inbox and the peer's inbox, mapped for the life of the session
struct Links {
    inbox: Mailbox,
    outbox: Mailbox,
}

/// An established two-peer chat
pub struct Session<N: Notifier, W: Write> {
    local: PeerId,
    remote: PeerId,
    links: Option<Links>,
    notifier: N,
    out: W,
    poll_interval: Duration,
    state: SessionState,
}

impl<N: Notifier, W: Write> Session<N, W> {
    /// Create our inbox, attach the peer's, and clear both
    pub fn establish(
        local: PeerId,
        remote: PeerId,
        config: &ChatConfig,
        notifier: N,
        out: W,
    ) -> Result<Self> {
        let inbox = Mailbox::create_inbox(local, config.region_size)?;
        let outbox = Mailbox::attach_outbox(remote, config.region_size)?;
        inbox.clear();
        outbox.clear();

        log::info!(
            "session established: inbox '{}', outbox '{}'",
            inbox.region().name(),
            outbox.region().name()
        );

        Ok(Self {
            local,
            remote,
            links: Some(Links { inbox, outbox }),
            notifier,
            out,
            poll_interval: config.poll_interval,
            state: SessionState::Established,
        })
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn local(&self) -> PeerId {
        self.local
    }

    #[inline]
    pub fn remote(&self) -> PeerId {
        self.remote
    }

    /// Exchange messages until input ends, we are interrupted, or the peer
    /// terminates
    ///
    /// Both mappings are released and our region unlinked on every exit
    /// path, errors included.
    pub fn run(
        &mut self,
        input: &Receiver<InputEvent>,
        notifications: &Receiver<Notification>,
    ) -> Result<Shutdown> {
        if self.state != SessionState::Established {
            return Err(ChatError::SessionClosed);
        }

        let outcome = self.exchange(input, notifications);
        self.transition(SessionState::Terminating);
        self.teardown();
        self.transition(SessionState::Closed);

        let shutdown = outcome?;
        if shutdown == Shutdown::Interrupted {
            self.notifier.notify(self.remote, Notification::Terminate)?;
        }
        Ok(shutdown)
    }

    fn exchange(
        &mut self,
        input: &Receiver<InputEvent>,
        notifications: &Receiver<Notification>,
    ) -> Result<Shutdown> {
        let mut prompt = true;
        loop {
            if prompt {
                write!(self.out, "{}", MESSAGE_PROMPT)?;
                self.out.flush()?;
                prompt = false;
            }

            select! {
                recv(input) -> event => match event {
                    Ok(InputEvent::Line(text)) => {
                        prompt = true;
                        if self.send(&text)? {
                            if let Some(shutdown) = self.await_delivery(notifications)? {
                                return Ok(shutdown);
                            }
                        }
                    }
                    Ok(InputEvent::Failed(kind)) => {
                        self.notifier.notify(self.remote, Notification::Terminate)?;
                        return Err(ChatError::Io(kind.into()));
                    }
                    Ok(InputEvent::Eof) | Err(_) => {
                        writeln!(self.out, "EOF detected, cleaning up...")?;
                        self.out.flush()?;
                        self.notifier.notify(self.remote, Notification::Terminate)?;
                        return Ok(Shutdown::EndOfInput);
                    }
                },
                recv(notifications) -> kind => {
                    if let Some(shutdown) = self.handle(kind)? {
                        return Ok(shutdown);
                    }
                }
            }
        }
    }

    /// Put `text` in the peer's inbox and tell the peer
    ///
    /// Returns `false` when there was nothing to send.
    fn send(&mut self, text: &str) -> Result<bool> {
        let links = self.links.as_ref().ok_or(ChatError::SessionClosed)?;
        match links.outbox.write(text) {
            Ok(len) => log::debug!("wrote {} bytes to '{}'", len, links.outbox.region().name()),
            Err(ChatError::EmptyMessage) => return Ok(false),
            Err(e) => return Err(e),
        }
        self.notifier.notify(self.remote, Notification::MessageReady)?;
        Ok(true)
    }

    /// Poll until the peer has drained our last message
    fn await_delivery(&mut self, notifications: &Receiver<Notification>) -> Result<Option<Shutdown>> {
        loop {
            let links = self.links.as_ref().ok_or(ChatError::SessionClosed)?;
            if !links.outbox.is_occupied() {
                log::debug!("message drained by {}", self.remote);
                return Ok(None);
            }

            select! {
                recv(notifications) -> kind => {
                    if let Some(shutdown) = self.handle(kind)? {
                        return Ok(Some(shutdown));
                    }
                }
                default(self.poll_interval) => {}
            }
        }
    }

    fn handle(&mut self, kind: std::result::Result<Notification, RecvError>) -> Result<Option<Shutdown>> {
        match kind.map_err(|_| ChatError::ListenerClosed)? {
            Notification::MessageReady => {
                let links = self.links.as_ref().ok_or(ChatError::SessionClosed)?;
                match links.inbox.drain() {
                    Some(text) => {
                        write!(self.out, "Received message: {}", text)?;
                        if !text.ends_with('\n') {
                            writeln!(self.out)?;
                        }
                        self.out.flush()?;
                    }
                    None => log::warn!("message notification with an empty inbox"),
                }
                Ok(None)
            }
            Notification::Terminate => {
                writeln!(self.out, "Received SIGTERM, cleaning up...")?;
                self.out.flush()?;
                Ok(Some(Shutdown::PeerTerminated))
            }
            Notification::TerminateAndPropagate => {
                writeln!(
                    self.out,
                    "Received SIGINT, cleaning up and sending SIGTERM to other process..."
                )?;
                self.out.flush()?;
                Ok(Some(Shutdown::Interrupted))
            }
        }
    }

    /// Unmap both regions and unlink ours
    fn teardown(&mut self) {
        if let Some(Links { inbox, outbox }) = self.links.take() {
            drop(outbox);
            drop(inbox);
            log::info!("released shared regions of {}", self.local);
        }
    }

    fn transition(&mut self, next: SessionState) {
        log::debug!("session {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
