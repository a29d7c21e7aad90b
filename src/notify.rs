//! Process-directed notifications carried by POSIX signals
//!
//! | Kind                    | Signal  |
//! |-------------------------|---------|
//! | `MessageReady`          | SIGUSR1 |
//! | `Terminate`             | SIGTERM |
//! | `TerminateAndPropagate` | SIGINT  |
//!
//! Incoming signals are never handled asynchronously. `NotificationListener`
//! blocks them in every thread and a dedicated thread collects them with
//! `sigwait`, forwarding each one as a `Notification` over a channel.

use crate::error::{ChatError, Result};
use crate::peer::PeerId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use rustix::io::Errno;
use rustix::process::{kill_process, Signal};
use std::io;
use std::thread;

/// What a notification asks the receiving peer to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Drain the inbox and print it
    MessageReady,
    /// Clean up and exit quietly
    Terminate,
    /// Clean up, send `Terminate` to the peer, then exit
    TerminateAndPropagate,
}

impl Notification {
    pub fn signal(self) -> Signal {
        match self {
            Notification::MessageReady => Signal::Usr1,
            Notification::Terminate => Signal::Term,
            Notification::TerminateAndPropagate => Signal::Int,
        }
    }

    pub fn from_raw_signal(sig: libc::c_int) -> Option<Self> {
        match sig {
            libc::SIGUSR1 => Some(Notification::MessageReady),
            libc::SIGTERM => Some(Notification::Terminate),
            libc::SIGINT => Some(Notification::TerminateAndPropagate),
            _ => None,
        }
    }
}

/// Delivers notifications to a peer process
pub trait Notifier {
    /// Fire-and-forget delivery of `kind` to `peer`
    ///
    /// A peer that no longer exists is not an error.
    fn notify(&self, peer: PeerId, kind: Notification) -> Result<()>;
}

/// Notifier backed by `kill(2)`
#[derive(Clone, Copy, Debug, Default)]
pub struct SignalNotifier;

impl Notifier for SignalNotifier {
    fn notify(&self, peer: PeerId, kind: Notification) -> Result<()> {
        let pid = peer.as_pid().ok_or_else(|| ChatError::Notify {
            peer: peer.as_raw(),
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;

        match kill_process(pid, kind.signal()) {
            Ok(()) => {
                log::debug!("sent {:?} to {}", kind, peer);
                Ok(())
            }
            Err(e) if e == Errno::SRCH => {
                log::debug!("{:?} to {} dropped: no such process", kind, peer);
                Ok(())
            }
            Err(e) => Err(ChatError::Notify {
                peer: peer.as_raw(),
                source: e.into(),
            }),
        }
    }
}

/// Collects incoming notification signals on a background thread
pub struct NotificationListener {
    rx: Receiver<Notification>,
}

impl NotificationListener {
    /// Block the notification signals and start the listener thread
    ///
    /// Must run before any other thread is spawned: threads inherit the
    /// signal mask of their creator, and an unblocked thread would receive
    /// the signals with their default (terminating) disposition.
    pub fn install() -> Result<Self> {
        let set = Self::signal_set()?;

        let rc = unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut()) };
        if rc != 0 {
            return Err(ChatError::SignalSetup(io::Error::from_raw_os_error(rc)));
        }

        let (tx, rx) = unbounded();
        // Detached: runs until the process exits or the receiver is dropped
        thread::Builder::new()
            .name("chat-signals".into())
            .spawn(move || Self::listen(set, tx))
            .map_err(ChatError::SignalSetup)?;

        log::debug!("notification listener installed");
        Ok(Self { rx })
    }

    #[inline]
    pub fn receiver(&self) -> &Receiver<Notification> {
        &self.rx
    }

    fn signal_set() -> Result<libc::sigset_t> {
        unsafe {
            let mut set = std::mem::zeroed::<libc::sigset_t>();
            if libc::sigemptyset(&mut set) != 0 {
                return Err(ChatError::SignalSetup(io::Error::last_os_error()));
            }
            for sig in [libc::SIGUSR1, libc::SIGTERM, libc::SIGINT] {
                if libc::sigaddset(&mut set, sig) != 0 {
                    return Err(ChatError::SignalSetup(io::Error::last_os_error()));
                }
            }
            Ok(set)
        }
    }

    fn listen(set: libc::sigset_t, tx: Sender<Notification>) {
        loop {
            let mut sig: libc::c_int = 0;
            let rc = unsafe { libc::sigwait(&set, &mut sig) };
            if rc != 0 {
                log::error!("sigwait failed: {}", io::Error::from_raw_os_error(rc));
                return;
            }

            match Notification::from_raw_signal(sig) {
                Some(kind) => {
                    log::debug!("received {:?}", kind);
                    if tx.send(kind).is_err() {
                        return;
                    }
                }
                None => log::warn!("ignoring unexpected signal {}", sig),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_mapping() {
        for kind in [
            Notification::MessageReady,
            Notification::Terminate,
            Notification::TerminateAndPropagate,
        ] {
            assert_eq!(Notification::from_raw_signal(kind.signal() as libc::c_int), Some(kind));
        }
        assert_eq!(Notification::from_raw_signal(libc::SIGHUP), None);
    }

    #[test]
    fn test_notify_into_the_void() {
        // Above any kernel pid_max, so no such process can exist
        let peer = PeerId::new(i32::MAX as u32).unwrap();
        assert!(SignalNotifier.notify(peer, Notification::Terminate).is_ok());
    }
}
