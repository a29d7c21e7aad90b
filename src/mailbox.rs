//! Single-slot mailbox living inside a shared region
//!
//! The first byte of the region is the sentinel: zero means empty, anything
//! else means a message is waiting. The sentinel doubles as the first byte of
//! the message text, so a message is published by writing bytes `1..n` and
//! the terminator first, then storing byte 0 with `Release`. Readers load
//! byte 0 with `Acquire` before touching the rest.
//!
//! # Layout
//! ```text
//! [ sentinel / text[0] | text[1..n] | 0 | unused ... ]
//!   ^ AtomicU8
//! ```

use crate::error::{ChatError, Result};
use crate::peer::PeerId;
use crate::shm::{Ownership, SharedRegion};
use std::sync::atomic::{AtomicU8, Ordering};

/// Smallest region holding one text byte and its terminator
const MIN_REGION_SIZE: usize = 2;

/// One-message mailbox over a shared region
pub struct Mailbox {
    region: SharedRegion,
}

impl Mailbox {
    /// Wrap a mapped region
    pub fn from_region(region: SharedRegion) -> Result<Self> {
        if region.size() < MIN_REGION_SIZE {
            return Err(ChatError::RegionTooSmall {
                min: MIN_REGION_SIZE,
                got: region.size(),
            });
        }
        Ok(Self { region })
    }

    /// Create (or reopen) the inbox owned by `owner`
    pub fn create_inbox(owner: PeerId, size: usize) -> Result<Self> {
        let region = SharedRegion::open_or_create(&owner.region_name(), size, Ownership::Owner)?;
        Self::from_region(region)
    }

    /// Attach to `peer`'s inbox for writing
    pub fn attach_outbox(peer: PeerId, size: usize) -> Result<Self> {
        let region = SharedRegion::open_or_create(&peer.region_name(), size, Ownership::Attached)?;
        Self::from_region(region)
    }

    /// Longest message the mailbox accepts, in bytes
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.region.size() - 1
    }

    #[inline(always)]
    pub fn region(&self) -> &SharedRegion {
        &self.region
    }

    #[inline(always)]
    fn sentinel(&self) -> &AtomicU8 {
        // SAFETY: the mapping is at least MIN_REGION_SIZE bytes and page aligned
        unsafe { &*(self.region.as_ptr() as *const AtomicU8) }
    }

    /// True iff a message is waiting to be drained
    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.sentinel().load(Ordering::Acquire) != 0
    }

    /// Publish `text` into the slot
    ///
    /// Text is cut at the first NUL byte and at `capacity()` bytes (on a char
    /// boundary). Returns the number of bytes stored.
    pub fn write(&self, text: &str) -> Result<usize> {
        let payload = Self::payload(text, self.capacity());
        if payload.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if self.is_occupied() {
            return Err(ChatError::MailboxOccupied);
        }

        let base = self.region.as_ptr();
        unsafe {
            std::ptr::copy_nonoverlapping(payload.as_ptr().add(1), base.add(1), payload.len() - 1);
            std::ptr::write_volatile(base.add(payload.len()), 0);
        }

        self.sentinel().store(payload[0], Ordering::Release);
        Ok(payload.len())
    }

    /// Take the waiting message out of the slot, leaving it empty
    ///
    /// Only the owning process drains its inbox, so there is a single
    /// consumer; the sentinel store is the last access to the slot.
    pub fn drain(&self) -> Option<String> {
        let first = self.sentinel().load(Ordering::Acquire);
        if first == 0 {
            return None;
        }

        let base = self.region.as_ptr() as *const u8;
        let mut bytes = Vec::with_capacity(64);
        bytes.push(first);
        for i in 1..self.capacity() {
            let b = unsafe { std::ptr::read_volatile(base.add(i)) };
            if b == 0 {
                break;
            }
            bytes.push(b);
        }

        self.sentinel().store(0, Ordering::Release);
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reset the whole slot to the empty state
    pub fn clear(&self) {
        unsafe {
            std::ptr::write_bytes(self.region.as_ptr().add(1), 0, self.region.size() - 1);
        }
        self.sentinel().store(0, Ordering::Release);
    }

    fn payload(text: &str, capacity: usize) -> &[u8] {
        let text = match text.find('\0') {
            Some(nul) => &text[..nul],
            None => text,
        };
        if text.len() <= capacity {
            return text.as_bytes();
        }
        let mut end = capacity;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text.as_bytes()[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    static NEXT: AtomicU32 = AtomicU32::new(0);

    /// Owner and attached views of one fresh region
    fn pair(size: usize) -> (Mailbox, Mailbox) {
        let name = format!(
            "/shm_chat_mbox_{}_{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        );
        let inbox = SharedRegion::open_or_create(&name, size, Ownership::Owner).unwrap();
        let outbox = SharedRegion::open_or_create(&name, size, Ownership::Attached).unwrap();
        let inbox = Mailbox::from_region(inbox).unwrap();
        inbox.clear();
        (inbox, Mailbox::from_region(outbox).unwrap())
    }

    #[test]
    fn test_write_then_drain() {
        let (inbox, outbox) = pair(4096);

        assert!(!inbox.is_occupied());
        assert_eq!(outbox.write("hello\n").unwrap(), 6);
        assert!(inbox.is_occupied());
        assert!(outbox.is_occupied());

        assert_eq!(inbox.drain().as_deref(), Some("hello\n"));
        assert!(!inbox.is_occupied());
        assert!(!outbox.is_occupied());
        assert_eq!(inbox.drain(), None);
    }

    #[test]
    fn test_shorter_message_after_longer() {
        let (inbox, outbox) = pair(4096);

        outbox.write("a much longer message").unwrap();
        inbox.drain().unwrap();
        outbox.write("short").unwrap();
        assert_eq!(inbox.drain().as_deref(), Some("short"));
    }

    #[test]
    fn test_write_refuses_occupied_slot() {
        let (inbox, outbox) = pair(4096);

        outbox.write("first").unwrap();
        assert!(matches!(outbox.write("second"), Err(ChatError::MailboxOccupied)));
        assert_eq!(inbox.drain().as_deref(), Some("first"));
    }

    #[test]
    fn test_truncates_to_capacity() {
        let (inbox, outbox) = pair(8);
        assert_eq!(outbox.capacity(), 7);

        assert_eq!(outbox.write("abcdefghij").unwrap(), 7);
        assert_eq!(inbox.drain().as_deref(), Some("abcdefg"));

        // Never split a multi-byte char
        assert_eq!(outbox.write("abcdeéé").unwrap(), 7);
        assert_eq!(inbox.drain().as_deref(), Some("abcdeé"));
    }

    #[test]
    fn test_stops_at_embedded_nul() {
        let (inbox, outbox) = pair(4096);

        outbox.write("left\0right").unwrap();
        assert_eq!(inbox.drain().as_deref(), Some("left"));
        assert!(matches!(outbox.write("\0tail"), Err(ChatError::EmptyMessage)));
        assert!(matches!(outbox.write(""), Err(ChatError::EmptyMessage)));
    }

    #[test]
    fn test_clear_empty_is_noop() {
        let (inbox, _outbox) = pair(4096);

        inbox.clear();
        inbox.clear();
        assert!(!inbox.is_occupied());
        assert_eq!(inbox.drain(), None);
    }

    #[test]
    fn test_clear_discards_stale_message() {
        let (inbox, outbox) = pair(4096);

        outbox.write("stale").unwrap();
        inbox.clear();
        assert!(!outbox.is_occupied());
        assert_eq!(inbox.drain(), None);
    }

    #[test]
    fn test_region_too_small() {
        let name = format!("/shm_chat_mbox_{}_tiny", std::process::id());
        let region = SharedRegion::open_or_create(&name, 1, Ownership::Owner).unwrap();
        assert!(matches!(
            Mailbox::from_region(region),
            Err(ChatError::RegionTooSmall { min: 2, got: 1 })
        ));
    }

    #[test]
    fn test_concurrent_drain_and_poll() {
        let (inbox, outbox) = pair(4096);
        let messages = 200;

        let consumer = std::thread::spawn(move || {
            let mut got = Vec::new();
            while got.len() < messages {
                match inbox.drain() {
                    Some(m) => got.push(m),
                    None => std::hint::spin_loop(),
                }
            }
            got
        });

        for i in 0..messages {
            while outbox.is_occupied() {
                std::hint::spin_loop();
            }
            outbox.write(&format!("msg {}", i)).unwrap();
        }

        let got = consumer.join().unwrap();
        let expected: Vec<String> = (0..messages).map(|i| format!("msg {}", i)).collect();
        assert_eq!(got, expected);
    }
}
