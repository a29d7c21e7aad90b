//! Process identities of the two chat peers

use rustix::process::Pid;
use std::fmt;

const REGION_SUFFIX: &str = "-chat";

/// OS process identifier of a chat peer
///
/// Always positive: zero and negative values are never valid peers, since
/// signalling them would address a process group instead of one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(u32);

impl PeerId {
    /// Wrap a raw pid, rejecting zero and values outside the pid range
    pub fn new(raw: u32) -> Option<Self> {
        if raw == 0 || raw > i32::MAX as u32 {
            return None;
        }
        Some(Self(raw))
    }

    /// Identity of the calling process
    pub fn current() -> Self {
        Self(std::process::id())
    }

    /// Parse a line the way `strtol(line, NULL, 10)` would
    ///
    /// Leading whitespace and an optional sign are skipped, digits are read
    /// until the first non-digit. Anything that does not yield a positive pid
    /// returns `None` so the caller keeps asking.
    pub fn parse(line: &str) -> Option<Self> {
        let s = line.trim_start();
        let (negative, s) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let digits = s.bytes().take_while(u8::is_ascii_digit).count();
        if negative || digits == 0 {
            return None;
        }

        s[..digits].parse::<u32>().ok().and_then(Self::new)
    }

    #[inline(always)]
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn as_pid(self) -> Option<Pid> {
        Pid::from_raw(self.0 as i32)
    }

    /// Name of the shared memory region this peer owns
    pub fn region_name(self) -> String {
        format!("/{}{}", self.0, REGION_SUFFIX)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_like_strtol() {
        assert_eq!(PeerId::parse("1234\n"), PeerId::new(1234));
        assert_eq!(PeerId::parse("  42abc"), PeerId::new(42));
        assert_eq!(PeerId::parse("+7"), PeerId::new(7));
    }

    #[test]
    fn test_parse_rejects_zero_and_garbage() {
        assert_eq!(PeerId::parse("0\n"), None);
        assert_eq!(PeerId::parse("abc"), None);
        assert_eq!(PeerId::parse(""), None);
        assert_eq!(PeerId::parse("-12"), None);
        assert_eq!(PeerId::parse("99999999999999"), None);
    }

    #[test]
    fn test_region_name() {
        let peer = PeerId::new(4321).unwrap();
        assert_eq!(peer.region_name(), "/4321-chat");
        assert_eq!(peer.to_string(), "4321");
    }

    #[test]
    fn test_current_is_valid() {
        let me = PeerId::current();
        assert_eq!(me.as_raw(), std::process::id());
        assert!(me.as_pid().is_some());
    }
}
