//! Symbolic interest sets.
//!
//! [`IOEvent`] is the portable shape the rest of the crate works with; the
//! `sys` backends translate it to an epoll bitmask or a pair of kqueue
//! filters.

use std::ops::BitOr;

/// The readiness a registration is interested in.
///
/// `None` is a real state, not the absence of one: a descriptor registered
/// with `None` is still monitored for errors and hangups on platforms that
/// report those unconditionally (Linux).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IOEvent {
    /// Interested in neither readability nor writability.
    None,
    /// Interested in readability.
    Read,
    /// Interested in writability.
    Write,
    /// Interested in both readability and writability.
    All,
}

impl IOEvent {
    /// Whether this interest includes readability.
    pub fn is_readable(self) -> bool {
        matches!(self, IOEvent::Read | IOEvent::All)
    }

    /// Whether this interest includes writability.
    pub fn is_writable(self) -> bool {
        matches!(self, IOEvent::Write | IOEvent::All)
    }
}

impl BitOr for IOEvent {
    type Output = IOEvent;

    fn bitor(self, rhs: IOEvent) -> IOEvent {
        match (
            self.is_readable() || rhs.is_readable(),
            self.is_writable() || rhs.is_writable(),
        ) {
            (true, true) => IOEvent::All,
            (true, false) => IOEvent::Read,
            (false, true) => IOEvent::Write,
            (false, false) => IOEvent::None,
        }
    }
}
