#[cfg(target_os = "linux")]
mod epoll;
#[cfg(target_os = "linux")]
pub use self::epoll::{Selector, Waker};

#[cfg(any(
    target_os = "freebsd",
    target_os = "macos",
    target_os = "netbsd",
    target_os = "openbsd"
))]
mod kqueue;
#[cfg(any(
    target_os = "freebsd",
    target_os = "macos",
    target_os = "netbsd",
    target_os = "openbsd"
))]
pub use self::kqueue::{Selector, Waker};

use std::os::unix::io::RawFd;

/// A single readiness notification, already folded from whatever shape the
/// underlying OS selector reports into the shape [`crate::selector::Selector`]
/// understands.
#[derive(Clone, Copy, Debug)]
pub enum RawEvent {
    /// Readiness for a registered descriptor.
    Io {
        fd: RawFd,
        readable: bool,
        writable: bool,
    },
    /// A cross-thread [`Waker::wake`] call.
    Wake,
    /// The deadline timer (Linux only; kqueue waits out its timeout
    /// natively) expired.
    Timer,
}
