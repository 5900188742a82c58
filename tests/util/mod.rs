//! Collection of testing utilities.

#![allow(dead_code)]

use std::os::unix::io::RawFd;

use sluice::{IOEvent, Registration, Selectable};

/// Initialise the test setup: logging, mostly.
pub fn init() {
    let env = env_logger::Env::new().filter("LOG_LEVEL");
    // The logger could already be set by a previous test in the same binary.
    drop(env_logger::try_init_from_env(env));
}

/// A minimal [`Selectable`]/[`Registration`] implementation backed by a raw
/// descriptor, used throughout the integration tests so they don't need a
/// full channel type to exercise the selector.
#[derive(Debug)]
pub struct TestIo {
    pub fd: RawFd,
    pub interested: IOEvent,
    pub label: &'static str,
}

impl TestIo {
    pub fn new(fd: RawFd, interested: IOEvent, label: &'static str) -> TestIo {
        TestIo { fd, interested, label }
    }
}

impl Selectable for TestIo {
    fn descriptor(&self) -> RawFd {
        self.fd
    }

    fn is_open(&self) -> bool {
        true
    }
}

impl Registration for TestIo {
    fn interested(&self) -> IOEvent {
        self.interested
    }

    fn set_interested(&mut self, interest: IOEvent) {
        self.interested = interest;
    }
}

/// A bare `RawFd` handle implementing [`Selectable`], for tests that only
/// need to register/deregister without reading the registration back.
#[derive(Debug)]
pub struct RawFdHandle(pub RawFd);

impl Selectable for RawFdHandle {
    fn descriptor(&self) -> RawFd {
        self.0
    }

    fn is_open(&self) -> bool {
        true
    }
}

/// A `Selectable` that always reports itself closed, for exercising
/// `register`'s openness check.
#[derive(Debug)]
pub struct ClosedFdHandle(pub RawFd);

impl Selectable for ClosedFdHandle {
    fn descriptor(&self) -> RawFd {
        self.0
    }

    fn is_open(&self) -> bool {
        false
    }
}

/// Create a connected, non-blocking pipe `(read_fd, write_fd)`.
pub fn new_pipe() -> (RawFd, RawFd) {
    let mut fds = [0; 2];
    let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
    assert_eq!(ret, 0, "pipe(2) failed: {}", std::io::Error::last_os_error());
    for &fd in &fds {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    }
    (fds[0], fds[1])
}

/// Close a raw descriptor, ignoring errors (tests clean up best-effort).
pub fn close(fd: RawFd) {
    unsafe { libc::close(fd) };
}
