//! A portable I/O readiness selector built on `epoll` (Linux) and `kqueue`
//! (BSD, Darwin).
//!
//! [`Selector`] is the crate's core: register [`Selectable`] descriptors
//! for an [`IOEvent`] interest, drive dispatch with [`Selector::wait`], and
//! interrupt a blocked wait from another thread with a [`Waker`] obtained
//! from [`Selector::waker`].
//!
//! # Goals
//!
//! * One readiness-selector abstraction over two incompatible kernel APIs.
//! * Safe cross-thread wakeup without a lock on the hot path.
//! * A deadline-bounded wait without any clock polling from the caller.
//!
//! # Usage
//!
//! ```no_run
//! use std::os::unix::io::RawFd;
//!
//! use sluice::{IOEvent, Registration, Selectable, Selector, Strategy};
//!
//! struct Channel {
//!     fd: RawFd,
//!     open: bool,
//!     interested: IOEvent,
//! }
//!
//! impl Selectable for Channel {
//!     fn descriptor(&self) -> RawFd { self.fd }
//!     fn is_open(&self) -> bool { self.open }
//! }
//!
//! impl Registration for Channel {
//!     fn interested(&self) -> IOEvent { self.interested }
//!     fn set_interested(&mut self, interest: IOEvent) { self.interested = interest }
//! }
//!
//! # fn try_main() -> sluice::Result<()> {
//! let mut selector = Selector::<Channel>::new()?;
//! # let channel = Channel { fd: 0, open: true, interested: IOEvent::Read };
//! selector.register(&channel, IOEvent::Read, |interested| Channel { interested, ..channel })?;
//!
//! selector.wait(Strategy::Block, |readable, _writable, registration: &mut Channel| {
//!     if readable {
//!         // ... read from registration.fd
//!     }
//!     Ok::<(), std::convert::Infallible>(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! A [`Selector`] is bound to the single thread that drives it: only that
//! thread may call [`register`], [`reregister`], [`deregister`], [`wait`],
//! [`close`] or [`gentle_close`]. The only type in this crate safe to share
//! across threads is [`Waker`], obtained from [`Selector::waker`].
//!
//! [`Selector`]: selector::Selector
//! [`register`]: selector::Selector::register
//! [`reregister`]: selector::Selector::reregister
//! [`deregister`]: selector::Selector::deregister
//! [`wait`]: selector::Selector::wait
//! [`close`]: selector::Selector::close
//! [`gentle_close`]: selector::Selector::gentle_close
//! [`Selector::waker`]: selector::Selector::waker
//! [`Selectable`]: selectable::Selectable
//! [`IOEvent`]: interest::IOEvent
//! [`Waker`]: waker::Waker

#![warn(missing_debug_implementations)]

mod sys;

pub mod error;
pub mod interest;
pub mod selectable;
pub mod selector;
pub mod strategy;
pub mod waker;

pub use error::{Result, SelectorError};
pub use interest::IOEvent;
pub use selectable::{Registration, Selectable};
pub use selector::Selector;
pub use strategy::Strategy;
pub use waker::Waker;
