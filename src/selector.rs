//! The selector core: registration table, wait dispatch, lifecycle.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::os::unix::io::RawFd;
use std::sync::Arc;

use log::{debug, trace};

use crate::error::{Result, SelectorError};
use crate::interest::IOEvent;
use crate::selectable::{Registration, Selectable};
use crate::strategy::Strategy;
use crate::sys::unix::{RawEvent, Selector as RawSelector, Waker as RawWaker};
use crate::waker::Waker;

const INITIAL_EVENTS_CAP: usize = 64;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Open,
    Closing,
    Closed,
}

/// A portable I/O readiness selector over `epoll` (Linux) and `kqueue`
/// (BSD, Darwin).
///
/// `Selector` is bound to a single thread: only that thread may call
/// [`register`], [`reregister`], [`deregister`], [`wait`], [`close`] and
/// [`gentle_close`]. The one exception is [`wake`], reachable through a
/// [`Waker`] obtained via [`waker`], which is safe to call from any thread
/// at any time.
///
/// `R` is the caller's own per-registration context type; `Selector` never
/// looks inside it beyond the [`Registration`] accessors.
///
/// [`register`]: Selector::register
/// [`reregister`]: Selector::reregister
/// [`deregister`]: Selector::deregister
/// [`wait`]: Selector::wait
/// [`close`]: Selector::close
/// [`gentle_close`]: Selector::gentle_close
/// [`waker`]: Selector::waker
/// [`wake`]: Waker::wake
pub struct Selector<R: Registration> {
    raw: RawSelector,
    waker: Arc<RawWaker>,
    waker_fd: RawFd,
    table: HashMap<RawFd, R>,
    events: Vec<RawEvent>,
    events_cap: usize,
    state: State,
    // `Selector` is deliberately never `Send`/`Sync`; only `Waker` is.
    _not_send_sync: PhantomData<*mut ()>,
}

impl<R: Registration> fmt::Debug for Selector<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("registrations", &self.table.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<R: Registration> Selector<R> {
    /// Create a new, open selector.
    pub fn new() -> Result<Selector<R>> {
        let raw = RawSelector::new()?;
        let waker = Arc::new(RawWaker::new(&raw)?);
        let waker_fd = waker.fd();
        trace!("created new selector");
        Ok(Selector {
            raw,
            waker,
            waker_fd,
            table: HashMap::new(),
            events: Vec::with_capacity(INITIAL_EVENTS_CAP),
            events_cap: INITIAL_EVENTS_CAP,
            state: State::Open,
            _not_send_sync: PhantomData,
        })
    }

    /// Obtain a thread-safe handle that can interrupt a blocked [`wait`].
    ///
    /// [`wait`]: Selector::wait
    pub fn waker(&self) -> Waker {
        Waker::new(self.waker.clone())
    }

    /// Register `selectable` for `interest`.
    ///
    /// `make_registration` is invoked with the initial interest to
    /// construct the caller's context, but only after the kernel interest
    /// has been installed successfully. Fails with
    /// [`SelectorError::AlreadyRegistered`] if the descriptor is already
    /// registered.
    pub fn register<S, F>(&mut self, selectable: &S, interest: IOEvent, make_registration: F) -> Result<()>
    where
        S: Selectable,
        F: FnOnce(IOEvent) -> R,
    {
        self.ensure_open()?;
        if !selectable.is_open() {
            return Err(SelectorError::SelectableNotOpen);
        }

        let fd = selectable.descriptor();
        match self.table.entry(fd) {
            Entry::Occupied(_) => Err(SelectorError::AlreadyRegistered),
            Entry::Vacant(entry) => {
                self.raw.add(fd, interest)?;
                entry.insert(make_registration(interest));
                trace!("registered fd {} for {:?}", fd, interest);
                Ok(())
            }
        }
    }

    /// Change the interest for an already-registered `selectable`.
    ///
    /// Fails with [`SelectorError::NotRegistered`] if `selectable` was
    /// never registered (or has since been deregistered).
    pub fn reregister<S>(&mut self, selectable: &S, interest: IOEvent) -> Result<()>
    where
        S: Selectable,
    {
        self.ensure_open()?;
        let fd = selectable.descriptor();
        let registration = self.table.get_mut(&fd).ok_or(SelectorError::NotRegistered)?;
        let old = registration.interested();
        self.raw.modify(fd, old, interest)?;
        registration.set_interested(interest);
        trace!("reregistered fd {} from {:?} to {:?}", fd, old, interest);
        Ok(())
    }

    /// Remove the registration for `selectable`, if any. Idempotent when
    /// the descriptor is already absent.
    pub fn deregister<S>(&mut self, selectable: &S) -> Result<()>
    where
        S: Selectable,
    {
        self.ensure_open()?;
        let fd = selectable.descriptor();
        if let Some(registration) = self.table.remove(&fd) {
            self.raw.delete(fd, registration.interested())?;
            trace!("deregistered fd {}", fd);
        }
        Ok(())
    }

    /// Block according to `strategy`, dispatching each ready event to
    /// `callback` as `(readable, writable, registration)`.
    ///
    /// An error returned by `callback` aborts dispatch of the current
    /// batch immediately and propagates out of `wait`; the kernel will
    /// redeliver level-triggered state for any undispatched events on the
    /// next call.
    pub fn wait<F, E>(&mut self, strategy: Strategy, mut callback: F) -> Result<()>
    where
        F: FnMut(bool, bool, &mut R) -> std::result::Result<(), E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.ensure_open()?;

        self.events.clear();
        self.raw.wait(&mut self.events, strategy)?;

        if self.events.len() == self.events_cap {
            self.events_cap *= 2;
            let additional = self.events_cap.saturating_sub(self.events.capacity());
            self.events.reserve_exact(additional);
            debug!("grew event buffer to {}", self.events_cap);
        }

        let Selector {
            ref mut table,
            ref events,
            ref waker,
            waker_fd,
            ..
        } = *self;

        for event in events.iter() {
            match *event {
                RawEvent::Wake => trace!("drained wake event"),
                RawEvent::Timer => trace!("drained deadline timer event"),
                RawEvent::Io { fd, readable, writable } => {
                    if fd == waker_fd {
                        waker.drain();
                        trace!("drained wake event");
                        continue;
                    }
                    if let Some(registration) = table.get_mut(&fd) {
                        callback(readable, writable, registration)
                            .map_err(|err| SelectorError::Callback(Box::new(err)))?;
                    } else {
                        trace!("dropping event for deregistered fd {}", fd);
                    }
                }
            }
        }
        Ok(())
    }

    /// Invoke `on_close` for every live registration (order is
    /// unspecified but every entry receives exactly one call), clear the
    /// table, then perform the same OS teardown as [`close`].
    ///
    /// [`close`]: Selector::close
    pub fn gentle_close<F>(&mut self, mut on_close: F) -> Result<()>
    where
        F: FnMut(&mut R),
    {
        self.ensure_open()?;
        self.state = State::Closing;
        for (_, mut registration) in self.table.drain() {
            on_close(&mut registration);
        }
        self.close_raw()
    }

    /// Close the selector. Fails with [`SelectorError::NotOpen`] unless
    /// the selector is currently open.
    ///
    /// Closes the readiness handle (and, on Linux, the deadline timer) but
    /// not the wake source, which is only released once every [`Waker`]
    /// clone and this selector have been dropped.
    pub fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.close_raw()
    }

    fn close_raw(&mut self) -> Result<()> {
        self.raw.close()?;
        self.state = State::Closed;
        trace!("closed selector");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == State::Open {
            Ok(())
        } else {
            Err(SelectorError::NotOpen)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::io::RawFd;

    use crate::interest::IOEvent;
    use crate::selectable::{Registration, Selectable};

    use super::{Selector, INITIAL_EVENTS_CAP};

    struct Ctx {
        fd: RawFd,
        interested: IOEvent,
    }

    impl Selectable for Ctx {
        fn descriptor(&self) -> RawFd {
            self.fd
        }

        fn is_open(&self) -> bool {
            true
        }
    }

    impl Registration for Ctx {
        fn interested(&self) -> IOEvent {
            self.interested
        }

        fn set_interested(&mut self, interest: IOEvent) {
            self.interested = interest;
        }
    }

    #[test]
    fn event_buffer_starts_at_initial_capacity() {
        let selector = Selector::<Ctx>::new().expect("create selector");
        assert_eq!(selector.events_cap, INITIAL_EVENTS_CAP);
        assert!(selector.events.capacity() >= INITIAL_EVENTS_CAP);
    }

    #[test]
    fn new_selector_is_open() {
        let mut selector = Selector::<Ctx>::new().expect("create selector");
        assert!(selector.close().is_ok());
        assert!(selector.close().is_err(), "closing twice must fail");
    }
}
