use std::cmp::min;
use std::io;
use std::mem;
use std::os::unix::io::RawFd;
use std::ptr;
use std::time::Duration;

use log::error;

use crate::error::{Result, SelectorError};
use crate::interest::IOEvent;
use crate::strategy::Strategy;
use crate::sys::syscall::{last_os_error, retry_on_eintr};
use crate::sys::unix::RawEvent;

// Each OS that implements kqueue picked different types for the `kevent`
// struct fields, hence the aliases below.

#[cfg(not(target_os = "netbsd"))]
#[allow(non_camel_case_types)]
type nchanges_t = libc::c_int;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type nchanges_t = libc::size_t;

#[cfg(any(target_os = "freebsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_filter_t = libc::c_short;
#[cfg(target_os = "macos")]
#[allow(non_camel_case_types)]
type kevent_filter_t = i16;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_filter_t = u32;

#[cfg(any(target_os = "freebsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_flags_t = libc::c_ushort;
#[cfg(target_os = "macos")]
#[allow(non_camel_case_types)]
type kevent_flags_t = u16;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_flags_t = u32;

#[cfg(any(target_os = "freebsd", target_os = "macos"))]
#[allow(non_camel_case_types)]
type kevent_data_t = libc::intptr_t;
#[cfg(any(target_os = "netbsd", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_data_t = i64;

#[cfg(any(target_os = "freebsd", target_os = "macos", target_os = "openbsd"))]
#[allow(non_camel_case_types)]
type kevent_udata_t = *mut libc::c_void;
#[cfg(target_os = "netbsd")]
#[allow(non_camel_case_types)]
type kevent_udata_t = libc::intptr_t;

#[cfg(any(target_os = "freebsd", target_os = "macos", target_os = "openbsd"))]
fn zero_udata() -> kevent_udata_t {
    ptr::null_mut()
}
#[cfg(target_os = "netbsd")]
fn zero_udata() -> kevent_udata_t {
    0
}

#[derive(Debug)]
pub struct Selector {
    kq: RawFd,
}

impl Selector {
    pub fn new() -> Result<Selector> {
        let kq = unsafe { libc::kqueue() };
        if kq == -1 {
            Err(last_os_error("kqueue"))
        } else {
            Ok(Selector { kq })
        }
    }

    /// Reconcile `old` against `new` by emitting the minimum set of
    /// `EV_ADD`/`EV_DELETE` changes for the read and write filters.
    ///
    /// `register` and `deregister` are just the special cases where `old`
    /// (resp. `new`) is [`IOEvent::None`].
    pub fn modify(&self, fd: RawFd, old: IOEvent, new: IOEvent) -> Result<()> {
        let mut changes = Vec::with_capacity(2);
        push_filter_change(
            &mut changes,
            fd,
            libc::EVFILT_READ,
            old.is_readable(),
            new.is_readable(),
        );
        push_filter_change(
            &mut changes,
            fd,
            libc::EVFILT_WRITE,
            old.is_writable(),
            new.is_writable(),
        );
        if changes.is_empty() {
            return Ok(());
        }
        kevent_register(self.kq, &mut changes, &[libc::ENOENT as kevent_data_t])
    }

    pub fn add(&self, fd: RawFd, interest: IOEvent) -> Result<()> {
        self.modify(fd, IOEvent::None, interest)
    }

    pub fn delete(&self, fd: RawFd, old: IOEvent) -> Result<()> {
        self.modify(fd, old, IOEvent::None)
    }

    pub fn wait(&self, events: &mut Vec<RawEvent>, strategy: Strategy) -> Result<()> {
        let timespec = match strategy {
            Strategy::Now => Some(libc::timespec {
                tv_sec: 0,
                tv_nsec: 0,
            }),
            Strategy::Block => None,
            Strategy::BlockUntilTimeout(duration) => Some(timespec_from_duration(duration)),
        };
        let timespec_ptr = timespec
            .as_ref()
            .map(|t| t as *const libc::timespec)
            .unwrap_or(ptr::null());

        let cap = events.capacity();
        let mut buf: Vec<libc::kevent> = Vec::with_capacity(cap);
        let n = retry_on_eintr("kevent (wait)", || unsafe {
            libc::kevent(
                self.kq,
                ptr::null(),
                0,
                buf.as_mut_ptr(),
                cap as nchanges_t,
                timespec_ptr,
            )
        })?;
        unsafe { buf.set_len(n as usize) };
        events.extend(buf.iter().map(kevent_to_raw_event));
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        let kq = mem::replace(&mut self.kq, -1);
        if kq != -1 && unsafe { libc::close(kq) } == -1 {
            Err(last_os_error("close (kqueue)"))
        } else {
            Ok(())
        }
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        if self.kq != -1 {
            if unsafe { libc::close(self.kq) } == -1 {
                error!("error closing kqueue: {}", io::Error::last_os_error());
            }
        }
    }
}

fn push_filter_change(
    changes: &mut Vec<libc::kevent>,
    fd: RawFd,
    filter: kevent_filter_t,
    was: bool,
    want: bool,
) {
    if want && !was {
        changes.push(new_kevent(
            fd as libc::uintptr_t,
            filter,
            libc::EV_ADD | libc::EV_RECEIPT,
        ));
    } else if !want && was {
        changes.push(new_kevent(
            fd as libc::uintptr_t,
            filter,
            libc::EV_DELETE | libc::EV_RECEIPT,
        ));
    }
}

fn timespec_from_duration(duration: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: min(duration.as_secs(), libc::time_t::max_value() as u64) as libc::time_t,
        tv_nsec: libc::c_long::from(duration.subsec_nanos() as i32),
    }
}

/// Convert a `kevent` into a [`RawEvent`].
///
/// Any filter other than `EVFILT_USER`/`EVFILT_READ`/`EVFILT_WRITE` is a
/// contract violation: this selector never arms any other filter, so the
/// kernel reporting one means its assumptions about the kqueue API no
/// longer hold. Unrecoverable, so this aborts rather than returning an
/// error the caller could plausibly ignore.
fn kevent_to_raw_event(kevent: &libc::kevent) -> RawEvent {
    let (fd, mut readable, mut writable) = if kevent.filter == libc::EVFILT_USER {
        return RawEvent::Wake;
    } else if kevent.filter == libc::EVFILT_READ {
        (kevent.ident as RawFd, true, false)
    } else if kevent.filter == libc::EVFILT_WRITE {
        (kevent.ident as RawFd, false, true)
    } else {
        panic!(
            "{}",
            SelectorError::contract_violation(format!(
                "kevent reported unknown filter {}",
                kevent.filter
            ))
        );
    };

    // EV_EOF/EV_ERROR fold into both sides for the same reason epoll's
    // error/hangup bits do: whichever side the caller is waiting on should
    // observe the condition.
    if contains_flag(kevent.flags, libc::EV_EOF) || contains_flag(kevent.flags, libc::EV_ERROR) {
        readable = true;
        writable = true;
    }

    RawEvent::Io {
        fd,
        readable,
        writable,
    }
}

fn new_kevent(ident: libc::uintptr_t, filter: kevent_filter_t, flags: kevent_flags_t) -> libc::kevent {
    libc::kevent {
        ident,
        filter,
        flags,
        fflags: 0,
        data: 0,
        udata: zero_udata(),
    }
}

/// Submit a change-only `kevent` call (no output slots): filter errors are
/// reported per-change via `EV_RECEIPT` rather than mixed into event
/// delivery, and this call never shares a syscall with the `wait`-driving
/// one.
fn kevent_register(
    kq: RawFd,
    changes: &mut [libc::kevent],
    ignored_errors: &[kevent_data_t],
) -> Result<()> {
    let ok = unsafe {
        libc::kevent(
            kq,
            changes.as_ptr(),
            changes.len() as nchanges_t,
            changes.as_mut_ptr(),
            changes.len() as nchanges_t,
            ptr::null(),
        )
    };

    if ok == -1 {
        // Per the FreeBSD manual: "When kevent() call fails with EINTR
        // error, all changes in the changelist have been applied" -- so
        // unlike every other syscall in this crate, EINTR here means
        // success, not "retry".
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => Ok(()),
            _ => Err(SelectorError::syscall("kevent (changelist)", err)),
        }
    } else {
        check_errors(changes, ignored_errors)
    }
}

fn check_errors(events: &[libc::kevent], ignored_errors: &[kevent_data_t]) -> Result<()> {
    for event in events {
        let data = event.data;
        if contains_flag(event.flags, libc::EV_ERROR) && data != 0 && !ignored_errors.contains(&data) {
            return Err(SelectorError::syscall(
                "kevent (changelist)",
                io::Error::from_raw_os_error(data as i32),
            ));
        }
    }
    Ok(())
}

fn contains_flag(flags: kevent_flags_t, flag: kevent_flags_t) -> bool {
    (flags & flag) != 0
}

#[derive(Debug)]
pub struct Waker {
    kq: RawFd,
}

impl Waker {
    pub fn new(selector: &Selector) -> Result<Waker> {
        let kq = unsafe { libc::dup(selector.kq) };
        if kq == -1 {
            return Err(last_os_error("dup"));
        }
        let waker = Waker { kq };
        let mut arm = new_kevent(
            0,
            libc::EVFILT_USER,
            libc::EV_ADD | libc::EV_CLEAR | libc::EV_RECEIPT,
        );
        arm.udata = zero_udata();
        if let Err(err) = kevent_register(waker.kq, &mut [arm], &[]) {
            unsafe { libc::close(kq) };
            return Err(err);
        }
        Ok(waker)
    }

    pub fn fd(&self) -> RawFd {
        self.kq
    }

    pub fn wake(&self) -> Result<()> {
        let mut trigger = new_kevent(
            0,
            libc::EVFILT_USER,
            libc::EV_ADD | libc::EV_CLEAR | libc::EV_RECEIPT,
        );
        trigger.fflags = libc::NOTE_TRIGGER;
        kevent_register(self.kq, &mut [trigger], &[])
    }

    /// No-op on this backend: `EV_CLEAR` already clears the user event's
    /// trigger state as part of `kevent` returning it, so there is no
    /// separate counter to drain the way the epoll eventfd needs one.
    pub(crate) fn drain(&self) {}
}

impl Drop for Waker {
    fn drop(&mut self) {
        if unsafe { libc::close(self.kq) } == -1 {
            error!("error closing waker kqueue descriptor: {}", io::Error::last_os_error());
        }
    }
}
