use std::io;
use std::mem;
use std::os::unix::io::RawFd;

use log::error;

use crate::error::Result;
use crate::interest::IOEvent;
use crate::strategy::Strategy;
use crate::sys::syscall::{last_os_error, retry_on_eintr};
use crate::sys::unix::RawEvent;

#[derive(Debug)]
pub struct Selector {
    epfd: RawFd,
    timer_fd: RawFd,
}

impl Selector {
    pub fn new() -> Result<Selector> {
        let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epfd == -1 {
            return Err(last_os_error("epoll_create1"));
        }

        let timer_fd = unsafe {
            libc::timerfd_create(
                libc::CLOCK_MONOTONIC,
                libc::TFD_CLOEXEC | libc::TFD_NONBLOCK,
            )
        };
        if timer_fd == -1 {
            let err = last_os_error("timerfd_create");
            unsafe { libc::close(epfd) };
            return Err(err);
        }

        let selector = Selector { epfd, timer_fd };
        if let Err(err) = selector.register_aux(timer_fd, libc::EPOLLIN as u32) {
            unsafe {
                libc::close(epfd);
                libc::close(timer_fd);
            }
            return Err(err);
        }
        Ok(selector)
    }

    /// Add an auxiliary (non-caller-owned) descriptor, tokened by its own
    /// fd value. Used for the timer and, from `Waker::new`, the eventfd.
    fn register_aux(&self, fd: RawFd, events: u32) -> Result<()> {
        let mut event = libc::epoll_event {
            events,
            u64: fd as u64,
        };
        epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut event)
    }

    pub fn add(&self, fd: RawFd, interest: IOEvent) -> Result<()> {
        let mut event = new_epoll_event(interest, fd as u64);
        epoll_ctl(self.epfd, libc::EPOLL_CTL_ADD, fd, &mut event)
    }

    pub fn modify(&self, fd: RawFd, _old: IOEvent, new: IOEvent) -> Result<()> {
        let mut event = new_epoll_event(new, fd as u64);
        epoll_ctl(self.epfd, libc::EPOLL_CTL_MOD, fd, &mut event)
    }

    pub fn delete(&self, fd: RawFd, _old: IOEvent) -> Result<()> {
        epoll_ctl(self.epfd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
    }

    pub fn wait(&self, events: &mut Vec<RawEvent>, strategy: Strategy) -> Result<()> {
        let timeout_ms = match strategy {
            Strategy::Now => 0,
            Strategy::Block => -1,
            Strategy::BlockUntilTimeout(duration) => {
                if duration.as_nanos() == 0 {
                    0
                } else {
                    arm_timer(self.timer_fd, duration)?;
                    -1
                }
            }
        };

        let cap = events.capacity();
        let mut buf: Vec<libc::epoll_event> = Vec::with_capacity(cap);
        let n = retry_on_eintr("epoll_wait", || unsafe {
            libc::epoll_wait(self.epfd, buf.as_mut_ptr(), cap as libc::c_int, timeout_ms)
        })?;
        unsafe { buf.set_len(n as usize) };

        for raw in &buf {
            let fd = raw.u64 as RawFd;
            if fd == self.timer_fd {
                drain_timer(self.timer_fd);
                events.push(RawEvent::Timer);
            } else {
                events.push(ep_event_to_raw_event(fd, raw.events));
            }
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        let epfd = mem::replace(&mut self.epfd, -1);
        let timer_fd = mem::replace(&mut self.timer_fd, -1);
        if epfd != -1 && unsafe { libc::close(epfd) } == -1 {
            return Err(last_os_error("close (epoll)"));
        }
        if timer_fd != -1 && unsafe { libc::close(timer_fd) } == -1 {
            return Err(last_os_error("close (timerfd)"));
        }
        Ok(())
    }
}

fn arm_timer(timer_fd: RawFd, duration: std::time::Duration) -> Result<()> {
    let spec = libc::itimerspec {
        it_interval: libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        },
        it_value: libc::timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: libc::c_long::from(duration.subsec_nanos() as i32),
        },
    };
    let ret = retry_on_eintr("timerfd_settime", || unsafe {
        libc::timerfd_settime(timer_fd, 0, &spec, std::ptr::null_mut())
    })?;
    let _ = ret;
    Ok(())
}

fn drain_timer(timer_fd: RawFd) {
    let mut buf = [0u8; 8];
    let ret = unsafe { libc::read(timer_fd, buf.as_mut_ptr() as *mut libc::c_void, 8) };
    if ret == -1 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::WouldBlock {
            error!("error draining deadline timer: {}", err);
        }
    }
}

/// Convert an `epoll_event` into a [`RawEvent::Io`].
///
/// Error and hangup bits are folded into *both* readability and
/// writability: the upstream layer only needs one of them to wake, and
/// probing the descriptor on either side observes the same failure.
fn ep_event_to_raw_event(fd: RawFd, events: u32) -> RawEvent {
    let mut readable = contains_flag(events, libc::EPOLLIN as u32);
    let mut writable = contains_flag(events, libc::EPOLLOUT as u32);

    if contains_flag(events, libc::EPOLLERR as u32)
        || contains_flag(events, libc::EPOLLRDHUP as u32)
        || contains_flag(events, libc::EPOLLHUP as u32)
    {
        readable = true;
        writable = true;
    }

    RawEvent::Io {
        fd,
        readable,
        writable,
    }
}

fn contains_flag(flags: u32, flag: u32) -> bool {
    (flags & flag) != 0
}

fn new_epoll_event(interest: IOEvent, token: u64) -> libc::epoll_event {
    libc::epoll_event {
        events: to_epoll_events(interest),
        u64: token,
    }
}

fn to_epoll_events(interest: IOEvent) -> u32 {
    let mut events = (libc::EPOLLERR | libc::EPOLLRDHUP) as u32;
    if interest.is_readable() {
        events |= libc::EPOLLIN as u32;
    }
    if interest.is_writable() {
        events |= libc::EPOLLOUT as u32;
    }
    events
}

fn epoll_ctl(epfd: RawFd, op: libc::c_int, fd: RawFd, event: *mut libc::epoll_event) -> Result<()> {
    if unsafe { libc::epoll_ctl(epfd, op, fd, event) } == -1 {
        // Possible errors: EBADF, EEXIST, ENOENT, EPERM: user error.
        // EINVAL, ELOOP: shouldn't happen. ENOMEM, ENOSPC: can't handle.
        Err(last_os_error("epoll_ctl"))
    } else {
        Ok(())
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        if self.epfd != -1 {
            if unsafe { libc::close(self.epfd) } == -1 {
                error!("error closing epoll: {}", io::Error::last_os_error());
            }
        }
        if self.timer_fd != -1 {
            if unsafe { libc::close(self.timer_fd) } == -1 {
                error!("error closing deadline timerfd: {}", io::Error::last_os_error());
            }
        }
    }
}

#[derive(Debug)]
pub struct Waker {
    fd: RawFd,
}

impl Waker {
    pub fn new(selector: &Selector) -> Result<Waker> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd == -1 {
            return Err(last_os_error("eventfd"));
        }
        // Edge-triggered: we always drain the counter ourselves, so level
        // re-delivery would just mean reading it twice for no benefit.
        if let Err(err) = selector.register_aux(fd, (libc::EPOLLIN | libc::EPOLLET) as u32) {
            unsafe { libc::close(fd) };
            return Err(err);
        }
        Ok(Waker { fd })
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn wake(&self) -> Result<()> {
        let buf = 1u64.to_ne_bytes();
        match unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, 8) } {
            -1 => {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    // Writing only blocks if the counter is about to
                    // overflow; reset it and try again.
                    self.drain();
                    self.wake()
                } else {
                    Err(crate::error::SelectorError::syscall("write (eventfd)", err))
                }
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn drain(&self) {
        let mut buf = [0u8; 8];
        let ret = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, 8) };
        if ret == -1 {
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::WouldBlock {
                error!("error draining waker: {}", err);
            }
        }
    }
}

impl Drop for Waker {
    fn drop(&mut self) {
        if unsafe { libc::close(self.fd) } == -1 {
            error!("error closing waker eventfd: {}", io::Error::last_os_error());
        }
    }
}
