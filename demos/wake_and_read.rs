//! Spawns a thread that writes to a pipe and wakes a `Selector` blocked in
//! `wait`, demonstrating the two ways `wait` can return: a ready
//! descriptor, and a cross-thread wake.

use std::os::unix::io::RawFd;
use std::thread;
use std::time::Duration;

use sluice::{IOEvent, Registration, Selectable, Selector, Strategy};

struct Pipe {
    fd: RawFd,
    interested: IOEvent,
}

impl Selectable for Pipe {
    fn descriptor(&self) -> RawFd {
        self.fd
    }

    fn is_open(&self) -> bool {
        true
    }
}

impl Registration for Pipe {
    fn interested(&self) -> IOEvent {
        self.interested
    }

    fn set_interested(&mut self, interest: IOEvent) {
        self.interested = interest;
    }
}

fn new_pipe() -> (RawFd, RawFd) {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        panic!("pipe(2) failed: {}", std::io::Error::last_os_error());
    }
    (fds[0], fds[1])
}

fn main() -> sluice::Result<()> {
    env_logger::init();

    let (read_fd, write_fd) = new_pipe();
    let mut selector = Selector::<Pipe>::new()?;
    let handle = Pipe { fd: read_fd, interested: IOEvent::None };
    selector.register(&handle, IOEvent::Read, |interested| Pipe { fd: read_fd, interested })?;

    let waker = selector.waker();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        waker.wake().expect("wake");
    });
    println!("waiting for a wake (nothing is writing to the pipe yet)...");
    selector.wait(Strategy::Block, |_, _, _: &mut Pipe| {
        println!("woken without a readiness event");
        Ok::<(), std::convert::Infallible>(())
    })?;

    unsafe { libc::write(write_fd, b"hi".as_ptr() as *const _, 2) };
    println!("waiting for the pipe to become readable...");
    selector.wait(Strategy::Block, |readable, _, registration: &mut Pipe| {
        if readable {
            println!("fd {} is readable", registration.fd);
        }
        Ok::<(), std::convert::Infallible>(())
    })?;

    selector.deregister(&handle)?;
    selector.close()?;
    unsafe {
        libc::close(read_fd);
        libc::close(write_fd);
    }
    Ok(())
}
