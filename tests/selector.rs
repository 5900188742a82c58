use std::os::unix::io::RawFd;
use std::thread;
use std::time::{Duration, Instant};

use sluice::{IOEvent, Registration, Selectable, Selector, SelectorError, Strategy};

#[path = "util/mod.rs"]
mod util;

use util::{close, new_pipe, ClosedFdHandle, RawFdHandle, TestIo};

const MARGIN: Duration = Duration::from_millis(150);

#[test]
fn basic_readability() {
    util::init();

    let (r, w) = new_pipe();
    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let handle = RawFdHandle(r);
    selector
        .register(&handle, IOEvent::Read, |interested| TestIo::new(r, interested, "reader"))
        .expect("register");

    assert_eq!(unsafe { libc::write(w, b"x".as_ptr() as *const _, 1) }, 1);

    let mut dispatched = 0;
    selector
        .wait(Strategy::Block, |readable, writable, registration: &mut TestIo| {
            dispatched += 1;
            assert!(readable);
            assert!(!writable);
            assert_eq!(registration.fd, r);
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("wait");

    assert_eq!(dispatched, 1);
    close(r);
    close(w);
}

#[test]
fn interest_transition() {
    util::init();

    let (r, w) = new_pipe();
    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let handle = RawFdHandle(r);
    selector
        .register(&handle, IOEvent::Read, |interested| TestIo::new(r, interested, "reader"))
        .expect("register");

    assert_eq!(unsafe { libc::write(w, b"x".as_ptr() as *const _, 1) }, 1);

    // Drop interest in readability; a `now` wait should see nothing for `r`.
    selector.reregister(&handle, IOEvent::Write).expect("reregister to write");

    let mut dispatched = 0;
    selector
        .wait(Strategy::Now, |_, _, _: &mut TestIo| {
            dispatched += 1;
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("wait");
    assert_eq!(dispatched, 0, "should not observe readability while uninterested in it");

    selector.reregister(&handle, IOEvent::All).expect("reregister to all");
    let mut saw_readable = false;
    selector
        .wait(Strategy::Now, |readable, _, _: &mut TestIo| {
            saw_readable |= readable;
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("wait");
    assert!(saw_readable, "should observe readability once interested again");

    close(r);
    close(w);
}

#[test]
fn wake_correctness() {
    util::init();

    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let waker = selector.waker();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        waker.wake().expect("wake");
    });

    let start = Instant::now();
    let mut dispatched = 0;
    selector
        .wait(Strategy::Block, |_, _, _: &mut TestIo| {
            dispatched += 1;
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("wait");
    let elapsed = start.elapsed();

    handle.join().unwrap();
    assert_eq!(dispatched, 0, "a wake should not deliver a spurious event");
    assert!(elapsed < Duration::from_millis(500), "wait should return promptly after wake, took {:?}", elapsed);
}

#[test]
fn timed_wait_respects_deadline() {
    util::init();

    let mut selector = Selector::<TestIo>::new().expect("create selector");

    let start = Instant::now();
    let mut dispatched = 0;
    selector
        .wait(Strategy::BlockUntilTimeout(Duration::from_millis(50)), |_, _, _: &mut TestIo| {
            dispatched += 1;
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("wait");
    let elapsed = start.elapsed();

    assert_eq!(dispatched, 0);
    assert!(elapsed >= Duration::from_millis(50), "returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(50) + MARGIN, "returned too late: {:?}", elapsed);
}

#[test]
fn deregister_before_wait_suppresses_queued_events() {
    util::init();

    let (r, w) = new_pipe();
    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let handle = RawFdHandle(r);
    selector
        .register(&handle, IOEvent::Read, |interested| TestIo::new(r, interested, "reader"))
        .expect("register");

    assert_eq!(unsafe { libc::write(w, b"x".as_ptr() as *const _, 1) }, 1);
    selector.deregister(&handle).expect("deregister");

    let mut dispatched = 0;
    selector
        .wait(Strategy::Now, |_, _, _: &mut TestIo| {
            dispatched += 1;
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("wait");
    assert_eq!(dispatched, 0, "deregistered descriptor must not dispatch");

    close(r);
    close(w);
}

#[test]
fn error_folds_into_both_sides() {
    util::init();

    let mut fds = [0i32; 2];
    let ret = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr()) };
    assert_eq!(ret, 0);
    let (a, b) = (fds[0], fds[1]);
    for &fd in &[a, b] {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    }

    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let handle = RawFdHandle(a);
    selector
        .register(&handle, IOEvent::Write, |interested| TestIo::new(a, interested, "peer"))
        .expect("register");

    close(b);

    let mut saw_readable = false;
    selector
        .wait(Strategy::Block, |readable, _writable, _: &mut TestIo| {
            saw_readable = readable;
            Ok::<(), std::convert::Infallible>(())
        })
        .expect("wait");

    assert!(saw_readable, "hangup must fold into readability regardless of requested interest");
    close(a);
}

#[test]
fn register_rejects_duplicate() {
    util::init();

    let (r, w) = new_pipe();
    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let handle = RawFdHandle(r);
    selector
        .register(&handle, IOEvent::Read, |interested| TestIo::new(r, interested, "reader"))
        .expect("first register");

    let err = selector
        .register(&handle, IOEvent::Read, |interested| TestIo::new(r, interested, "reader"))
        .unwrap_err();
    assert!(matches!(err, SelectorError::AlreadyRegistered));

    close(r);
    close(w);
}

#[test]
fn register_rejects_closed_selectable() {
    util::init();

    let (r, w) = new_pipe();
    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let handle = ClosedFdHandle(r);

    let err = selector
        .register(&handle, IOEvent::Read, |interested| TestIo::new(r, interested, "reader"))
        .unwrap_err();
    assert!(matches!(err, SelectorError::SelectableNotOpen));

    close(r);
    close(w);
}

#[test]
fn operations_fail_after_close() {
    util::init();

    let (r, w) = new_pipe();
    let mut selector = Selector::<TestIo>::new().expect("create selector");
    let handle = RawFdHandle(r);
    selector
        .register(&handle, IOEvent::Read, |interested| TestIo::new(r, interested, "reader"))
        .expect("register");

    selector.close().expect("close");

    assert!(matches!(selector.close(), Err(SelectorError::NotOpen)));
    assert!(matches!(
        selector.reregister(&handle, IOEvent::All),
        Err(SelectorError::NotOpen)
    ));
    assert!(matches!(
        selector.wait(Strategy::Now, |_, _, _: &mut TestIo| Ok::<(), std::convert::Infallible>(())),
        Err(SelectorError::NotOpen)
    ));

    close(r);
    close(w);
}

#[test]
fn gentle_close_notifies_every_registration() {
    util::init();

    let (r1, w1) = new_pipe();
    let (r2, w2) = new_pipe();
    let mut selector = Selector::<TestIo>::new().expect("create selector");
    selector
        .register(&RawFdHandle(r1), IOEvent::Read, |interested| TestIo::new(r1, interested, "one"))
        .expect("register 1");
    selector
        .register(&RawFdHandle(r2), IOEvent::Read, |interested| TestIo::new(r2, interested, "two"))
        .expect("register 2");

    let mut closed: Vec<RawFd> = Vec::new();
    selector
        .gentle_close(|registration: &mut TestIo| closed.push(registration.fd))
        .expect("gentle close");

    closed.sort();
    assert_eq!(closed, vec![r1.min(r2), r1.max(r2)]);
    assert!(matches!(selector.close(), Err(SelectorError::NotOpen)));

    for fd in [r1, w1, r2, w2] {
        close(fd);
    }
}
