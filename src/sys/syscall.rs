//! Thin retry wrapper shared by the `epoll` and `kqueue` backends.

use std::io;

use crate::error::SelectorError;

/// Build a [`SelectorError`] from the current `errno`, labelled `name`.
pub(crate) fn last_os_error(name: &'static str) -> SelectorError {
    SelectorError::syscall(name, io::Error::last_os_error())
}

/// Invoke `f`, retrying transparently on `EINTR`; any other failure (`f`
/// returning `-1`) is converted into a labelled [`SelectorError`].
///
/// The one documented exception — a kqueue change-list application that
/// fails with `EINTR` still having applied every change — is handled
/// separately in `sys::unix::kqueue`, since there `EINTR` means success
/// rather than "retry".
pub(crate) fn retry_on_eintr<F>(name: &'static str, mut f: F) -> Result<libc::c_int, SelectorError>
where
    F: FnMut() -> libc::c_int,
{
    loop {
        let ret = f();
        if ret == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(SelectorError::syscall(name, err));
        }
        return Ok(ret);
    }
}
