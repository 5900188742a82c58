//! The one cross-thread-safe handle in this crate.

use std::sync::Arc;

use crate::error::Result;
use crate::sys::unix::Waker as RawWaker;

/// A handle that interrupts a blocked [`Selector::wait`] from any thread.
///
/// Obtained from a [`Selector`] via [`Selector::waker`]. Cloning is cheap:
/// every clone, and the `Selector` it came from, share the same underlying
/// wake source (an eventfd on Linux, a duplicated kqueue descriptor on
/// BSD/Darwin). That source is only actually closed once every clone has
/// been dropped, which is what lets [`wake`] remain safe to call
/// concurrently with [`Selector::close`]: `close` tears down the readiness
/// handle itself but never the wake source.
///
/// [`Selector`]: crate::selector::Selector
/// [`Selector::waker`]: crate::selector::Selector::waker
/// [`Selector::close`]: crate::selector::Selector::close
/// [`wake`]: Waker::wake
#[derive(Clone, Debug)]
pub struct Waker {
    inner: Arc<RawWaker>,
}

impl Waker {
    pub(crate) fn new(inner: Arc<RawWaker>) -> Waker {
        Waker { inner }
    }

    /// Cause the next (or an in-progress) call to [`Selector::wait`] to
    /// return promptly. Always succeeds unless the wake source itself is
    /// broken; a `wait` that is not currently blocked still latches the
    /// wake for its next call.
    ///
    /// [`Selector::wait`]: crate::selector::Selector::wait
    pub fn wake(&self) -> Result<()> {
        self.inner.wake()
    }
}
