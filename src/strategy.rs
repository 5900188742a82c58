//! How long [`Selector::wait`] is willing to block.
//!
//! [`Selector::wait`]: crate::selector::Selector::wait

use std::time::Duration;

/// Controls how long a call to [`Selector::wait`] may block.
///
/// [`Selector::wait`]: crate::selector::Selector::wait
#[derive(Clone, Copy, Debug)]
pub enum Strategy {
    /// Return immediately, even if nothing is ready.
    Now,
    /// Block indefinitely until at least one event is ready, or [`wake`] is
    /// called.
    ///
    /// [`wake`]: crate::waker::Waker::wake
    Block,
    /// Block for at most the given duration.
    BlockUntilTimeout(Duration),
}
