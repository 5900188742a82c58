//! The error type returned by every fallible operation in this crate.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Errors produced by a [`Selector`].
///
/// [`Selector`]: crate::selector::Selector
#[derive(Debug)]
pub enum SelectorError {
    /// The selector is not open: it was never opened successfully, is
    /// mid-[`gentle_close`], or has already been [`close`]d.
    ///
    /// [`gentle_close`]: crate::selector::Selector::gentle_close
    /// [`close`]: crate::selector::Selector::close
    NotOpen,
    /// [`register`] was called for a descriptor that is already registered.
    ///
    /// [`register`]: crate::selector::Selector::register
    AlreadyRegistered,
    /// [`reregister`] was called for a descriptor that was never
    /// registered (or was already deregistered).
    ///
    /// [`reregister`]: crate::selector::Selector::reregister
    NotRegistered,
    /// [`register`] was called with a [`Selectable`] that reports itself
    /// already closed. Distinct from [`NotOpen`](SelectorError::NotOpen):
    /// this is the descriptor's state, not the selector's.
    ///
    /// [`register`]: crate::selector::Selector::register
    /// [`Selectable`]: crate::selectable::Selectable
    SelectableNotOpen,
    /// A system call failed.
    Syscall {
        /// The syscall (or closely related operation) that failed.
        name: &'static str,
        /// The underlying OS error.
        source: io::Error,
    },
    /// The user-supplied callback passed to [`wait`] returned an error.
    ///
    /// [`wait`]: crate::selector::Selector::wait
    Callback(Box<dyn StdError + Send + Sync>),
    /// The kernel reported a filter or event shape this crate does not know
    /// how to interpret. Unrecoverable; the only user of this variant is a
    /// panic message, since the contract violation means the backend's
    /// assumptions about the kernel API no longer hold.
    InternalContractViolation(String),
}

impl SelectorError {
    pub(crate) fn syscall(name: &'static str, source: io::Error) -> SelectorError {
        SelectorError::Syscall { name, source }
    }

    pub(crate) fn contract_violation(detail: String) -> SelectorError {
        SelectorError::InternalContractViolation(detail)
    }
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::NotOpen => f.write_str("selector is not open"),
            SelectorError::AlreadyRegistered => f.write_str("descriptor is already registered"),
            SelectorError::NotRegistered => f.write_str("descriptor is not registered"),
            SelectorError::SelectableNotOpen => f.write_str("selectable is not open"),
            SelectorError::Syscall { name, source } => write!(f, "{} failed: {}", name, source),
            SelectorError::Callback(err) => write!(f, "wait callback failed: {}", err),
            SelectorError::InternalContractViolation(detail) => {
                write!(f, "internal contract violation: {}", detail)
            }
        }
    }
}

impl StdError for SelectorError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SelectorError::Syscall { source, .. } => Some(source),
            SelectorError::Callback(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Convenience alias for the result of a fallible selector operation.
pub type Result<T> = std::result::Result<T, SelectorError>;
