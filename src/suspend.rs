//! Host notification around blocking syscalls.
//!
//! Address resolution, blocking connect and blocking accept can park the
//! calling thread for a long time. A host that multiplexes logical tasks
//! onto OS threads (a garbage-collected runtime, a green-thread scheduler)
//! needs to know when that happens so it can keep other tasks running and
//! keep argument buffers from moving underneath the kernel.
//!
//! The host supplies a [`SuspendHook`]. Freestanding programs use
//! [`NoSuspend`].

use crate::error::{errno, set_errno};

/// Callbacks bracketing a syscall that may block.
///
/// `before_blocking_call` pins whatever buffers the host must keep in place
/// and then releases the host's scheduler. `after_blocking_call` undoes that
/// in reverse order: reacquire the scheduler, then unpin.
///
/// Implementations may freely clobber `errno`; the caller saves it first.
pub trait SuspendHook {
    fn before_blocking_call(&self);
    fn after_blocking_call(&self);
}

/// Hook for programs with no host runtime to notify.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSuspend;

impl SuspendHook for NoSuspend {
    #[inline]
    fn before_blocking_call(&self) {}

    #[inline]
    fn after_blocking_call(&self) {}
}

impl<H: SuspendHook + ?Sized> SuspendHook for &H {
    fn before_blocking_call(&self) {
        (**self).before_blocking_call()
    }

    fn after_blocking_call(&self) {
        (**self).after_blocking_call()
    }
}

/// Runs `call` between the hook's two halves.
///
/// errno is read strictly between the syscall and `after_blocking_call`
/// and written back once the hook returns.
pub(crate) fn blocking<H, R, F>(hook: &H, call: F) -> R
where
    H: SuspendHook + ?Sized,
    F: FnOnce() -> R,
{
    hook.before_blocking_call();
    let result = call();
    let saved = errno();
    hook.after_blocking_call();
    set_errno(saved);
    result
}
