//! Process-wide SIGPIPE policy.
//!
//! By default a write to a socket whose peer has gone away raises SIGPIPE,
//! which terminates the process. Any program writing to sockets through
//! this crate must call [`ignore_broken_pipe`] once before relying on
//! `write_all` reporting `EPIPE` instead.

use crate::error::{SocketError, errno, report};

/// Sets the SIGPIPE disposition to `SIG_IGN`.
///
/// Afterwards a write to a closed peer fails with `EPIPE`. The disposition
/// lasts for the life of the process and is inherited across exec().
/// Calling this again reinstalls the same disposition.
pub fn ignore_broken_pipe() -> Result<(), SocketError> {
	report("ignore_broken_pipe", install_ignore())
}

fn install_ignore() -> Result<(), SocketError> {
	let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
	action.sa_sigaction = libc::SIG_IGN;
	action.sa_flags = 0;
	unsafe { libc::sigemptyset(&mut action.sa_mask) };

	let result = unsafe { libc::sigaction(libc::SIGPIPE, &action, std::ptr::null_mut()) };
	if result == -1 {
		return Err(SocketError::Signal { errno: errno() });
	}

	tracing::debug!("SIGPIPE disposition set to SIG_IGN");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn current_disposition() -> libc::sighandler_t {
		let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
		let rc = unsafe { libc::sigaction(libc::SIGPIPE, std::ptr::null(), &mut old) };
		assert_eq!(rc, 0);
		old.sa_sigaction
	}

	#[test]
	fn installs_ignore_idempotently() {
		ignore_broken_pipe().expect("first install");
		ignore_broken_pipe().expect("second install");
		assert_eq!(current_disposition(), libc::SIG_IGN);
	}
}
