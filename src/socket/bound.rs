use std::os::fd::{AsRawFd, OwnedFd};
use std::marker::PhantomData;
use crate::addr::Domain;
use crate::error::{ListenError, errno};
use super::listener::Listener;

/// A socket that has been bound to an address but not yet listening.
///
/// Same structure as RawSocket. Different name = different capabilities:
/// the only way forward is `.listen()`.
pub(crate) struct BoundSocket<D: Domain> {
	fd: OwnedFd,
	_marker: PhantomData<D>,
}

impl<D: Domain> BoundSocket<D> {
	/// Internal use only - called by RawSocket::bind()
	pub(crate) fn from_fd(fd: OwnedFd) -> Self {
		Self {
			fd,
			_marker: PhantomData,
		}
	}

	/// Transitions to a listening socket.
	///
	/// `backlog`: maximum pending connections queue size.
	/// Consumes self; on failure the descriptor is closed.
	pub(crate) fn listen(self, backlog: i32) -> Result<Listener<D>, ListenError> {
		let result = unsafe {
			libc::listen(self.fd.as_raw_fd(), backlog)
		};

		if result == -1 {
			return Err(ListenError::Listen { errno: errno(), backlog });
		}

		Ok(Listener::from_fd(self.fd))
	}
}
