use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::marker::PhantomData;
use crate::addr::{Domain, ToSockAddr};
use crate::error::{ConnectError, ListenError, SocketError, errno};
use super::bound::BoundSocket;
use super::options::set_nonblocking;

/// A stream socket that has been created but not yet bound or connected.
///
/// This is the starting point for every socket this crate opens.
/// Use `.bind()` to move towards a listener, `.connect()` for a client.
/// Dropping it closes the descriptor.
pub(crate) struct RawSocket<D: Domain> {
	fd: OwnedFd,
	_marker: PhantomData<D>,
}

impl<D: Domain> RawSocket<D> {
	/// Creates a new stream socket.
	///
	/// The socket is created with `SOCK_CLOEXEC` (close on exec).
	/// On failure the raw errno is returned for the caller to classify.
	pub(crate) fn new() -> Result<Self, i32> {
		let fd = unsafe {
			libc::socket(D::raw(), libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0)
		};
		if fd == -1 {
			return Err(errno());
		}
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };

		Ok(Self {
			fd,
			_marker: PhantomData,
		})
	}

	pub(crate) fn set_nonblocking(&self, nonblocking: bool) -> Result<(), SocketError> {
		set_nonblocking(self, nonblocking)
	}

	/// Binds the socket to an address.
	///
	/// Consumes self, returns BoundSocket.
	pub(crate) fn bind(self, addr: &D::Addr) -> Result<BoundSocket<D>, ListenError> {
		let result = addr.with_raw(|ptr, len| unsafe {
			libc::bind(self.as_raw_fd(), ptr, len)
		});

		match result {
			Some(-1) => Err(ListenError::Bind {
				errno: errno(),
				addr: format!("{:?}", addr),
			}),
			Some(_) => Ok(BoundSocket::from_fd(self.into_fd())),
			None => Err(ListenError::PathTooLong {
				addr: format!("{:?}", addr),
			}),
		}
	}

	/// Issues connect(), retrying the same call while it is interrupted.
	///
	/// `EINPROGRESS` counts as success: on a non-blocking socket the
	/// handshake finishes later. A retry after `EINTR` may find the first
	/// attempt already completed, reported as `EISCONN`.
	pub(crate) fn connect(&self, addr: &D::Addr) -> Result<(), ConnectError> {
		let mut retried = false;
		loop {
			let result = addr.with_raw(|ptr, len| unsafe {
				libc::connect(self.as_raw_fd(), ptr, len)
			});

			let e = match result {
				Some(0) => return Ok(()),
				Some(_) => errno(),
				None => return Err(ConnectError::PathTooLong {
					addr: format!("{:?}", addr),
				}),
			};

			match e {
				libc::EINTR => {
					retried = true;
					continue;
				}
				libc::EINPROGRESS => return Ok(()),
				libc::EISCONN if retried => return Ok(()),
				libc::EAGAIN if D::CONNECT_AGAIN_PENDING => return Ok(()),
				_ => return Err(ConnectError::Connect {
					errno: e,
					addr: format!("{:?}", addr),
				}),
			}
		}
	}

	pub(crate) fn into_fd(self) -> OwnedFd {
		self.fd
	}
}
/*
What new() does:
1. D::raw(): gets AF_INET, AF_INET6, or AF_UNIX
2. SOCK_STREAM: every socket here is a byte stream
3. SOCK_CLOEXEC: closes fd if process calls exec()
4. Returns OwnedFd: auto-closes on drop, so every early return
   on a failure path releases the descriptor
 */

impl<D: Domain> AsRawFd for RawSocket<D> {
	fn as_raw_fd(&self) -> std::os::fd::RawFd {
		self.fd.as_raw_fd()
	}
}
