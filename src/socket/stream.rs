use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::marker::PhantomData;
use crate::addr::{Domain, FromSockAddr};
use crate::error::{IoError, SocketError, errno};
use crate::transfer::{self, Shutdown};
use super::options::set_nonblocking;

/// A connected stream socket.
///
/// Represents an established connection, ready for read/write.
/// Created by `Listener::accept()` (server), `ConnectorBuilder` (client)
/// or `PendingConnect::finish()`.
pub struct ConnectedStream<D: Domain> {
	fd: OwnedFd,
	_marker: PhantomData<D>,
}

impl<D: Domain> ConnectedStream<D> {
	pub(crate) fn from_fd(fd: OwnedFd) -> Self {
		Self {
			fd,
			_marker: PhantomData,
		}
	}

	/// Returns the raw file descriptor.
	#[inline]
	pub fn as_raw_fd(&self) -> libc::c_int {
		self.fd.as_raw_fd()
	}

	pub fn read(&self, buf: &mut [u8]) -> Result<usize, IoError> {
		loop {
			let n = unsafe {
				libc::read(
					self.as_raw_fd(),
					buf.as_mut_ptr() as *mut libc::c_void,
					buf.len(),
				)
			};

			if n >= 0 {
				return Ok(n as usize);
			}
			let e = errno();
			if e != libc::EINTR {
				return Err(IoError::Read { errno: e });
			}
		}
	}

	/// One successful write(); may send fewer bytes than `buf` holds.
	///
	/// Retries `EINTR` like `read`.
	pub fn write(&self, buf: &[u8]) -> Result<usize, IoError> {
		loop {
			let n = unsafe {
				libc::write(
					self.as_raw_fd(),
					buf.as_ptr() as *const libc::c_void,
					buf.len(),
				)
			};

			if n >= 0 {
				return Ok(n as usize);
			}
			let e = errno();
			if e != libc::EINTR {
				return Err(IoError::Write { errno: e });
			}
		}
	}

	/// Sends the whole buffer, continuing after short writes.
	pub fn write_all(&self, buf: &[u8]) -> Result<(), IoError> {
		transfer::write_all(self, buf)
	}

	pub fn shutdown(&self, how: Shutdown) -> Result<(), IoError> {
		transfer::shutdown(self, how)
	}

	pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), SocketError> {
		set_nonblocking(self, nonblocking)
	}
}

impl<D: Domain> ConnectedStream<D>
where
	D::Addr: FromSockAddr,
{
	/// Returns the remote address of this connection.
	pub fn peer_addr(&self) -> Result<D::Addr, SocketError> {
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

		let result = unsafe {
			libc::getpeername(
				self.as_raw_fd(),
				&mut storage as *mut _ as *mut libc::sockaddr,
				&mut len,
			)
		};

		if result == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "SO_PEERNAME" });
		}

		unsafe { D::Addr::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) }
			.ok_or(SocketError::GetOption { errno: libc::EAFNOSUPPORT, option: "SO_PEERNAME" })
	}

	/// Returns the local address of this connection.
	pub fn local_addr(&self) -> Result<D::Addr, SocketError> {
		super::listener::local_addr::<D>(self.as_raw_fd())
	}
}

impl<D: Domain> AsRawFd for ConnectedStream<D> {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl<D: Domain> std::os::fd::AsFd for ConnectedStream<D> {
	fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
		self.fd.as_fd()
	}
}

impl<D: Domain> std::io::Read for ConnectedStream<D> {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
		Ok(ConnectedStream::read(self, buf)?)
	}
}

impl<D: Domain> std::io::Write for ConnectedStream<D> {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		Ok(ConnectedStream::write(self, buf)?)
	}

	fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
		Ok(ConnectedStream::write_all(self, buf)?)
	}

	fn flush(&mut self) -> std::io::Result<()> {
		Ok(())  // nothing is buffered at this level
	}
}

impl<D: Domain> FromRawFd for ConnectedStream<D> {
	unsafe fn from_raw_fd(fd: RawFd) -> Self {
		unsafe { Self::from_fd(OwnedFd::from_raw_fd(fd)) }
	}
}

impl<D: Domain> IntoRawFd for ConnectedStream<D> {
	fn into_raw_fd(self) -> RawFd {
		self.fd.into_raw_fd()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use crate::addr::Unix;

	extern "C" fn on_signal(_: libc::c_int) {}

	fn stream_pair() -> (ConnectedStream<Unix>, ConnectedStream<Unix>) {
		let mut fds = [0; 2];
		let rc = unsafe { libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0, fds.as_mut_ptr()) };
		assert_eq!(rc, 0);
		unsafe { (ConnectedStream::from_raw_fd(fds[0]), ConnectedStream::from_raw_fd(fds[1])) }
	}

	/// Fills the send side until the kernel refuses more; returns the byte count.
	fn fill(stream: &ConnectedStream<Unix>) -> usize {
		stream.set_nonblocking(true).expect("nonblocking");
		let chunk = [0u8; 4096];
		let mut total = 0;
		for len in [chunk.len(), 1] {
			loop {
				match stream.write(&chunk[..len]) {
					Ok(n) => total += n,
					Err(IoError::Write { errno }) if errno == libc::EAGAIN => break,
					Err(other) => panic!("unexpected error: {other}"),
				}
			}
		}
		stream.set_nonblocking(false).expect("blocking");
		total
	}

	#[test]
	fn write_resumes_after_signal_interrupt() {
		// no SA_RESTART, so a blocked write() comes back with EINTR
		let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
		action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
		action.sa_flags = 0;
		unsafe { libc::sigemptyset(&mut action.sa_mask) };
		assert_eq!(unsafe { libc::sigaction(libc::SIGUSR1, &action, std::ptr::null_mut()) }, 0);

		let (writer, reader) = stream_pair();
		let queued = fill(&writer);
		let target = unsafe { libc::pthread_self() };

		let drainer = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(100));
			unsafe { libc::pthread_kill(target, libc::SIGUSR1) };
			std::thread::sleep(Duration::from_millis(100));

			let mut buf = [0u8; 8192];
			let mut total = 0;
			while total < queued + 1 {
				let n = reader.read(&mut buf).expect("drain");
				assert!(n > 0);
				total += n;
			}
			total
		});

		assert_eq!(writer.write(b"x").expect("write after EINTR"), 1);
		assert_eq!(drainer.join().expect("drainer"), queued + 1);
	}
}
