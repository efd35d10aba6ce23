//! Raw byte transfer and descriptor housekeeping.
//!
//! These work on any descriptor, not only sockets opened by this crate.

use std::os::fd::{AsRawFd, IntoRawFd};
use crate::error::{IoError, errno, report};

/// Which half of a connection to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
	Read,       // SHUT_RD
	Write,      // SHUT_WR
	ReadWrite,  // SHUT_RDWR
}

impl Shutdown {
	/// Maps the numeric selector used at the C boundary:
	/// `0` read, `1` write, `2` both. Anything else is `None`.
	pub fn from_selector(how: i32) -> Option<Self> {
		match how {
			0 => Some(Shutdown::Read),
			1 => Some(Shutdown::Write),
			2 => Some(Shutdown::ReadWrite),
			_ => None,
		}
	}

	fn raw(self) -> libc::c_int {
		match self {
			Shutdown::Read => libc::SHUT_RD,
			Shutdown::Write => libc::SHUT_WR,
			Shutdown::ReadWrite => libc::SHUT_RDWR,
		}
	}
}

/// Writes the whole buffer.
///
/// Keeps calling write() after short writes and retries `EINTR`. Any other
/// failure stops the loop; the error records how far it got, and `errno`
/// is left at the failing write's value.
///
/// On a non-blocking descriptor `EAGAIN` is a failure like any other.
pub fn write_all<S: AsRawFd>(fd: &S, buf: &[u8]) -> Result<(), IoError> {
	report("write_all", write_all_inner(fd.as_raw_fd(), buf))
}

fn write_all_inner(fd: libc::c_int, buf: &[u8]) -> Result<(), IoError> {
	let total = buf.len();
	let mut remaining = buf;

	while !remaining.is_empty() {
		let n = unsafe {
			libc::write(fd, remaining.as_ptr() as *const libc::c_void, remaining.len())
		};

		if n < 0 {
			let e = errno();
			if e == libc::EINTR {
				continue;
			}
			return Err(IoError::Incomplete {
				errno: e,
				written: total - remaining.len(),
				total,
			});
		}
		if n == 0 {
			return Err(IoError::WriteZero { written: total - remaining.len(), total });
		}
		remaining = &remaining[n as usize..];
	}
	Ok(())
}

/// Whether the descriptor refers to a regular file.
///
/// Three outcomes: `Ok(true)`, `Ok(false)` (socket, pipe, device, ...)
/// or `Err` when fstat() itself fails.
pub fn is_regular_file<S: AsRawFd>(fd: &S) -> Result<bool, IoError> {
	let mut stat: libc::stat = unsafe { std::mem::zeroed() };
	let result = unsafe { libc::fstat(fd.as_raw_fd(), &mut stat) };
	if result == -1 {
		return report("is_regular_file", Err(IoError::Stat { errno: errno() }));
	}
	Ok(stat.st_mode & libc::S_IFMT == libc::S_IFREG)
}

/// Shuts down one or both directions of a connection.
///
/// The descriptor stays open.
pub fn shutdown<S: AsRawFd>(fd: &S, how: Shutdown) -> Result<(), IoError> {
	let result = unsafe { libc::shutdown(fd.as_raw_fd(), how.raw()) };
	if result == -1 {
		return report("shutdown", Err(IoError::Shutdown { errno: errno() }));
	}
	Ok(())
}

/// Closes a descriptor, reporting whether close() succeeded.
///
/// Dropping an owned descriptor also closes it but swallows the result.
pub fn close<F: IntoRawFd>(fd: F) -> Result<(), IoError> {
	let result = unsafe { libc::close(fd.into_raw_fd()) };
	if result == -1 {
		return report("close", Err(IoError::Close { errno: errno() }));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Read;
	use std::os::fd::{FromRawFd, OwnedFd};

	fn pipe() -> (std::fs::File, OwnedFd) {
		let mut fds = [0; 2];
		let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
		assert_eq!(rc, 0);
		unsafe { (std::fs::File::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
	}

	#[test]
	fn selector_mapping() {
		assert_eq!(Shutdown::from_selector(0), Some(Shutdown::Read));
		assert_eq!(Shutdown::from_selector(1), Some(Shutdown::Write));
		assert_eq!(Shutdown::from_selector(2), Some(Shutdown::ReadWrite));
		assert_eq!(Shutdown::from_selector(3), None);
		assert_eq!(Shutdown::from_selector(-1), None);
	}

	#[test]
	fn write_all_through_pipe() {
		let (mut reader, writer) = pipe();
		write_all(&writer, b"hello pipe").expect("write_all");
		drop(writer);
		let mut out = Vec::new();
		reader.read_to_end(&mut out).expect("read");
		assert_eq!(out, b"hello pipe");
	}

	#[test]
	fn empty_buffer_is_trivially_sent() {
		let (_reader, writer) = pipe();
		write_all(&writer, &[]).expect("nothing to write");
	}

	#[test]
	fn write_all_reports_progress_on_failure() {
		let (reader, writer) = pipe();
		crate::socket::set_nonblocking(&writer, true).expect("nonblocking");
		// a pipe holds 64 KiB by default; 1 MiB cannot fit without a reader
		let payload = vec![7u8; 1 << 20];
		let err = write_all(&writer, &payload).unwrap_err();
		match err {
			IoError::Incomplete { errno, written, total } => {
				assert_eq!(errno, libc::EAGAIN);
				assert!(written > 0 && written < total);
				assert_eq!(total, payload.len());
			}
			other => panic!("unexpected error: {other}"),
		}
		assert_eq!(crate::last_os_error(), libc::EAGAIN);
		drop(reader);
	}

	#[test]
	fn regular_file_classification() {
		let file = tempfile::tempfile().expect("tempfile");
		assert!(is_regular_file(&file).expect("fstat file"));

		let (reader, _writer) = pipe();
		assert!(!is_regular_file(&reader).expect("fstat pipe"));
	}

	#[test]
	fn close_reports_success() {
		let (reader, writer) = pipe();
		close(writer).expect("close writer");
		close(reader).expect("close reader");
	}
}
