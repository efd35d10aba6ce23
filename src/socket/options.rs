use std::os::fd::AsRawFd;
use crate::error::{SocketError, errno};

/// Sets SO_REUSEADDR on a socket.
///
/// Allows binding to an address that's in TIME_WAIT state.
/// Essential for server restarts.
pub fn set_reuse_addr<S: AsRawFd>(socket: &S, enable: bool) -> Result<(), SocketError> {
	let val: libc::c_int = if enable { 1 } else { 0 };
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_REUSEADDR,
			&val as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option: "SO_REUSEADDR" })
	} else {
		Ok(())
	}
}

/// Sets or clears `O_NONBLOCK` on a descriptor.
///
/// Reads the current status flags, masks the bit in or out and writes them
/// back. Either step failing fails the whole call.
///
/// Affects whether connect() returns before the handshake finishes and
/// whether accept() waits for a connection.
pub fn set_nonblocking<S: AsRawFd>(socket: &S, nonblocking: bool) -> Result<(), SocketError> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" });
	}

	let new_flags = if nonblocking {
		flags | libc::O_NONBLOCK
	} else {
		flags & !libc::O_NONBLOCK
	};

	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFL, new_flags) };
	if result == -1 {
		return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" });
	}
	Ok(())
}

/// Reads and clears the socket's latched error (SO_ERROR).
///
/// `Ok(0)` means no error is pending. Call this once the readiness
/// mechanism reports a non-blocking connect as writable.
pub fn take_error<S: AsRawFd>(socket: &S) -> Result<i32, SocketError> {
	let mut error: libc::c_int = 0;
	let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			libc::SOL_SOCKET,
			libc::SO_ERROR,
			&mut error as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};

	if result == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "SO_ERROR" });
	}
	Ok(error)
}

/// Latched socket error, `0` when none is pending or the query itself fails.
pub fn check_pending_error<S: AsRawFd>(socket: &S) -> i32 {
	take_error(socket).unwrap_or(0)
}

/*
 Breaking take_error() down:
  ┌───────────────────────────────────────────┬───────────────────────────────────────────┐
  │                   Line                    │                  Purpose                  │
  ├───────────────────────────────────────────┼───────────────────────────────────────────┤
  │ let mut error: libc::c_int = 0            │ Kernel writes the error code here         │
  │ libc::SOL_SOCKET                          │ Socket-level option (not TCP/IP specific) │
  │ libc::SO_ERROR                            │ The specific option we want               │
  │ error == 0                                │ Zero means no error, connect succeeded    │
  └───────────────────────────────────────────┴───────────────────────────────────────────┘
 */
