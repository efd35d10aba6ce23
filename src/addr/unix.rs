use std::ffi::CString;
use std::mem::offset_of;
use crate::addr::{Domain, ToSockAddr};

/// Unix domain socket marker.
///
/// Sockets with this domain use filesystem paths (e.g., /tmp/app.sock).
/// Only works on the same machine. Accepted connections carry no peer address.
pub struct Unix;

impl Domain for Unix {
	type Addr = UnixAddr;
	type Raw = libc::sockaddr_un;
	type Peer = ();

	// a full backlog on a non-blocking AF_UNIX connect shows up as EAGAIN
	const CONNECT_AGAIN_PENDING: bool = true;
	const REUSE_ADDR: bool = false;

	#[inline]
	fn raw() -> libc::c_int {
		libc::AF_UNIX
	}

	fn peer(_raw: &libc::sockaddr_un) {}

	fn prepare_bind(addr: &UnixAddr, stale: StalePath) {
		if addr.is_abstract || stale == StalePath::Fail {
			return;
		}
		let Ok(path) = CString::new(addr.path.clone()) else {
			return;
		};
		// nothing there is fine; anything else surfaces as a bind() failure
		let removed = unsafe { libc::unlink(path.as_ptr()) } == 0;
		if removed {
			tracing::trace!(path = %addr.display(), "removed stale socket node");
		}
	}
}

/// What a Unix listener does about a node already sitting at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePath {
	/// Unlink whatever is there before bind(). A listener that is still
	/// running on the old node keeps its descriptor.
	#[default]
	Remove,
	/// Leave it alone; bind() fails with `EADDRINUSE`.
	Fail,
}

/// Unix domain socket address (file path or abstract).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixAddr {
	path: Vec<u8>,
	/// True if this is an abstract socket (Linux-only, no filesystem entry).
	is_abstract: bool,
}

/// Size of `sockaddr_un::sun_path`.
const SUN_PATH_LEN: usize =
	std::mem::size_of::<libc::sockaddr_un>() - offset_of!(libc::sockaddr_un, sun_path);

impl UnixAddr {
	/// Creates a new Unix address from a filesystem path.
	pub fn new<P: AsRef<[u8]>>(path: P) -> Self {
		Self {
			path: path.as_ref().to_vec(),
			is_abstract: false,
		}
	}

	/// Creates from a filesystem path.
	pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Self {
		use std::os::unix::ffi::OsStrExt;
		Self::new(path.as_ref().as_os_str().as_bytes())
	}

	/// Creates an abstract socket address (Linux-only).
	///
	/// Abstract sockets exist only in memory, with no filesystem entry.
	/// Auto-removed when all references close.
	pub fn abstract_socket<P: AsRef<[u8]>>(name: P) -> Self {
		Self {
			path: name.as_ref().to_vec(),
			is_abstract: true,
		}
	}

	/// Longest path accepted, in bytes. One byte of `sun_path` is kept
	/// for the terminator.
	pub fn max_path_len() -> usize {
		SUN_PATH_LEN - 1
	}

	/// Returns true if this is an abstract socket.
	pub fn is_abstract(&self) -> bool {
		self.is_abstract
	}

	/// Returns the path bytes.
	pub fn path(&self) -> &[u8] {
		&self.path
	}

	pub(crate) fn display(&self) -> String {
		String::from_utf8_lossy(&self.path).into_owned()
	}

	/// Converts to the raw sockaddr_un for syscalls.
	///
	/// Returns the structure and the length to hand to the kernel.
	pub(crate) fn to_raw(&self) -> Option<(libc::sockaddr_un, libc::socklen_t)> {
		let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
		addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

		if self.is_abstract {
			// Abstract: first byte is null, then the name
			if self.path.len() + 1 > SUN_PATH_LEN {
				return None;
			}
			for (i, &byte) in self.path.iter().enumerate() {
				addr.sun_path[i + 1] = byte as libc::c_char;
			}
			let len = offset_of!(libc::sockaddr_un, sun_path) + 1 + self.path.len();
			Some((addr, len as libc::socklen_t))
		} else {
			// '>=' leaves room for the terminating null
			if self.path.len() >= SUN_PATH_LEN {
				return None;
			}
			for (i, &byte) in self.path.iter().enumerate() {
				addr.sun_path[i] = byte as libc::c_char;
			}
			Some((addr, std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t))
		}
	}

	/// Creates from raw sockaddr_un whose `sun_path` holds `path_len` valid bytes.
	pub(crate) fn from_raw(raw: &libc::sockaddr_un, path_len: usize) -> Self {
		let bytes: Vec<u8> = raw.sun_path[..path_len.min(SUN_PATH_LEN)]
			.iter()
			.map(|&c| c as u8)
			.collect();

		match bytes.split_first() {
			Some((0, name)) => Self { path: name.to_vec(), is_abstract: true },
			_ => {
				let end = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
				Self { path: bytes[..end].to_vec(), is_abstract: false }
			}
		}
	}
}

impl ToSockAddr for UnixAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let (raw, len) = self.to_raw()?;  // Returns None if path too long
		let ptr = &raw as *const _ as *const libc::sockaddr;
		Some(f(ptr, len))
	}
}
