//! C-ABI boundary for embedding hosts.
//!
//! Every function takes primitive arguments and returns either a
//! descriptor (`>= 0`), an operation-scoped negative code, or a boolean as
//! `1`/`0`. After a failure, `plainsock_last_error()` returns the errno of
//! the syscall that caused it.
//!
//! Hosts with a cooperative scheduler register their callbacks once with
//! [`plainsock_set_host_hooks`]; blocking calls then pin their argument
//! buffers, release the scheduler, and undo both afterwards.

use std::ffi::{CStr, c_char, c_int, c_void};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};
use std::sync::OnceLock;
use crate::addr::{Domain, IpDomain, Ipv4, Ipv6, StalePath, Unix, UnixAddr};
use crate::error::{ConnectError, ErrorCode, ListenError, last_os_error};
use crate::socket::{ConnectorBuilder, ListenerBuilder, accept_on, check_pending_error, set_nonblocking};
use crate::suspend::SuspendHook;
use crate::transfer::{self, Shutdown};
use crate::signal;

/// Host callbacks run around blocking syscalls.
///
/// Any callback may be null.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostHooks {
	/// Keep the object at this address from moving.
	pub pin: Option<extern "C" fn(*const c_void)>,
	/// Release a pinned object.
	pub unpin: Option<extern "C" fn(*const c_void)>,
	/// Let other host tasks run while this thread blocks.
	pub deactivate: Option<extern "C" fn()>,
	/// Rejoin the host scheduler.
	pub activate: Option<extern "C" fn()>,
}

static HOST_HOOKS: OnceLock<HostHooks> = OnceLock::new();

/// Suspension hook built from the registered host callbacks for one call.
struct HostSuspend {
	hooks: Option<&'static HostHooks>,
	pinned: [*const c_void; 2],
}

impl HostSuspend {
	fn new(pinned: [*const c_void; 2]) -> Self {
		Self { hooks: HOST_HOOKS.get(), pinned }
	}

	fn unpinned() -> Self {
		Self::new([std::ptr::null(); 2])
	}
}

impl SuspendHook for HostSuspend {
	fn before_blocking_call(&self) {
		let Some(hooks) = self.hooks else { return };
		if let Some(pin) = hooks.pin {
			for &ptr in self.pinned.iter().filter(|p| !p.is_null()) {
				pin(ptr);
			}
		}
		if let Some(deactivate) = hooks.deactivate {
			deactivate();
		}
	}

	fn after_blocking_call(&self) {
		let Some(hooks) = self.hooks else { return };
		if let Some(activate) = hooks.activate {
			activate();
		}
		if let Some(unpin) = hooks.unpin {
			for &ptr in self.pinned.iter().rev().filter(|p| !p.is_null()) {
				unpin(ptr);
			}
		}
	}
}

/// Descriptor handed in by the host; never closed on drop.
struct Borrowed(RawFd);

impl AsRawFd for Borrowed {
	fn as_raw_fd(&self) -> RawFd {
		self.0
	}
}

impl IntoRawFd for Borrowed {
	fn into_raw_fd(self) -> RawFd {
		self.0
	}
}

fn flag<E>(result: Result<(), E>) -> c_int {
	result.is_ok() as c_int
}

fn code<T: IntoRawFd, E: ErrorCode>(result: Result<T, E>) -> c_int {
	match result {
		Ok(fd) => fd.into_raw_fd(),
		Err(err) => err.code(),
	}
}

/// Borrows a nullable C string as UTF-8. `Err(())` for invalid UTF-8.
unsafe fn opt_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, ()> {
	if ptr.is_null() {
		return Ok(None);
	}
	unsafe { CStr::from_ptr(ptr) }.to_str().map(Some).map_err(|_| ())
}

/// Registers the host callbacks. Returns `1` on the first call and `0`
/// once hooks are already in place.
///
/// # Safety
/// `hooks` must be null or point to a valid `HostHooks`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_set_host_hooks(hooks: *const HostHooks) -> c_int {
	if hooks.is_null() {
		return 0;
	}
	let hooks = unsafe { *hooks };
	HOST_HOOKS.set(hooks).is_ok() as c_int
}

#[unsafe(no_mangle)]
pub extern "C" fn plainsock_set_fd_non_blocking(fd: c_int) -> c_int {
	flag(set_nonblocking(&Borrowed(fd), true))
}

#[unsafe(no_mangle)]
pub extern "C" fn plainsock_set_fd_blocking(fd: c_int) -> c_int {
	flag(set_nonblocking(&Borrowed(fd), false))
}

/// Latched socket error of `fd`, `0` if none.
#[unsafe(no_mangle)]
pub extern "C" fn plainsock_check_sock_error(fd: c_int) -> c_int {
	check_pending_error(&Borrowed(fd))
}

#[unsafe(no_mangle)]
pub extern "C" fn plainsock_ignore_sigpipe() -> c_int {
	flag(signal::ignore_broken_pipe())
}

unsafe fn connect_ip<D: IpDomain>(
	address: *const c_char,
	service: *const c_char,
	port: u16,
	blocking: c_int,
) -> c_int {
	let (Ok(Some(host)), Ok(svc)) = (unsafe { opt_str(address) }, unsafe { opt_str(service) }) else {
		crate::error::set_errno(libc::EINVAL);
		return ConnectError::Resolve { host: String::new(), gai: libc::EAI_NONAME, errno: libc::EINVAL }.code();
	};
	let hook = HostSuspend::new([address as *const c_void, service as *const c_void]);
	let connector = ConnectorBuilder::<D>::new().port(port).hook(hook);
	if blocking != 0 {
		code(connector.connect_host(host, svc))
	} else {
		code(connector.connect_host_nonblocking(host, svc))
	}
}

/// Connects to an IPv4 host.
///
/// `port > 0` overrides the port resolved from `service`; `service` may be
/// null when a port is given. With `blocking == 0` the socket is
/// non-blocking and the call returns once the connection is under way.
///
/// Returns the descriptor, `-1` resolution failed, `-2` socket setup
/// failed, `-3` connect failed.
///
/// # Safety
/// `address` must be a valid C string; `service` null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_connect_ipv4(
	address: *const c_char,
	service: *const c_char,
	port: u16,
	blocking: c_int,
) -> c_int {
	unsafe { connect_ip::<Ipv4>(address, service, port, blocking) }
}

/// IPv6 counterpart of [`plainsock_connect_ipv4`].
///
/// # Safety
/// `address` must be a valid C string; `service` null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_connect_ipv6(
	address: *const c_char,
	service: *const c_char,
	port: u16,
	blocking: c_int,
) -> c_int {
	unsafe { connect_ip::<Ipv6>(address, service, port, blocking) }
}

/// Connects to a Unix-domain socket.
///
/// Returns the descriptor, `-1` path too long, `-2` socket setup failed,
/// `-3` connect failed.
///
/// # Safety
/// `path` must be a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_connect_unix(path: *const c_char, blocking: c_int) -> c_int {
	if path.is_null() {
		return ConnectError::PathTooLong { addr: String::new() }.code();
	}
	let addr = UnixAddr::new(unsafe { CStr::from_ptr(path) }.to_bytes());
	let connector = ConnectorBuilder::<Unix>::new().hook(HostSuspend::unpinned());
	if blocking != 0 {
		code(connector.connect(&addr))
	} else {
		code(connector.connect_nonblocking(&addr))
	}
}

unsafe fn listen_ip<D: IpDomain>(address: *const c_char, port: u16, backlog: c_int) -> c_int {
	let Ok(host) = (unsafe { opt_str(address) }) else {
		return ListenError::InvalidAddress { addr: String::new() }.code();
	};
	code(ListenerBuilder::<D>::new().backlog(backlog).bind_host(host, port))
}

/// Listens on IPv4. A null `address` binds every interface.
///
/// Returns the descriptor, `-1` invalid address, `-2` socket failed,
/// `-3` bind failed, `-4` listen failed.
///
/// # Safety
/// `address` must be null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_listen_ipv4(address: *const c_char, port: u16, backlog: c_int) -> c_int {
	unsafe { listen_ip::<Ipv4>(address, port, backlog) }
}

/// IPv6 counterpart of [`plainsock_listen_ipv4`].
///
/// # Safety
/// `address` must be null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_listen_ipv6(address: *const c_char, port: u16, backlog: c_int) -> c_int {
	unsafe { listen_ip::<Ipv6>(address, port, backlog) }
}

/// Listens on a Unix-domain path.
///
/// Unless `fail_if_exists` is non-zero, any node already at `path` is
/// removed first. Returns the descriptor, `-1` path too long, `-2` socket
/// failed, `-3` bind failed, `-4` listen failed.
///
/// # Safety
/// `path` must be a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_listen_unix(path: *const c_char, backlog: c_int, fail_if_exists: c_int) -> c_int {
	if path.is_null() {
		return ListenError::PathTooLong { addr: String::new() }.code();
	}
	let addr = UnixAddr::new(unsafe { CStr::from_ptr(path) }.to_bytes());
	let stale = if fail_if_exists != 0 { StalePath::Fail } else { StalePath::Remove };
	code(ListenerBuilder::<Unix>::new().backlog(backlog).stale_path(stale).bind(addr))
}

unsafe fn accept_ip<D>(fd: c_int, out: *mut u8) -> c_int
where
	D: Domain,
	D::Peer: AsRef<[u8]>,
{
	let hook = HostSuspend::new([out as *const c_void, std::ptr::null()]);
	match accept_on::<D, _>(fd, &hook) {
		Ok((conn, peer)) => {
			if !out.is_null() {
				let bytes = peer.as_ref();
				unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), out, bytes.len()) };
			}
			conn.into_raw_fd()
		}
		Err(err) => err.code(),
	}
}

/// Accepts on an IPv4 listener.
///
/// When `peer` is non-null the client's address is written there as 4
/// bytes in network order. Returns the descriptor, `-1` on failure, `-2`
/// if the listener is non-blocking and nothing is pending.
///
/// # Safety
/// `peer` must be null or valid for 4 bytes of writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_accept_ipv4(fd: c_int, peer: *mut u8) -> c_int {
	unsafe { accept_ip::<Ipv4>(fd, peer) }
}

/// IPv6 counterpart of [`plainsock_accept_ipv4`]; `peer` receives 16 bytes.
///
/// # Safety
/// `peer` must be null or valid for 16 bytes of writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_accept_ipv6(fd: c_int, peer: *mut u8) -> c_int {
	unsafe { accept_ip::<Ipv6>(fd, peer) }
}

/// Accepts on a Unix-domain listener. Same codes as the IP variants.
#[unsafe(no_mangle)]
pub extern "C" fn plainsock_accept_unix(fd: c_int) -> c_int {
	code(accept_on::<Unix, _>(fd, &HostSuspend::unpinned()).map(|(conn, ())| conn))
}

/// Writes all `len` bytes. Returns `1` if everything was sent.
///
/// # Safety
/// `buf` must be valid for `len` bytes of reads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn plainsock_write_all(fd: c_int, buf: *const u8, len: usize) -> c_int {
	if buf.is_null() {
		return (len == 0) as c_int;
	}
	let bytes = unsafe { std::slice::from_raw_parts(buf, len) };
	flag(transfer::write_all(&Borrowed(fd), bytes))
}

/// `1` regular file, `0` anything else, `-1` if fstat() failed.
#[unsafe(no_mangle)]
pub extern "C" fn plainsock_is_regular_file(fd: c_int) -> c_int {
	match transfer::is_regular_file(&Borrowed(fd)) {
		Ok(true) => 1,
		Ok(false) => 0,
		Err(_) => -1,
	}
}

/// `how`: `0` read side, `1` write side, `2` both. Other values return `0`
/// without touching the descriptor.
#[unsafe(no_mangle)]
pub extern "C" fn plainsock_shutdown(fd: c_int, how: c_int) -> c_int {
	match Shutdown::from_selector(how) {
		Some(how) => flag(transfer::shutdown(&Borrowed(fd), how)),
		None => 0,
	}
}

#[unsafe(no_mangle)]
pub extern "C" fn plainsock_close_fd(fd: c_int) -> c_int {
	flag(transfer::close(Borrowed(fd)))
}

#[unsafe(no_mangle)]
pub extern "C" fn plainsock_last_error() -> c_int {
	last_os_error()
}
