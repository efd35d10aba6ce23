//! Address families and related types.
//!
//! This module defines the three address families supported:
//! - `Ipv4`: Internet Protocol version 4
//! - `Ipv6`: Internet Protocol version 6
//! - `Unix`: Unix domain sockets (local only)
//!
//! Connector, listener and acceptor are written once, generic over
//! [`Domain`]. Everything that differs per family lives in the trait impls.

mod ipv4;
mod ipv6;
mod unix;
pub use self::ipv4::{Ipv4, SocketAddrV4};
pub use self::ipv6::{Ipv6, SocketAddrV6};
pub use self::unix::{Unix, UnixAddr, StalePath};

/// Address-family strategy.
///
/// Each type implementing this trait represents an address family
/// that can be passed to the `socket()` syscall, together with the
/// family-specific pieces of the connect/listen/accept algorithms.
pub trait Domain {
	/// Typed socket address for this family.
	type Addr: ToSockAddr + FromSockAddr + std::fmt::Debug + Clone;

	/// The C sockaddr structure the kernel fills in on accept().
	///
	/// Must be plain old data: an all-zero bit pattern is a valid value.
	type Raw;

	/// Binary peer address reported by accept(). `()` when the family
	/// does not report one.
	type Peer;

	/// Whether a non-blocking connect() failing with `EAGAIN` is treated
	/// like `EINPROGRESS`.
	const CONNECT_AGAIN_PENDING: bool = false;

	/// Whether listeners set `SO_REUSEADDR` before bind().
	const REUSE_ADDR: bool;

	/// Returns the libc constant for this address family.
	fn raw() -> libc::c_int;

	/// Extracts the peer address from the structure accept() filled in.
	fn peer(raw: &Self::Raw) -> Self::Peer;

	/// Runs before a listener's socket is created.
	fn prepare_bind(_addr: &Self::Addr, _stale: StalePath) {}
}

/// Families whose destinations go through getaddrinfo() and whose
/// listeners bind to a textual address plus port.
pub trait IpDomain: Domain {
	/// Wildcard address (any interface).
	fn any(port: u16) -> Self::Addr;

	/// Loopback address.
	fn loopback(port: u16) -> Self::Addr;

	/// Parses a numeric address. `None` if `host` is not one.
	fn parse(host: &str, port: u16) -> Option<Self::Addr>;

	/// Returns `addr` with its port replaced.
	fn with_port(addr: Self::Addr, port: u16) -> Self::Addr;
}

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	/// Returns None if the address is invalid (e.g., path too long for Unix).
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;

	/// Whether the address can be handed to the kernel at all.
	fn fits(&self) -> bool {
		self.with_raw(|_, _| ()).is_some()
	}
}
/*
Why a closure pattern? sockaddr_in, sockaddr_in6 and sockaddr_un are different
sizes. We can't return a pointer to a local variable, so the raw struct is
built on the callee's stack and lent to the closure while it is still alive.
 */

/// Trait for address types that can be created from raw sockaddr.
pub trait FromSockAddr: Sized {
	/// Creates address from raw sockaddr storage.
	///
	/// # Safety
	/// `addr` must point to at least `len` readable bytes.
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self>;
}

impl FromSockAddr for SocketAddrV4 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
		if raw.sin_family != libc::AF_INET as libc::sa_family_t {
			return None;
		}
		Some(Self::from_raw(raw))
	}
}

impl FromSockAddr for SocketAddrV6 {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if len < std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
		if raw.sin6_family != libc::AF_INET6 as libc::sa_family_t {
			return None;
		}
		Some(Self::from_raw(raw))
	}
}

impl FromSockAddr for UnixAddr {
	unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		let header = std::mem::size_of::<libc::sa_family_t>() as libc::socklen_t;
		if len < header || len > std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t {
			return None;
		}
		let raw = unsafe { &*(addr as *const libc::sockaddr_un) };
		Some(Self::from_raw(raw, (len - header) as usize))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn v4_sockaddr_round_trips_through_raw() {
		let addr = SocketAddrV4::new([10, 1, 2, 3], 4242);
		let back = addr
			.with_raw(|ptr, len| unsafe { SocketAddrV4::from_sockaddr(ptr, len) })
			.flatten();
		assert_eq!(back, Some(addr));
	}

	#[test]
	fn v4_rejects_short_buffer() {
		let addr = SocketAddrV4::new([127, 0, 0, 1], 1);
		let back = addr
			.with_raw(|ptr, _| unsafe { SocketAddrV4::from_sockaddr(ptr, 4) })
			.flatten();
		assert_eq!(back, None);
	}

	#[test]
	fn v6_rejects_wrong_family() {
		let v4 = SocketAddrV4::new([127, 0, 0, 1], 1);
		let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
		v4.with_raw(|ptr, len| unsafe {
			std::ptr::copy_nonoverlapping(ptr as *const u8, &mut storage as *mut _ as *mut u8, len as usize)
		});
		let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
		let parsed = unsafe { SocketAddrV6::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) };
		assert_eq!(parsed, None);
	}

	#[test]
	fn unix_path_round_trips() {
		let addr = UnixAddr::new("/tmp/plainsock.sock");
		let back = addr
			.with_raw(|ptr, len| unsafe { UnixAddr::from_sockaddr(ptr, len) })
			.flatten();
		assert_eq!(back, Some(addr));
	}

	#[test]
	fn ip_domains_parse_and_override_ports() {
		assert_eq!(Ipv4::parse("192.168.1.9", 80), Some(SocketAddrV4::new([192, 168, 1, 9], 80)));
		assert_eq!(Ipv4::parse("not-an-address", 80), None);
		assert_eq!(Ipv4::any(5).ip(), [0, 0, 0, 0]);
		assert_eq!(Ipv4::with_port(Ipv4::loopback(1), 9).port(), 9);

		let mut loopback = [0u8; 16];
		loopback[15] = 1;
		assert_eq!(Ipv6::parse("::1", 7).map(|a| a.ip()), Some(loopback));
		assert_eq!(Ipv6::parse("127.0.0.1", 7), None);
		assert_eq!(Ipv6::loopback(3).ip(), loopback);
	}
}
