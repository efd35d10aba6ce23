use std::net::Ipv6Addr;
use crate::addr::{Domain, IpDomain, ToSockAddr};

/// IPv6 address family marker.
///
/// Sockets with this domain use 128-bit addresses (e.g., ::1).
/// Accepted connections report the peer as 16 bytes in network byte order.
pub struct Ipv6;

impl Domain for Ipv6 {
	type Addr = SocketAddrV6;
	type Raw = libc::sockaddr_in6;
	type Peer = [u8; 16];

	const REUSE_ADDR: bool = true;

	#[inline]
	fn raw() -> libc::c_int {
		libc::AF_INET6
	}

	fn peer(raw: &libc::sockaddr_in6) -> [u8; 16] {
		raw.sin6_addr.s6_addr
	}
}

impl IpDomain for Ipv6 {
	fn any(port: u16) -> SocketAddrV6 {
		SocketAddrV6::new([0; 16], port)
	}

	fn loopback(port: u16) -> SocketAddrV6 {
		SocketAddrV6::new(Ipv6Addr::LOCALHOST.octets(), port)
	}

	fn parse(host: &str, port: u16) -> Option<SocketAddrV6> {
		let ip: Ipv6Addr = host.parse().ok()?;
		Some(SocketAddrV6::new(ip.octets(), port))
	}

	fn with_port(addr: SocketAddrV6, port: u16) -> SocketAddrV6 {
		SocketAddrV6::with_scope(addr.ip, port, addr.scope_id)
	}
}

/// IPv6 socket address (IP + port + scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketAddrV6 {
	ip: [u8; 16],
	port: u16,
	/// Scope ID for link-local addresses (identifies network interface).
	/// Usually 0 unless using link-local addresses like fe80::.
	scope_id: u32,
}

impl SocketAddrV6 {
	/// Creates a new IPv6 address.
	pub fn new(ip: [u8; 16], port: u16) -> Self {
		Self { ip, port, scope_id: 0 }
	}

	/// Creates with explicit scope ID.
	///
	/// Use for link-local addresses (fe80::) where you need to specify the interface.
	pub fn with_scope(ip: [u8; 16], port: u16, scope_id: u32) -> Self {
		Self { ip, port, scope_id }
	}

	/// Returns the IP bytes.
	pub fn ip(&self) -> [u8; 16] {
		self.ip
	}

	/// Returns the port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Returns the scope ID.
	pub fn scope_id(&self) -> u32 {
		self.scope_id
	}

	/// Converts to the raw sockaddr_in6 for syscalls.
	pub(crate) fn to_raw(&self) -> libc::sockaddr_in6 {
		let mut raw: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
		raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
		raw.sin6_port = self.port.to_be();
		raw.sin6_addr.s6_addr = self.ip;
		raw.sin6_scope_id = self.scope_id;
		raw
	}

	/// Creates from raw sockaddr_in6.
	pub(crate) fn from_raw(raw: &libc::sockaddr_in6) -> Self {
		Self {
			ip: raw.sin6_addr.s6_addr,
			port: u16::from_be(raw.sin6_port),
			scope_id: raw.sin6_scope_id,
		}
	}
}

/*
Same pattern like V4, but bigger IP:
- 16 bytes for IP address
- 2 bytes for port
Two extra fields compared to IPv4:
- sin6_flowinfo: Traffic class and flow label (left 0)
- sin6_scope_id: Link-local scope (usually 0 unless you're dealing with fe80::)
*/

impl ToSockAddr for SocketAddrV6 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}
