use std::net::Ipv4Addr;
use crate::addr::{Domain, IpDomain, ToSockAddr};

/// IPv4 address family marker.
///
/// Sockets with this domain use 32-bit addresses (e.g., 192.168.1.1).
/// Accepted connections report the peer as 4 bytes in network byte order.
pub struct Ipv4;

impl Domain for Ipv4 {
	type Addr = SocketAddrV4;
	type Raw = libc::sockaddr_in;
	type Peer = [u8; 4];

	const REUSE_ADDR: bool = true;

	#[inline]
	fn raw() -> libc::c_int {
		libc::AF_INET
	}

	fn peer(raw: &libc::sockaddr_in) -> [u8; 4] {
		// s_addr is already in network order; keep the bytes as they sit in memory
		raw.sin_addr.s_addr.to_ne_bytes()
	}
}

impl IpDomain for Ipv4 {
	fn any(port: u16) -> SocketAddrV4 {
		SocketAddrV4::new([0, 0, 0, 0], port)
	}

	fn loopback(port: u16) -> SocketAddrV4 {
		SocketAddrV4::new([127, 0, 0, 1], port)
	}

	fn parse(host: &str, port: u16) -> Option<SocketAddrV4> {
		let ip: Ipv4Addr = host.parse().ok()?;
		Some(SocketAddrV4::new(ip.octets(), port))
	}

	fn with_port(addr: SocketAddrV4, port: u16) -> SocketAddrV4 {
		SocketAddrV4::new(addr.ip, port)
	}
}

/// IPv4 socket address (IP + port).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketAddrV4 {
	ip: [u8; 4],
	port: u16,
}

impl SocketAddrV4 {
	/// Creates a new IPv4 address.
	pub fn new(ip: [u8; 4], port: u16) -> Self {
		Self { ip, port }
	}

	/// Creates from raw sockaddr_in.
	pub(crate) fn from_raw(raw: &libc::sockaddr_in) -> Self {
		Self {
			ip: raw.sin_addr.s_addr.to_ne_bytes(),
			port: u16::from_be(raw.sin_port),
		}
	}

	/// Returns the IP bytes.
	pub fn ip(&self) -> [u8; 4] {
		self.ip
	}

	/// Returns the port.
	pub fn port(&self) -> u16 {
		self.port
	}

	/// Converts to the raw sockaddr_in for syscalls.
	pub(crate) fn to_raw(&self) -> libc::sockaddr_in {
		let mut raw: libc::sockaddr_in = unsafe { std::mem::zeroed() };
		raw.sin_family = libc::AF_INET as libc::sa_family_t;
		raw.sin_port = self.port.to_be();
		raw.sin_addr.s_addr = u32::from_ne_bytes(self.ip);
		raw
	}
}

impl ToSockAddr for SocketAddrV4 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();  // sockaddr_in lives on THIS stack frame
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

/*
What this is:
- 4 bytes for IP address
- 2 bytes for port
  - sin_family: Address family (AF_INET = 2 for IPv4)
  - sin_port: Port in network byte order (big-endian)
  - sin_addr: IP address in network byte order, i.e. the octets exactly as written
  - sin_zero: Padding, left zeroed
 */
