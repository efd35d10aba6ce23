use std::marker::PhantomData;
use std::os::fd::OwnedFd;
use crate::addr::{Domain, IpDomain, StalePath, ToSockAddr, Unix, UnixAddr};
use crate::error::{ConnectError, ListenError, report};
use crate::suspend::{self, NoSuspend, SuspendHook};
use super::{ConnectedStream, Listener, PendingConnect, RawSocket, resolve, set_reuse_addr};

// ============================================================================
// Listener Builder
// ============================================================================

/// Builder for TCP/Unix stream listeners.
///
/// # Example
/// ```ignore
/// use plainsock::{Ipv4, Unix, UnixAddr, ListenerBuilder, StalePath};
///
/// let tcp = ListenerBuilder::<Ipv4>::new()
///     .backlog(1024)
///     .bind_any(8080)?;
///
/// let local = ListenerBuilder::<Unix>::new()
///     .stale_path(StalePath::Fail)
///     .bind(UnixAddr::new("/run/app.sock"))?;
/// ```
pub struct ListenerBuilder<D: Domain> {
	backlog: i32,
	reuse_addr: bool,
	stale: StalePath,
	_marker: PhantomData<D>,
}

impl<D: Domain> Default for ListenerBuilder<D> {
	fn default() -> Self {
		Self::new()
	}
}

impl<D: Domain> ListenerBuilder<D> {
	pub fn new() -> Self {
		Self {
			backlog: 128,
			reuse_addr: D::REUSE_ADDR,
			stale: StalePath::default(),
			_marker: PhantomData,
		}
	}

	/// Set listen backlog. Default: 128.
	pub fn backlog(mut self, backlog: i32) -> Self {
		self.backlog = backlog;
		self
	}

	/// Set SO_REUSEADDR before bind. Default: on for IP, off for Unix.
	pub fn reuse_addr(mut self, enable: bool) -> Self {
		self.reuse_addr = enable;
		self
	}

	/// Binds and starts listening.
	///
	/// Steps, each closing the socket if it fails: validate address,
	/// clear a stale Unix node, socket(), SO_REUSEADDR (best effort),
	/// bind(), listen().
	pub fn bind(self, addr: D::Addr) -> Result<Listener<D>, ListenError> {
		report("listen", self.bind_inner(addr))
	}

	fn bind_inner(&self, addr: D::Addr) -> Result<Listener<D>, ListenError> {
		if !addr.fits() {
			return Err(ListenError::PathTooLong { addr: format!("{:?}", addr) });
		}

		D::prepare_bind(&addr, self.stale);

		let socket = RawSocket::<D>::new().map_err(|errno| ListenError::Create { errno })?;

		if self.reuse_addr {
			if let Err(err) = set_reuse_addr(&socket, true) {
				tracing::debug!(error = %err, "SO_REUSEADDR not applied");
			}
		}

		let listener = socket.bind(&addr)?.listen(self.backlog)?;
		tracing::trace!(fd = listener.as_raw_fd(), addr = ?addr, backlog = self.backlog, "listening");
		Ok(listener)
	}
}

impl<D: IpDomain> ListenerBuilder<D> {
	/// Listens on every interface.
	pub fn bind_any(self, port: u16) -> Result<Listener<D>, ListenError> {
		self.bind(D::any(port))
	}

	/// Listens on the loopback interface only.
	pub fn bind_local(self, port: u16) -> Result<Listener<D>, ListenError> {
		self.bind(D::loopback(port))
	}

	/// Listens on a numeric address; `None` means every interface.
	///
	/// An address that does not parse for this family fails with
	/// `ListenError::InvalidAddress` before any socket exists.
	pub fn bind_host(self, host: Option<&str>, port: u16) -> Result<Listener<D>, ListenError> {
		let addr = match host {
			None => D::any(port),
			Some(host) => match D::parse(host, port) {
				Some(addr) => addr,
				None => {
					let err = ListenError::InvalidAddress { addr: host.to_owned() };
					return report("listen", Err(err));
				}
			},
		};
		self.bind(addr)
	}
}

impl ListenerBuilder<Unix> {
	/// What to do about a node already at the path. Default: `StalePath::Remove`.
	pub fn stale_path(mut self, stale: StalePath) -> Self {
		self.stale = stale;
		self
	}
}

// ============================================================================
// Connector Builder
// ============================================================================

/// Builder for outbound TCP/Unix stream connections.
///
/// # Example
/// ```ignore
/// use plainsock::{Ipv4, Unix, UnixAddr, ConnectorBuilder};
///
/// let conn = ConnectorBuilder::<Ipv4>::new()
///     .port(8080)
///     .connect_host("localhost", None)?;
///
/// let pending = ConnectorBuilder::<Unix>::new()
///     .connect_nonblocking(&UnixAddr::new("/run/app.sock"))?;
/// ```
pub struct ConnectorBuilder<D: Domain, H: SuspendHook = NoSuspend> {
	port: u16,
	hook: H,
	_marker: PhantomData<D>,
}

impl<D: Domain> Default for ConnectorBuilder<D> {
	fn default() -> Self {
		Self::new()
	}
}

impl<D: Domain> ConnectorBuilder<D> {
	pub fn new() -> Self {
		Self {
			port: 0,
			hook: NoSuspend,
			_marker: PhantomData,
		}
	}
}

impl<D: Domain, H: SuspendHook> ConnectorBuilder<D, H> {
	/// Port that overrides whatever resolution produced. `0` (the default)
	/// keeps the resolved port; a service name is then required.
	pub fn port(mut self, port: u16) -> Self {
		self.port = port;
		self
	}

	/// Host notification around resolution and connect.
	pub fn hook<H2: SuspendHook>(self, hook: H2) -> ConnectorBuilder<D, H2> {
		ConnectorBuilder {
			port: self.port,
			hook,
			_marker: PhantomData,
		}
	}

	/// Tries each candidate in order until one connects (or, non-blocking,
	/// starts connecting).
	///
	/// Socket construction or mode failures abort the whole attempt.
	/// A connect failure closes that candidate's socket and moves on; when
	/// every candidate has failed the last failure is returned.
	fn establish(candidates: Vec<D::Addr>, nonblocking: bool) -> Result<OwnedFd, ConnectError> {
		let mut last = None;
		for addr in candidates {
			let socket = RawSocket::<D>::new().map_err(|errno| ConnectError::Create { errno })?;
			if nonblocking {
				socket.set_nonblocking(true)?;
			}
			match socket.connect(&addr) {
				Ok(()) => {
					tracing::trace!(addr = ?addr, nonblocking, "connected");
					return Ok(socket.into_fd());
				}
				Err(err) => {
					tracing::trace!(addr = ?addr, error = %err, "candidate failed");
					last = Some(err);
				}
			}
		}
		Err(last.unwrap_or(ConnectError::Resolve { host: String::new(), gai: 0, errno: 0 }))
	}
}

impl<D: IpDomain, H: SuspendHook> ConnectorBuilder<D, H> {
	/// Resolves `host` (plus optional `service`) and connects, blocking
	/// until the handshake completes.
	pub fn connect_host(&self, host: &str, service: Option<&str>) -> Result<ConnectedStream<D>, ConnectError> {
		let fd = report("connect", self.connect_ip(host, service, false))?;
		Ok(ConnectedStream::from_fd(fd))
	}

	/// Resolves and starts a non-blocking connect.
	///
	/// The returned socket is non-blocking. Completion is discovered with
	/// a readiness notification followed by `PendingConnect::take_error()`.
	pub fn connect_host_nonblocking(&self, host: &str, service: Option<&str>) -> Result<PendingConnect<D>, ConnectError> {
		let fd = report("connect", self.connect_ip(host, service, true))?;
		Ok(PendingConnect::from_fd(fd))
	}

	pub(crate) fn connect_ip(&self, host: &str, service: Option<&str>, nonblocking: bool) -> Result<OwnedFd, ConnectError> {
		suspend::blocking(&self.hook, || {
			let candidates = resolve::resolve::<D>(host, service, self.port)?;
			Self::establish(candidates, nonblocking)
		})
	}
}

impl<H: SuspendHook> ConnectorBuilder<Unix, H> {
	/// Connects to a Unix socket, blocking until accepted into the backlog.
	pub fn connect(&self, addr: &UnixAddr) -> Result<ConnectedStream<Unix>, ConnectError> {
		let fd = report("connect", self.connect_unix(addr, false))?;
		Ok(ConnectedStream::from_fd(fd))
	}

	/// Starts a non-blocking connect to a Unix socket.
	pub fn connect_nonblocking(&self, addr: &UnixAddr) -> Result<PendingConnect<Unix>, ConnectError> {
		let fd = report("connect", self.connect_unix(addr, true))?;
		Ok(PendingConnect::from_fd(fd))
	}

	pub(crate) fn connect_unix(&self, addr: &UnixAddr, nonblocking: bool) -> Result<OwnedFd, ConnectError> {
		// checked before any syscall, so nothing is ever allocated for it
		if !addr.fits() {
			return Err(ConnectError::PathTooLong { addr: addr.display() });
		}
		suspend::blocking(&self.hook, || Self::establish(vec![addr.clone()], nonblocking))
	}
}
