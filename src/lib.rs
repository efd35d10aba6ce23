pub mod socket;
pub mod suspend;
pub mod transfer;
pub mod ffi;
mod addr;
mod error;
mod signal;

pub use self::error::{ErrorCode, AcceptError, ConnectError, IoError, ListenError, SocketError,
					  errno, last_os_error};
pub use self::addr::{Domain, IpDomain, ToSockAddr, FromSockAddr,
					 Ipv4, Ipv6, Unix, SocketAddrV4, SocketAddrV6, UnixAddr, StalePath};
pub use self::socket::{ListenerBuilder, ConnectorBuilder,
					   Listener, ConnectedStream, PendingConnect,
					   set_reuse_addr, set_nonblocking, take_error, check_pending_error};
pub use self::signal::ignore_broken_pipe;
pub use self::suspend::{SuspendHook, NoSuspend};
pub use self::transfer::{Shutdown, write_all, is_regular_file, shutdown, close};
