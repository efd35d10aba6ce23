mod common;

use plainsock::{
	AcceptError, ConnectError, ConnectorBuilder, ErrorCode, IoError, Ipv4, Ipv6, ListenError,
	ListenerBuilder, StalePath, Unix, UnixAddr, last_os_error,
};
use common::{closed_port, init_test_logging};

fn long_unix_path() -> UnixAddr {
	UnixAddr::new(vec![b'a'; UnixAddr::max_path_len() + 1])
}

#[test]
fn unix_path_too_long_is_code_one() {
	init_test_logging();
	let err = ConnectorBuilder::<Unix>::new().connect(&long_unix_path()).map(|_| ()).unwrap_err();
	assert!(matches!(err, ConnectError::PathTooLong { .. }));
	assert_eq!(err.code(), -1);

	let err = ListenerBuilder::<Unix>::new().bind(long_unix_path()).map(|_| ()).unwrap_err();
	assert!(matches!(err, ListenError::PathTooLong { .. }));
	assert_eq!(err.code(), -1);
}

#[test]
fn longest_unix_path_still_fits() {
	init_test_logging();
	let dir = tempfile::tempdir().expect("tempdir");
	let mut path = dir.path().as_os_str().as_encoded_bytes().to_vec();
	path.push(b'/');
	while path.len() < UnixAddr::max_path_len() {
		path.push(b's');
	}
	let addr = UnixAddr::new(&path);
	let listener = ListenerBuilder::<Unix>::new().bind(addr.clone()).expect("listen at the limit");
	ConnectorBuilder::<Unix>::new().connect(&addr).expect("connect at the limit");
	drop(listener);
}

#[test]
fn nonblocking_accept_with_nothing_pending_is_code_two() {
	init_test_logging();
	let listener = ListenerBuilder::<Ipv4>::new().bind_local(0).expect("listen");
	listener.set_nonblocking(true).expect("nonblocking");

	let err = listener.accept().map(|_| ()).unwrap_err();
	assert!(matches!(err, AcceptError::WouldBlock { .. }));
	assert_eq!(err.code(), -2);
	assert_eq!(last_os_error(), libc::EAGAIN);
}

#[test]
fn accept_on_invalid_descriptor_is_code_one() {
	init_test_logging();
	let rc = plainsock::ffi::plainsock_accept_unix(-1);
	assert_eq!(rc, -1);
	assert_eq!(last_os_error(), libc::EBADF);

	let rc = unsafe { plainsock::ffi::plainsock_accept_ipv4(-1, std::ptr::null_mut()) };
	assert_eq!(rc, -1);
	assert_eq!(last_os_error(), libc::EBADF);
}

#[test]
fn accept_on_a_non_listening_socket_is_code_one() {
	init_test_logging();
	let file = tempfile::tempfile().expect("tempfile");
	let rc = plainsock::ffi::plainsock_accept_unix(std::os::fd::AsRawFd::as_raw_fd(&file));
	assert_eq!(rc, -1);
	assert_eq!(last_os_error(), libc::ENOTSOCK);
}

#[test]
fn unix_rebind_with_fail_policy_is_bind_failure() {
	init_test_logging();
	let dir = tempfile::tempdir().expect("tempdir");
	let addr = UnixAddr::from_path(dir.path().join("busy.sock"));
	let _first = ListenerBuilder::<Unix>::new().bind(addr.clone()).expect("first listen");

	let err = ListenerBuilder::<Unix>::new()
		.stale_path(StalePath::Fail)
		.bind(addr)
		.map(|_| ())
		.unwrap_err();
	assert!(matches!(err, ListenError::Bind { .. }));
	assert_eq!(err.code(), -3);
	assert_eq!(last_os_error(), libc::EADDRINUSE);
}

#[test]
fn unix_rebind_replaces_node_and_orphans_old_listener() {
	init_test_logging();
	let dir = tempfile::tempdir().expect("tempdir");
	let addr = UnixAddr::from_path(dir.path().join("replaced.sock"));
	let old = ListenerBuilder::<Unix>::new().bind(addr.clone()).expect("first listen");
	let new = ListenerBuilder::<Unix>::new().bind(addr.clone()).expect("rebind");

	let _client = ConnectorBuilder::<Unix>::new().connect(&addr).expect("connect");
	new.accept().expect("new listener gets the client");

	old.set_nonblocking(true).expect("nonblocking");
	let err = old.accept().map(|_| ()).unwrap_err();
	assert_eq!(err.code(), -2);
}

#[test]
fn ffi_unix_listen_fail_if_exists() {
	init_test_logging();
	use std::os::unix::ffi::OsStrExt;
	let dir = tempfile::tempdir().expect("tempdir");
	let path = dir.path().join("node");
	std::fs::write(&path, b"").expect("create stale node");
	let c_path = std::ffi::CString::new(path.as_os_str().as_bytes()).expect("c path");

	let rc = unsafe { plainsock::ffi::plainsock_listen_unix(c_path.as_ptr(), 4, 1) };
	assert_eq!(rc, -3);
	assert_eq!(last_os_error(), libc::EADDRINUSE);

	let fd = unsafe { plainsock::ffi::plainsock_listen_unix(c_path.as_ptr(), 4, 0) };
	assert!(fd >= 0, "listen after removal: {fd}");
	assert_eq!(plainsock::ffi::plainsock_close_fd(fd), 1);
}

#[test]
fn ipv4_bind_conflict_is_code_three() {
	init_test_logging();
	let first = ListenerBuilder::<Ipv4>::new()
		.reuse_addr(false)
		.bind_local(0)
		.expect("listen");
	let port = first.local_addr().expect("addr").port();

	let err = ListenerBuilder::<Ipv4>::new()
		.reuse_addr(false)
		.bind_local(port)
		.map(|_| ())
		.unwrap_err();
	assert_eq!(err.code(), -3);
	assert_eq!(last_os_error(), libc::EADDRINUSE);
}

#[test]
fn invalid_listen_address_is_code_one() {
	init_test_logging();
	let err = ListenerBuilder::<Ipv4>::new().bind_host(Some("::1"), 0).map(|_| ()).unwrap_err();
	assert!(matches!(err, ListenError::InvalidAddress { .. }));
	assert_eq!(err.code(), -1);

	let err = ListenerBuilder::<Ipv6>::new().bind_host(Some("127.0.0.1"), 0).map(|_| ()).unwrap_err();
	assert_eq!(err.code(), -1);
}

#[test]
fn broken_pipe_reports_epipe() {
	init_test_logging();
	plainsock::ignore_broken_pipe().expect("ignore SIGPIPE");

	let dir = tempfile::tempdir().expect("tempdir");
	let addr = UnixAddr::from_path(dir.path().join("pipe.sock"));
	let listener = ListenerBuilder::<Unix>::new().bind(addr.clone()).expect("listen");
	let client = ConnectorBuilder::<Unix>::new().connect(&addr).expect("connect");
	let (server, ()) = listener.accept().expect("accept");
	drop(server);

	let err = client.write_all(b"nobody is listening").unwrap_err();
	match err {
		IoError::Incomplete { errno, written, .. } => {
			assert_eq!(errno, libc::EPIPE);
			assert_eq!(written, 0);
		}
		other => panic!("unexpected error: {other}"),
	}
	assert_eq!(last_os_error(), libc::EPIPE);
}

#[test]
fn connection_refused_is_code_three() {
	init_test_logging();
	let port = closed_port();
	let err = ConnectorBuilder::<Ipv4>::new()
		.port(port)
		.connect_host("127.0.0.1", None)
		.map(|_| ())
		.unwrap_err();
	assert!(matches!(err, ConnectError::Connect { .. }));
	assert_eq!(err.code(), -3);
	assert_eq!(last_os_error(), libc::ECONNREFUSED);

	let rc = unsafe { plainsock::ffi::plainsock_connect_ipv4(c"127.0.0.1".as_ptr(), std::ptr::null(), port, 1) };
	assert_eq!(rc, -3);
	assert_eq!(plainsock::ffi::plainsock_last_error(), libc::ECONNREFUSED);
}

#[test]
fn unix_connect_without_listener_is_code_three() {
	init_test_logging();
	let dir = tempfile::tempdir().expect("tempdir");
	let addr = UnixAddr::from_path(dir.path().join("absent.sock"));
	let err = ConnectorBuilder::<Unix>::new().connect(&addr).map(|_| ()).unwrap_err();
	assert_eq!(err.code(), -3);
	assert_eq!(last_os_error(), libc::ENOENT);
}

#[test]
fn unresolvable_host_is_code_one() {
	init_test_logging();
	let err = ConnectorBuilder::<Ipv4>::new()
		.port(80)
		.connect_host("no-such-host.invalid", None)
		.map(|_| ())
		.unwrap_err();
	assert!(matches!(err, ConnectError::Resolve { .. }));
	assert_eq!(err.code(), -1);
}

#[test]
fn family_mismatch_fails_resolution() {
	init_test_logging();
	let err = ConnectorBuilder::<Ipv6>::new()
		.port(80)
		.connect_host("127.0.0.1", None)
		.map(|_| ())
		.unwrap_err();
	assert_eq!(err.code(), -1);
}

#[test]
fn io_error_conversion_keeps_errno() {
	init_test_logging();
	let port = closed_port();
	let err = ConnectorBuilder::<Ipv4>::new()
		.port(port)
		.connect_host("127.0.0.1", None)
		.map(|_| ())
		.unwrap_err();
	let io: std::io::Error = err.into();
	assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
}

#[test]
fn mode_helpers_on_bad_descriptor() {
	init_test_logging();
	use plainsock::ffi::*;
	assert_eq!(plainsock_set_fd_non_blocking(-1), 0);
	assert_eq!(plainsock_last_error(), libc::EBADF);
	assert_eq!(plainsock_set_fd_blocking(-1), 0);
	assert_eq!(plainsock_check_sock_error(-1), 0);
	assert_eq!(plainsock_shutdown(-1, 2), 0);
	assert_eq!(plainsock_last_error(), libc::EBADF);
}
