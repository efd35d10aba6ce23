#![allow(dead_code)]

use std::sync::Once;
use plainsock::{ConnectedStream, Domain};

static INIT_LOGGING: Once = Once::new();

/// Routes the crate's tracing output through the test harness.
///
/// The first call wins; later calls are no-ops.
pub fn init_test_logging() {
	INIT_LOGGING.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_max_level(tracing::Level::TRACE)
			.with_test_writer()
			.with_target(true)
			.with_ansi(false)
			.try_init();
	});
}

/// Reads until the peer shuts down its write side.
pub fn read_to_end<D: Domain>(stream: &ConnectedStream<D>) -> Vec<u8> {
	let mut out = Vec::new();
	let mut buf = [0u8; 8192];
	loop {
		let n = stream.read(&mut buf).expect("read");
		if n == 0 {
			return out;
		}
		out.extend_from_slice(&buf[..n]);
	}
}

/// Deterministic payload that exposes reordering or dropped chunks.
pub fn payload(len: usize) -> Vec<u8> {
	(0..len).map(|i| (i % 251) as u8).collect()
}

/// Number of descriptors open in this process.
pub fn open_fds() -> usize {
	// the directory handle itself is counted every time, so it cancels out
	std::fs::read_dir("/proc/self/fd").expect("read /proc/self/fd").count()
}

/// A loopback port that nothing is listening on.
pub fn closed_port() -> u16 {
	let listener = plainsock::ListenerBuilder::<plainsock::Ipv4>::new()
		.bind_local(0)
		.expect("bind probe");
	let port = listener.local_addr().expect("probe addr").port();
	drop(listener);
	port
}

/// Port an IPv4 descriptor is bound to.
pub fn local_port(fd: std::os::fd::RawFd) -> u16 {
	let mut raw: libc::sockaddr_in = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
	let rc = unsafe { libc::getsockname(fd, &mut raw as *mut _ as *mut libc::sockaddr, &mut len) };
	assert_eq!(rc, 0, "getsockname");
	u16::from_be(raw.sin_port)
}
