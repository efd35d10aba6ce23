use std::ffi::CStr;

/// Shared surface of every error in this crate.
///
/// `code()` is the operation-scoped negative integer handed across the C
/// boundary. The same number means different things for different
/// operations, so codes are only comparable within one error type.
pub trait ErrorCode {
    /// Negative result code for this failure.
    fn code(&self) -> i32;

    /// The `errno` captured right after the failing syscall, if there was one.
    fn raw_os_error(&self) -> Option<i32>;
}

/// Socket configuration errors (descriptor flags, options, signal disposition).
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("sigaction(SIGPIPE) failed: {}", errno_to_str(*.errno))]
    Signal { errno: i32 },
}

impl ErrorCode for SocketError {
    fn code(&self) -> i32 {
        -1
    }

    fn raw_os_error(&self) -> Option<i32> {
        match self {
            SocketError::SetOption { errno, .. }
            | SocketError::GetOption { errno, .. }
            | SocketError::Signal { errno } => Some(*errno),
        }
    }
}

/// Outbound connection errors.
///
/// Codes: `-1` resolution failed (or Unix path too long), `-2` socket
/// construction failed, `-3` connect failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// `gai` is the getaddrinfo status, `0` when lookup succeeded but
    /// produced no usable address.
    #[error("could not resolve {host}: {}", gai_to_str(*.gai))]
    Resolve { host: String, gai: i32, errno: i32 },

    #[error("unix socket path {addr} does not fit in sun_path")]
    PathTooLong { addr: String },

    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error(transparent)]
    Mode(#[from] SocketError),

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },
}

impl ErrorCode for ConnectError {
    fn code(&self) -> i32 {
        match self {
            ConnectError::Resolve { .. } | ConnectError::PathTooLong { .. } => -1,
            ConnectError::Create { .. } | ConnectError::Mode(_) => -2,
            ConnectError::Connect { .. } => -3,
        }
    }

    fn raw_os_error(&self) -> Option<i32> {
        match self {
            ConnectError::Resolve { errno, .. } => (*errno != 0).then_some(*errno),
            ConnectError::PathTooLong { .. } => None,
            ConnectError::Create { errno } => Some(*errno),
            ConnectError::Mode(err) => err.raw_os_error(),
            ConnectError::Connect { errno, .. } => Some(*errno),
        }
    }
}

/// Listening socket errors.
///
/// Codes: `-1` invalid address (Unix: path too long), `-2` socket
/// construction failed, `-3` bind failed, `-4` listen failed.
#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error("invalid bind address: {addr}")]
    InvalidAddress { addr: String },

    #[error("unix socket path {addr} does not fit in sun_path")]
    PathTooLong { addr: String },

    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("bind({addr}) failed: {}", errno_to_str(*.errno))]
    Bind { errno: i32, addr: String },

    #[error("listen(backlog={backlog}) failed: {}", errno_to_str(*.errno))]
    Listen { errno: i32, backlog: i32 },
}

impl ErrorCode for ListenError {
    fn code(&self) -> i32 {
        match self {
            ListenError::InvalidAddress { .. } | ListenError::PathTooLong { .. } => -1,
            ListenError::Create { .. } => -2,
            ListenError::Bind { .. } => -3,
            ListenError::Listen { .. } => -4,
        }
    }

    fn raw_os_error(&self) -> Option<i32> {
        match self {
            ListenError::InvalidAddress { .. } | ListenError::PathTooLong { .. } => None,
            ListenError::Create { errno }
            | ListenError::Bind { errno, .. }
            | ListenError::Listen { errno, .. } => Some(*errno),
        }
    }
}

/// Connection acceptance errors.
///
/// Codes: `-1` generic failure, `-2` no connection pending on a
/// non-blocking listener.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    #[error("accept() failed: {}", errno_to_str(*.errno))]
    Accept { errno: i32 },

    #[error("no connection pending")]
    WouldBlock { errno: i32 },

    /// The kernel reported a peer address larger than the family's
    /// sockaddr structure. The new connection has been closed.
    #[error("peer address length {len} exceeds {max}")]
    AddressOverflow { len: u32, max: u32 },
}

impl ErrorCode for AcceptError {
    fn code(&self) -> i32 {
        match self {
            AcceptError::WouldBlock { .. } => -2,
            AcceptError::Accept { .. } | AcceptError::AddressOverflow { .. } => -1,
        }
    }

    fn raw_os_error(&self) -> Option<i32> {
        match self {
            AcceptError::Accept { errno } | AcceptError::WouldBlock { errno } => Some(*errno),
            AcceptError::AddressOverflow { .. } => None,
        }
    }
}

/// I/O operation errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("read() failed: {}", errno_to_str(*.errno))]
    Read { errno: i32 },

    #[error("write() failed: {}", errno_to_str(*.errno))]
    Write { errno: i32 },

    #[error("write() failed after {written} of {total} bytes: {}", errno_to_str(*.errno))]
    Incomplete { errno: i32, written: usize, total: usize },

    #[error("write() accepted no bytes after {written} of {total}")]
    WriteZero { written: usize, total: usize },

    #[error("fstat() failed: {}", errno_to_str(*.errno))]
    Stat { errno: i32 },

    #[error("shutdown() failed: {}", errno_to_str(*.errno))]
    Shutdown { errno: i32 },

    #[error("close() failed: {}", errno_to_str(*.errno))]
    Close { errno: i32 },
}

impl ErrorCode for IoError {
    fn code(&self) -> i32 {
        -1
    }

    fn raw_os_error(&self) -> Option<i32> {
        match self {
            IoError::Read { errno }
            | IoError::Write { errno }
            | IoError::Incomplete { errno, .. }
            | IoError::Stat { errno }
            | IoError::Shutdown { errno }
            | IoError::Close { errno } => Some(*errno),
            IoError::WriteZero { .. } => None,
        }
    }
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// Overwrites the calling thread's errno.
#[inline]
pub(crate) fn set_errno(value: i32) {
    unsafe { *libc::__errno_location() = value }
}

/// Returns the calling thread's current OS error code.
///
/// After a failed operation in this crate this is the errno of the syscall
/// that caused the failure, not of any cleanup that ran afterwards.
pub fn last_os_error() -> i32 {
    errno()
}

/// Logs a failed operation and puts its captured errno back in place.
///
/// Must run after every descriptor the operation opened has been dropped,
/// so the close() calls cannot leave their own errno behind.
pub(crate) fn report<T, E>(op: &'static str, result: Result<T, E>) -> Result<T, E>
where
    E: ErrorCode + std::fmt::Display,
{
    if let Err(err) = &result {
        tracing::debug!(op, code = err.code(), errno = ?err.raw_os_error(), error = %err, "operation failed");
        if let Some(saved) = err.raw_os_error() {
            set_errno(saved);
        }
    }
    result
}

/// Converts errno to human-readable string.
fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRINUSE => "address already in use".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EHOSTUNREACH => "host unreachable".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOENT => "no such file or directory".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::ENOTSOCK => "not a socket".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

fn gai_to_str(gai: i32) -> String {
    if gai == 0 {
        return "no usable addresses".into();
    }
    let msg = unsafe { libc::gai_strerror(gai) };
    if msg.is_null() {
        return format!("getaddrinfo error {}", gai);
    }
    unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRINUSE => std::io::ErrorKind::AddrInUse,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

fn kind_of<E: ErrorCode>(err: &E, fallback: std::io::ErrorKind) -> std::io::ErrorKind {
    err.raw_os_error().map_or(fallback, errno_to_kind)
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        std::io::Error::new(kind_of(&err, std::io::ErrorKind::Other), err)
    }
}

impl From<ConnectError> for std::io::Error {
    fn from(err: ConnectError) -> Self {
        let kind = match &err {
            ConnectError::Resolve { .. } => std::io::ErrorKind::NotFound,
            ConnectError::PathTooLong { .. } => std::io::ErrorKind::InvalidInput,
            _ => kind_of(&err, std::io::ErrorKind::Other),
        };
        std::io::Error::new(kind, err)
    }
}

impl From<ListenError> for std::io::Error {
    fn from(err: ListenError) -> Self {
        std::io::Error::new(kind_of(&err, std::io::ErrorKind::InvalidInput), err)
    }
}

impl From<AcceptError> for std::io::Error {
    fn from(err: AcceptError) -> Self {
        let kind = match &err {
            AcceptError::WouldBlock { .. } => std::io::ErrorKind::WouldBlock,
            _ => kind_of(&err, std::io::ErrorKind::InvalidData),
        };
        std::io::Error::new(kind, err)
    }
}

impl From<IoError> for std::io::Error {
    fn from(err: IoError) -> Self {
        let kind = match &err {
            IoError::WriteZero { .. } => std::io::ErrorKind::WriteZero,
            _ => kind_of(&err, std::io::ErrorKind::Other),
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_scoped_per_operation() {
        let resolve = ConnectError::Resolve { host: "x".into(), gai: 0, errno: 0 };
        let invalid = ListenError::InvalidAddress { addr: "x".into() };
        let failed = AcceptError::Accept { errno: libc::EBADF };
        assert_eq!(resolve.code(), -1);
        assert_eq!(resolve.raw_os_error(), None);
        assert_eq!(invalid.code(), -1);
        assert_eq!(failed.code(), -1);

        assert_eq!(ConnectError::Connect { errno: libc::ECONNREFUSED, addr: String::new() }.code(), -3);
        assert_eq!(ListenError::Bind { errno: libc::EADDRINUSE, addr: String::new() }.code(), -3);
        assert_eq!(ListenError::Listen { errno: libc::EINVAL, backlog: 1 }.code(), -4);
        assert_eq!(AcceptError::WouldBlock { errno: libc::EAGAIN }.code(), -2);
        assert_eq!(AcceptError::AddressOverflow { len: 200, max: 16 }.code(), -1);
    }

    #[test]
    fn mode_failure_counts_as_construction() {
        let err: ConnectError = SocketError::SetOption { errno: libc::EBADF, option: "O_NONBLOCK" }.into();
        assert_eq!(err.code(), -2);
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn report_restores_captured_errno() {
        let result: Result<(), ListenError> =
            Err(ListenError::Bind { errno: libc::EADDRINUSE, addr: "x".into() });
        set_errno(libc::EBADF);
        let _ = report("bind", result);
        assert_eq!(last_os_error(), libc::EADDRINUSE);
    }

    #[test]
    fn report_leaves_errno_alone_without_syscall() {
        set_errno(libc::ENOENT);
        let result: Result<(), ConnectError> = Err(ConnectError::PathTooLong { addr: "x".into() });
        let _ = report("connect", result);
        assert_eq!(last_os_error(), libc::ENOENT);
    }

    #[test]
    fn io_error_kind_mapping() {
        let err: std::io::Error = IoError::Incomplete { errno: libc::EPIPE, written: 1, total: 2 }.into();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
        let err: std::io::Error = AcceptError::WouldBlock { errno: libc::EAGAIN }.into();
        assert_eq!(err.kind(), std::io::ErrorKind::WouldBlock);
    }
}
