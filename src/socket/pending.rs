use std::marker::PhantomData;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use crate::addr::Domain;
use crate::error::SocketError;
use super::options::take_error;
use super::stream::ConnectedStream;

/// A non-blocking connection whose handshake may still be in flight.
///
/// Wait for writability with whatever readiness mechanism the caller
/// runs (poll, epoll, io_uring), then call `take_error()`.
pub struct PendingConnect<D: Domain> {
    fd: OwnedFd,
    _marker: PhantomData<D>,
}

impl<D: Domain> PendingConnect<D> {
    pub(crate) fn from_fd(fd: OwnedFd) -> Self {
        Self {
            fd,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_raw_fd(&self) -> libc::c_int {
        self.fd.as_raw_fd()
    }

    /// Reads and clears the socket error status.
    ///
    /// Returns `None` if no error (connect succeeded).
    /// Returns `Some(error)` if connect failed.
    /// Reading clears the error, so only call once.
    pub fn take_error(&self) -> Result<Option<std::io::Error>, SocketError> {
        let error = take_error(self)?;
        if error == 0 {
            Ok(None)
        } else {
            Ok(Some(std::io::Error::from_raw_os_error(error)))
        }
    }

    /// Completes the connection after verifying no error.
    ///
    /// Call `take_error()` first. If it returned `None`, call this.
    /// The descriptor stays non-blocking.
    pub fn finish(self) -> ConnectedStream<D> {
        ConnectedStream::from_fd(self.fd)
    }
}

impl<D: Domain> AsRawFd for PendingConnect<D> {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl<D: Domain> std::os::fd::AsFd for PendingConnect<D> {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl<D: Domain> FromRawFd for PendingConnect<D> {
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        unsafe { Self::from_fd(OwnedFd::from_raw_fd(fd)) }
    }
}

impl<D: Domain> IntoRawFd for PendingConnect<D> {
    fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}
