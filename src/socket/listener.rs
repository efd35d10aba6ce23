use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::marker::PhantomData;
use crate::addr::{Domain, FromSockAddr};
use crate::error::{AcceptError, SocketError, errno, report};
use crate::suspend::{self, NoSuspend, SuspendHook};
use super::options::set_nonblocking;
use super::stream::ConnectedStream;

/// A listening socket ready to accept connections.
///
/// Only ever handed out in the listening state: builders either return
/// one of these or an error, never a half-configured socket.
/// The type parameter D tracks which address family (Ipv4, Ipv6, Unix).
pub struct Listener<D: Domain> {
    fd: OwnedFd,
    _marker: PhantomData<D>,
}

impl<D: Domain> Listener<D> {
    /// Internal use only, called by BoundSocket::listen()
    pub(crate) fn from_fd(fd: OwnedFd) -> Self {
        Self {
            fd,
            _marker: PhantomData,
        }
    }

    /// Returns the raw file descriptor.
    #[inline]
    pub fn as_raw_fd(&self) -> libc::c_int {
        self.fd.as_raw_fd()
    }

    /// Accepts an incoming connection.
    ///
    /// Returns the new connection together with the peer's binary address
    /// (`[u8; 4]` for IPv4, `[u8; 16]` for IPv6, `()` for Unix).
    ///
    /// # Failure Modes
    ///
    /// - `AcceptError::WouldBlock` (code -2) if the listener is non-blocking
    ///   and nothing is queued. Try again after a readiness notification.
    /// - Any other variant (code -1) means the listener itself is unusable
    ///   or the kernel answer was malformed.
    pub fn accept(&self) -> Result<(ConnectedStream<D>, D::Peer), AcceptError> {
        self.accept_with(&NoSuspend)
    }

    /// Like [`accept`](Self::accept), notifying `hook` around the syscall.
    pub fn accept_with<H: SuspendHook + ?Sized>(
        &self,
        hook: &H,
    ) -> Result<(ConnectedStream<D>, D::Peer), AcceptError> {
        let (fd, peer) = accept_on::<D, H>(self.as_raw_fd(), hook)?;
        Ok((ConnectedStream::from_fd(fd), peer))
    }

    /// Sets or clears the `O_NONBLOCK` flag on the listener socket.
    ///
    /// This decides whether `accept()` waits or returns `WouldBlock`.
    /// It does **not** change typestate: blocking behavior is a runtime
    /// property, not a state transition.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<(), SocketError> {
        report("set_nonblocking", set_nonblocking(self, nonblocking))
    }

    /// Returns the address the listener is bound to.
    ///
    /// Use this to learn the port after binding to port 0.
    pub fn local_addr(&self) -> Result<D::Addr, SocketError> {
        local_addr::<D>(self.as_raw_fd())
    }
}

/// Shared accept algorithm, usable on a descriptor this crate does not own.
///
/// Retries across `EINTR`, marks the new descriptor close-on-exec and
/// rejects a peer address longer than `D::Raw`. The new descriptor is
/// closed on every failure path.
pub(crate) fn accept_on<D, H>(listener: RawFd, hook: &H) -> Result<(OwnedFd, D::Peer), AcceptError>
where
    D: Domain,
    H: SuspendHook + ?Sized,
{
    report("accept", accept_raw::<D, H>(listener, hook))
}

fn accept_raw<D, H>(listener: RawFd, hook: &H) -> Result<(OwnedFd, D::Peer), AcceptError>
where
    D: Domain,
    H: SuspendHook + ?Sized,
{
    let mut raw: D::Raw = unsafe { std::mem::zeroed() };
    let max = std::mem::size_of::<D::Raw>() as libc::socklen_t;
    let mut len = max;

    let (fd, err) = suspend::blocking(hook, || loop {
        let fd = unsafe {
            libc::accept4(
                listener,
                &mut raw as *mut D::Raw as *mut libc::sockaddr,
                &mut len,
                libc::SOCK_CLOEXEC,
            )
        };
        let err = errno();
        if fd == -1 && err == libc::EINTR {
            continue;
        }
        break (fd, err);
    });

    if fd == -1 {
        return match err {
            libc::EAGAIN => Err(AcceptError::WouldBlock { errno: err }),
            _ => Err(AcceptError::Accept { errno: err }),
        };
    }

    let fd = unsafe { OwnedFd::from_raw_fd(fd) };
    if len > max {
        drop(fd);
        return Err(AcceptError::AddressOverflow { len, max });
    }

    tracing::trace!(fd = fd.as_raw_fd(), listener, "accepted connection");
    Ok((fd, D::peer(&raw)))
}

pub(crate) fn local_addr<D: Domain>(fd: RawFd) -> Result<D::Addr, SocketError> {
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;

    let result = unsafe {
        libc::getsockname(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
    };

    if result == -1 {
        return Err(SocketError::GetOption { errno: errno(), option: "SO_SOCKNAME" });
    }

    unsafe { D::Addr::from_sockaddr(&storage as *const _ as *const libc::sockaddr, len) }
        .ok_or(SocketError::GetOption { errno: libc::EAFNOSUPPORT, option: "SO_SOCKNAME" })
}

impl<D: Domain> AsRawFd for Listener<D> {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl<D: Domain> std::os::fd::AsFd for Listener<D> {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl<D: Domain> FromRawFd for Listener<D> {
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        unsafe { Self::from_fd(OwnedFd::from_raw_fd(fd)) }
    }
}

impl<D: Domain> std::os::fd::IntoRawFd for Listener<D> {
    fn into_raw_fd(self) -> RawFd {
        self.fd.into_raw_fd()
    }
}

/*
Notice: accept_raw() checks the descriptor before the length.
A failed accept4() leaves `len` untouched, so the overflow check
only ever fires on a descriptor that has to be closed again.
*/
