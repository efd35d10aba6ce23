use std::ffi::CString;
use crate::addr::{FromSockAddr, IpDomain};
use crate::error::{ConnectError, errno};

/// Owned getaddrinfo() result list, freed on drop.
struct AddrInfoList(*mut libc::addrinfo);

impl AddrInfoList {
	fn iter(&self) -> impl Iterator<Item = &libc::addrinfo> {
		let mut cur = self.0;
		std::iter::from_fn(move || {
			if cur.is_null() {
				return None;
			}
			let entry = unsafe { &*cur };
			cur = entry.ai_next;
			Some(entry)
		})
	}
}

impl Drop for AddrInfoList {
	fn drop(&mut self) {
		if !self.0.is_null() {
			unsafe { libc::freeaddrinfo(self.0) };
		}
	}
}

/// Resolves `host` (and optional `service`) to stream candidates of family `D`,
/// in the order getaddrinfo() returned them.
///
/// A `port` above zero replaces whatever port resolution produced; it is
/// required when `service` is `None`. An empty answer is a failure.
pub(crate) fn resolve<D: IpDomain>(
	host: &str,
	service: Option<&str>,
	port: u16,
) -> Result<Vec<D::Addr>, ConnectError> {
	let failed = |gai: i32, errno: i32| ConnectError::Resolve {
		host: host.to_owned(),
		gai,
		errno,
	};

	let c_host = CString::new(host).map_err(|_| failed(libc::EAI_NONAME, libc::EINVAL))?;
	let c_service = service
		.map(CString::new)
		.transpose()
		.map_err(|_| failed(libc::EAI_SERVICE, libc::EINVAL))?;

	let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
	hints.ai_family = D::raw();
	hints.ai_socktype = libc::SOCK_STREAM;

	let mut res: *mut libc::addrinfo = std::ptr::null_mut();
	let rc = unsafe {
		libc::getaddrinfo(
			c_host.as_ptr(),
			c_service.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
			&hints,
			&mut res,
		)
	};
	if rc != 0 {
		// errno only describes the failure for EAI_SYSTEM
		let os = if rc == libc::EAI_SYSTEM { errno() } else { 0 };
		return Err(failed(rc, os));
	}
	let list = AddrInfoList(res);

	let candidates: Vec<D::Addr> = list
		.iter()
		.filter(|ai| ai.ai_family == D::raw() && !ai.ai_addr.is_null())
		.filter_map(|ai| unsafe { D::Addr::from_sockaddr(ai.ai_addr, ai.ai_addrlen) })
		.map(|addr| if port > 0 { D::with_port(addr, port) } else { addr })
		.collect();

	if candidates.is_empty() {
		return Err(failed(0, 0));
	}

	tracing::trace!(host, count = candidates.len(), "resolved candidates");
	Ok(candidates)
}
