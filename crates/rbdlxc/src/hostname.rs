//! Local host identity.
//!
//! A move whose target names this host is a no-op, so the daemon needs the
//! same name peers use to reach it: the canonical FQDN when the resolver
//! knows one, the kernel nodename otherwise.

#![allow(unsafe_code)]

use std::ffi::{CStr, CString};
use std::ptr;

/// Kernel nodename, as `uname -n` prints it.
#[must_use]
pub fn short_hostname() -> String {
    rustix::system::uname()
        .nodename()
        .to_string_lossy()
        .into_owned()
}

/// Canonical name of this host, falling back to [`short_hostname`].
#[must_use]
pub fn local_fqdn() -> String {
    let short = short_hostname();
    match canonical_name(&short) {
        Some(fqdn) => fqdn,
        None => {
            tracing::debug!(hostname = %short, "No canonical name, using nodename");
            short
        }
    }
}

/// Resolve `host` with `AI_CANONNAME` and return the canonical name.
fn canonical_name(host: &str) -> Option<String> {
    let node = CString::new(host).ok()?;

    // SAFETY: an all-zero addrinfo is a valid "no hints" value.
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_flags = libc::AI_CANONNAME;

    let mut result: *mut libc::addrinfo = ptr::null_mut();
    // SAFETY: node and hints outlive the call; result is freed below.
    let rc = unsafe { libc::getaddrinfo(node.as_ptr(), ptr::null(), &hints, &mut result) };
    if rc != 0 || result.is_null() {
        return None;
    }

    // SAFETY: result is a non-null list returned by getaddrinfo; only the
    // first entry carries ai_canonname.
    let canon = unsafe {
        let first = &*result;
        let name = (!first.ai_canonname.is_null())
            .then(|| CStr::from_ptr(first.ai_canonname).to_string_lossy().into_owned());
        libc::freeaddrinfo(result);
        name
    };

    canon
        .map(|name| trim_root(&name).to_string())
        .filter(|name| !name.is_empty())
}

/// Drop the trailing root label dot.
fn trim_root(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
