//! Process-level memory hardening
//!
//! Best-effort protections for seed and key material:
//!
//! 1. Core dumps are disabled (`setrlimit(RLIMIT_CORE, 0)`) so a crash
//!    never writes secrets to disk.
//! 2. [`LockedBuffer`] pins its pages with `mlock()` so the OS cannot
//!    swap them out, and zeroizes before unlocking on drop.
//!
//! Failures are logged, not fatal: containers and unprivileged users
//! often cannot raise memlock limits.

use std::sync::atomic::{AtomicBool, Ordering};

use zeroize::Zeroize;

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process. Idempotent; call early
/// at startup. Returns whether the limit is in place.
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        let rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with a stack-local rlimit is a plain POSIX call
        let rc = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) };
        if rc != 0 {
            log::warn!(
                "failed to disable core dumps: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    #[cfg(not(unix))]
    {
        log::warn!("core dump prevention not supported on this platform");
        false
    }
}

/// A heap buffer that is `mlock`ed while alive and zeroized on drop.
///
/// Used for seeds and derived keys that must never reach swap.
pub struct LockedBuffer {
    data: Vec<u8>,
    locked: bool,
}

impl LockedBuffer {
    /// Allocate a zero-filled buffer of `len` bytes and pin it.
    pub fn new(len: usize) -> Self {
        let data = vec![0u8; len];
        let locked = lock_pages(&data);
        if !locked && !data.is_empty() {
            log::warn!("mlock failed for {} bytes; buffer may be swappable", len);
        }
        Self { data, locked }
    }

    /// Copy `src` into a fresh locked buffer.
    pub fn from_slice(src: &[u8]) -> Self {
        let mut buf = Self::new(src.len());
        buf.data.copy_from_slice(src);
        buf
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the pages are actually pinned.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for LockedBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
        if self.locked {
            unlock_pages(&self.data);
        }
    }
}

#[cfg(unix)]
fn lock_pages(data: &[u8]) -> bool {
    if data.is_empty() {
        return true;
    }
    // SAFETY: the pointer and length come from a live Vec allocation
    unsafe { libc::mlock(data.as_ptr() as *const libc::c_void, data.len()) == 0 }
}

#[cfg(unix)]
fn unlock_pages(data: &[u8]) {
    if data.is_empty() {
        return;
    }
    // SAFETY: matches a prior successful mlock on the same region
    unsafe {
        libc::munlock(data.as_ptr() as *const libc::c_void, data.len());
    }
}

#[cfg(not(unix))]
fn lock_pages(_data: &[u8]) -> bool {
    false
}

#[cfg(not(unix))]
fn unlock_pages(_data: &[u8]) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_core_dumps_idempotent() {
        disable_core_dumps();
        // Second call short-circuits on the atomic and reports success
        assert!(disable_core_dumps());
    }

    #[test]
    fn test_locked_buffer_read_write() {
        let mut buf = LockedBuffer::new(64);
        assert_eq!(buf.len(), 64);
        buf.as_mut_slice()[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(&buf.as_slice()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_from_slice_copies() {
        let buf = LockedBuffer::from_slice(b"seed material");
        assert_eq!(buf.as_slice(), b"seed material");
    }

    #[test]
    fn test_zero_length() {
        let buf = LockedBuffer::new(0);
        assert!(buf.is_empty());
        assert!(buf.is_locked());
    }
}
