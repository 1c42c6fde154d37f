//! `EventFdNotifier`: default `Notifier` on Linux.
//!
//! Workers write 1 to an eventfd; the driving thread polls it and reads it
//! back to zero. Coalescing: multiple `notify()` calls before the read
//! result in a single wakeup (eventfd counter semantics).

use offload_core::notifier::Notifier;
use offload_core::{OffloadError, Result};

use std::os::unix::io::RawFd;
use std::time::Duration;

use super::timeout_ms;

pub struct EventFdNotifier {
    fd: RawFd,
}

impl EventFdNotifier {
    /// Create a new eventfd and wrap it. The notifier closes it on drop.
    pub fn create() -> Result<Self> {
        // Safety: plain syscall, no pointers.
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(OffloadError::last_os_error());
        }
        Ok(Self { fd })
    }

    /// Raw eventfd, for registering with an external poll loop.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Read the counter back to zero. `Ok(false)` if it was already zero.
    fn drain(&self) -> Result<bool> {
        let mut val: u64 = 0;
        // Safety: reading 8 bytes into a live u64.
        let ret = unsafe {
            libc::read(
                self.fd,
                &mut val as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = OffloadError::last_os_error();
            return match err {
                OffloadError::Os(e) if e == libc::EAGAIN => Ok(false),
                _ => Err(err),
            };
        }
        Ok(val > 0)
    }
}

impl Notifier for EventFdNotifier {
    fn notify(&self) -> Result<()> {
        let val: u64 = 1;
        // Safety: writing 8 bytes from a live u64.
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let err = OffloadError::last_os_error();
            // EAGAIN means the counter is saturated: a wake is already pending.
            return match err {
                OffloadError::Os(e) if e == libc::EAGAIN => Ok(()),
                _ => Err(err),
            };
        }
        Ok(())
    }

    fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        // Safety: one live pollfd.
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms(timeout)) };
        if ret < 0 {
            let err = OffloadError::last_os_error();
            return match err {
                OffloadError::Os(e) if e == libc::EINTR => Ok(false),
                _ => Err(err),
            };
        }
        if ret == 0 {
            return Ok(false);
        }
        self.drain()
    }
}

impl Drop for EventFdNotifier {
    fn drop(&mut self) {
        if self.fd >= 0 {
            // Safety: we own the fd and close it exactly once.
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fd_is_pollable() {
        let n = EventFdNotifier::create().unwrap();
        assert!(n.fd() >= 0);

        n.notify().unwrap();
        let mut pfd = libc::pollfd {
            fd: n.fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ready = unsafe { libc::poll(&mut pfd, 1, 0) };
        assert_eq!(ready, 1);
        assert!(n.drain().unwrap());
        assert!(!n.drain().unwrap());
    }
}
