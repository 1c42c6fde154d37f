//! Driving-thread notifiers.
//!
//! On Linux the default is an eventfd, which an epoll/io_uring based driving
//! loop can watch next to its sockets. Elsewhere a condvar stands in.

use offload_core::{Notifier, Result};

mod condvar;
pub use condvar::CondvarNotifier;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod eventfd;
        pub use eventfd::EventFdNotifier;
        pub type PlatformNotifier = EventFdNotifier;
    } else {
        pub type PlatformNotifier = CondvarNotifier;
    }
}

/// Create the platform-appropriate notifier.
pub fn new_notifier() -> Result<Box<dyn Notifier>> {
    Ok(Box::new(PlatformNotifier::create()?))
}

/// Convert a wait timeout to poll(2) milliseconds, rounding up so a short
/// non-zero timeout never turns into a busy poll.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) fn timeout_ms(timeout: Option<std::time::Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(d) => {
            let ms = (d.as_micros() + 999) / 1000;
            ms.min(i32::MAX as u128) as i32
        }
    }
}
