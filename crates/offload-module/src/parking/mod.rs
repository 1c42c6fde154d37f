//! Worker parking mechanism
//!
//! Idle pool workers sleep here until `submit()` wakes them.
//! Platform-specific implementations use the most efficient primitive available.
//!
//! Parking is epoch based so a wake can never be lost between a worker's
//! "queue is empty" check and its sleep:
//!
//! ```text
//! let epoch = parking.prepare_park();
//! if queue.is_empty() {
//!     parking.park(epoch, Some(timeout));   // returns at once if a wake
//! }                                         // happened after prepare_park
//! ```

use std::time::Duration;

/// Platform-specific worker parking mechanism
pub trait WorkerParking: Send + Sync {
    /// Snapshot the wake epoch. Check for work after this call, then pass
    /// the snapshot to `park()`.
    fn prepare_park(&self) -> u32;

    /// Sleep until a wake newer than `epoch`, or until `timeout`.
    ///
    /// Returns:
    /// - `true` if a wake was observed
    /// - `false` on timeout or spurious wakeup
    ///
    /// Workers re-check for work after returning regardless of the value.
    fn park(&self, epoch: u32, timeout: Option<Duration>) -> bool;

    /// Wake one parked worker
    fn wake_one(&self);

    /// Wake all parked workers (shutdown)
    fn wake_all(&self);

    /// Number of currently parked workers (hint, may be stale)
    fn parked_count(&self) -> usize;
}

mod fallback;
pub use fallback::FallbackParking;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        pub use fallback::FallbackParking as PlatformParking;
    }
}

/// Create a new platform-appropriate parking instance
pub fn new_parking() -> Box<dyn WorkerParking> {
    Box::new(PlatformParking::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn check_timeout(parking: &dyn WorkerParking) {
        let start = Instant::now();
        let epoch = parking.prepare_park();
        let woken = parking.park(epoch, Some(Duration::from_millis(50)));
        let elapsed = start.elapsed();
        assert!(!woken);
        assert!(elapsed >= Duration::from_millis(40)); // Allow some slack
    }

    fn wait_parked(parking: &dyn WorkerParking, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while parking.parked_count() < n && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn check_wake_one(parking: Arc<dyn WorkerParking>) {
        let p2 = Arc::clone(&parking);
        let handle = thread::spawn(move || {
            let epoch = p2.prepare_park();
            let start = Instant::now();
            let woken = p2.park(epoch, Some(Duration::from_secs(10)));
            (woken, start.elapsed())
        });

        wait_parked(parking.as_ref(), 1);
        parking.wake_one();

        let (woken, elapsed) = handle.join().unwrap();
        assert!(woken);
        assert!(elapsed < Duration::from_secs(5));
    }

    fn check_wake_before_park(parking: &dyn WorkerParking) {
        let epoch = parking.prepare_park();
        parking.wake_one();
        let start = Instant::now();
        assert!(parking.park(epoch, Some(Duration::from_secs(10))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_platform_parking() {
        check_timeout(&PlatformParking::new());
        check_wake_one(Arc::new(PlatformParking::new()));
        check_wake_before_park(&PlatformParking::new());
    }

    #[test]
    fn test_fallback_parking() {
        check_timeout(&FallbackParking::new());
        check_wake_one(Arc::new(FallbackParking::new()));
        check_wake_before_park(&FallbackParking::new());
    }

    #[test]
    fn test_wake_all() {
        let parking: Arc<dyn WorkerParking> = Arc::from(new_parking());
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let p = Arc::clone(&parking);
                thread::spawn(move || {
                    let epoch = p.prepare_park();
                    p.park(epoch, Some(Duration::from_secs(10)))
                })
            })
            .collect();

        wait_parked(parking.as_ref(), 3);
        parking.wake_all();

        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(parking.parked_count(), 0);
    }
}
