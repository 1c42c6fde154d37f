//! Built-in blocking workload.
//!
//! Sleeps for `step * ((seed % 9) + 1)`, i.e. one to nine steps. With the
//! default 100ms step that is 100..=900ms. Stands in for a disk read, a
//! DNS lookup, or any other call that would stall the driving thread.

use std::thread;
use std::time::Duration;

use offload_core::kdebug;
use offload_core::task::{TaskInput, TaskOutput};

/// Delay the sleep workload uses for `seed`.
#[inline]
pub fn delay_for_seed(seed: u64, step: Duration) -> Duration {
    step * ((seed % 9) as u32 + 1)
}

/// `WorkFn` that sleeps the worker thread and reports the nominal delay.
pub fn sleep_task(input: &TaskInput) -> TaskOutput {
    let delay = delay_for_seed(input.seed, input.step);
    kdebug!("sleep task: seed={} delay={}ms", input.seed, delay.as_millis());
    thread::sleep(delay);
    kdebug!("sleep task: seed={} done after {}ms", input.seed, delay.as_millis());
    TaskOutput::new(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use offload_core::task::WorkFn;
    use std::time::Instant;

    const STEP: Duration = Duration::from_millis(100);

    #[test]
    fn test_delay_range() {
        assert_eq!(delay_for_seed(0, STEP), Duration::from_millis(100));
        assert_eq!(delay_for_seed(4, STEP), Duration::from_millis(500));
        assert_eq!(delay_for_seed(8, STEP), Duration::from_millis(900));
        assert_eq!(delay_for_seed(9, STEP), Duration::from_millis(100));
        for seed in 0..1000u64 {
            let d = delay_for_seed(seed, STEP);
            assert!(d >= STEP && d <= STEP * 9);
        }
        assert_eq!(delay_for_seed(u64::MAX, STEP), STEP * ((u64::MAX % 9) as u32 + 1));
    }

    #[test]
    fn test_sleep_task_sleeps() {
        let work: WorkFn = sleep_task;
        let start = Instant::now();
        let out = work(&TaskInput::new(2, Duration::from_millis(5)));
        assert_eq!(out.elapsed_ms(), 15);
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
