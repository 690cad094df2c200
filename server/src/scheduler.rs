//! Cancellable delayed actions driven by the authority tick.
//!
//! Nothing here reads the wall clock: tasks only move forward when the owner
//! calls [`Scheduler::advance`] with the tick's elapsed time, so a cancel made
//! while handling messages is always seen before the next expiry check.

use std::time::Duration;

/// Handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: u64,
    pending: Vec<(TaskHandle, Duration)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: Duration) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;
        self.pending.push((handle, delay));
        handle
    }

    /// Returns false if the task already fired or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|(h, _)| *h != handle);
        self.pending.len() != before
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.pending.iter().any(|(h, _)| *h == handle)
    }

    pub fn remaining(&self, handle: TaskHandle) -> Option<Duration> {
        self.pending
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, remaining)| *remaining)
    }

    /// Moves every task forward by `dt` and returns the ones that expired,
    /// in the order they were scheduled. Expired tasks are removed.
    pub fn advance(&mut self, dt: Duration) -> Vec<TaskHandle> {
        let mut expired = Vec::new();
        self.pending.retain_mut(|(handle, remaining)| {
            *remaining = remaining.saturating_sub(dt);
            if remaining.is_zero() {
                expired.push(*handle);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(500);

    #[test]
    fn test_task_fires_after_delay() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Duration::from_millis(1500));

        assert!(scheduler.advance(TICK).is_empty());
        assert!(scheduler.advance(TICK).is_empty());
        assert_eq!(scheduler.remaining(handle), Some(TICK));
        assert_eq!(scheduler.advance(TICK), vec![handle]);
        assert!(!scheduler.is_pending(handle));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(TICK);

        assert!(scheduler.cancel(handle));
        assert!(scheduler.advance(TICK * 4).is_empty());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(TICK);

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert_eq!(scheduler.len(), 0);
    }

    #[test]
    fn test_handles_are_unique() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.schedule(TICK);
        let b = scheduler.schedule(TICK * 2);
        assert_ne!(a, b);

        assert_eq!(scheduler.advance(TICK), vec![a]);
        assert!(scheduler.is_pending(b));
    }

    #[test]
    fn test_zero_delay_fires_on_next_advance() {
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule(Duration::ZERO);
        assert_eq!(scheduler.advance(Duration::ZERO), vec![handle]);
    }
}
