//! Runtime counters.
//!
//! Counters are plain atomics so the timer signal handler can update them
//! without taking a lock.

use portable_atomic::{AtomicU64, Ordering};

/// Live counters owned by a runtime.
#[derive(Debug)]
pub struct SystemMetrics {
    /// Threads handed out by create/spawn
    pub threads_created: AtomicU64,
    /// Threads that ran their exit path
    pub threads_exited: AtomicU64,
    /// Successful kill requests
    pub threads_killed: AtomicU64,
    /// Stacks released by deferred reclamation
    pub stacks_reclaimed: AtomicU64,
    /// Dispatches that changed the running thread
    pub context_switches: AtomicU64,
    /// Timer ticks that preempted a thread
    pub timer_interrupts: AtomicU64,
    /// Threads moved from a wait queue to the ready queue
    pub wakeups: AtomicU64,
    /// Joins that consumed a thread's exit status
    pub joins: AtomicU64,
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMetrics {
    pub const fn new() -> Self {
        Self {
            threads_created: AtomicU64::new(0),
            threads_exited: AtomicU64::new(0),
            threads_killed: AtomicU64::new(0),
            stacks_reclaimed: AtomicU64::new(0),
            context_switches: AtomicU64::new(0),
            timer_interrupts: AtomicU64::new(0),
            wakeups: AtomicU64::new(0),
            joins: AtomicU64::new(0),
        }
    }

    pub fn record_thread_created(&self) {
        self.threads_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_thread_exited(&self) {
        self.threads_exited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_thread_killed(&self) {
        self.threads_killed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stack_reclaimed(&self) {
        self.stacks_reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_context_switch(&self) {
        self.context_switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timer_interrupt(&self) {
        self.timer_interrupts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_wakeups(&self, count: usize) {
        self.wakeups.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_join(&self) {
        self.joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RuntimeStats {
        let threads_created = self.threads_created.load(Ordering::Relaxed);
        let threads_exited = self.threads_exited.load(Ordering::Relaxed);
        RuntimeStats {
            threads_created,
            threads_exited,
            threads_killed: self.threads_killed.load(Ordering::Relaxed),
            stacks_reclaimed: self.stacks_reclaimed.load(Ordering::Relaxed),
            context_switches: self.context_switches.load(Ordering::Relaxed),
            timer_interrupts: self.timer_interrupts.load(Ordering::Relaxed),
            wakeups: self.wakeups.load(Ordering::Relaxed),
            joins: self.joins.load(Ordering::Relaxed),
            live_threads: threads_created.saturating_sub(threads_exited),
        }
    }
}

/// Point-in-time copy of a runtime's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub threads_created: u64,
    pub threads_exited: u64,
    pub threads_killed: u64,
    pub stacks_reclaimed: u64,
    pub context_switches: u64,
    pub timer_interrupts: u64,
    pub wakeups: u64,
    pub joins: u64,
    /// Created threads that have not yet run their exit path. The bootstrap
    /// thread is not counted.
    pub live_threads: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = SystemMetrics::new();
        metrics.record_thread_created();
        metrics.record_thread_created();
        metrics.record_thread_exited();
        metrics.record_wakeups(3);
        metrics.record_context_switch();

        let stats = metrics.snapshot();
        assert_eq!(stats.threads_created, 2);
        assert_eq!(stats.live_threads, 1);
        assert_eq!(stats.wakeups, 3);
        assert_eq!(stats.context_switches, 1);
        assert_eq!(stats.timer_interrupts, 0);
    }
}
