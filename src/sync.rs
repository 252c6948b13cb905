//! Blocking primitives built on [`Runtime::sleep`] and [`Runtime::wakeup`].
//!
//! Neither type touches the thread table directly. Mutual exclusion comes
//! from running each check-then-sleep step with preemption disabled, so a
//! release can never slip in between the test and the park.

use crate::error::ThreadError;
use crate::queue::WaitQueue;
use crate::runtime::Runtime;
use core::cell::Cell;

/// A sleeping mutual-exclusion lock.
#[derive(Debug, Default)]
pub struct Lock {
    held: Cell<bool>,
    queue: WaitQueue,
}

impl Lock {
    pub const fn new() -> Self {
        Lock {
            held: Cell::new(false),
            queue: WaitQueue::new(),
        }
    }

    pub fn is_held(&self) -> bool {
        self.held.get()
    }

    /// Takes the lock if it is free. Never blocks.
    pub fn try_acquire(&self, rt: &Runtime) -> bool {
        rt.without_preemption(|| !self.held.replace(true))
    }

    /// Takes the lock, sleeping until it is released.
    ///
    /// # Panics
    /// If the lock is held and no other thread can run to release it, or if
    /// the lock is already in use by a different runtime.
    pub fn acquire(&self, rt: &Runtime) {
        rt.without_preemption(|| {
            while self.held.replace(true) {
                park(rt, &self.queue, "lock");
            }
        });
    }

    /// Frees the lock and wakes every thread sleeping on it; they race to
    /// retake it in ready-queue order.
    pub fn release(&self, rt: &Runtime) {
        rt.without_preemption(|| {
            self.held.set(false);
            rt.wakeup(&self.queue, true);
        });
    }

    /// Acquires the lock and returns a guard that releases it on drop.
    pub fn lock<'a>(&'a self, rt: &'a Runtime) -> LockGuard<'a> {
        self.acquire(rt);
        LockGuard { lock: self, rt }
    }
}

/// Releases its [`Lock`] when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a Lock,
    rt: &'a Runtime,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(self.rt);
    }
}

/// A condition variable. Signals sent while nobody waits are lost.
#[derive(Debug, Default)]
pub struct CondVar {
    queue: WaitQueue,
}

impl CondVar {
    pub const fn new() -> Self {
        CondVar {
            queue: WaitQueue::new(),
        }
    }

    /// Releases `lock`, sleeps until signalled and reacquires `lock` before
    /// returning. The release and the sleep happen atomically.
    ///
    /// May return without a signal when no other thread can run, so callers
    /// recheck their condition in a loop.
    pub fn wait(&self, rt: &Runtime, lock: &Lock) {
        rt.without_preemption(|| {
            lock.release(rt);
            match rt.sleep(&self.queue) {
                Ok(_) | Err(ThreadError::NoneReady) => {}
                Err(err) => panic!("condition variable misuse: {err}"),
            }
            lock.acquire(rt);
        });
    }

    /// Wakes the longest waiting thread. Returns how many were woken.
    pub fn signal(&self, rt: &Runtime) -> usize {
        rt.wakeup(&self.queue, false)
    }

    /// Wakes every waiting thread. Returns how many were woken.
    pub fn broadcast(&self, rt: &Runtime) -> usize {
        rt.wakeup(&self.queue, true)
    }
}

fn park(rt: &Runtime, queue: &WaitQueue, what: &str) {
    match rt.sleep(queue) {
        Ok(_) => {}
        Err(ThreadError::NoneReady) => {
            panic!("deadlock: {what} is held and no other thread can run")
        }
        Err(err) => panic!("{what} shared between runtimes: {err}"),
    }
}
