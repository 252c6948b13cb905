//! Intrusive FIFO queues over the thread table.
//!
//! A queue only stores the indices of its first and last member; the links
//! between members live in the `next` field of each thread control block.
//! Because there is a single link per thread, a thread can be a member of
//! at most one queue at a time.

use crate::thread::Thread;
use core::cell::Cell;
use core::ptr::NonNull;

/// Names the wait queue a blocked thread is parked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueRef {
    /// The join queue of the given thread id, owned by the scheduler.
    Join(usize),
    /// A [`WaitQueue`] owned by user code.
    External(NonNull<Queue>),
}

pub(crate) struct Queue {
    head: Cell<Option<usize>>,
    tail: Cell<Option<usize>>,
}

impl Queue {
    pub const fn new() -> Self {
        Queue {
            head: Cell::new(None),
            tail: Cell::new(None),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.head.get().is_none()
    }

    pub fn head(&self) -> Option<usize> {
        self.head.get()
    }

    pub fn push(&self, threads: &mut [Thread], id: usize) {
        debug_assert!(!self.contains(threads, id), "thread {id} queued twice");

        threads[id].next = None;
        match self.tail.get() {
            None => self.head.set(Some(id)),
            Some(tail) => threads[tail].next = Some(id),
        }
        self.tail.set(Some(id));
    }

    pub fn pop(&self, threads: &mut [Thread]) -> Option<usize> {
        let head = self.head.get()?;
        let next = threads[head].next.take();
        self.head.set(next);
        if next.is_none() {
            self.tail.set(None);
        }
        Some(head)
    }

    /// Unlinks `id` wherever it sits in the queue.
    pub fn remove(&self, threads: &mut [Thread], id: usize) -> bool {
        let mut prev: Option<usize> = None;
        let mut cursor = self.head.get();

        while let Some(current) = cursor {
            if current == id {
                let next = threads[current].next.take();
                match prev {
                    None => self.head.set(next),
                    Some(prev) => threads[prev].next = next,
                }
                if self.tail.get() == Some(current) {
                    self.tail.set(prev);
                }
                return true;
            }
            prev = Some(current);
            cursor = threads[current].next;
        }
        false
    }

    pub fn contains(&self, threads: &[Thread], id: usize) -> bool {
        self.iter(threads).any(|member| member == id)
    }

    pub fn iter<'a>(&self, threads: &'a [Thread]) -> impl Iterator<Item = usize> + 'a {
        let mut cursor = self.head.get();
        core::iter::from_fn(move || {
            let current = cursor?;
            cursor = threads[current].next;
            Some(current)
        })
    }
}

/// A FIFO of threads blocked until some event occurs.
///
/// Pass it to [`Runtime::sleep`](crate::Runtime::sleep) to park the calling
/// thread and to [`Runtime::wakeup`](crate::Runtime::wakeup) to release
/// parked threads. The first runtime that uses a queue owns it; other
/// runtimes are refused.
///
/// A parked thread keeps a borrow of the queue alive on its suspended stack,
/// which is what keeps the queue in place while it has members.
pub struct WaitQueue {
    queue: Queue,
    owner: Cell<usize>,
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitQueue {
    pub const fn new() -> Self {
        WaitQueue {
            queue: Queue::new(),
            owner: Cell::new(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Binds the queue to `owner` on first use.
    pub(crate) fn bind(&self, owner: usize) -> bool {
        match self.owner.get() {
            0 => {
                self.owner.set(owner);
                true
            }
            bound => bound == owner,
        }
    }

    pub(crate) fn queue(&self) -> &Queue {
        &self.queue
    }
}

impl core::fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WaitQueue")
            .field("head", &self.queue.head())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn table(n: usize) -> Vec<Thread> {
        (0..n).map(Thread::empty).collect()
    }

    fn members(queue: &Queue, threads: &[Thread]) -> Vec<usize> {
        queue.iter(threads).collect()
    }

    #[test]
    fn test_fifo_order() {
        let mut threads = table(4);
        let queue = Queue::new();
        assert!(queue.is_empty());

        queue.push(&mut threads, 2);
        queue.push(&mut threads, 0);
        queue.push(&mut threads, 3);

        assert_eq!(queue.head(), Some(2));
        assert_eq!(queue.pop(&mut threads), Some(2));
        assert_eq!(queue.pop(&mut threads), Some(0));
        assert_eq!(queue.pop(&mut threads), Some(3));
        assert_eq!(queue.pop(&mut threads), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut threads = table(5);
        let queue = Queue::new();
        for id in 0..5 {
            queue.push(&mut threads, id);
        }

        assert!(queue.remove(&mut threads, 0));
        assert!(queue.remove(&mut threads, 2));
        assert!(queue.remove(&mut threads, 4));
        assert!(!queue.remove(&mut threads, 4));
        assert_eq!(members(&queue, &threads), [1, 3]);

        // The tail must have moved back so pushes still land at the end.
        queue.push(&mut threads, 4);
        assert_eq!(members(&queue, &threads), [1, 3, 4]);
    }

    #[test]
    fn test_remove_only_member() {
        let mut threads = table(2);
        let queue = Queue::new();
        queue.push(&mut threads, 1);

        assert!(queue.remove(&mut threads, 1));
        assert!(queue.is_empty());
        assert_eq!(queue.pop(&mut threads), None);

        queue.push(&mut threads, 0);
        assert_eq!(members(&queue, &threads), [0]);
    }

    #[test]
    fn test_links_move_between_queues() {
        let mut threads = table(3);
        let ready = Queue::new();
        let waiting = Queue::new();

        ready.push(&mut threads, 0);
        ready.push(&mut threads, 1);
        let id = ready.pop(&mut threads).unwrap();
        waiting.push(&mut threads, id);

        assert!(waiting.contains(&threads, 0));
        assert!(!ready.contains(&threads, 0));
        assert_eq!(members(&ready, &threads), [1]);
    }

    #[test]
    fn test_wait_queue_binds_once() {
        let wq = WaitQueue::new();
        assert!(wq.bind(0x1000));
        assert!(wq.bind(0x1000));
        assert!(!wq.bind(0x2000));
        assert!(wq.is_empty());
    }
}
