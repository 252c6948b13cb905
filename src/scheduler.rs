//! Thread table, ready queue and id allocation.
//!
//! `Scheduler` is plain data: it never switches contexts and never touches
//! the preemption flag. [`Runtime`](crate::Runtime) wraps it in the critical
//! sections and performs the switches.

use crate::context::Context;
use crate::queue::{Queue, QueueRef};
use crate::stack_guard::Stack;
use crate::thread::{DiscardFn, Thread, ThreadState};
use alloc::boxed::Box;

pub(crate) struct Scheduler {
    pub threads: Box<[Thread]>,
    /// One join queue per thread id.
    pub joins: Box<[Queue]>,
    pub ready: Queue,
    /// Terminated ids. Their stacks are freed lazily and the ids are handed
    /// out again by `take_free_id`.
    pub reuse: Queue,
    pub current: usize,
    next_id: usize,
}

impl Scheduler {
    pub fn new(max_threads: usize) -> Self {
        let mut threads: Box<[Thread]> = (0..max_threads).map(Thread::empty).collect();
        threads[0].state = ThreadState::Running;

        Scheduler {
            threads,
            joins: (0..max_threads).map(|_| Queue::new()).collect(),
            ready: Queue::new(),
            reuse: Queue::new(),
            current: 0,
            next_id: 1,
        }
    }

    pub fn capacity(&self) -> usize {
        self.threads.len()
    }

    pub fn state_of(&self, id: usize) -> Option<ThreadState> {
        self.threads.get(id).map(|thread| thread.state)
    }

    pub fn current_thread(&mut self) -> &mut Thread {
        &mut self.threads[self.current]
    }

    pub fn is_ready_queued(&self, id: usize) -> bool {
        id < self.threads.len() && self.ready.contains(&self.threads, id)
    }

    /// The id the next `take_free_id` will return.
    pub fn peek_free_id(&self) -> Option<usize> {
        if self.next_id < self.threads.len() {
            Some(self.next_id)
        } else {
            self.reuse.head()
        }
    }

    pub fn take_free_id(&mut self) -> Option<usize> {
        if self.next_id < self.threads.len() {
            let id = self.next_id;
            self.next_id += 1;
            Some(id)
        } else {
            self.reuse.pop(&mut self.threads)
        }
    }

    /// Installs a new thread in slot `id` and makes it ready.
    pub fn install(&mut self, id: usize, stack: Stack, context: Context, discard: Option<(DiscardFn, usize)>) {
        self.threads[id].reset(stack, context, discard);
        self.ready.push(&mut self.threads, id);
    }

    /// Frees the stacks of terminated threads. Must not run while any of
    /// them could still be executing, i.e. only from a live thread.
    pub fn reclaim(&mut self) -> usize {
        let mut freed = 0;
        let mut cursor = self.reuse.head();
        while let Some(id) = cursor {
            let thread = &mut self.threads[id];
            if thread.stack.take().is_some() {
                freed += 1;
            }
            cursor = thread.next;
        }
        freed
    }

    /// Files the outgoing thread according to its state: runnable threads go
    /// to the back of the ready queue, terminated ones to the reuse queue,
    /// blocked ones stay where `park` put them.
    pub fn retire_current(&mut self) {
        let id = self.current;
        match self.threads[id].state {
            ThreadState::Blocked => {}
            ThreadState::Exited | ThreadState::Killed => {
                // The bootstrap thread runs on the native stack and its id
                // is never handed out again.
                if id != 0 {
                    self.reuse.push(&mut self.threads, id);
                }
            }
            _ => {
                self.threads[id].state = ThreadState::Ready;
                self.ready.push(&mut self.threads, id);
            }
        }
    }

    /// Pulls `id` out of the ready queue and makes it the running thread.
    /// A killed thread keeps its state so it notices on resumption.
    pub fn dispatch(&mut self, id: usize) {
        let removed = self.ready.remove(&mut self.threads, id);
        debug_assert!(removed, "dispatching thread {id} that is not ready");

        let thread = &mut self.threads[id];
        if thread.state != ThreadState::Killed {
            thread.state = ThreadState::Running;
        }
        self.current = id;
    }

    /// Blocks the running thread on `queue`.
    pub fn park(&mut self, queue: QueueRef) {
        let id = self.current;
        let thread = &mut self.threads[id];
        thread.state = ThreadState::Blocked;
        thread.parked_on = Some(queue);
        queue_of(&self.joins, queue).push(&mut self.threads, id);
    }

    /// Moves one thread parked on `queue` to the ready queue.
    pub fn unpark(&mut self, queue: QueueRef) -> Option<usize> {
        let id = queue_of(&self.joins, queue).pop(&mut self.threads)?;
        let thread = &mut self.threads[id];
        thread.parked_on = None;
        thread.state = ThreadState::Ready;
        self.ready.push(&mut self.threads, id);
        Some(id)
    }

    /// Wakes every thread joining `id`. The first one woken is handed the
    /// exit code, so the join is decided before the id can be reused.
    pub fn release_joiners(&mut self, id: usize) -> usize {
        let mut woken = 0;
        while let Some(joiner) = self.unpark(QueueRef::Join(id)) {
            if woken == 0 && self.threads[id].joinable {
                self.threads[id].joinable = false;
                self.threads[joiner].joined = self.threads[id].exit_code;
            }
            woken += 1;
        }
        woken
    }

    /// Unlinks a blocked thread from whichever wait queue holds it.
    pub fn unlink(&mut self, id: usize) {
        if let Some(queue) = self.threads[id].parked_on.take() {
            queue_of(&self.joins, queue).remove(&mut self.threads, id);
        }
    }
}

fn queue_of(joins: &[Queue], queue: QueueRef) -> &Queue {
    match queue {
        QueueRef::Join(id) => &joins[id],
        // Parked threads keep the external queue borrowed on their
        // suspended stacks, so it outlives its membership.
        QueueRef::External(ptr) => unsafe { ptr.as_ref() },
    }
}
