//! The green-thread runtime.
//!
//! A [`Runtime`] owns the thread table and multiplexes green threads over
//! the native thread that created it. The native thread itself becomes the
//! bootstrap thread, id 0. Every operation runs with preemption disabled and
//! restores the previous setting on every return path.

use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::error::{ThreadError, ThreadResult};
use crate::observability::{RuntimeStats, SystemMetrics};
use crate::preemption::{timer, Interrupts};
use crate::queue::{QueueRef, WaitQueue};
use crate::scheduler::Scheduler;
use crate::stack_guard::Stack;
use crate::thread::{DiscardFn, Target, ThreadId, ThreadState, KILLED_EXIT_CODE};
use alloc::boxed::Box;
use core::cell::UnsafeCell;
use core::marker::{PhantomData, PhantomPinned};
use core::pin::Pin;
use core::ptr::NonNull;
use core::time::Duration;

/// Entry point of a thread started with [`Runtime::create`].
pub type ThreadEntry = fn(&Runtime, usize);

type RawEntry = unsafe fn(&Runtime, usize);

/// A single-CPU green-thread scheduler.
///
/// Created pinned on the heap: every green thread keeps the runtime's
/// address in its initial frame. The runtime is neither `Send` nor `Sync`.
pub struct Runtime {
    sched: UnsafeCell<Scheduler>,
    irq: Interrupts,
    metrics: SystemMetrics,
    config: RuntimeConfig,
    _pinned: PhantomPinned,
    _not_send: PhantomData<*mut ()>,
}

impl Runtime {
    /// Builds a runtime and makes the calling context its bootstrap thread.
    pub fn new(config: RuntimeConfig) -> ThreadResult<Pin<Box<Runtime>>> {
        config.validate()?;
        Ok(Box::pin(Runtime {
            sched: UnsafeCell::new(Scheduler::new(config.max_threads)),
            irq: Interrupts::new(),
            metrics: SystemMetrics::new(),
            config,
            _pinned: PhantomPinned,
            _not_send: PhantomData,
        }))
    }

    /// Exclusive access to the scheduler state.
    ///
    /// Callers hold preemption disabled and drop the borrow before any
    /// context switch.
    #[allow(clippy::mut_from_ref)]
    fn sched(&self) -> &mut Scheduler {
        unsafe { &mut *self.sched.get() }
    }

    fn key(&self) -> usize {
        self as *const Runtime as usize
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Size of the thread table, including the bootstrap thread.
    pub fn capacity(&self) -> usize {
        let _guard = self.irq.disable();
        self.sched().capacity()
    }

    /// Id of the running thread.
    pub fn current(&self) -> ThreadId {
        let _guard = self.irq.disable();
        ThreadId::new(self.sched().current)
    }

    /// State of slot `id`, or `None` if the id is out of range.
    pub fn state(&self, id: ThreadId) -> Option<ThreadState> {
        let _guard = self.irq.disable();
        self.sched().state_of(id.as_usize())
    }

    /// Exit code of a terminated thread. Stays readable after its join has
    /// been consumed, until the id is handed out again.
    pub fn exit_code(&self, id: ThreadId) -> Option<i32> {
        let _guard = self.irq.disable();
        let thread = self.sched().threads.get(id.as_usize())?;
        if thread.state.is_terminal() {
            thread.exit_code
        } else {
            None
        }
    }

    /// Creates a thread that runs `entry(runtime, arg)` and queues it as
    /// ready. The caller keeps running.
    pub fn create(&self, entry: ThreadEntry, arg: usize) -> ThreadResult<ThreadId> {
        self.create_thread(entry as *const () as usize, arg, None)
    }

    /// Like [`create`](Self::create), for a closure. If the thread is killed
    /// before it first runs, the closure is dropped without being called.
    pub fn spawn<F>(&self, f: F) -> ThreadResult<ThreadId>
    where
        F: FnOnce(&Runtime) + 'static,
    {
        let _guard = self.irq.disable();
        let arg = Box::into_raw(Box::new(f)) as usize;
        let discard: DiscardFn = drop_boxed::<F>;
        let entry: RawEntry = run_boxed::<F>;

        self.create_thread(entry as *const () as usize, arg, Some((discard, arg)))
            .inspect_err(|_| unsafe { drop_boxed::<F>(arg) })
    }

    fn create_thread(
        &self,
        entry: usize,
        arg: usize,
        discard: Option<(DiscardFn, usize)>,
    ) -> ThreadResult<ThreadId> {
        let _guard = self.irq.disable();
        let s = self.sched();

        // Nothing is touched until both the slot and the stack are secured.
        let id = s.peek_free_id().ok_or(ThreadError::NoMoreThreads)?;
        let mut stack = Stack::new(self.config.stack_size).ok_or(ThreadError::NoMemory)?;
        debug_assert_eq!(stack.size(), self.config.stack_size);
        let context = Context::synthesize(&mut stack, [self.key(), entry, arg]);

        let taken = s.take_free_id();
        debug_assert_eq!(taken, Some(id));
        s.install(id, stack, context, discard);

        self.metrics.record_thread_created();
        Ok(ThreadId::new(id))
    }

    /// Gives up the CPU.
    ///
    /// `Target::Current` (or the caller's own id) returns immediately.
    /// `Target::Any` runs the head of the ready queue and fails with
    /// `NoneReady` if it is empty. `Target::Id` runs that thread, which must
    /// be in the ready queue. Returns the id that was switched to once the
    /// caller is scheduled again.
    pub fn yield_to(&self, target: Target) -> ThreadResult<ThreadId> {
        let _guard = self.irq.disable();
        self.schedule(target, true)
    }

    pub fn yield_now(&self) -> ThreadResult<ThreadId> {
        self.yield_to(Target::Any)
    }

    /// Resolves `target`, files the outgoing thread and dispatches the
    /// incoming one. Returns `(outgoing, incoming)`; the two are equal when
    /// the caller keeps the CPU. Preemption must already be disabled.
    fn prepare_switch(&self, target: Target, reclaim: bool) -> ThreadResult<(usize, usize)> {
        let s = self.sched();

        if reclaim {
            for _ in 0..s.reclaim() {
                self.metrics.record_stack_reclaimed();
            }
        }

        let own = s.current;
        let wanted = match target {
            Target::Current => return Ok((own, own)),
            Target::Id(id) if id.as_usize() == own => return Ok((own, own)),
            Target::Any => s.ready.head().ok_or(ThreadError::NoneReady)?,
            Target::Id(id) => {
                if !s.is_ready_queued(id.as_usize()) {
                    return Err(ThreadError::InvalidThread);
                }
                id.as_usize()
            }
        };

        let outgoing = s.current_thread();
        if outgoing.check_stack_overflow() {
            panic!("stack overflow detected in thread {}", outgoing.id);
        }

        s.retire_current();
        s.dispatch(wanted);
        self.metrics.record_context_switch();
        Ok((own, wanted))
    }

    /// Switches to `target` and returns once the caller runs again.
    fn schedule(&self, target: Target, reclaim: bool) -> ThreadResult<ThreadId> {
        let (own, wanted) = self.prepare_switch(target, reclaim)?;
        if own == wanted {
            return Ok(ThreadId::new(own));
        }

        let s = self.sched();
        let from = &mut s.threads[own].context as *mut Context;
        let to = &s.threads[wanted].context as *const Context;
        unsafe { Context::switch(from, to) };

        // Resumed. A kill that arrived while we sat in the ready queue takes
        // effect now.
        if self.sched().current_thread().state == ThreadState::Killed {
            self.terminate(KILLED_EXIT_CODE, reclaim);
        }
        Ok(ThreadId::new(wanted))
    }

    /// Terminates the calling thread with `code`, waking every thread
    /// waiting to join it. If no other thread can run, the process exits
    /// with `code`.
    pub fn exit(&self, code: i32) -> ! {
        self.terminate(code, true)
    }

    fn terminate(&self, code: i32, reclaim: bool) -> ! {
        let _guard = self.irq.disable();
        let own = {
            let s = self.sched();
            let thread = s.current_thread();
            if thread.state != ThreadState::Killed {
                thread.state = ThreadState::Exited;
            }
            thread.finish(code);
            thread.discard = None;
            s.current
        };
        // The bootstrap thread was never counted as created.
        if own != 0 {
            self.metrics.record_thread_exited();
        }

        let woken = self.sched().release_joiners(own);
        self.metrics.record_wakeups(woken);

        // Nothing will ever resume this thread, so its continuation is not
        // saved.
        if let Ok((_, next)) = self.prepare_switch(Target::Any, reclaim) {
            let to = &self.sched().threads[next].context as *const Context;
            unsafe { Context::restore(to) }
        }
        halt(code)
    }

    /// Marks `id` as killed. The thread notices the next time it is
    /// dispatched and exits with [`KILLED_EXIT_CODE`]. A thread blocked on
    /// any wait queue is unlinked from it and made ready.
    pub fn kill(&self, id: ThreadId) -> ThreadResult<ThreadId> {
        let _guard = self.irq.disable();
        let s = self.sched();
        let idx = id.as_usize();
        if idx == s.current {
            return Err(ThreadError::InvalidThread);
        }

        match s.state_of(idx) {
            Some(ThreadState::Ready) => {
                let thread = &mut s.threads[idx];
                thread.state = ThreadState::Killed;
                thread.record_exit(KILLED_EXIT_CODE);
            }
            Some(ThreadState::Blocked) => {
                s.unlink(idx);
                let thread = &mut s.threads[idx];
                thread.state = ThreadState::Killed;
                thread.record_exit(KILLED_EXIT_CODE);
                s.ready.push(&mut s.threads, idx);
            }
            _ => return Err(ThreadError::InvalidThread),
        }

        self.metrics.record_thread_killed();
        Ok(id)
    }

    /// Blocks the calling thread on `queue` until a [`wakeup`](Self::wakeup)
    /// releases it. Fails with `NoneReady` if no other thread could run and
    /// with `InvalidThread` if the queue belongs to another runtime.
    pub fn sleep(&self, queue: &WaitQueue) -> ThreadResult<ThreadId> {
        let _guard = self.irq.disable();
        if !queue.bind(self.key()) {
            return Err(ThreadError::InvalidThread);
        }
        self.sleep_on(QueueRef::External(NonNull::from(queue.queue())))
    }

    fn sleep_on(&self, queue: QueueRef) -> ThreadResult<ThreadId> {
        let s = self.sched();
        if s.ready.is_empty() {
            return Err(ThreadError::NoneReady);
        }
        s.park(queue);
        self.schedule(Target::Any, true)
    }

    /// Makes the first thread parked on `queue` ready, or all of them if
    /// `all` is set. Returns how many threads were woken.
    pub fn wakeup(&self, queue: &WaitQueue, all: bool) -> usize {
        let _guard = self.irq.disable();
        if !queue.bind(self.key()) {
            return 0;
        }
        self.wake(QueueRef::External(NonNull::from(queue.queue())), all)
    }

    fn wake(&self, queue: QueueRef, all: bool) -> usize {
        let s = self.sched();
        let mut woken = 0;
        while s.unpark(queue).is_some() {
            woken += 1;
            if !all {
                break;
            }
        }
        self.metrics.record_wakeups(woken);
        woken
    }

    /// Waits for thread `id` to terminate and returns its exit code.
    ///
    /// Only the first join of a terminated thread succeeds; every later one
    /// fails with `InvalidThread`. A killed thread that has not reached its
    /// exit path yet is waited for like a running one. Waiting on yourself,
    /// on an empty slot or on an out-of-range id also fails with
    /// `InvalidThread`.
    pub fn wait(&self, id: ThreadId) -> ThreadResult<i32> {
        let _guard = self.irq.disable();
        let idx = id.as_usize();
        {
            let s = self.sched();
            match s.state_of(idx) {
                None | Some(ThreadState::Empty) => return Err(ThreadError::InvalidThread),
                _ if idx == s.current => return Err(ThreadError::InvalidThread),
                _ if s.threads[idx].exited => return self.admit(idx),
                _ => {}
            }
            s.current_thread().joined = None;
        }

        self.sleep_on(QueueRef::Join(idx))?;
        // Admission was decided when the exit path woke us; the slot may
        // already belong to a new thread.
        let code = self.sched().current_thread().joined.take();
        let code = code.ok_or(ThreadError::InvalidThread)?;
        self.metrics.record_join();
        Ok(code)
    }

    fn admit(&self, idx: usize) -> ThreadResult<i32> {
        let thread = &mut self.sched().threads[idx];
        if !thread.joinable {
            return Err(ThreadError::InvalidThread);
        }
        let code = thread.exit_code.ok_or(ThreadError::InvalidThread)?;
        thread.joinable = false;
        self.metrics.record_join();
        Ok(code)
    }

    /// Runs `f` with preemption disabled.
    pub fn without_preemption<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.irq.disable();
        f()
    }

    pub fn preemption_enabled(&self) -> bool {
        self.irq.enabled()
    }

    /// Starts a periodic timer that forces a yield every `interval`.
    ///
    /// A preempted thread can be interrupted anywhere, including inside the
    /// allocator, so preemptible code must allocate only inside
    /// [`without_preemption`](Self::without_preemption). Only one runtime
    /// per process can own the timer.
    pub fn enable_preemption(&self, interval: Duration) -> ThreadResult<()> {
        let _guard = self.irq.disable();
        timer::arm(self, interval)?;
        self.irq.set_timer_armed(true);
        Ok(())
    }

    /// Stops the preemption timer. Threads switch only cooperatively
    /// afterwards.
    pub fn disable_preemption(&self) {
        let _guard = self.irq.disable();
        timer::disarm(self);
        self.irq.set_timer_armed(false);
        timer::unmask();
    }

    /// Called from the timer signal handler on the owning native thread.
    pub(crate) fn preempt(&self) {
        if !self.irq.enabled() {
            return;
        }
        // The kernel blocks the signal until the handler returns, so only
        // the flag needs clearing. Nothing here may free memory.
        self.irq.set_flag(false);
        self.metrics.record_timer_interrupt();
        let _ = self.schedule(Target::Any, false);
        self.irq.set_flag(true);
    }

    pub fn stats(&self) -> RuntimeStats {
        self.metrics.snapshot()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.irq.timer_armed() {
            self.disable_preemption();
        }

        let s = self.sched.get_mut();
        assert_eq!(s.current, 0, "runtime dropped from a green thread");

        // Threads that never started still own their closures. Threads that
        // did start are abandoned mid-flight with their stacks.
        for thread in s.threads.iter_mut() {
            if let Some((discard, arg)) = thread.discard.take() {
                unsafe { discard(arg) };
            }
        }
    }
}

impl core::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("preemption_enabled", &self.irq.enabled())
            .field("stats", &self.metrics.snapshot())
            .finish()
    }
}

/// First Rust code every green thread runs. Entered from the architecture
/// entry shim with preemption disabled by the switch that dispatched it.
pub(crate) extern "C" fn trampoline(runtime: usize, entry: usize, arg: usize) -> ! {
    let rt = unsafe { &*(runtime as *const Runtime) };

    let (killed, discard) = {
        let thread = rt.sched().current_thread();
        (thread.state == ThreadState::Killed, thread.discard.take())
    };

    if killed {
        if let Some((discard, arg)) = discard {
            unsafe { discard(arg) };
        }
        rt.exit(KILLED_EXIT_CODE);
    }

    rt.irq.set(true);
    let entry = unsafe { core::mem::transmute::<usize, RawEntry>(entry) };
    unsafe { entry(rt, arg) };
    rt.exit(0)
}

unsafe fn run_boxed<F: FnOnce(&Runtime)>(rt: &Runtime, arg: usize) {
    // Move the closure out first: a thread that calls `exit` never returns
    // here to free the box.
    let f = rt.without_preemption(|| *Box::from_raw(arg as *mut F));
    f(rt)
}

unsafe fn drop_boxed<F>(arg: usize) {
    drop(Box::from_raw(arg as *mut F));
}

#[cfg(feature = "std")]
fn halt(code: i32) -> ! {
    std::process::exit(code)
}

#[cfg(all(not(feature = "std"), unix))]
fn halt(code: i32) -> ! {
    unsafe { libc::exit(code) }
}

#[cfg(all(not(feature = "std"), not(unix)))]
fn halt(_code: i32) -> ! {
    loop {
        core::hint::spin_loop();
    }
}
