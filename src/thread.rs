use crate::context::Context;
use crate::queue::QueueRef;
use crate::stack_guard::Stack;
use core::fmt;

/// Exit code recorded for a thread that was killed.
pub const KILLED_EXIT_CODE: i32 = 9;

/// Index of a slot in the thread table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(usize);

impl ThreadId {
    /// The thread that was running when the runtime was created.
    pub const BOOTSTRAP: ThreadId = ThreadId(0);

    pub const fn new(id: usize) -> Self {
        ThreadId(id)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Empty,
    Ready,
    Running,
    Blocked,
    Exited,
    Killed,
}

impl ThreadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ThreadState::Exited | ThreadState::Killed)
    }
}

/// Who `yield_to` should hand the CPU to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The caller itself; a no-op.
    Current,
    /// Whichever thread is at the head of the ready queue.
    Any,
    /// A specific thread, which must be waiting in the ready queue.
    Id(ThreadId),
}

impl From<ThreadId> for Target {
    fn from(id: ThreadId) -> Self {
        Target::Id(id)
    }
}

/// Releases the argument of a thread that is killed before it first runs.
pub(crate) type DiscardFn = unsafe fn(usize);

/// Thread control block.
pub(crate) struct Thread {
    pub id: ThreadId,
    pub state: ThreadState,
    pub context: Context,
    /// `None` for the bootstrap thread, which runs on the native stack, and
    /// for slots whose stack has been reclaimed.
    pub stack: Option<Stack>,
    /// Intrusive link shared by every queue.
    pub next: Option<usize>,
    /// Wait queue this thread is parked on while Blocked.
    pub parked_on: Option<QueueRef>,
    pub exit_code: Option<i32>,
    /// Set once the exit path has run. A killed thread gets there only when
    /// it is next dispatched.
    pub exited: bool,
    /// Cleared by the first successful join.
    pub joinable: bool,
    /// Exit code handed over by the thread this one was joining.
    pub joined: Option<i32>,
    /// Releases the start argument if the thread never gets to run.
    pub discard: Option<(DiscardFn, usize)>,
}

impl Thread {
    pub fn empty(id: usize) -> Self {
        Thread {
            id: ThreadId(id),
            state: ThreadState::Empty,
            context: Context::default(),
            stack: None,
            next: None,
            parked_on: None,
            exit_code: None,
            exited: false,
            joinable: true,
            joined: None,
            discard: None,
        }
    }

    /// Prepares a free slot for a newly created thread. Any stack left over
    /// from the previous occupant is dropped here.
    pub fn reset(&mut self, stack: Stack, context: Context, discard: Option<(DiscardFn, usize)>) {
        self.state = ThreadState::Ready;
        self.context = context;
        self.stack = Some(stack);
        self.next = None;
        self.parked_on = None;
        self.exit_code = None;
        self.exited = false;
        self.joinable = true;
        self.joined = None;
        self.discard = discard;
    }

    /// Records the exit code on the first transition into a terminal state.
    pub fn record_exit(&mut self, code: i32) {
        self.exit_code.get_or_insert(code);
    }

    /// Records the end of the exit path. Only from here on can the thread
    /// be joined without sleeping.
    pub fn finish(&mut self, code: i32) {
        self.record_exit(code);
        self.exited = true;
    }

    pub fn check_stack_overflow(&self) -> bool {
        self.stack.as_ref().is_some_and(|stack| !stack.is_intact())
    }
}
