use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ThreadError {
    /// No other thread is ready to run.
    #[error("no other thread is ready to run")]
    NoneReady,
    /// The id or target does not name a thread the operation can act on.
    #[error("invalid thread id or target")]
    InvalidThread,
    /// Every slot of the thread table is in use.
    #[error("maximum number of threads reached")]
    NoMoreThreads,
    /// The thread stack could not be allocated.
    #[error("thread stack allocation failed")]
    NoMemory,
    #[error("invalid runtime configuration")]
    InvalidConfig,
    #[error("timer preemption is not available on this platform")]
    PreemptionUnavailable,
    #[error("another runtime already owns the preemption timer")]
    PreemptionBusy,
}

impl ThreadError {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadError::NoneReady => "No other thread is ready to run",
            ThreadError::InvalidThread => "Invalid thread ID provided",
            ThreadError::NoMoreThreads => "Maximum number of threads reached",
            ThreadError::NoMemory => "Thread stack allocation failed",
            ThreadError::InvalidConfig => "Invalid runtime configuration",
            ThreadError::PreemptionUnavailable => "Timer preemption is not available",
            ThreadError::PreemptionBusy => "Preemption timer is owned by another runtime",
        }
    }
}

pub type ThreadResult<T> = Result<T, ThreadError>;
