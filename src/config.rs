//! Runtime configuration.

use crate::error::{ThreadError, ThreadResult};

/// Smallest stack a thread may be given. The timer signal frame is pushed
/// onto the interrupted thread's stack, so this leaves room for it.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

/// Fixed limits of a [`Runtime`](crate::Runtime), chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Size of the thread table, including the bootstrap thread (id 0).
    pub max_threads: usize,
    /// Size in bytes of every thread stack.
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_threads: 1024,
            stack_size: 64 * 1024,
        }
    }
}

impl RuntimeConfig {
    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub(crate) fn validate(&self) -> ThreadResult<()> {
        if self.max_threads < 1 || self.stack_size < MIN_STACK_SIZE {
            return Err(ThreadError::InvalidConfig);
        }
        Ok(())
    }
}
