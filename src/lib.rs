//! Green threads for a single native thread.
//!
//! A [`Runtime`] multiplexes any number of user-level threads over the
//! native thread that created it. Threads switch cooperatively through
//! [`Runtime::yield_to`], block on [`WaitQueue`]s, [`Lock`]s and
//! [`CondVar`]s, and can optionally be preempted by a periodic timer signal
//! (Linux only).
//!
//! ```no_run
//! use green_threads::{Runtime, RuntimeConfig};
//!
//! let rt = Runtime::new(RuntimeConfig::default()).unwrap();
//! let worker = rt.spawn(|rt| {
//!     for _ in 0..3 {
//!         let _ = rt.yield_now();
//!     }
//! }).unwrap();
//! assert_eq!(rt.wait(worker), Ok(0));
//! ```

#![no_std]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

mod arch;
pub mod config;
mod context;
pub mod error;
pub mod observability;
mod preemption;
mod queue;
pub mod runtime;
mod scheduler;
mod stack_guard;
pub mod sync;
pub mod thread;


pub use config::{RuntimeConfig, MIN_STACK_SIZE};
pub use error::{ThreadError, ThreadResult};
pub use observability::RuntimeStats;
pub use queue::WaitQueue;
pub use runtime::{Runtime, ThreadEntry};
pub use sync::{CondVar, Lock, LockGuard};
pub use thread::{Target, ThreadId, ThreadState, KILLED_EXIT_CODE};
