//! Interrupt discipline and the preemption timer.
//!
//! [`Interrupts`] is the per-runtime "preemption enabled" flag. Every
//! scheduler operation runs inside a [`PreemptGuard`], which clears the flag
//! and puts back whatever value it found when dropped, so critical sections
//! nest. While the timer is armed, clearing the flag also blocks the timer
//! signal for the native thread, and setting it unblocks the signal.

use portable_atomic::{AtomicBool, Ordering};

pub(crate) struct Interrupts {
    enabled: AtomicBool,
    timer_armed: AtomicBool,
}

impl Interrupts {
    pub const fn new() -> Self {
        Interrupts {
            enabled: AtomicBool::new(true),
            timer_armed: AtomicBool::new(false),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Sets the flag and returns its previous value.
    pub fn set(&self, on: bool) -> bool {
        if on {
            let was = self.enabled.swap(true, Ordering::SeqCst);
            if self.timer_armed.load(Ordering::SeqCst) {
                timer::unmask();
            }
            was
        } else {
            if self.timer_armed.load(Ordering::SeqCst) {
                timer::mask();
            }
            self.enabled.swap(false, Ordering::SeqCst)
        }
    }

    /// Changes the flag without touching the signal mask. Used inside the
    /// timer handler, where the kernel owns the mask until the handler
    /// returns.
    pub fn set_flag(&self, on: bool) -> bool {
        self.enabled.swap(on, Ordering::SeqCst)
    }

    pub fn disable(&self) -> PreemptGuard<'_> {
        let was_enabled = self.set(false);
        PreemptGuard {
            irq: self,
            was_enabled,
        }
    }

    pub fn set_timer_armed(&self, armed: bool) {
        self.timer_armed.store(armed, Ordering::SeqCst);
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed.load(Ordering::SeqCst)
    }
}

/// Restores the preemption flag it found on creation when dropped.
pub(crate) struct PreemptGuard<'a> {
    irq: &'a Interrupts,
    was_enabled: bool,
}

impl Drop for PreemptGuard<'_> {
    fn drop(&mut self) {
        self.irq.set(self.was_enabled);
    }
}

#[cfg(target_os = "linux")]
pub(crate) mod timer {
    use crate::error::{ThreadError, ThreadResult};
    use crate::runtime::Runtime;
    use core::mem::MaybeUninit;
    use core::time::Duration;

    #[derive(Clone, Copy)]
    struct Owner {
        runtime: *const Runtime,
        thread: libc::pthread_t,
    }

    unsafe impl Send for Owner {}

    /// The runtime whose native thread receives the timer signal.
    static OWNER: spin::Mutex<Option<Owner>> = spin::Mutex::new(None);

    const SIGNAL: libc::c_int = libc::SIGALRM;

    fn signal_set() -> libc::sigset_t {
        unsafe {
            let mut set = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigemptyset(set.as_mut_ptr());
            libc::sigaddset(set.as_mut_ptr(), SIGNAL);
            set.assume_init()
        }
    }

    pub fn mask() {
        let set = signal_set();
        unsafe { libc::pthread_sigmask(libc::SIG_BLOCK, &set, core::ptr::null_mut()) };
    }

    pub fn unmask() {
        let set = signal_set();
        unsafe { libc::pthread_sigmask(libc::SIG_UNBLOCK, &set, core::ptr::null_mut()) };
    }

    fn set_interval(interval: Duration) -> bool {
        let tv = libc::timeval {
            tv_sec: interval.as_secs() as libc::time_t,
            tv_usec: interval.subsec_micros() as libc::suseconds_t,
        };
        let timer = libc::itimerval {
            it_interval: tv,
            it_value: tv,
        };
        unsafe { libc::setitimer(libc::ITIMER_REAL, &timer, core::ptr::null_mut()) == 0 }
    }

    /// Installs the handler and starts the periodic timer for `runtime`.
    pub fn arm(runtime: &Runtime, interval: Duration) -> ThreadResult<()> {
        if interval.is_zero() {
            return Err(ThreadError::InvalidConfig);
        }

        let mut owner = OWNER.lock();
        let this = runtime as *const Runtime;
        match *owner {
            Some(current) if current.runtime != this => return Err(ThreadError::PreemptionBusy),
            _ => {}
        }

        unsafe {
            let mut sa = MaybeUninit::<libc::sigaction>::zeroed();
            libc::sigemptyset(&mut (*sa.as_mut_ptr()).sa_mask);
            (*sa.as_mut_ptr()).sa_flags = libc::SA_RESTART;
            (*sa.as_mut_ptr()).sa_sigaction = on_timer as *const () as usize;
            if libc::sigaction(SIGNAL, sa.as_ptr(), core::ptr::null_mut()) == -1 {
                return Err(ThreadError::PreemptionUnavailable);
            }
        }

        *owner = Some(Owner {
            runtime: this,
            thread: unsafe { libc::pthread_self() },
        });
        drop(owner);

        if !set_interval(interval) {
            disarm(runtime);
            return Err(ThreadError::PreemptionUnavailable);
        }
        Ok(())
    }

    /// Stops the timer if `runtime` owns it.
    pub fn disarm(runtime: &Runtime) {
        let mut owner = OWNER.lock();
        if !matches!(*owner, Some(current) if current.runtime == runtime as *const Runtime) {
            return;
        }
        set_interval(Duration::ZERO);
        *owner = None;
    }

    extern "C" fn on_timer(_sig: libc::c_int) {
        let errno = unsafe { *libc::__errno_location() };

        // The owner lock is only ever held briefly outside the handler;
        // a tick that finds it taken is simply skipped.
        let owner = OWNER.try_lock().and_then(|owner| *owner);
        if let Some(owner) = owner {
            unsafe {
                if libc::pthread_equal(libc::pthread_self(), owner.thread) == 0 {
                    libc::pthread_kill(owner.thread, SIGNAL);
                } else {
                    (*owner.runtime).preempt();
                }
            }
        }

        unsafe { *libc::__errno_location() = errno };
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) mod timer {
    use crate::error::{ThreadError, ThreadResult};
    use crate::runtime::Runtime;
    use core::time::Duration;

    pub fn mask() {}

    pub fn unmask() {}

    pub fn arm(_runtime: &Runtime, _interval: Duration) -> ThreadResult<()> {
        Err(ThreadError::PreemptionUnavailable)
    }

    pub fn disarm(_runtime: &Runtime) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_restores_previous_state() {
        let irq = Interrupts::new();
        assert!(irq.enabled());
        {
            let _outer = irq.disable();
            assert!(!irq.enabled());
            {
                let _inner = irq.disable();
                assert!(!irq.enabled());
            }
            // The inner section must not re-enable on its way out.
            assert!(!irq.enabled());
        }
        assert!(irq.enabled());
    }

    #[test]
    fn test_set_returns_previous() {
        let irq = Interrupts::new();
        assert!(irq.set(false));
        assert!(!irq.set(false));
        assert!(!irq.set_flag(true));
        assert!(irq.enabled());
        assert!(!irq.timer_armed());
    }
}
