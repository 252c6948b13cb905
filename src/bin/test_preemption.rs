//! Two threads that never yield, kept alternating by the preemption timer.
//!
//! Output goes straight to `write(2)` from a stack buffer: a preempted
//! thread may be holding the stdout lock or be inside the allocator.

#[cfg(target_os = "linux")]
mod demo {
    use std::time::Duration;

    use green_threads::{Runtime, RuntimeConfig};

    fn print_progress(thread: usize, count: u64) {
        let mut buffer = [0u8; 48];
        let mut pos = 0;
        let mut push = |bytes: &[u8]| {
            buffer[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };

        push(b"Thread ");
        push(&[b'0' + thread as u8]);
        push(b" reached ");

        let mut digits = [0u8; 20];
        let mut n = count;
        let mut len = 0;
        loop {
            digits[len] = b'0' + (n % 10) as u8;
            len += 1;
            n /= 10;
            if n == 0 {
                break;
            }
        }
        digits[..len].reverse();
        push(&digits[..len]);
        push(b"\n");

        unsafe { libc::write(1, buffer.as_ptr().cast(), pos) };
    }

    fn spin(_rt: &Runtime, thread: usize) {
        let mut counter = 0u64;
        loop {
            counter = core::hint::black_box(counter + 1);
            if counter % 50_000_000 == 0 {
                print_progress(thread, counter);
                if counter >= 200_000_000 {
                    return;
                }
            }
        }
    }

    pub fn run() {
        let rt = Runtime::new(RuntimeConfig::default().with_max_threads(4))
            .expect("failed to start runtime");

        let first = rt.create(spin, 1).expect("thread table full");
        let second = rt.create(spin, 2).expect("thread table full");

        if let Err(err) = rt.enable_preemption(Duration::from_millis(10)) {
            eprintln!("preemption unavailable: {err}");
            return;
        }

        let _ = rt.wait(first);
        let _ = rt.wait(second);
        rt.disable_preemption();

        let stats = rt.stats();
        println!(
            "timer interrupts: {}, context switches: {}",
            stats.timer_interrupts, stats.context_switches
        );
    }
}

#[cfg(target_os = "linux")]
fn main() {
    demo::run();
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("timer preemption is only available on Linux");
}
