//! Cooperative demo: three counting threads, a join, and a lock-protected
//! hand-off through a condition variable.

use std::cell::Cell;
use std::rc::Rc;

use green_threads::{CondVar, Lock, Runtime, RuntimeConfig};

fn counter(rt: &Runtime, label: usize) {
    for i in 0..5 {
        println!("Thread {label}: {i}");
        let _ = rt.yield_now();
    }
}

fn main() {
    let rt = match Runtime::new(RuntimeConfig::default().with_max_threads(16)) {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            std::process::exit(1);
        }
    };

    let ids: Vec<_> = (1..=3)
        .map(|label| rt.create(counter, label).expect("thread table full"))
        .collect();
    for id in ids {
        match rt.wait(id) {
            Ok(code) => println!("joined thread {id} with exit code {code}"),
            Err(err) => println!("join of thread {id} failed: {err}"),
        }
    }

    let lock = Rc::new(Lock::new());
    let cv = Rc::new(CondVar::new());
    let value = Rc::new(Cell::new(None));

    let (l, c, v) = (lock.clone(), cv.clone(), value.clone());
    let consumer = rt
        .spawn(move |rt| {
            let _guard = l.lock(rt);
            while v.get().is_none() {
                c.wait(rt, &l);
            }
            println!("consumer received {:?}", v.get());
        })
        .expect("thread table full");

    let (l, c, v) = (lock.clone(), cv.clone(), value.clone());
    rt.spawn(move |rt| {
        let _guard = l.lock(rt);
        v.set(Some(42));
        println!("producer woke {} waiter(s)", c.signal(rt));
    })
    .expect("thread table full");

    let _ = rt.wait(consumer);
    while rt.yield_now().is_ok() {}

    println!("{:#?}", rt.stats());
}
