//! Smoke tests to verify basic functionality through the public API

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use green_threads::{
    CondVar, Lock, Runtime, RuntimeConfig, Target, ThreadError, ThreadId, ThreadState,
};

fn drain(rt: &Runtime) {
    while rt.yield_now().is_ok() {}
}

/// Two threads hand the CPU directly to each other.
#[test]
fn test_ping_pong() {
    let rt = Runtime::new(RuntimeConfig::default().with_max_threads(4)).unwrap();
    let trace = Rc::new(RefCell::new(String::new()));
    let partner = Rc::new(Cell::new(ThreadId::BOOTSTRAP));

    let (t, p) = (trace.clone(), partner.clone());
    let ping = rt
        .spawn(move |rt| {
            for _ in 0..3 {
                t.borrow_mut().push('a');
                let _ = rt.yield_to(Target::Id(p.get()));
            }
        })
        .unwrap();

    let (t, p) = (trace.clone(), ping);
    let pong = rt
        .spawn(move |rt| {
            for _ in 0..3 {
                t.borrow_mut().push('b');
                let _ = rt.yield_to(Target::Id(p));
            }
        })
        .unwrap();
    partner.set(pong);

    assert_eq!(rt.yield_to(Target::Id(ping)), Ok(ping));
    drain(&rt);
    assert_eq!(trace.borrow().as_str(), "ababab");
}

/// Each thread joins its predecessor and exits with its code plus one.
#[test]
fn test_join_chain() {
    let rt = Runtime::new(RuntimeConfig::default().with_max_threads(16)).unwrap();

    let mut previous = rt.spawn(|rt| rt.exit(1)).unwrap();
    for _ in 0..8 {
        let before = previous;
        previous = rt
            .spawn(move |rt| match rt.wait(before) {
                Ok(code) => rt.exit(code + 1),
                Err(_) => rt.exit(-1),
            })
            .unwrap();
    }

    assert_eq!(rt.wait(previous), Ok(9));
    drain(&rt);
    assert_eq!(rt.stats().joins, 9);
}

/// Ids handed out by `create` count up from 1 and report state changes.
#[test]
fn test_thread_states_through_lifecycle() {
    fn worker(rt: &Runtime, _arg: usize) {
        let _ = rt.yield_now();
    }

    let rt = Runtime::new(RuntimeConfig::default().with_max_threads(4)).unwrap();
    let id = rt.create(worker, 0).unwrap();
    assert_eq!(id, ThreadId::new(1));
    assert_eq!(rt.state(id), Some(ThreadState::Ready));

    rt.yield_now().unwrap();
    assert_eq!(rt.state(id), Some(ThreadState::Ready));

    rt.yield_now().unwrap();
    assert_eq!(rt.state(id), Some(ThreadState::Exited));
    assert_eq!(rt.yield_now(), Err(ThreadError::NoneReady));
}

/// Bounded buffer guarded by one lock and two condition variables.
#[test]
fn test_producer_consumer() {
    const CAPACITY: usize = 2;
    const ITEMS: u32 = 20;

    struct Channel {
        lock: Lock,
        not_empty: CondVar,
        not_full: CondVar,
        items: RefCell<VecDeque<u32>>,
    }

    let rt = Runtime::new(RuntimeConfig::default().with_max_threads(8)).unwrap();
    let channel = Rc::new(Channel {
        lock: Lock::new(),
        not_empty: CondVar::new(),
        not_full: CondVar::new(),
        items: RefCell::new(VecDeque::new()),
    });
    let received = Rc::new(RefCell::new(Vec::new()));

    let ch = channel.clone();
    rt.spawn(move |rt| {
        for item in 0..ITEMS {
            let _guard = ch.lock.lock(rt);
            while ch.items.borrow().len() == CAPACITY {
                ch.not_full.wait(rt, &ch.lock);
            }
            ch.items.borrow_mut().push_back(item);
            ch.not_empty.signal(rt);
        }
    })
    .unwrap();

    let (ch, out) = (channel.clone(), received.clone());
    rt.spawn(move |rt| {
        for _ in 0..ITEMS {
            let _guard = ch.lock.lock(rt);
            while ch.items.borrow().is_empty() {
                ch.not_empty.wait(rt, &ch.lock);
            }
            let item = ch.items.borrow_mut().pop_front();
            out.borrow_mut().extend(item);
            ch.not_full.signal(rt);
        }
    })
    .unwrap();

    drain(&rt);
    assert_eq!(*received.borrow(), (0..ITEMS).collect::<Vec<_>>());
    assert!(!channel.lock.is_held());
}

#[test]
fn test_error_messages() {
    assert_eq!(ThreadError::NoneReady.as_str(), "No other thread is ready to run");
    assert_eq!(
        ThreadError::PreemptionBusy.to_string(),
        "another runtime already owns the preemption timer"
    );
}
