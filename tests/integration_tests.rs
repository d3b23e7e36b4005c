use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tagged_mpmc::{
    ClaimStrategy, ConcurrentQueue, CreateError, InvalidHandle, PopError, PushError, Queue,
    QueueConfig, RingQueue,
};

/// Backing store handing out distinct, stable payload addresses.
struct Tokens {
    values: Vec<u64>,
}

impl Tokens {
    fn new(n: usize) -> Self {
        Tokens {
            values: (0..n as u64).collect(),
        }
    }

    fn base(&mut self) -> usize {
        self.values.as_mut_ptr() as usize
    }
}

fn token(base: usize, i: usize) -> *mut u64 {
    (base as *mut u64).wrapping_add(i)
}

fn index_of(base: usize, p: NonNull<u64>) -> usize {
    (p.as_ptr() as usize - base) / std::mem::size_of::<u64>()
}

#[test]
fn test_basic_push_pop() {
    let queue = Queue::<i32>::new(8).unwrap();
    let mut value = 42;

    queue.push(&mut value).unwrap();
    let popped = queue.pop().unwrap();
    assert_eq!(popped.as_ptr(), &mut value as *mut i32);
}

#[test]
fn test_fifo_order() {
    let queue = Queue::<u64>::new(16).unwrap();
    let mut tokens = Tokens::new(10);
    let base = tokens.base();

    for i in 0..10 {
        queue.push(token(base, i)).unwrap();
    }

    for i in 0..10 {
        assert_eq!(index_of(base, queue.pop().unwrap()), i);
    }
}

#[test]
fn test_concrete_capacity_four_scenario() {
    let queue = Queue::<&str>::new(4).unwrap();
    let mut a = "A";
    let mut b = "B";
    let mut c = "C";
    let mut d = "D";

    queue.push(&mut a).unwrap();
    queue.push(&mut b).unwrap();
    queue.push(&mut c).unwrap();
    assert_eq!(queue.push(&mut d), Err(PushError::Full));

    assert_eq!(queue.pop().unwrap().as_ptr(), &mut a as *mut &str);
    assert_eq!(queue.pop().unwrap().as_ptr(), &mut b as *mut &str);
    assert_eq!(queue.pop().unwrap().as_ptr(), &mut c as *mut &str);
    assert_eq!(queue.pop(), Err(PopError::Empty));
}

#[test]
fn test_zero_capacity_fails() {
    assert_eq!(Queue::<i32>::new(0).unwrap_err(), CreateError::ZeroCapacity);
    assert_eq!(RingQueue::<i32>::new(0).unwrap_err(), CreateError::ZeroCapacity);
}

#[test]
fn test_capacity_too_large_fails() {
    let too_big = u32::MAX as usize;
    assert_eq!(
        Queue::<i32>::new(too_big).unwrap_err(),
        CreateError::CapacityTooLarge(too_big)
    );
}

#[test]
fn test_null_payload_does_not_consume_slot() {
    let queue = Queue::<i32>::new(2).unwrap();
    assert_eq!(queue.push(std::ptr::null_mut()), Err(PushError::NullPayload));
    assert_eq!(queue.len(), 0);

    let mut value = 1;
    queue.push(&mut value).unwrap();
    assert_eq!(queue.len(), 1);
}

#[test]
fn test_full_queue() {
    let queue = Queue::<u64>::new(5).unwrap();
    let mut tokens = Tokens::new(5);
    let base = tokens.base();

    for i in 0..4 {
        assert!(queue.push(token(base, i)).is_ok());
    }

    assert_eq!(queue.push(token(base, 4)), Err(PushError::Full));
    assert_eq!(queue.len(), 4);
    assert_eq!(index_of(base, queue.pop().unwrap()), 0);
}

#[test]
fn test_empty_queue() {
    let queue = Queue::<i32>::new(4).unwrap();
    assert_eq!(queue.pop(), Err(PopError::Empty));
    assert!(queue.is_empty());
}

#[test]
fn test_capacity() {
    let queue = Queue::<i32>::new(1024).unwrap();
    assert_eq!(queue.capacity(), 1024);
    assert_eq!(queue.usable_capacity(), 1023);
}

#[test]
fn test_len_and_empty() {
    let queue = Queue::<u64>::new(8).unwrap();
    let mut tokens = Tokens::new(2);
    let base = tokens.base();

    assert!(queue.is_empty());
    assert_eq!(queue.len(), 0);

    queue.push(token(base, 0)).unwrap();
    queue.push(token(base, 1)).unwrap();

    assert!(!queue.is_empty());
    assert_eq!(queue.len(), 2);
}

#[test]
fn test_alternating_push_pop() {
    let queue = Queue::<u64>::new(2).unwrap();
    let mut tokens = Tokens::new(100);
    let base = tokens.base();

    for i in 0..100 {
        queue.push(token(base, i)).unwrap();
        assert_eq!(index_of(base, queue.pop().unwrap()), i);
    }
}

#[test]
fn test_wrap_around() {
    for claim in [ClaimStrategy::Linear, ClaimStrategy::Rotating] {
        let queue = Queue::<u64>::with_config(QueueConfig::new(9).with_claim(claim)).unwrap();
        let mut tokens = Tokens::new(1000);
        let base = tokens.base();

        for round in 0..10 {
            for i in 0..8 {
                queue.push(token(base, round * 100 + i)).unwrap();
            }
            for i in 0..8 {
                assert_eq!(index_of(base, queue.pop().unwrap()), round * 100 + i);
            }
        }
        assert_eq!(queue.pop(), Err(PopError::Empty));
    }
}

#[test]
fn test_boxed_payloads_round_trip() {
    let queue = Queue::<String>::new(4).unwrap();

    for word in ["alpha", "beta", "gamma"] {
        queue.push(Box::into_raw(Box::new(word.to_string()))).unwrap();
    }

    let words: Vec<String> = queue
        .drain()
        // SAFETY: every payload was produced by `Box::into_raw` and is popped once.
        .map(|p| *unsafe { Box::from_raw(p.as_ptr()) })
        .collect();
    assert_eq!(words, ["alpha", "beta", "gamma"]);
}

#[test]
fn test_destroy() {
    let queue = Queue::<i32>::new(4).unwrap();
    let clone = queue.clone();
    let mut value = 3;

    queue.push(&mut value).unwrap();
    queue.destroy().unwrap();

    assert!(clone.is_destroyed());
    assert_eq!(clone.push(&mut value), Err(PushError::InvalidHandle));
    assert_eq!(clone.pop(), Err(PopError::InvalidHandle));
    assert_eq!(clone.destroy(), Err(InvalidHandle));
}

#[test]
fn test_push_error_precedence() {
    let queue = Queue::<i32>::new(2).unwrap();
    queue.destroy().unwrap();
    assert_eq!(queue.push(std::ptr::null_mut()), Err(PushError::InvalidHandle));
}

#[test]
fn test_spsc_threaded() {
    const MESSAGES: usize = 10_000;
    let queue = Queue::<u64>::new(128).unwrap();
    let mut tokens = Tokens::new(MESSAGES);
    let base = tokens.base();

    let q_push = queue.clone();
    let producer = thread::spawn(move || {
        for i in 0..MESSAGES {
            while q_push.push(token(base, i)).is_err() {
                std::hint::spin_loop();
            }
        }
    });

    let q_pop = queue.clone();
    let consumer = thread::spawn(move || {
        for i in 0..MESSAGES {
            let p = loop {
                match q_pop.pop() {
                    Ok(p) => break p,
                    Err(_) => std::hint::spin_loop(),
                }
            };
            assert_eq!(index_of(base, p), i);
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
    assert!(queue.is_empty());
}

#[test]
fn test_mpsc_per_producer_order() {
    const PRODUCERS: usize = 4;
    const MESSAGES_PER_PRODUCER: usize = 2_500;

    let queue = Queue::<u64>::new(64).unwrap();
    let mut tokens = Tokens::new(PRODUCERS * MESSAGES_PER_PRODUCER);
    let base = tokens.base();

    let mut handles = vec![];
    for p in 0..PRODUCERS {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..MESSAGES_PER_PRODUCER {
                while q.push(token(base, p * MESSAGES_PER_PRODUCER + i)).is_err() {
                    std::hint::spin_loop();
                }
            }
        }));
    }

    let mut last_seen = [None::<usize>; PRODUCERS];
    let mut received = 0;
    while received < PRODUCERS * MESSAGES_PER_PRODUCER {
        match queue.pop() {
            Ok(p) => {
                let index = index_of(base, p);
                let producer = index / MESSAGES_PER_PRODUCER;
                if let Some(prev) = last_seen[producer] {
                    assert!(index > prev, "producer {} reordered", producer);
                }
                last_seen[producer] = Some(index);
                received += 1;
            }
            Err(_) => std::hint::spin_loop(),
        }
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(queue.pop(), Err(PopError::Empty));
}

#[test]
fn test_spmc_threaded() {
    const CONSUMERS: usize = 4;
    const TOTAL_MESSAGES: usize = 4_000;

    let queue = Queue::<u64>::new(256).unwrap();
    let mut tokens = Tokens::new(TOTAL_MESSAGES);
    let base = tokens.base();

    let q = queue.clone();
    let producer = thread::spawn(move || {
        for i in 0..TOTAL_MESSAGES {
            while q.push(token(base, i)).is_err() {
                std::hint::spin_loop();
            }
        }
    });

    let consumed_count = Arc::new(AtomicUsize::new(0));
    let mut consumers = vec![];
    for _ in 0..CONSUMERS {
        let q = queue.clone();
        let count = consumed_count.clone();
        consumers.push(thread::spawn(move || {
            let mut mine = vec![];
            loop {
                match q.pop() {
                    Ok(p) => {
                        mine.push(index_of(base, p));
                        count.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(_) => {
                        if count.load(Ordering::Relaxed) >= TOTAL_MESSAGES {
                            break;
                        }
                        std::hint::spin_loop();
                    }
                }
            }
            mine
        }));
    }

    producer.join().unwrap();
    let mut seen = HashSet::new();
    for c in consumers {
        for index in c.join().unwrap() {
            assert!(seen.insert(index), "payload {} popped twice", index);
        }
    }
    assert_eq!(seen.len(), TOTAL_MESSAGES);
}

fn mpmc_exactly_once<Q: ConcurrentQueue<u64> + 'static>(queue: Q) {
    const PRODUCERS: usize = 4;
    const CONSUMERS: usize = 4;
    const MESSAGES_PER_PRODUCER: usize = 2_500;
    const TOTAL_MESSAGES: usize = PRODUCERS * MESSAGES_PER_PRODUCER;

    let mut tokens = Tokens::new(TOTAL_MESSAGES);
    let base = tokens.base();
    let consumed = Arc::new(AtomicUsize::new(0));

    let mut producers = vec![];
    for p in 0..PRODUCERS {
        let q = queue.clone();
        producers.push(thread::spawn(move || {
            for i in 0..MESSAGES_PER_PRODUCER {
                while q.push(token(base, p * MESSAGES_PER_PRODUCER + i)).is_err() {
                    std::hint::spin_loop();
                }
            }
        }));
    }

    let mut consumers = vec![];
    for _ in 0..CONSUMERS {
        let q = queue.clone();
        let consumed = consumed.clone();
        consumers.push(thread::spawn(move || {
            let mut mine = vec![];
            while consumed.load(Ordering::Relaxed) < TOTAL_MESSAGES {
                if let Ok(p) = q.pop() {
                    mine.push(index_of(base, p));
                    consumed.fetch_add(1, Ordering::Relaxed);
                } else {
                    std::hint::spin_loop();
                }
            }
            mine
        }));
    }

    for h in producers {
        h.join().unwrap();
    }
    let mut seen = vec![false; TOTAL_MESSAGES];
    for c in consumers {
        for index in c.join().unwrap() {
            assert!(!seen[index], "payload {} popped twice", index);
            seen[index] = true;
        }
    }
    assert!(seen.iter().all(|&s| s));
    assert!(queue.pop().unwrap_err().is_empty());
}

#[test]
fn test_mpmc_threaded() {
    mpmc_exactly_once(Queue::<u64>::new(64).unwrap());
}

#[test]
fn test_mpmc_threaded_small_pool() {
    mpmc_exactly_once(
        Queue::<u64>::with_config(QueueConfig::new(3).with_backoff(false)).unwrap(),
    );
}

#[test]
fn test_ring_mpmc_threaded() {
    mpmc_exactly_once(RingQueue::<u64>::new(64).unwrap());
}

#[test]
fn test_stress_accounting() {
    const PUSHERS: usize = 3;
    const POPPERS: usize = 3;

    let queue = Queue::<u64>::new(32).unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let pushed = Arc::new(AtomicUsize::new(0));
    let popped = Arc::new(AtomicUsize::new(0));
    let mut value = 9u64;
    let payload = &mut value as *mut u64 as usize;

    let mut handles = vec![];
    for _ in 0..PUSHERS {
        let (q, stop, pushed) = (queue.clone(), stop.clone(), pushed.clone());
        handles.push(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if q.push(payload as *mut u64).is_ok() {
                    pushed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for _ in 0..POPPERS {
        let (q, stop, popped) = (queue.clone(), stop.clone(), popped.clone());
        handles.push(thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                if let Ok(p) = q.pop() {
                    assert_eq!(p.as_ptr() as usize, payload);
                    popped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    thread::sleep(Duration::from_millis(200));
    stop.store(true, Ordering::Relaxed);
    for h in handles {
        h.join().unwrap();
    }

    let remaining = queue.drain().count();
    assert_eq!(
        pushed.load(Ordering::Relaxed) - popped.load(Ordering::Relaxed),
        remaining
    );
    assert!(remaining <= queue.usable_capacity());
}

#[test]
fn test_aba_slot_cycling() {
    // A two-slot pool forces every push/pop to recycle the same two slots,
    // so stale tagged references are produced constantly.
    let queue = Queue::<u64>::with_config(
        QueueConfig::new(2).with_claim(ClaimStrategy::Linear),
    )
    .unwrap();
    let mut tokens = Tokens::new(4);
    let base = tokens.base();
    let total = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for t in 0..4 {
        let q = queue.clone();
        let total = total.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..20_000 {
                if q.push(token(base, t)).is_ok() {
                    total.fetch_add(1, Ordering::Relaxed);
                }
                if let Ok(p) = q.pop() {
                    assert!(index_of(base, p) < 4);
                    total.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let remaining = queue.drain().count();
    assert_eq!(total.load(Ordering::Relaxed), remaining);
    assert!(remaining <= 1);
}

#[test]
fn test_ring_full_and_empty() {
    let ring = RingQueue::<u64>::new(4).unwrap();
    let mut tokens = Tokens::new(5);
    let base = tokens.base();

    assert_eq!(ring.pop(), Err(PopError::Empty));
    for i in 0..4 {
        ring.push(token(base, i)).unwrap();
    }
    assert_eq!(ring.push(token(base, 4)), Err(PushError::Full));
    assert_eq!(ring.push(std::ptr::null_mut()), Err(PushError::NullPayload));
    for i in 0..4 {
        assert_eq!(index_of(base, ring.pop().unwrap()), i);
    }
    assert_eq!(ring.pop(), Err(PopError::Empty));
}
