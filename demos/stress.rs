//! Push/pop stress run over heap-allocated payloads.
//!
//! Usage:
//!     cargo run --release --example stress -- [queue_size] [push_threads] [pop_threads] [seconds]
//!
//! Pushers box a payload and free it themselves when the queue is full;
//! poppers free whatever they pop. At the end the run checks that
//! `pushed - popped` equals what is left in the queue.

use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tagged_mpmc::Queue;

struct Payload {
    a: i32,
    b: i64,
    c: [u8; 10],
}

fn arg(args: &[String], index: usize, default: usize) -> usize {
    match args.get(index) {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            eprintln!("invalid argument {:?}", s);
            eprintln!(
                "usage: {} [queue_size] [push_threads] [pop_threads] [seconds]",
                args[0]
            );
            process::exit(2);
        }),
    }
}

fn main() {
    tagged_mpmc::init_tracing();

    let args: Vec<String> = env::args().collect();
    let queue_size = arg(&args, 1, 1024);
    let push_threads = arg(&args, 2, 4);
    let pop_threads = arg(&args, 3, 4);
    let seconds = arg(&args, 4, 3);

    let queue = match Queue::<Payload>::new(queue_size) {
        Ok(queue) => queue,
        Err(e) => {
            eprintln!("create lock free queue of size[{}] failed: {}", queue_size, e);
            process::exit(1);
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let pushed = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));
    let popped = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];

    for i in 0..push_threads {
        let (q, stop, pushed, rejected) =
            (queue.clone(), stop.clone(), pushed.clone(), rejected.clone());
        let handle = thread::Builder::new()
            .name(format!("push-{}", i))
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    let ptr = Box::into_raw(Box::new(Payload {
                        a: i as i32,
                        b: 0,
                        c: [0; 10],
                    }));
                    if q.push(ptr).is_ok() {
                        pushed.fetch_add(1, Ordering::Relaxed);
                    } else {
                        // SAFETY: the queue refused it, so we still own it.
                        drop(unsafe { Box::from_raw(ptr) });
                        rejected.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .expect("spawn pusher");
        handles.push(handle);
    }

    for i in 0..pop_threads {
        let (q, stop, popped) = (queue.clone(), stop.clone(), popped.clone());
        let handle = thread::Builder::new()
            .name(format!("pop-{}", i))
            .spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Ok(ptr) = q.pop() {
                        // SAFETY: every payload was boxed by a pusher and is popped once.
                        let payload = unsafe { Box::from_raw(ptr.as_ptr()) };
                        debug_assert!(payload.a >= 0 && payload.b == 0 && payload.c == [0; 10]);
                        popped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
            .expect("spawn popper");
        handles.push(handle);
    }

    println!("running ...");
    thread::sleep(Duration::from_secs(seconds as u64));
    stop.store(true, Ordering::Relaxed);
    for h in handles {
        h.join().unwrap();
    }

    let mut remaining = 0;
    for ptr in queue.drain() {
        // SAFETY: as above, popped exactly once.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        remaining += 1;
    }
    queue.destroy().expect("destroyed once");

    let pushed = pushed.load(Ordering::Relaxed);
    let popped = popped.load(Ordering::Relaxed);
    println!("pushed:    {}", pushed);
    println!("rejected:  {}", rejected.load(Ordering::Relaxed));
    println!("popped:    {}", popped);
    println!("remaining: {}", remaining);

    if pushed - popped != remaining {
        eprintln!("accounting mismatch: pushed - popped != remaining");
        process::exit(1);
    }
    println!("ok");
}
