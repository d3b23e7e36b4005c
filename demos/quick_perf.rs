use std::thread;
use std::time::Instant;

use tagged_mpmc::{ConcurrentQueue, Queue, RingQueue};

const MESSAGES: usize = 1_000_000;
const BUFFER_SIZE: usize = 1024;

fn payload(i: usize) -> *mut u64 {
    ((i + 1) * 8) as *mut u64
}

fn main() {
    println!("Tagged MPMC Performance Test");
    println!("==============================\n");

    for (producers, consumers) in [(1, 1), (4, 1), (1, 4), (4, 4)] {
        println!(
            "{} Producer(s), {} Consumer(s) ({} messages):",
            producers, consumers, MESSAGES
        );
        report("Queue", || {
            run(Queue::<u64>::new(BUFFER_SIZE).unwrap(), producers, consumers)
        });
        report("RingQueue", || {
            run(RingQueue::<u64>::new(BUFFER_SIZE).unwrap(), producers, consumers)
        });
        println!();
    }
}

fn report(name: &str, f: impl FnOnce()) {
    let start = Instant::now();
    f();
    let elapsed = start.elapsed();
    let throughput = MESSAGES as f64 / elapsed.as_secs_f64();
    println!("  {:<10} Time: {:?}", name, elapsed);
    println!("  {:<10} Throughput: {:.2} msgs/sec", "", throughput);
    println!(
        "  {:<10} Latency: {:.0} ns/op",
        "",
        elapsed.as_nanos() as f64 / MESSAGES as f64
    );
}

fn run<Q: ConcurrentQueue<u64> + 'static>(queue: Q, producers: usize, consumers: usize) {
    let per_producer = MESSAGES / producers;
    let per_consumer = MESSAGES / consumers;
    let mut handles = vec![];

    for p in 0..producers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for i in 0..per_producer {
                while q.push(payload(p * per_producer + i)).is_err() {
                    std::hint::spin_loop();
                }
            }
        }));
    }

    for _ in 0..consumers {
        let q = queue.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..per_consumer {
                while q.pop().is_err() {
                    std::hint::spin_loop();
                }
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
}
