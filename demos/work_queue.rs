use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tagged_mpmc::Queue;

struct Job {
    id: usize,
    name: String,
}

struct JobResult {
    job: Job,
    worker: usize,
}

fn main() {
    tagged_mpmc::init_tracing();
    println!("Work Queue Example\n");

    const NUM_WORKERS: usize = 4;
    const NUM_JOBS: usize = 20;

    let jobs = Queue::<Job>::new(128).expect("capacity is non-zero");
    let results = Queue::<JobResult>::new(128).expect("capacity is non-zero");
    let processed = Arc::new(AtomicUsize::new(0));

    let jobs_tx = jobs.clone();
    let producer = thread::spawn(move || {
        for id in 0..NUM_JOBS {
            let job = Box::into_raw(Box::new(Job {
                id,
                name: format!("Job-{:02}", id),
            }));
            while jobs_tx.push(job).is_err() {
                std::hint::spin_loop();
            }
            println!("Enqueued job {}", id);
            thread::sleep(Duration::from_millis(50));
        }
        println!("All jobs enqueued!");
    });

    let mut workers = vec![];
    for worker in 0..NUM_WORKERS {
        let jobs_rx = jobs.clone();
        let results_tx = results.clone();
        let processed = processed.clone();

        workers.push(thread::spawn(move || {
            let mut mine = 0;
            while processed.load(Ordering::Acquire) < NUM_JOBS {
                match jobs_rx.pop() {
                    Ok(job) => {
                        // SAFETY: each job box is pushed once and popped once.
                        let job = unsafe { Box::from_raw(job.as_ptr()) };
                        println!("Worker {} processing: {}", worker, job.name);
                        thread::sleep(Duration::from_millis(200));

                        let result = Box::into_raw(Box::new(JobResult { job: *job, worker }));
                        while results_tx.push(result).is_err() {
                            std::hint::spin_loop();
                        }
                        processed.fetch_add(1, Ordering::AcqRel);
                        mine += 1;
                    }
                    Err(_) => thread::sleep(Duration::from_millis(10)),
                }
            }
            println!("Worker {} finished ({} jobs)", worker, mine);
        }));
    }

    let results_rx = results.clone();
    let collector = thread::spawn(move || {
        let mut collected = 0;
        while collected < NUM_JOBS {
            match results_rx.pop() {
                Ok(result) => {
                    // SAFETY: each result box is pushed once and popped once.
                    let result = unsafe { Box::from_raw(result.as_ptr()) };
                    println!(
                        "Result: {} (#{}) completed by worker {}",
                        result.job.name, result.job.id, result.worker
                    );
                    collected += 1;
                }
                Err(_) => std::hint::spin_loop(),
            }
        }
        println!("All results collected!");
    });

    producer.join().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    collector.join().unwrap();

    println!("\nWork queue example completed!");
}
