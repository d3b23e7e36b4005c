//! Simple usage example

use std::thread;
use std::time::Duration;

use tagged_mpmc::Queue;

fn main() {
    tagged_mpmc::init_tracing();
    println!("Tagged MPMC - Simple Example\n");

    // 16 slots: one sentinel, 15 usable
    let queue = Queue::<String>::new(16).expect("capacity is non-zero");

    let producer_queue = queue.clone();
    let consumer_queue = queue.clone();

    let producer = thread::spawn(move || {
        for i in 0..10 {
            let message = format!("Message {}", i);
            println!("Sending: {}", message);

            // The queue only carries the reference; the consumer takes ownership back.
            let message = Box::into_raw(Box::new(message));
            while producer_queue.push(message).is_err() {
                std::hint::spin_loop();
            }

            thread::sleep(Duration::from_millis(100));
        }
        println!("Producer finished!");
    });

    let consumer = thread::spawn(move || {
        for _ in 0..10 {
            loop {
                match consumer_queue.pop() {
                    Ok(message) => {
                        // SAFETY: produced by `Box::into_raw` above and popped exactly once.
                        let message = unsafe { Box::from_raw(message.as_ptr()) };
                        println!("Received: {}", message);
                        break;
                    }
                    Err(_) => std::hint::spin_loop(),
                }
            }
        }
        println!("Consumer finished!");
    });

    producer.join().unwrap();
    consumer.join().unwrap();
    queue.destroy().expect("destroyed once");

    println!("\nExample completed successfully!");
}
