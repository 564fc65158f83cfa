//! Minimal tour of the pool API.

use karya_rs::WorkerPool;
use std::time::Duration;

fn main() {
    let pool = WorkerPool::new().unwrap();
    println!("pool size: {}", pool.size());

    let f1 = {
        let v = vec![1, 2, 3, 4, 5];
        pool.submit(move || v.iter().sum::<i32>()).unwrap()
    };

    let f2 = pool
        .submit(|| {
            std::thread::sleep(Duration::from_millis(50));
            (1..=100_000u64).sum::<u64>()
        })
        .unwrap();

    pool.submit(|| println!("hello from pool task"))
        .unwrap()
        .wait();

    println!("sum(v) = {}", f1.get().unwrap());
    println!("sum(1..=100000) = {}", f2.get().unwrap());

    pool.request_stop();
}
