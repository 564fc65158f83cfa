//! Chunked dot-product through the pool against a sequential baseline.

use karya_rs::WorkerPool;
use std::sync::Arc;
use std::time::Instant;

const N: usize = 50_000_000;
const NUM_CHUNKS: usize = 128;

fn main() {
    println!("initializing data ({} elements)...", N);
    let v1: Arc<Vec<f64>> = Arc::new(vec![1.0; N]);
    let v2: Arc<Vec<f64>> = Arc::new(vec![1.0; N]);

    // Sequential baseline
    let start = Instant::now();
    let sequential: f64 = v1.iter().zip(v2.iter()).map(|(a, b)| a * b).sum();
    let sequential_ms = start.elapsed().as_secs_f64() * 1e3;
    println!("sequential: {:.1} ms (result {})", sequential_ms, sequential);

    // Pool, one task per chunk
    let pool = WorkerPool::new().unwrap();
    let chunk = N / NUM_CHUNKS;

    let start = Instant::now();
    let futures: Vec<_> = (0..NUM_CHUNKS)
        .map(|c| {
            let v1 = v1.clone();
            let v2 = v2.clone();
            let lo = c * chunk;
            let hi = if c == NUM_CHUNKS - 1 { N } else { lo + chunk };
            pool.submit(move || {
                v1[lo..hi]
                    .iter()
                    .zip(v2[lo..hi].iter())
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
            })
            .unwrap()
        })
        .collect();
    let parallel: f64 = futures.into_iter().map(|f| f.get().unwrap()).sum();
    let parallel_ms = start.elapsed().as_secs_f64() * 1e3;

    println!(
        "pool ({} workers): {:.1} ms (result {})",
        pool.size(),
        parallel_ms,
        parallel
    );
    assert_eq!(sequential, parallel);
    println!("speedup: {:.2}x", sequential_ms / parallel_ms);
}
