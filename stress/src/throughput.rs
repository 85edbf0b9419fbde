use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use num_format::{Locale, ToFormattedString};

const SLIDING_WINDOW_SIZE: u64 = 2; // In seconds
const BATCH_SIZE: u64 = 1000;

static STOP: AtomicBool = AtomicBool::new(false);

#[repr(C)]
#[derive(Default)]
struct WorkerStats {
    count: AtomicU64,
    /// Keeps every counter on its own cache line.
    padding: [u64; 15],
}

#[derive(Parser, Debug)]
#[command(about = "Runs a workload on every core and prints its throughput")]
pub struct Args {
    /// Number of worker threads, defaults to the number of physical cores.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Stops after this many seconds instead of waiting for Ctrl-C.
    #[arg(short, long)]
    duration_secs: Option<u64>,
}

pub fn test_throughput<F>(func: F)
where
    F: Fn() + Sync + Send + 'static,
{
    let args = Args::parse();
    ctrlc::set_handler(move || {
        STOP.store(true, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    let num_threads = args.threads.unwrap_or_else(num_cpus::get_physical).max(1);
    println!("Number of threads: {num_threads}");
    let deadline = args
        .duration_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    let func_arc = Arc::new(func);
    let worker_stats: Arc<Vec<WorkerStats>> =
        Arc::new((0..num_threads).map(|_| WorkerStats::default()).collect());

    let monitor_stats = Arc::clone(&worker_stats);
    let monitor = thread::spawn(move || {
        let mut start_time = Instant::now();
        let mut total_count_old: u64 = 0;
        loop {
            thread::sleep(Duration::from_millis(500));
            let elapsed = start_time.elapsed();
            if elapsed.as_secs() >= SLIDING_WINDOW_SIZE {
                let total_count: u64 = monitor_stats
                    .iter()
                    .map(|stats| stats.count.load(Ordering::Relaxed))
                    .sum();
                let throughput =
                    ((total_count - total_count_old) as f64 / elapsed.as_secs_f64()) as u64;
                total_count_old = total_count;
                println!(
                    "Throughput: {} iterations/sec",
                    throughput.to_formatted_string(&Locale::en)
                );
                start_time = Instant::now();
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                STOP.store(true, Ordering::SeqCst);
            }
            if STOP.load(Ordering::SeqCst) {
                break;
            }
        }
    });

    let workers: Vec<_> = (0..num_threads)
        .map(|thread_index| {
            let worker_stats = Arc::clone(&worker_stats);
            let func = Arc::clone(&func_arc);
            thread::spawn(move || {
                while !STOP.load(Ordering::SeqCst) {
                    for _ in 0..BATCH_SIZE {
                        func();
                    }
                    worker_stats[thread_index]
                        .count
                        .fetch_add(BATCH_SIZE, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    monitor.join().unwrap();
}
