//! Worker pool - fixed-size pool draining one job queue
//!
//! Each worker takes integers off a shared queue, sleeps for a fixed delay
//! to simulate work, and publishes the doubled value. Workers stop once the
//! queue is closed and drained. There is no cancellation beyond closing the
//! queue and no error path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, trace};

/// Default simulated work per item
pub const DEFAULT_WORK_DELAY: Duration = Duration::from_millis(100);

/// Shared receiving end of the job queue
pub type JobQueue = Arc<Mutex<mpsc::Receiver<i64>>>;

/// Wrap a receiver so several workers can drain it
pub fn shared_queue(rx: mpsc::Receiver<i64>) -> JobQueue {
    Arc::new(Mutex::new(rx))
}

/// Process jobs until the queue is closed, returning how many were handled
///
/// Also stops early if nobody is listening for results any more.
pub async fn worker(
    id: usize,
    jobs: JobQueue,
    results: mpsc::Sender<i64>,
    delay: Duration,
) -> usize {
    let mut handled = 0;

    loop {
        // Hold the queue lock only while receiving, not while working
        let job = { jobs.lock().await.recv().await };
        let Some(job) = job else {
            break;
        };

        trace!("worker {} processing job {}", id, job);
        tokio::time::sleep(delay).await;

        if results.send(job.saturating_mul(2)).await.is_err() {
            debug!("worker {} stopping: result channel closed", id);
            break;
        }
        handled += 1;
    }

    debug!("worker {} finished after {} jobs", id, handled);
    handled
}

/// A fixed number of workers sharing one job queue
#[derive(Debug, Clone)]
pub struct WorkerPool {
    size: usize,
    delay: Duration,
}

impl WorkerPool {
    /// Create a pool; a size of zero is treated as one
    pub fn new(size: usize, delay: Duration) -> Self {
        Self {
            size: size.max(1),
            delay,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Feed every input through the pool and collect all results
    ///
    /// Results are in completion order, which only matches input order for a
    /// single worker.
    pub async fn run(&self, inputs: Vec<i64>) -> Vec<i64> {
        self.run_with_progress(inputs, |_| {}).await
    }

    /// Like [`run`](Self::run), invoking `on_result` as each result arrives
    pub async fn run_with_progress<F>(&self, inputs: Vec<i64>, mut on_result: F) -> Vec<i64>
    where
        F: FnMut(i64),
    {
        let expected = inputs.len();
        let capacity = expected.max(1);
        let (job_tx, job_rx) = mpsc::channel(capacity);
        let (result_tx, mut result_rx) = mpsc::channel(capacity);

        let queue = shared_queue(job_rx);
        let mut workers = JoinSet::new();
        for id in 0..self.size {
            workers.spawn(worker(id, Arc::clone(&queue), result_tx.clone(), self.delay));
        }
        // Only workers hold senders now, so the result channel closes when they exit
        drop(result_tx);

        for job in inputs {
            if job_tx.send(job).await.is_err() {
                break;
            }
        }
        drop(job_tx);

        let mut results = Vec::with_capacity(expected);
        while let Some(value) = result_rx.recv().await {
            on_result(value);
            results.push(value);
        }

        while workers.join_next().await.is_some() {}

        results
    }

    /// Run and return results sorted ascending
    pub async fn run_ordered(&self, inputs: Vec<i64>) -> Vec<i64> {
        let mut results = self.run(inputs).await;
        results.sort_unstable();
        results
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(3, DEFAULT_WORK_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_worker_doubles_until_closed() {
        let (job_tx, job_rx) = mpsc::channel(8);
        let (result_tx, mut result_rx) = mpsc::channel(8);

        for job in [1, 2, 3] {
            job_tx.send(job).await.unwrap();
        }
        drop(job_tx);

        let handled = worker(0, shared_queue(job_rx), result_tx, DEFAULT_WORK_DELAY).await;
        assert_eq!(handled, 3);

        let mut results = Vec::new();
        while let Some(value) = result_rx.recv().await {
            results.push(value);
        }
        assert_eq!(results, vec![2, 4, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_sleeps_per_item() {
        let (job_tx, job_rx) = mpsc::channel(8);
        let (result_tx, _result_rx) = mpsc::channel(8);
        for job in [1, 2, 3] {
            job_tx.send(job).await.unwrap();
        }
        drop(job_tx);

        let start = Instant::now();
        worker(0, shared_queue(job_rx), result_tx, Duration::from_millis(100)).await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_stops_when_results_dropped() {
        let (job_tx, job_rx) = mpsc::channel(8);
        let (result_tx, result_rx) = mpsc::channel(8);
        drop(result_rx);
        job_tx.send(5).await.unwrap();

        // Queue is still open; the worker must still return
        let handled = worker(0, shared_queue(job_rx), result_tx, DEFAULT_WORK_DELAY).await;
        assert_eq!(handled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_worker_pool_preserves_order() {
        let pool = WorkerPool::new(1, DEFAULT_WORK_DELAY);
        assert_eq!(pool.run(vec![1, 2, 3]).await, vec![2, 4, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_processes_every_job_in_parallel() {
        let pool = WorkerPool::new(4, Duration::from_millis(100));
        let inputs: Vec<i64> = (1..=8).collect();

        let start = Instant::now();
        let results = pool.run_ordered(inputs).await;
        let elapsed = start.elapsed();

        assert_eq!(results, vec![2, 4, 6, 8, 10, 12, 14, 16]);
        // 8 jobs over 4 workers: two rounds, not eight
        assert!(elapsed < Duration::from_millis(800));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_progress_callback_and_empty_input() {
        let pool = WorkerPool::new(0, DEFAULT_WORK_DELAY);
        assert_eq!(pool.size(), 1);
        assert!(pool.run(Vec::new()).await.is_empty());

        let mut seen = 0;
        let results = pool.run_with_progress(vec![10, 20], |_| seen += 1).await;
        assert_eq!(seen, 2);
        assert_eq!(results, vec![20, 40]);
    }
}
