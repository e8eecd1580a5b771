//! Bounded queue of chart jobs served by a fixed set of workers.
//!
//! Chart computation is synchronous and CPU-bound, so each worker hands its
//! job to the blocking thread pool and waits for it. At most `workers`
//! computations run at once. When the queue is full, `submit` waits for a
//! free slot: saturation shows up as latency, not as errors.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::chart::{BirthSubject, ChartError, ChartGenerator};
use crate::metrics::CHART_COMPUTE_SECONDS;
use crate::models::ChartResult;

// Queued job - subject + reply channel
pub struct ChartJob {
    pub subject: BirthSubject,
    pub response_tx: oneshot::Sender<Result<ChartResult, ChartError>>,
}

#[derive(Clone)]
pub struct ChartWorkerPool {
    job_tx: mpsc::Sender<ChartJob>,
}

impl ChartWorkerPool {
    /// Spawns `workers` workers on the current runtime. The handles finish
    /// once every pool clone is dropped and the queue drains.
    pub fn start(
        generator: ChartGenerator,
        workers: usize,
        queue_capacity: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (job_tx, job_rx) = mpsc::channel::<ChartJob>(queue_capacity.max(1));
        let job_rx = Arc::new(Mutex::new(job_rx));

        let handles = (0..workers.max(1))
            .map(|id| {
                let job_rx = Arc::clone(&job_rx);
                let generator = generator.clone();
                tokio::spawn(async move { chart_worker(id, job_rx, generator).await })
            })
            .collect();

        tracing::info!(workers = workers.max(1), queue_capacity, "chart worker pool started");
        (Self { job_tx }, handles)
    }

    pub async fn submit(&self, subject: BirthSubject) -> Result<ChartResult, ChartError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.job_tx
            .send(ChartJob {
                subject,
                response_tx,
            })
            .await
            .map_err(|_| ChartError::QueueClosed)?;

        response_rx.await.map_err(|_| ChartError::QueueClosed)?
    }
}

async fn chart_worker(
    id: usize,
    job_rx: Arc<Mutex<mpsc::Receiver<ChartJob>>>,
    generator: ChartGenerator,
) {
    tracing::debug!(worker = id, "chart worker started");

    loop {
        // lock is released as soon as a job is taken
        let job = { job_rx.lock().await.recv().await };
        let Some(job) = job else { break };

        let ChartJob {
            subject,
            response_tx,
        } = job;
        let generator = generator.clone();
        let started = Instant::now();

        let result = tokio::task::spawn_blocking(move || generator.generate(&subject))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(worker = id, error = %e, "chart computation panicked");
                Err(ChartError::Engine {
                    body: "chart".to_string(),
                    message: e.to_string(),
                })
            });

        CHART_COMPUTE_SECONDS.observe(started.elapsed().as_secs_f64());
        // requester may have gone away, nothing to do then
        let _ = response_tx.send(result);
    }

    tracing::debug!(worker = id, "chart worker stopped");
}
