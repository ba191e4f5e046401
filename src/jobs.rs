//! Background ingestion jobs
//!
//! Videos are submitted by id and picked up by a fixed pool of worker tasks,
//! each running one ingestion at a time. Delivery is at-least-once: the same
//! video may be submitted repeatedly, and the per-stream file check makes the
//! repeat a no-op.

use anyhow::{anyhow, Result};
use futures::future::join_all;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::IngestError;
use crate::ingestion::{IngestionReport, SubtitleIngestor};

/// Identifier handed out for each submission
pub type JobId = Uuid;

/// Result of one ingestion job
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub video_id: i64,
    pub result: Result<IngestionReport, IngestError>,
}

#[derive(Debug)]
struct QueuedJob {
    id: JobId,
    video_id: i64,
}

/// Queue of pending ingestions served by a worker pool
pub struct IngestionQueue {
    sender: mpsc::UnboundedSender<QueuedJob>,
    workers: Vec<JoinHandle<()>>,
    outcomes: mpsc::UnboundedReceiver<JobOutcome>,
}

impl IngestionQueue {
    /// Spawn `workers` tasks (at least one) sharing the queue
    pub fn start(ingestor: SubtitleIngestor, workers: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel::<QueuedJob>();
        let (outcome_tx, outcomes) = mpsc::unbounded_channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers.max(1))
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let outcome_tx = outcome_tx.clone();
                let ingestor = ingestor.clone();

                tokio::spawn(async move {
                    loop {
                        // Lock only while waiting so other workers can ingest meanwhile
                        let next = receiver.lock().await.recv().await;
                        let Some(job) = next else { break };

                        debug!("Worker {} picked up job {} (video {})", worker_id, job.id, job.video_id);
                        let result = ingestor.ingest(job.video_id).await;

                        let outcome = JobOutcome {
                            job_id: job.id,
                            video_id: job.video_id,
                            result,
                        };
                        if outcome_tx.send(outcome).is_err() {
                            debug!("Outcome receiver dropped, worker {} keeps draining", worker_id);
                        }
                    }
                    debug!("Worker {} stopped", worker_id);
                })
            })
            .collect();

        Self {
            sender,
            workers,
            outcomes,
        }
    }

    /// Queue a video for ingestion and return immediately
    pub fn submit(&self, video_id: i64) -> Result<JobId> {
        let id = Uuid::new_v4();

        self.sender
            .send(QueuedJob { id, video_id })
            .map_err(|_| anyhow!("Ingestion queue is closed"))?;

        info!("Queued ingestion job {} for video {}", id, video_id);
        Ok(id)
    }

    /// Wait for the next finished job
    pub async fn next_outcome(&mut self) -> Option<JobOutcome> {
        self.outcomes.recv().await
    }

    /// Stop accepting jobs, let the workers finish the queue, and collect
    /// every outcome not yet taken with [`next_outcome`](Self::next_outcome)
    pub async fn shutdown(self) -> Vec<JobOutcome> {
        let Self {
            sender,
            workers,
            mut outcomes,
        } = self;
        drop(sender);

        for joined in join_all(workers).await {
            if let Err(e) = joined {
                error!("Ingestion worker failed: {}", e);
            }
        }

        let mut finished = Vec::new();
        while let Some(outcome) = outcomes.recv().await {
            finished.push(outcome);
        }
        finished
    }
}
