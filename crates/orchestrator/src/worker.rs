//! Pipeline worker - runs generation jobs in the background
//!
//! Intake pushes jobs onto an in-process queue; the worker drains it and
//! runs every job as its own task, at most `num_workers` at a time. When
//! every [`JobQueue`] handle is dropped the worker finishes the jobs in
//! flight and returns.

use crate::pipeline::GenerationPipeline;
use architect_common::{Error, Result, ServiceRecord};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum number of pipelines running concurrently
    pub num_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { num_workers: 4 }
    }
}

/// A record waiting to be generated
#[derive(Debug)]
pub struct PipelineJob {
    pub record: ServiceRecord,
}

/// Sending half of the job queue
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<PipelineJob>,
}

impl JobQueue {
    pub fn submit(&self, job: PipelineJob) -> Result<()> {
        let id = job.record.id.clone();
        self.tx.send(job).map_err(|_| {
            Error::Other(anyhow::anyhow!(
                "pipeline worker is not running, cannot generate record {}",
                id
            ))
        })?;
        debug!("Queued generation job for record {}", id);
        Ok(())
    }
}

/// Create a queue and the worker draining it
pub fn job_queue(config: WorkerConfig, pipeline: Arc<GenerationPipeline>) -> (JobQueue, Worker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        JobQueue { tx },
        Worker {
            config,
            pipeline,
            jobs: rx,
        },
    )
}

/// Pipeline worker
pub struct Worker {
    config: WorkerConfig,
    pipeline: Arc<GenerationPipeline>,
    jobs: mpsc::UnboundedReceiver<PipelineJob>,
}

impl Worker {
    /// Start the worker loop; returns once the queue is closed and drained
    pub async fn run(mut self) {
        let limit = Arc::new(Semaphore::new(self.config.num_workers.max(1)));
        let mut tasks = JoinSet::new();

        info!(
            "Pipeline worker started ({} concurrent jobs), waiting for jobs...",
            self.config.num_workers
        );

        loop {
            tokio::select! {
                job = self.jobs.recv() => {
                    let Some(job) = job else { break };

                    let permit = match limit.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let pipeline = self.pipeline.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        run_guarded(pipeline, job).await;
                    });
                }
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    log_outcome(result);
                }
            }
        }

        while let Some(result) = tasks.join_next().await {
            log_outcome(result);
        }

        info!("Pipeline worker stopped");
    }
}

/// Run one pipeline on its own task so a panic still ends in FAILED
async fn run_guarded(pipeline: Arc<GenerationPipeline>, job: PipelineJob) {
    let id = job.record.id.clone();
    let runner = pipeline.clone();

    if let Err(e) = tokio::spawn(async move { runner.run(job.record).await }).await {
        error!("Pipeline for record {} aborted: {}", id, e);
        pipeline
            .abandon(&id, format!("Generation aborted unexpectedly: {}", e))
            .await;
    }
}

fn log_outcome(result: std::result::Result<(), JoinError>) {
    if let Err(e) = result {
        error!("Pipeline task aborted: {}", e);
    }
}
