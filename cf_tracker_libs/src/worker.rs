use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

pub type Task = BoxFuture<'static, anyhow::Result<String>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("background queue is full")]
    QueueFull,
    #[error("background worker has shut down")]
    Closed,
}

struct Job {
    name: String,
    task: Task,
}

/// Single consumer running submitted tasks one after another.
///
/// Submission never waits: a full queue is reported to the caller.
pub struct BackgroundWorker {
    sender: mpsc::Sender<Job>,
    consumer: JoinHandle<()>,
}

impl BackgroundWorker {
    pub fn spawn(queue_size: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<Job>(queue_size.max(1));

        let consumer = tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                tracing::info!("Start background task {}", job.name);
                match job.task.await {
                    Ok(message) => tracing::info!("Background task {} finished: {}", job.name, message),
                    Err(e) => tracing::error!("Background task {} failed: {:#}", job.name, e),
                }
            }
            tracing::info!("Background worker stopped");
        });

        Self { sender, consumer }
    }

    pub fn submit(&self, name: &str, task: Task) -> Result<(), WorkerError> {
        let job = Job {
            name: name.to_string(),
            task,
        };
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!("background queue is full, {} rejected", name);
                Err(WorkerError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(WorkerError::Closed),
        }
    }

    /// Stop accepting tasks and wait until the queued ones are done.
    pub async fn shutdown(self) {
        drop(self.sender);
        if let Err(e) = self.consumer.await {
            tracing::error!("background worker panicked: {}", e);
        }
    }
}
