//! Async, batched audit pipeline. Handlers call [`AuditPipeline::record`],
//! which is a non-blocking send into a bounded channel; a fixed pool of
//! workers drains it, flushing to the repository whenever a batch fills up
//! or a timeout elapses, whichever comes first. A full channel drops the
//! event and logs a warning rather than blocking the caller — audit
//! logging must never add latency or backpressure to the key-lifecycle
//! path it observes.
use crate::entry::AuditEvent;
use crate::repository::AuditRepository;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy)]
pub struct AuditPipelineConfig {
    pub channel_capacity: usize,
    pub worker_count: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for AuditPipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 4096,
            worker_count: 2,
            batch_size: 64,
            flush_interval: Duration::from_millis(500),
        }
    }
}

pub struct AuditPipeline {
    sender: mpsc::Sender<AuditEvent>,
}

impl AuditPipeline {
    /// Spawns `config.worker_count` workers against `repository` and
    /// returns the pipeline handle alongside their join handles, so the
    /// caller can await a graceful shutdown.
    pub fn spawn(
        repository: Arc<dyn AuditRepository>,
        config: AuditPipelineConfig,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::channel(config.channel_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut handles = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let receiver = receiver.clone();
            let repository = repository.clone();
            let batch_size = config.batch_size;
            let flush_interval = config.flush_interval;
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, receiver, repository, batch_size, flush_interval).await;
            }));
        }

        (Self { sender }, handles)
    }

    /// Enqueues `event`. Never blocks: if the channel is saturated, the
    /// event is dropped and a warning is logged.
    pub fn record(&self, event: AuditEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::warn!(error = %err, "audit channel saturated, dropping event");
        }
    }

    /// Closes the send side so workers drain their remaining queue and
    /// exit; callers should then `.await` the join handles returned by
    /// [`AuditPipeline::spawn`] to guarantee the final flush completed.
    pub fn shutdown(self) {
        drop(self.sender);
    }
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<AuditEvent>>>,
    repository: Arc<dyn AuditRepository>,
    batch_size: usize,
    flush_interval: Duration,
) {
    let mut batch = Vec::with_capacity(batch_size);
    loop {
        let mut guard = receiver.lock().await;
        let drained = tokio::time::timeout(flush_interval, async {
            while batch.len() < batch_size {
                match guard.recv().await {
                    Some(event) => batch.push(event),
                    None => break,
                }
            }
        })
        .await;
        let channel_closed = guard.is_closed() && guard.is_empty();
        drop(guard);

        if !batch.is_empty() {
            if let Err(err) = repository.insert_batch(&batch).await {
                tracing::error!(worker_id, error = %err, batch_len = batch.len(), "audit batch flush failed");
            }
            batch.clear();
        }

        if drained.is_err() {
            // Timed out with an empty or partial batch; loop and try again.
            continue;
        }
        if channel_closed {
            break;
        }
    }
}
