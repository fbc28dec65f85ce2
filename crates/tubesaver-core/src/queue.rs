//! Bounded worker pool for running several downloads at once.
//!
//! Each submitted [`DownloadRequest`] becomes a [`QueueItem`]. Workers wait
//! on a semaphore sized from `max_concurrent_downloads`, then run the
//! blocking orchestration on tokio's blocking pool. State changes are
//! published as [`QueueEvent`]s on an unbounded channel.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::{MAX_CONCURRENT_DOWNLOADS, MIN_CONCURRENT_DOWNLOADS};
use crate::extractor::{ProgressCallback, ProgressEvent};
use crate::orchestrator::{DownloadOrchestrator, DownloadReport, DownloadRequest};

/// Unique identifier for a queue item.
pub type QueueItemId = u64;

/// Status of a queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItemStatus {
    /// Waiting for a worker.
    Pending,
    /// Being downloaded.
    Downloading,
    /// Download completed successfully.
    Completed,
    /// Download failed with an error.
    Failed(String),
    /// The user declined before extraction.
    Cancelled,
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Downloading => write!(f, "Downloading"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed(msg) => write!(f, "Failed: {msg}"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A request tracked by the queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// Unique identifier.
    pub id: QueueItemId,
    /// The submitted request.
    pub request: DownloadRequest,
    /// Current status.
    pub status: QueueItemStatus,
    /// Last reported download percentage.
    pub progress: f64,
    /// Orchestration report once finished.
    pub report: Option<DownloadReport>,
}

impl QueueItem {
    const fn new(id: QueueItemId, request: DownloadRequest) -> Self {
        Self {
            id,
            request,
            status: QueueItemStatus::Pending,
            progress: 0.0,
            report: None,
        }
    }

    /// Whether the item reached a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(
            self.status,
            QueueItemStatus::Completed | QueueItemStatus::Failed(_) | QueueItemStatus::Cancelled
        )
    }
}

/// Events emitted by the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    /// An item was accepted.
    Queued {
        /// The queue item ID.
        item_id: QueueItemId,
        /// Requested URL.
        url: String,
    },
    /// A worker picked the item up.
    Started {
        /// The queue item ID.
        item_id: QueueItemId,
    },
    /// Extractor progress for the item.
    Progress {
        /// The queue item ID.
        item_id: QueueItemId,
        /// The extractor event.
        event: ProgressEvent,
    },
    /// The item reached a terminal state.
    Finished {
        /// The queue item ID.
        item_id: QueueItemId,
        /// Whether the download succeeded.
        success: bool,
        /// Terminal status line.
        message: String,
    },
}

/// Counts of items per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Total number of items.
    pub total_items: usize,
    /// Items waiting for a worker.
    pub pending_count: usize,
    /// Items being downloaded.
    pub downloading_count: usize,
    /// Completed items.
    pub completed_count: usize,
    /// Failed items.
    pub failed_count: usize,
    /// Cancelled items.
    pub cancelled_count: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    items: Vec<QueueItem>,
    next_id: QueueItemId,
}

impl QueueState {
    fn find_item_mut(&mut self, id: QueueItemId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_items: self.items.len(),
            ..QueueStats::default()
        };
        for item in &self.items {
            match &item.status {
                QueueItemStatus::Pending => stats.pending_count += 1,
                QueueItemStatus::Downloading => stats.downloading_count += 1,
                QueueItemStatus::Completed => stats.completed_count += 1,
                QueueItemStatus::Failed(_) => stats.failed_count += 1,
                QueueItemStatus::Cancelled => stats.cancelled_count += 1,
            }
        }
        stats
    }
}

/// Runs download requests with bounded concurrency.
pub struct DownloadQueue {
    orchestrator: Arc<DownloadOrchestrator>,
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    state: Arc<RwLock<QueueState>>,
    event_tx: mpsc::UnboundedSender<QueueEvent>,
    event_rx: Mutex<mpsc::UnboundedReceiver<QueueEvent>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DownloadQueue {
    /// Queue sized from the orchestrator's `max_concurrent_downloads`.
    #[must_use]
    pub fn new(orchestrator: Arc<DownloadOrchestrator>) -> Self {
        let max = orchestrator.config().max_concurrent_downloads;
        Self::with_max_concurrent(orchestrator, max)
    }

    /// Queue running at most `max` downloads at once, clamped to 1..=8.
    #[must_use]
    pub fn with_max_concurrent(orchestrator: Arc<DownloadOrchestrator>, max: usize) -> Self {
        let max_concurrent = max.clamp(MIN_CONCURRENT_DOWNLOADS, MAX_CONCURRENT_DOWNLOADS);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            state: Arc::new(RwLock::new(QueueState::default())),
            event_tx,
            event_rx: Mutex::new(event_rx),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Effective concurrency limit.
    #[must_use]
    pub const fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Accept `request` and schedule it. Must be called inside a tokio runtime.
    pub async fn submit(&self, request: DownloadRequest) -> QueueItemId {
        let id = {
            let mut state = self.state.write().await;
            let id = state.next_id;
            state.next_id += 1;
            state.items.push(QueueItem::new(id, request.clone()));
            id
        };
        let _ = self.event_tx.send(QueueEvent::Queued {
            item_id: id,
            url: request.url.clone(),
        });
        debug!("Queued {} as item {}", request.url, id);

        let worker = tokio::spawn(run_item(
            id,
            request,
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.semaphore),
            Arc::clone(&self.state),
            self.event_tx.clone(),
        ));
        self.workers.lock().await.push(worker);
        id
    }

    /// Submit every request, in order.
    pub async fn submit_batch(&self, requests: Vec<DownloadRequest>) -> Vec<QueueItemId> {
        let mut ids = Vec::with_capacity(requests.len());
        for request in requests {
            ids.push(self.submit(request).await);
        }
        ids
    }

    /// Wait for every submitted item and return all items.
    pub async fn wait(&self) -> Vec<QueueItem> {
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                error!(context = "Queue", "Queue worker failed: {}", e);
            }
        }
        self.items().await
    }

    /// Snapshot of one item.
    pub async fn get_item(&self, id: QueueItemId) -> Option<QueueItem> {
        self.state
            .read()
            .await
            .items
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Snapshot of every item, in submission order.
    pub async fn items(&self) -> Vec<QueueItem> {
        self.state.read().await.items.clone()
    }

    /// Counts per status.
    pub async fn stats(&self) -> QueueStats {
        self.state.read().await.stats()
    }

    /// Next pending event, if any.
    pub async fn try_recv_event(&self) -> Option<QueueEvent> {
        self.event_rx.lock().await.try_recv().ok()
    }

    /// Wait for the next event.
    pub async fn recv_event(&self) -> Option<QueueEvent> {
        self.event_rx.lock().await.recv().await
    }
}

impl std::fmt::Debug for DownloadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadQueue")
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

async fn run_item(
    id: QueueItemId,
    request: DownloadRequest,
    orchestrator: Arc<DownloadOrchestrator>,
    semaphore: Arc<Semaphore>,
    state: Arc<RwLock<QueueState>>,
    events: mpsc::UnboundedSender<QueueEvent>,
) {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        error!(context = "Queue", "Worker pool closed before item {} started", id);
        return;
    };

    if let Some(item) = state.write().await.find_item_mut(id) {
        item.status = QueueItemStatus::Downloading;
    }
    let _ = events.send(QueueEvent::Started { item_id: id });
    info!("Starting item {}: {}", id, request.url);

    let progress_tx = events.clone();
    let progress_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        let progress: ProgressCallback = Box::new(move |event| {
            if let ProgressEvent::Downloading { percent } = event
                && let Ok(mut state) = progress_state.try_write()
                && let Some(item) = state.find_item_mut(id)
            {
                item.progress = percent;
            }
            let _ = progress_tx.send(QueueEvent::Progress { item_id: id, event });
        });
        orchestrator.execute(&request, Some(progress))
    })
    .await;

    let (status, success, message, report) = match result {
        Ok(report) => {
            let status = if report.is_success() {
                QueueItemStatus::Completed
            } else if report.is_cancelled() {
                QueueItemStatus::Cancelled
            } else {
                QueueItemStatus::Failed(report.outcome.error.clone().unwrap_or_default())
            };
            (status, report.is_success(), report.message(), Some(report))
        }
        Err(e) => {
            error!(context = "Queue", "Download worker for item {} panicked: {}", id, e);
            let message = format!("Download failed: worker crashed: {e}");
            (QueueItemStatus::Failed(message.clone()), false, message, None)
        }
    };

    if let Some(item) = state.write().await.find_item_mut(id) {
        item.status = status;
        item.report = report;
        if success {
            item.progress = 100.0;
        }
    }
    let _ = events.send(QueueEvent::Finished {
        item_id: id,
        success,
        message,
    });
}
