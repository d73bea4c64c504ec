//! Approval workflow: submit photos, then watch the review until it is
//! decided or the decision deadline passes.
//!
//! Only the latest submission is watched. Starting a new watch aborts the
//! previous poll task and bumps the generation, so a decision for an older
//! submission is never delivered.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::{ReviewId, ReviewService, ReviewStatus};
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::onboarding::model::PhotoRef;
use crate::retry::{retry, with_timeout};

/// How a watched review ended.
#[derive(Debug)]
pub enum ReviewOutcome {
    Decided(ReviewStatus),
    /// No decision before the deadline; the review is still pending.
    DeadlineExceeded,
    /// Polling failed after retries.
    Failed(ReviewError),
}

pub struct ApprovalWorkflow {
    service: Arc<dyn ReviewService>,
    config: ReviewConfig,
    generation: Arc<AtomicU64>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl ApprovalWorkflow {
    pub fn new(service: Arc<dyn ReviewService>, config: ReviewConfig) -> Self {
        Self {
            service,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            poller: Mutex::new(None),
        }
    }

    /// Hand photos to the reviewer. Not retried: a second submit would
    /// create a second review.
    pub async fn submit(&self, photos: &[PhotoRef]) -> Result<ReviewId, ReviewError> {
        let id = with_timeout(
            "submit_for_review",
            self.config.submit_timeout,
            self.service.submit_for_review(photos),
        )
        .await?;
        tracing::info!(review = %id, photos = photos.len(), "Submitted for review");
        Ok(id)
    }

    /// Start watching `id` in the background, replacing any earlier watch.
    /// `on_outcome` runs once with the final outcome unless a newer watch
    /// (or `cancel`) supersedes this one first.
    pub async fn watch<F, Fut>(&self, id: ReviewId, on_outcome: F)
    where
        F: FnOnce(ReviewOutcome) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut poller = self.poller.lock().await;
        if let Some(previous) = poller.take() {
            previous.abort();
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let service = Arc::clone(&self.service);
        let config = self.config.clone();

        *poller = Some(tokio::spawn(async move {
            let outcome = await_decision(service.as_ref(), &config, id).await;
            if current.load(Ordering::SeqCst) != generation {
                tracing::debug!(review = %id, generation, "Discarding stale review outcome");
                return;
            }
            on_outcome(outcome).await;
        }));
        tracing::debug!(review = %id, generation, "Watching review");
    }

    /// Stop watching without starting a new watch.
    pub async fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.poller.lock().await.take() {
            previous.abort();
        }
    }
}

/// One status poll with timeout and retry.
async fn poll_once(
    service: &dyn ReviewService,
    config: &ReviewConfig,
    id: ReviewId,
) -> Result<ReviewStatus, ReviewError> {
    retry(&config.retry, "poll_review_status", || {
        with_timeout(
            "poll_review_status",
            config.poll_timeout,
            service.poll_review_status(id),
        )
    })
    .await
}

/// Poll until the reviewer decides or the deadline passes.
async fn await_decision(
    service: &dyn ReviewService,
    config: &ReviewConfig,
    id: ReviewId,
) -> ReviewOutcome {
    let deadline = Instant::now() + config.decision_deadline;
    loop {
        match poll_once(service, config, id).await {
            Ok(ReviewStatus::Pending) => {}
            Ok(status) => {
                tracing::info!(review = %id, status = ?status, "Review decided");
                return ReviewOutcome::Decided(status);
            }
            Err(e) => {
                tracing::warn!(review = %id, error = %e, "Review polling failed");
                return ReviewOutcome::Failed(e);
            }
        }
        if Instant::now() + config.poll_interval > deadline {
            tracing::warn!(review = %id, "Review decision deadline exceeded");
            return ReviewOutcome::DeadlineExceeded;
        }
        tokio::time::sleep(config.poll_interval).await;
    }
}
