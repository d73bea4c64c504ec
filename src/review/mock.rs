//! Randomized stand-in reviewer.
//!
//! Each submission is decided once, after a random delay, with a fixed
//! approval rate. Polls before the decision time report `Pending`; the
//! first poll after it returns the decision and drops the submission.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{ReviewId, ReviewService, ReviewStatus};
use crate::error::ReviewError;
use crate::onboarding::model::PhotoRef;

pub const REJECTION_REASON: &str = "Face not clearly visible. Please upload clear headshots.";

struct Submission {
    decided_at: Instant,
    status: ReviewStatus,
}

pub struct MockReviewService {
    min_delay: Duration,
    max_delay: Duration,
    approval_rate: f64,
    submissions: RwLock<HashMap<ReviewId, Submission>>,
}

impl Default for MockReviewService {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3), 0.7)
    }
}

impl MockReviewService {
    pub fn new(min_delay: Duration, max_delay: Duration, approval_rate: f64) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
            approval_rate: approval_rate.clamp(0.0, 1.0),
            submissions: RwLock::new(HashMap::new()),
        }
    }

    /// Reviewer that always decides the same way, immediately.
    pub fn always(approve: bool) -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, if approve { 1.0 } else { 0.0 })
    }
}

#[async_trait]
impl ReviewService for MockReviewService {
    async fn submit_for_review(&self, photos: &[PhotoRef]) -> Result<ReviewId, ReviewError> {
        if photos.is_empty() {
            return Err(ReviewError::SubmissionFailed("no photos attached".into()));
        }
        let (delay, approved) = {
            let mut rng = rand::thread_rng();
            let span = self.max_delay.saturating_sub(self.min_delay);
            let delay = self.min_delay + span.mul_f64(rng.gen_range(0.0..=1.0));
            (delay, rng.gen_bool(self.approval_rate))
        };
        let status = if approved {
            ReviewStatus::Approved
        } else {
            ReviewStatus::Rejected {
                reason: REJECTION_REASON.to_string(),
            }
        };

        let id = ReviewId::new();
        tracing::info!(review = %id, photos = photos.len(), delay_ms = delay.as_millis() as u64, "Mock review queued");
        self.submissions.write().await.insert(
            id,
            Submission {
                decided_at: Instant::now() + delay,
                status,
            },
        );
        Ok(id)
    }

    /// A decided review is reported once and then forgotten.
    async fn poll_review_status(&self, id: ReviewId) -> Result<ReviewStatus, ReviewError> {
        let mut submissions = self.submissions.write().await;
        let submission = submissions
            .get(&id)
            .ok_or_else(|| ReviewError::NotFound { id: id.to_string() })?;
        if Instant::now() < submission.decided_at {
            return Ok(ReviewStatus::Pending);
        }
        let status = submission.status.clone();
        submissions.remove(&id);
        Ok(status)
    }
}
