//! Approval review: the gate between profile submission and full access.
//!
//! `ReviewService` is the external reviewer; `ApprovalWorkflow` drives one
//! submission at a time through `Pending` to a decision.

pub mod mock;
pub mod workflow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReviewError;
use crate::onboarding::model::PhotoRef;

pub use mock::MockReviewService;
pub use workflow::{ApprovalWorkflow, ReviewOutcome};

/// Identifier handed out by the reviewer for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub Uuid);

impl ReviewId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reviewer's answer for a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected { reason: String },
}

/// External reviewer contract.
#[async_trait]
pub trait ReviewService: Send + Sync {
    /// Hand the photos to the reviewer.
    async fn submit_for_review(&self, photos: &[PhotoRef]) -> Result<ReviewId, ReviewError>;

    /// Current decision for a submission.
    async fn poll_review_status(&self, id: ReviewId) -> Result<ReviewStatus, ReviewError>;
}
