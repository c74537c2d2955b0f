use std::sync::Arc;

use crate::model::{PullRequestKey, ReviewId};

/// Errors surfaced by the review coordinator.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// Caller violated a precondition. Raised before any state is touched.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("failed to fetch pull request {pull_request}")]
    Fetch {
        pull_request: PullRequestKey,
        #[source]
        source: anyhow::Error,
    },

    /// `review_id > 0` but the snapshot has no such review. Callers decide whether to fall back
    /// to a new draft.
    #[error("review {review_id} not found in {pull_request}")]
    ReviewNotFound {
        review_id: ReviewId,
        pull_request: PullRequestKey,
    },

    #[error("failed to acquire session for {pull_request}")]
    Session {
        pull_request: PullRequestKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to initialize file listing")]
    FileListing(#[source] anyhow::Error),

    #[error("failed to project review comments")]
    Projection(#[source] anyhow::Error),
}

/// Error shared between the caller and the published snapshot.
pub type SharedError = Arc<ReviewError>;

impl ReviewError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReviewError::ReviewNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_fetch_error_keeps_source() {
        let err = ReviewError::Fetch {
            pull_request: PullRequestKey::new("owner", "repo", 3),
            source: anyhow::anyhow!("gh command failed: HTTP 502"),
        };
        assert_eq!(err.to_string(), "failed to fetch pull request owner/repo#3");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("gh command failed: HTTP 502"));
    }

    #[test]
    fn test_not_found_kind() {
        let err = ReviewError::ReviewNotFound {
            review_id: 9,
            pull_request: PullRequestKey::new("owner", "repo", 3),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "review 9 not found in owner/repo#3");
        assert!(!ReviewError::InvalidOperation("x".into()).is_not_found());
    }
}
