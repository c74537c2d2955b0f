use std::sync::Arc;
use tokio::sync::watch;

use crate::error::{ReviewError, SharedError};
use crate::model::{PullRequest, Review};
use crate::projector::FileCommentViewModel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Errored,
}

/// Published state of one review draft. Observers always receive a whole snapshot; fields are
/// never patched in place.
#[derive(Debug, Clone, Default)]
pub struct ReviewSnapshot {
    pub status: LoadStatus,
    pub is_busy: bool,
    pub pull_request: Option<Arc<PullRequest>>,
    pub review: Option<Review>,
    pub body: String,
    pub file_comments: Arc<Vec<FileCommentViewModel>>,
    pub error: Option<SharedError>,
}

impl ReviewSnapshot {
    /// `Loaded` かつ処理中でないか
    pub fn is_ready(&self) -> bool {
        self.status == LoadStatus::Loaded && !self.is_busy
    }
}

/// Write side of the snapshot channel. Held by the orchestrator and by its binder task.
#[derive(Clone)]
pub struct StatePublisher {
    sender: Arc<watch::Sender<ReviewSnapshot>>,
}

impl StatePublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ReviewSnapshot::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReviewSnapshot> {
        self.sender.subscribe()
    }

    pub fn current(&self) -> ReviewSnapshot {
        self.sender.borrow().clone()
    }

    /// Enters `Loading` and returns a guard that clears the busy flag however the load ends.
    pub fn begin_loading(&self) -> BusyGuard {
        let previous = self.sender.borrow().status;
        self.sender.send_modify(|state| {
            state.status = LoadStatus::Loading;
            state.is_busy = true;
        });
        BusyGuard {
            publisher: self.clone(),
            previous,
        }
    }

    pub fn publish_loaded(
        &self,
        pull_request: Arc<PullRequest>,
        review: Review,
        file_comments: Vec<FileCommentViewModel>,
    ) {
        self.sender.send_modify(|state| {
            state.status = LoadStatus::Loaded;
            state.body = review.body.clone();
            state.pull_request = Some(pull_request);
            state.review = Some(review);
            state.file_comments = Arc::new(file_comments);
            state.error = None;
        });
    }

    /// コメント一覧のみ差し替え（セッション変更時）
    pub fn publish_file_comments(&self, file_comments: Vec<FileCommentViewModel>) {
        self.sender.send_modify(|state| {
            state.file_comments = Arc::new(file_comments);
        });
    }

    /// Marks the load as failed. Previously published data stays in place.
    pub fn fail(&self, error: ReviewError) -> SharedError {
        let error = Arc::new(error);
        self.sender.send_modify(|state| {
            state.status = LoadStatus::Errored;
            state.error = Some(Arc::clone(&error));
        });
        error
    }

    /// Surfaces an error without changing the load status.
    pub fn report(&self, error: ReviewError) {
        let error = Arc::new(error);
        self.sender.send_modify(|state| {
            state.error = Some(error);
        });
    }

    pub fn clear_error(&self) {
        self.sender.send_if_modified(|state| state.error.take().is_some());
    }

    pub fn set_body(&self, body: String) {
        self.sender.send_modify(|state| {
            state.body = body;
        });
    }
}

impl Default for StatePublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears `is_busy` on drop. A load abandoned mid-flight (future dropped) falls back to the
/// status it started from.
pub struct BusyGuard {
    publisher: StatePublisher,
    previous: LoadStatus,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        self.publisher.sender.send_modify(|state| {
            state.is_busy = false;
            if state.status == LoadStatus::Loading {
                state.status = previous;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_guard_clears_flag() {
        let publisher = StatePublisher::new();
        {
            let _busy = publisher.begin_loading();
            let state = publisher.current();
            assert!(state.is_busy);
            assert_eq!(state.status, LoadStatus::Loading);
        }
        let state = publisher.current();
        assert!(!state.is_busy);
        assert_eq!(state.status, LoadStatus::Idle);
    }

    #[test]
    fn test_fail_keeps_previous_data() {
        let publisher = StatePublisher::new();
        publisher.set_body("draft".to_string());
        let _busy = publisher.begin_loading();

        let error = publisher.fail(ReviewError::InvalidOperation("boom".into()));
        drop(_busy);

        let state = publisher.current();
        assert_eq!(state.status, LoadStatus::Errored);
        assert!(!state.is_busy);
        assert_eq!(state.body, "draft");
        assert!(Arc::ptr_eq(state.error.as_ref().unwrap(), &error));
    }

    #[tokio::test]
    async fn test_subscribers_see_published_snapshot() {
        let publisher = StatePublisher::new();
        let mut rx = publisher.subscribe();

        publisher.report(ReviewError::InvalidOperation("x".into()));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().error.is_some());

        publisher.clear_error();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().error.is_none());

        // エラーがない状態での clear は通知しない
        publisher.clear_error();
        assert!(!rx.has_changed().unwrap());
    }
}
