use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ReviewError;
use crate::filter::CommentMembershipFilter;
use crate::projector::FileCommentProjector;
use crate::session::{Session, SessionChange};
use crate::state::StatePublisher;

struct Subscription {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Keeps at most one session-change subscription alive and re-projects the review's comments
/// for every notification it receives.
#[derive(Default)]
pub struct ReviewSessionBinder {
    active: Option<Subscription>,
}

impl ReviewSessionBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self) -> bool {
        self.active.is_some()
    }

    /// Starts reacting to `changes`. The receiver must have been created before the initial
    /// projection so nothing published in between is lost.
    ///
    /// Call [`unbind`](Self::unbind) first; a still-active subscription is cancelled here as a
    /// fallback, without waiting for its task.
    pub fn bind(
        &mut self,
        changes: broadcast::Receiver<SessionChange>,
        session: Arc<dyn Session>,
        projector: Arc<FileCommentProjector>,
        filter: CommentMembershipFilter,
        publisher: StatePublisher,
    ) {
        if let Some(previous) = self.active.take() {
            warn!("binding over a live session subscription; cancelling it");
            previous.cancel.cancel();
            previous.task.abort();
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(react_to_changes(
            changes,
            session,
            projector,
            filter,
            publisher,
            cancel.clone(),
        ));
        self.active = Some(Subscription { cancel, task });
    }

    /// Releases the subscription and waits until its task (and the receiver it owns) is gone.
    pub async fn unbind(&mut self) {
        let Some(subscription) = self.active.take() else {
            return;
        };
        subscription.cancel.cancel();
        if let Err(e) = subscription.task.await {
            if e.is_panic() {
                warn!(error = %e, "session subscription task panicked");
            }
        }
    }
}

impl Drop for ReviewSessionBinder {
    fn drop(&mut self) {
        if let Some(subscription) = self.active.take() {
            subscription.cancel.cancel();
            subscription.task.abort();
        }
    }
}

async fn react_to_changes(
    mut changes: broadcast::Receiver<SessionChange>,
    session: Arc<dyn Session>,
    projector: Arc<FileCommentProjector>,
    filter: CommentMembershipFilter,
    publisher: StatePublisher,
    cancel: CancellationToken,
) {
    let pull_request = session.pull_request().clone();
    loop {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            received = changes.recv() => received,
        };
        match received {
            Ok(change) => {
                debug!(%pull_request, sequence = change.sequence, "session changed");
            }
            // 取りこぼした通知は 1 回の再投影にまとめる
            Err(RecvError::Lagged(skipped)) => {
                debug!(%pull_request, skipped, "session notifications lagged");
            }
            Err(RecvError::Closed) => {
                debug!(%pull_request, "session change stream closed");
                break;
            }
        }

        let projected = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            projected = projector.project(&session, filter) => projected,
        };
        match projected {
            Ok(file_comments) => publisher.publish_file_comments(file_comments),
            Err(e) => {
                warn!(
                    %pull_request,
                    review_id = filter.review_id(),
                    error = %format!("{:#}", e),
                    "failed to re-project review comments"
                );
                publisher.report(ReviewError::Projection(e));
            }
        }
    }
}
