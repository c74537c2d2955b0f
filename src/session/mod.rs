//! Live pull request sessions: the externally mutated file/thread/comment state a review is
//! reconciled against.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::model::{PullRequest, PullRequestKey, SessionFile, User};

mod live;

pub use live::{LiveSession, LiveSessionManager};

/// "Something changed" notification. Delivery is at-least-once; the sequence number only
/// orders notifications from one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionChange {
    pub sequence: u64,
}

#[async_trait]
pub trait Session: Send + Sync {
    fn pull_request(&self) -> &PullRequestKey;

    fn current_user(&self) -> &User;

    /// 現在のファイル一覧（スナップショット）
    async fn get_all_files(&self) -> Result<Arc<Vec<SessionFile>>>;

    /// Receives every change published after this call returns.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}

#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Returns the session tracked for this pull request, creating it if needed.
    async fn get_session(&self, pull_request: &PullRequest) -> Result<Arc<dyn Session>>;
}
