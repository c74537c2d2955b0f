use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

use super::{Session, SessionChange, SessionManager};
use crate::model::{Comment, InlineCommentThread, PullRequest, PullRequestKey, SessionFile, User};

/// In-process session. Files are an immutable snapshot swapped on every update, so readers
/// never observe a half-applied change.
pub struct LiveSession {
    key: PullRequestKey,
    user: User,
    files: RwLock<Arc<Vec<SessionFile>>>,
    changes: broadcast::Sender<SessionChange>,
    sequence: AtomicU64,
}

impl LiveSession {
    pub fn new(key: PullRequestKey, user: User, capacity: usize) -> Self {
        Self::with_files(key, user, capacity, Vec::new())
    }

    pub fn with_files(
        key: PullRequestKey,
        user: User,
        capacity: usize,
        files: Vec<SessionFile>,
    ) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            key,
            user,
            files: RwLock::new(Arc::new(files)),
            changes,
            sequence: AtomicU64::new(0),
        }
    }

    /// ファイル一覧を丸ごと置き換えて通知
    pub async fn replace_files(&self, files: Vec<SessionFile>) -> u64 {
        *self.files.write().await = Arc::new(files);
        self.notify()
    }

    /// Appends a comment to the thread anchored at `path:line`, opening the file or thread
    /// when it does not exist yet.
    pub async fn add_comment(&self, path: &str, line: Option<u32>, comment: Comment) -> u64 {
        {
            let mut guard = self.files.write().await;
            let files = Arc::make_mut(&mut *guard);
            let index = match files.iter().position(|f| f.path == path) {
                Some(index) => index,
                None => {
                    files.push(SessionFile::new(path));
                    files.len() - 1
                }
            };
            let file = &mut files[index];
            let comment = Arc::new(comment);
            match file.threads.iter_mut().find(|t| t.line == line) {
                Some(thread) => thread.comments.push(comment),
                None => file.threads.push(InlineCommentThread {
                    path: path.to_string(),
                    line,
                    comments: vec![comment],
                }),
            }
        }
        self.notify()
    }

    /// Publishes a change notification and returns its sequence number.
    pub fn notify(&self) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        // 購読者がいない場合の送信エラーは無視
        let _ = self.changes.send(SessionChange { sequence });
        sequence
    }

    /// Number of live change subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }
}

#[async_trait]
impl Session for LiveSession {
    fn pull_request(&self) -> &PullRequestKey {
        &self.key
    }

    fn current_user(&self) -> &User {
        &self.user
    }

    async fn get_all_files(&self) -> Result<Arc<Vec<SessionFile>>> {
        Ok(self.files.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

/// Tracks one [`LiveSession`] per pull request and hands the same instance back on reload.
pub struct LiveSessionManager {
    user: User,
    capacity: usize,
    sessions: Mutex<HashMap<PullRequestKey, Arc<LiveSession>>>,
}

impl LiveSessionManager {
    pub fn new(user: User, capacity: usize) -> Self {
        Self {
            user,
            capacity,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a pre-built session, replacing any tracked one for the same pull request.
    pub async fn insert(&self, session: Arc<LiveSession>) {
        self.sessions
            .lock()
            .await
            .insert(session.key.clone(), session);
    }

    pub async fn session(&self, key: &PullRequestKey) -> Option<Arc<LiveSession>> {
        self.sessions.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl SessionManager for LiveSessionManager {
    async fn get_session(&self, pull_request: &PullRequest) -> Result<Arc<dyn Session>> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(pull_request.key.clone())
            .or_insert_with(|| {
                Arc::new(LiveSession::new(
                    pull_request.key.clone(),
                    self.user.clone(),
                    self.capacity,
                ))
            })
            .clone();
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: u64, review_id: u64) -> Comment {
        Comment {
            id,
            review_id,
            user: User::new("alice"),
            body: format!("comment {}", id),
        }
    }

    fn same_session(a: &Arc<dyn Session>, b: &Arc<dyn Session>) -> bool {
        std::ptr::eq(Arc::as_ptr(a) as *const u8, Arc::as_ptr(b) as *const u8)
    }

    fn key() -> PullRequestKey {
        PullRequestKey::new("owner", "repo", 1)
    }

    #[tokio::test]
    async fn test_add_comment_groups_by_anchor() {
        let session = LiveSession::new(key(), User::new("alice"), 8);
        session.add_comment("src/lib.rs", Some(10), comment(1, 5)).await;
        session.add_comment("src/lib.rs", Some(10), comment(2, 5)).await;
        session.add_comment("src/lib.rs", Some(20), comment(3, 6)).await;
        session.add_comment("README.md", None, comment(4, 5)).await;

        let files = session.get_all_files().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/lib.rs");
        assert_eq!(files[0].threads.len(), 2);
        assert_eq!(files[0].threads[0].comments.len(), 2);
        assert_eq!(files[1].path, "README.md");
    }

    #[tokio::test]
    async fn test_snapshot_is_not_mutated_by_later_updates() {
        let session = LiveSession::new(key(), User::new("alice"), 8);
        session.add_comment("a.rs", Some(1), comment(1, 5)).await;
        let before = session.get_all_files().await.unwrap();

        session.add_comment("a.rs", Some(1), comment(2, 5)).await;
        let after = session.get_all_files().await.unwrap();

        assert_eq!(before[0].threads[0].comments.len(), 1);
        assert_eq!(after[0].threads[0].comments.len(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_only_see_later_changes() {
        let session = LiveSession::new(key(), User::new("alice"), 8);
        session.notify();

        let mut rx = session.subscribe();
        assert!(rx.try_recv().is_err());

        let sequence = session.replace_files(vec![SessionFile::new("a.rs")]).await;
        assert_eq!(rx.recv().await.unwrap(), SessionChange { sequence });
        assert_eq!(sequence, 2);
    }

    #[tokio::test]
    async fn test_subscriber_count_tracks_receivers() {
        let session = LiveSession::new(key(), User::new("alice"), 8);
        assert_eq!(session.subscriber_count(), 0);
        let rx = session.subscribe();
        assert_eq!(session.subscriber_count(), 1);
        drop(rx);
        assert_eq!(session.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_manager_reuses_session_per_pull_request() {
        let manager = LiveSessionManager::new(User::new("alice"), 8);
        let pr = PullRequest {
            key: key(),
            title: "t".to_string(),
            head_sha: "abc".to_string(),
            reviews: vec![],
        };

        let first = manager.get_session(&pr).await.unwrap();
        let second = manager.get_session(&pr).await.unwrap();
        assert!(same_session(&first, &second));
        assert_eq!(first.current_user().login, "alice");

        let other = PullRequest {
            key: PullRequestKey::new("owner", "repo", 2),
            ..pr
        };
        let third = manager.get_session(&other).await.unwrap();
        assert!(!same_session(&first, &third));
    }
}
