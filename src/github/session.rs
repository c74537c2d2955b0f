use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::comment::{comments_signature, fetch_review_comments, group_into_files, ReviewComment};
use super::pr::fetch_current_user;
use crate::model::{PullRequest, PullRequestKey};
use crate::session::{LiveSession, Session, SessionManager};

/// Signature of the last applied comment list. The lock is held for a whole
/// fetch → compare → replace cycle, so syncs of one session never interleave.
type SyncState = Arc<Mutex<u64>>;

/// Sessions are tracked weakly: once the last holder drops one, its entry is evicted on the next
/// lookup and its polling task ends.
struct Tracked {
    session: Weak<LiveSession>,
    sync: SyncState,
}

/// Sessions backed by the pull request's review comments on GitHub.
///
/// Each session is seeded on first use and then re-synced by a polling task; reacquiring an
/// existing session (load / refresh) syncs it once more before returning.
pub struct GhSessionManager {
    host: String,
    poll_interval: Duration,
    capacity: usize,
    sessions: Mutex<HashMap<PullRequestKey, Tracked>>,
    cancel: CancellationToken,
}

impl GhSessionManager {
    pub fn new(host: impl Into<String>, poll_interval: Duration, capacity: usize) -> Self {
        Self {
            host: host.into(),
            poll_interval,
            capacity,
            sessions: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }
}

impl Drop for GhSessionManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl SessionManager for GhSessionManager {
    async fn get_session(&self, pull_request: &PullRequest) -> Result<Arc<dyn Session>> {
        let mut sessions = self.sessions.lock().await;

        if let Some((session, sync)) = lookup(&mut sessions, &pull_request.key) {
            sync_comments(&self.host, &session, &sync).await?;
            return Ok(session);
        }

        let key = pull_request.key.clone();
        let (user, comments) = tokio::try_join!(
            fetch_current_user(&self.host),
            fetch_review_comments(&self.host, &key)
        )?;
        let sync = Arc::new(Mutex::new(comments_signature(&comments)));
        let session = Arc::new(LiveSession::with_files(
            key.clone(),
            user,
            self.capacity,
            group_into_files(comments),
        ));
        debug!(pull_request = %key, host = %self.host, "session opened");

        if !self.poll_interval.is_zero() {
            tokio::spawn(poll_comments(
                self.host.clone(),
                Arc::downgrade(&session),
                Arc::clone(&sync),
                self.poll_interval,
                self.cancel.child_token(),
            ));
        }

        sessions.insert(
            key,
            Tracked {
                session: Arc::downgrade(&session),
                sync,
            },
        );
        Ok(session)
    }
}

/// Returns the live session tracked for `key`, evicting the entry if it is gone.
fn lookup(
    sessions: &mut HashMap<PullRequestKey, Tracked>,
    key: &PullRequestKey,
) -> Option<(Arc<LiveSession>, SyncState)> {
    let tracked = sessions.get(key)?;
    match tracked.session.upgrade() {
        Some(session) => Some((session, Arc::clone(&tracked.sync))),
        None => {
            debug!(pull_request = %key, "evicting dropped session");
            sessions.remove(key);
            None
        }
    }
}

async fn sync_comments(host: &str, session: &LiveSession, sync: &Mutex<u64>) -> Result<bool> {
    sync_with(
        session,
        sync,
        fetch_review_comments(host, session.pull_request()),
    )
    .await
}

/// Applies the fetched comments when their signature changed.
/// Returns whether a change notification went out.
async fn sync_with<F>(session: &LiveSession, sync: &Mutex<u64>, fetch: F) -> Result<bool>
where
    F: Future<Output = Result<Vec<ReviewComment>>>,
{
    let mut signature = sync.lock().await;
    let comments = fetch.await?;
    let next = comments_signature(&comments);
    if *signature == next {
        return Ok(false);
    }
    *signature = next;
    let sequence = session.replace_files(group_into_files(comments)).await;
    debug!(pull_request = %session.pull_request(), sequence, "review comments changed");
    Ok(true)
}

async fn poll_comments(
    host: String,
    session: Weak<LiveSession>,
    sync: SyncState,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // 最初の tick は即時に完了する
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(session) = session.upgrade() else {
            debug!("session dropped; polling stopped");
            break;
        };
        if let Err(e) = sync_comments(&host, &session, &sync).await {
            warn!(
                pull_request = %session.pull_request(),
                "failed to poll review comments: {:#}",
                e
            );
        }
    }
}
