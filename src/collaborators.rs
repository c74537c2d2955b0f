use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::filter::CommentMembershipFilter;
use crate::session::Session;

/// Renders the session's file/diff tree filtered to the review's threads.
#[async_trait]
pub trait FileListing: Send + Sync {
    async fn initialize(
        &self,
        session: Arc<dyn Session>,
        filter: CommentMembershipFilter,
    ) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTreeEntry {
    pub path: String,
    /// フィルタに一致したスレッド数
    pub thread_count: usize,
}

/// File listing that keeps, per file, how many threads the active review takes part in.
/// Files without a matching thread are left out.
#[derive(Default)]
pub struct FileTree {
    entries: Mutex<Vec<FileTreeEntry>>,
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<FileTreeEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl FileListing for FileTree {
    async fn initialize(
        &self,
        session: Arc<dyn Session>,
        filter: CommentMembershipFilter,
    ) -> Result<()> {
        let files = session.get_all_files().await?;
        let entries: Vec<FileTreeEntry> = files
            .iter()
            .filter_map(|file| {
                let thread_count = file.threads.iter().filter(|t| filter.matches(t)).count();
                (thread_count > 0).then(|| FileTreeEntry {
                    path: file.path.clone(),
                    thread_count,
                })
            })
            .collect();
        debug!(
            pull_request = %session.pull_request(),
            review_id = filter.review_id(),
            files = entries.len(),
            "file tree initialized"
        );
        *self.entries.lock().await = entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, PullRequestKey, User};
    use crate::session::LiveSession;

    fn comment(id: u64, review_id: u64) -> Comment {
        Comment {
            id,
            review_id,
            user: User::new("alice"),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_file_tree_counts_matching_threads() {
        let session = Arc::new(LiveSession::new(
            PullRequestKey::new("owner", "repo", 1),
            User::new("alice"),
            8,
        ));
        session.add_comment("a.rs", Some(1), comment(1, 5)).await;
        session.add_comment("a.rs", Some(1), comment(2, 6)).await;
        session.add_comment("a.rs", Some(9), comment(3, 5)).await;
        session.add_comment("b.rs", Some(2), comment(4, 6)).await;

        let tree = FileTree::new();
        tree.initialize(session, CommentMembershipFilter::new(5))
            .await
            .unwrap();

        assert_eq!(
            tree.entries().await,
            vec![FileTreeEntry {
                path: "a.rs".to_string(),
                thread_count: 2,
            }]
        );
    }
}
