use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::client::gh_api_paginate;
use crate::model::{Comment, InlineCommentThread, PullRequestKey, SessionFile, User};

/// Inline review comment as returned by `pulls/{n}/comments`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewComment {
    pub id: u64,
    pub path: String,
    pub line: Option<u32>,
    /// 差分が更新されて `line` が消えた場合の元の行
    pub original_line: Option<u32>,
    pub body: String,
    pub user: Option<User>,
    pub pull_request_review_id: Option<u64>,
    pub in_reply_to_id: Option<u64>,
}

pub async fn fetch_review_comments(host: &str, key: &PullRequestKey) -> Result<Vec<ReviewComment>> {
    let endpoint = format!(
        "repos/{}/pulls/{}/comments?per_page=100",
        key.full_name(),
        key.number
    );
    let json = gh_api_paginate(host, &endpoint).await?;
    serde_json::from_value(json).context("Failed to parse review comments response")
}

/// Groups comments into files and reply threads.
///
/// Files and threads keep the order in which their first comment appears. A reply whose
/// parent is missing opens a thread of its own.
pub fn group_into_files(comments: Vec<ReviewComment>) -> Vec<SessionFile> {
    let mut files: Vec<SessionFile> = Vec::new();
    let mut file_index: HashMap<String, usize> = HashMap::new();
    // comment id → thread root id
    let mut roots: HashMap<u64, u64> = HashMap::new();
    // thread root id → (file index, thread index)
    let mut threads: HashMap<u64, (usize, usize)> = HashMap::new();

    for raw in comments {
        let root = raw
            .in_reply_to_id
            .map(|parent| roots.get(&parent).copied().unwrap_or(parent))
            .unwrap_or(raw.id);
        roots.insert(raw.id, root);

        let comment = Arc::new(Comment {
            id: raw.id,
            review_id: raw.pull_request_review_id.unwrap_or_default(),
            user: raw.user.unwrap_or_else(|| User::new("ghost")),
            body: raw.body,
        });

        if let Some(&(f, t)) = threads.get(&root) {
            files[f].threads[t].comments.push(comment);
            continue;
        }

        let f = *file_index.entry(raw.path.clone()).or_insert_with(|| {
            files.push(SessionFile::new(raw.path.clone()));
            files.len() - 1
        });
        let file = &mut files[f];
        file.threads.push(InlineCommentThread {
            path: raw.path,
            line: raw.line.or(raw.original_line),
            comments: vec![comment],
        });
        threads.insert(root, (f, file.threads.len() - 1));
    }

    files
}

/// Cheap change detector for polled comment lists.
pub fn comments_signature(comments: &[ReviewComment]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for comment in comments {
        comment.id.hash(&mut hasher);
        comment.body.hash(&mut hasher);
        comment.line.hash(&mut hasher);
        comment.pull_request_review_id.hash(&mut hasher);
    }
    hasher.finish()
}
