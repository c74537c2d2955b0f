use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// レビュー ID。0 は「まだ作成されていない」ドラフトを表す
pub type ReviewId = u64;

/// Id carried by a review draft that has not been created on the server yet.
pub const NEW_REVIEW_ID: ReviewId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

/// Lifecycle of a review, mirroring the GitHub review states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    #[default]
    Pending,
    Commented,
    Approved,
    ChangesRequested,
    Dismissed,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Pending => "PENDING",
            ReviewState::Commented => "COMMENTED",
            ReviewState::Approved => "APPROVED",
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::Dismissed => "DISMISSED",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub user: User,
    pub state: ReviewState,
    pub body: String,
}

impl Review {
    /// ローカルで作成する新規ドラフト（サーバー未登録）
    pub fn new_draft(user: User) -> Self {
        Self {
            id: NEW_REVIEW_ID,
            user,
            state: ReviewState::Pending,
            body: String::new(),
        }
    }

    pub fn is_new(&self) -> bool {
        self.id == NEW_REVIEW_ID
    }
}

/// Identity of a pull request: `owner/repo#number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PullRequestKey {
    pub owner: String,
    pub repo: String,
    pub number: u32,
}

impl PullRequestKey {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, number: u32) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    /// `owner/repo` form used by the `gh` endpoints.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for PullRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Immutable pull request snapshot. A refresh replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub key: PullRequestKey,
    pub title: String,
    pub head_sha: String,
    pub reviews: Vec<Review>,
}

impl PullRequest {
    pub fn find_review(&self, id: ReviewId) -> Option<&Review> {
        self.reviews.iter().find(|review| review.id == id)
    }
}

/// The checked-out repository the review is being written from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRepository {
    pub owner: String,
    pub name: String,
    pub root: PathBuf,
}

/// Remote the model service talks to (e.g. `github.com` or a GHE host).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub host: String,
}

impl Connection {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new("github.com")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Comment {
    pub id: u64,
    /// 所属するレビューの ID
    pub review_id: ReviewId,
    pub user: User,
    pub body: String,
}

/// コード位置に紐づくコメントスレッド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineCommentThread {
    pub path: String,
    pub line: Option<u32>,
    pub comments: Vec<Arc<Comment>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFile {
    pub path: String,
    pub threads: Vec<InlineCommentThread>,
}

impl SessionFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            threads: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_draft_defaults() {
        let review = Review::new_draft(User::new("alice"));
        assert!(review.is_new());
        assert_eq!(review.state, ReviewState::Pending);
        assert!(review.body.is_empty());
        assert_eq!(review.user.login, "alice");
    }

    #[test]
    fn test_find_review() {
        let pr = PullRequest {
            key: PullRequestKey::new("owner", "repo", 7),
            title: "t".to_string(),
            head_sha: "abc".to_string(),
            reviews: vec![
                Review {
                    id: 1,
                    user: User::new("a"),
                    state: ReviewState::Commented,
                    body: "a".to_string(),
                },
                Review {
                    id: 2,
                    user: User::new("b"),
                    state: ReviewState::Pending,
                    body: "b".to_string(),
                },
            ],
        };
        assert_eq!(pr.find_review(2).map(|r| r.body.as_str()), Some("b"));
        assert!(pr.find_review(3).is_none());
    }

    #[test]
    fn test_review_state_serde_matches_github() {
        let state: ReviewState = serde_json::from_str("\"CHANGES_REQUESTED\"").unwrap();
        assert_eq!(state, ReviewState::ChangesRequested);
        assert_eq!(state.to_string(), "CHANGES_REQUESTED");
    }

    #[test]
    fn test_pull_request_key_display() {
        let key = PullRequestKey::new("owner", "repo", 42);
        assert_eq!(key.to_string(), "owner/repo#42");
        assert_eq!(key.full_name(), "owner/repo");
    }
}
