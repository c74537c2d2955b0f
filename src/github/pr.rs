use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use super::client::{gh_api, gh_api_paginate, gh_command_in};
use crate::model::{
    LocalRepository, PullRequest, PullRequestKey, Review, ReviewState, User,
};

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    title: String,
    head: RawBranch,
}

#[derive(Debug, Deserialize)]
struct RawBranch {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawReview {
    id: u64,
    /// 削除済みユーザーは null
    user: Option<User>,
    state: ReviewState,
    body: Option<String>,
}

impl RawReview {
    fn into_review(self) -> Review {
        Review {
            id: self.id,
            user: self.user.unwrap_or_else(|| User::new("ghost")),
            state: self.state,
            body: self.body.unwrap_or_default(),
        }
    }
}

/// Fetches the pull request and all of its reviews.
pub async fn fetch_pull_request(host: &str, key: &PullRequestKey) -> Result<PullRequest> {
    let repo = key.full_name();
    let pr_endpoint = format!("repos/{}/pulls/{}", repo, key.number);
    let reviews_endpoint = format!("repos/{}/pulls/{}/reviews?per_page=100", repo, key.number);

    let (pr_json, reviews_json) = tokio::try_join!(
        gh_api(host, &pr_endpoint),
        gh_api_paginate(host, &reviews_endpoint)
    )?;
    build_pull_request(key.clone(), pr_json, reviews_json)
}

fn build_pull_request(key: PullRequestKey, pr: Value, reviews: Value) -> Result<PullRequest> {
    let raw: RawPullRequest =
        serde_json::from_value(pr).context("Failed to parse PR response")?;
    let reviews: Vec<RawReview> =
        serde_json::from_value(reviews).context("Failed to parse reviews response")?;

    Ok(PullRequest {
        key,
        title: raw.title,
        head_sha: raw.head.sha,
        reviews: reviews.into_iter().map(RawReview::into_review).collect(),
    })
}

/// The authenticated user on `host`.
pub async fn fetch_current_user(host: &str) -> Result<User> {
    let json = gh_api(host, "user").await?;
    serde_json::from_value(json).context("Failed to parse user response")
}

#[derive(Debug, Deserialize)]
struct RawRepoView {
    name: String,
    owner: User,
}

/// Resolves the GitHub repository checked out at `dir`.
pub async fn detect_local_repository(dir: &Path) -> Result<LocalRepository> {
    let root = git_toplevel(dir).await?;
    let output = gh_command_in(Some(&root), &["repo", "view", "--json", "name,owner"]).await?;
    let view: RawRepoView =
        serde_json::from_str(&output).context("Failed to parse gh repo view output")?;

    Ok(LocalRepository {
        owner: view.owner.login,
        name: view.name,
        root,
    })
}

async fn git_toplevel(dir: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .await
        .context("failed to spawn git command")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        anyhow::bail!("not inside a git repository: {}", stderr.trim());
    }

    Ok(PathBuf::from(
        String::from_utf8_lossy(&output.stdout).trim().to_string(),
    ))
}
