//! Text and JSON rendering of a review snapshot for the command line.

use serde::Serialize;
use std::fmt::Write as _;

use crate::model::{ReviewState, User};
use crate::state::{LoadStatus, ReviewSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum StatusKind {
    Idle,
    Loading,
    Loaded,
    Errored,
}

impl From<LoadStatus> for StatusKind {
    fn from(status: LoadStatus) -> Self {
        match status {
            LoadStatus::Idle => Self::Idle,
            LoadStatus::Loading => Self::Loading,
            LoadStatus::Loaded => Self::Loaded,
            LoadStatus::Errored => Self::Errored,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReviewSummary<'a> {
    id: u64,
    is_new: bool,
    state: ReviewState,
    user: &'a User,
}

#[derive(Debug, Serialize)]
struct CommentEntry<'a> {
    index: usize,
    path: &'a str,
    line: Option<u32>,
    comment_id: u64,
    author: &'a str,
    body: &'a str,
}

/// JSON document written to stdout for `--json`.
#[derive(Debug, Serialize)]
pub struct ReviewReport<'a> {
    status: StatusKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pull_request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    review: Option<ReviewSummary<'a>>,
    body: &'a str,
    comments: Vec<CommentEntry<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> ReviewReport<'a> {
    pub fn new(snapshot: &'a ReviewSnapshot) -> Self {
        Self {
            status: snapshot.status.into(),
            pull_request: snapshot.pull_request.as_ref().map(|pr| pr.key.to_string()),
            title: snapshot.pull_request.as_ref().map(|pr| pr.title.as_str()),
            review: snapshot.review.as_ref().map(|review| ReviewSummary {
                id: review.id,
                is_new: review.is_new(),
                state: review.state,
                user: &review.user,
            }),
            body: &snapshot.body,
            comments: snapshot
                .file_comments
                .iter()
                .enumerate()
                .map(|(index, vm)| CommentEntry {
                    index,
                    path: vm.path(),
                    line: vm.line(),
                    comment_id: vm.comment().id,
                    author: &vm.comment().user.login,
                    body: &vm.comment().body,
                })
                .collect(),
            error: snapshot.error.as_ref().map(|e| error_chain(&**e)),
        }
    }
}

/// Renders the error with its source chain: `outer: inner: root`.
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        messages.push(cause.to_string());
        source = cause.source();
    }
    messages.join(": ")
}

pub fn write_json_stdout(snapshot: &ReviewSnapshot) {
    use std::io::Write;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    match serde_json::to_writer(&mut handle, &ReviewReport::new(snapshot)) {
        Ok(()) => {
            let _ = writeln!(handle);
            let _ = handle.flush();
        }
        Err(e) => {
            eprintln!("JSON serialization failed: {}", e);
        }
    }
}

/// Human-readable form of the snapshot.
pub fn format_text(snapshot: &ReviewSnapshot) -> String {
    let mut out = String::new();

    if let Some(pr) = &snapshot.pull_request {
        let _ = writeln!(out, "{} {}", pr.key, pr.title);
    }
    match &snapshot.review {
        Some(review) if review.is_new() => {
            let _ = writeln!(out, "Review: new draft by {}", review.user.login);
        }
        Some(review) => {
            let _ = writeln!(
                out,
                "Review: #{} {} by {}",
                review.id, review.state, review.user.login
            );
        }
        None => {
            let _ = writeln!(out, "Review: (not loaded)");
        }
    }
    if !snapshot.body.is_empty() {
        let _ = writeln!(out);
        for line in snapshot.body.lines() {
            let _ = writeln!(out, "  {}", line);
        }
    }

    let _ = writeln!(out);
    if snapshot.file_comments.is_empty() {
        let _ = writeln!(out, "No inline comments.");
    }
    for (index, vm) in snapshot.file_comments.iter().enumerate() {
        let location = match vm.line() {
            Some(line) => format!("{}:{}", vm.path(), line),
            None => vm.path().to_string(),
        };
        let first_line = vm.comment().body.lines().next().unwrap_or_default();
        let _ = writeln!(
            out,
            "[{}] {} ({}) {}",
            index,
            location,
            vm.comment().user.login,
            first_line
        );
    }

    if let Some(error) = &snapshot.error {
        let _ = writeln!(out);
        let _ = writeln!(out, "Error: {}", error_chain(&**error));
    }
    out
}
