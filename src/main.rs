use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use octorus_review::collaborators::FileTree;
use octorus_review::config::Config;
use octorus_review::editor::ExternalEditor;
use octorus_review::github::{detect_local_repository, GhModelServiceFactory, GhSessionManager};
use octorus_review::model::{Connection, LocalRepository, NEW_REVIEW_ID};
use octorus_review::orchestrator::{Collaborators, ReviewLoadOrchestrator};
use octorus_review::report::{format_text, write_json_stdout};
use octorus_review::state::{LoadStatus, ReviewSnapshot};

#[derive(Parser, Debug)]
#[command(name = "or-review")]
#[command(about = "Load or start a GitHub PR review and keep its inline comments in sync")]
#[command(version)]
struct Args {
    /// Repository name (e.g., "owner/repo"). Defaults to the repository checked out here
    #[arg(short, long)]
    repo: Option<String>,

    /// Pull request number
    #[arg(short, long)]
    pr: u32,

    /// Existing review id; 0 starts a new draft
    #[arg(long, default_value_t = NEW_REVIEW_ID)]
    review: u64,

    /// Print the review as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Open the comment at INDEX in the editor
    #[arg(long, value_name = "INDEX")]
    open: Option<usize>,

    /// Keep running and reprint on every change (r + Enter refreshes, q + Enter quits)
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    init_tracing(&config.log.filter);

    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    let local = detect_local_repository(&cwd)
        .await
        .context("Failed to detect the local GitHub repository")?;
    let (owner, name) = match &args.repo {
        Some(repo) => parse_repo(repo)?,
        None => (local.owner.clone(), local.name.clone()),
    };

    let mut orchestrator = ReviewLoadOrchestrator::new(build_collaborators(&config, &local));
    let connection = Connection::new(config.host.clone());

    let result = orchestrator
        .initialize(&local, &connection, &owner, &name, args.pr, args.review)
        .await;
    if let Err(e) = result {
        orchestrator.shutdown().await;
        return Err(e.into());
    }

    render(&orchestrator.snapshot(), args.json);

    let outcome = async {
        if let Some(index) = args.open {
            open_comment(&orchestrator.snapshot(), index).await?;
        }
        if args.watch {
            watch(&mut orchestrator, args.json).await?;
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    orchestrator.shutdown().await;
    outcome
}

/// RUST_LOG wins over the configured filter. Logs go to stderr so stdout stays parseable.
fn init_tracing(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_collaborators(config: &Config, local: &LocalRepository) -> Collaborators {
    Collaborators {
        model_services: Arc::new(GhModelServiceFactory),
        sessions: Arc::new(GhSessionManager::new(
            config.host.clone(),
            config.session.poll_interval(),
            config.session.notification_capacity,
        )),
        file_listing: Arc::new(FileTree::new()),
        editor: Arc::new(ExternalEditor::new(
            config.editor.clone(),
            local.root.clone(),
        )),
    }
}

fn parse_repo(repo: &str) -> Result<(String, String)> {
    match repo.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner.to_string(), name.to_string()))
        }
        _ => anyhow::bail!("invalid repository '{}': expected owner/name", repo),
    }
}

fn render(snapshot: &ReviewSnapshot, json: bool) {
    if json {
        write_json_stdout(snapshot);
    } else {
        print!("{}", format_text(snapshot));
    }
}

async fn open_comment(snapshot: &ReviewSnapshot, index: usize) -> Result<()> {
    let comment = snapshot
        .file_comments
        .get(index)
        .cloned()
        .with_context(|| {
            format!(
                "no comment at index {} ({} comments)",
                index,
                snapshot.file_comments.len()
            )
        })?;

    tokio::task::spawn_blocking(move || comment.open_in_editor())
        .await
        .context("editor task panicked")?
}

async fn watch(orchestrator: &mut ReviewLoadOrchestrator, json: bool) -> Result<()> {
    let mut snapshots = orchestrator.subscribe();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    eprintln!("Watching for changes: r + Enter to refresh, q + Enter or Ctrl-C to quit");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if !snapshot.is_busy && snapshot.status != LoadStatus::Loading {
                    render(&snapshot, json);
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => match line.trim() {
                        "r" => orchestrator.refresh().await,
                        "q" => break,
                        "" => {}
                        other => eprintln!("unknown command '{}': r refreshes, q quits", other),
                    },
                    None => stdin_open = false,
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo() {
        assert_eq!(
            parse_repo("ushironoko/octorus").unwrap(),
            ("ushironoko".to_string(), "octorus".to_string())
        );
        assert!(parse_repo("octorus").is_err());
        assert!(parse_repo("/octorus").is_err());
        assert!(parse_repo("a/b/c").is_err());
    }

    #[test]
    fn test_args_defaults_to_new_draft() {
        let args = Args::try_parse_from(["or-review", "--pr", "12"]).unwrap();
        assert_eq!(args.pr, 12);
        assert_eq!(args.review, NEW_REVIEW_ID);
        assert!(args.repo.is_none());
        assert!(!args.watch);
    }
}
