//! Review draft lifecycle: resolve the pull request and review, keep the review's comments in
//! sync with the live session.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::binder::ReviewSessionBinder;
use crate::collaborators::FileListing;
use crate::editor::Editor;
use crate::error::{ReviewError, SharedError};
use crate::filter::CommentMembershipFilter;
use crate::model::{
    Connection, LocalRepository, PullRequest, PullRequestKey, Review, ReviewId, User,
    NEW_REVIEW_ID,
};
use crate::projector::FileCommentProjector;
use crate::service::ModelServiceFactory;
use crate::session::{Session, SessionManager};
use crate::state::{ReviewSnapshot, StatePublisher};


/// External collaborators, assembled by the caller.
#[derive(Clone)]
pub struct Collaborators {
    pub model_services: Arc<dyn ModelServiceFactory>,
    pub sessions: Arc<dyn SessionManager>,
    pub file_listing: Arc<dyn FileListing>,
    pub editor: Arc<dyn Editor>,
}

/// Loads or creates a review draft for one pull request and keeps the draft's inline comments
/// projected from the live session.
///
/// `initialize`, `load` and `refresh` take `&mut self`, so they never overlap on one instance.
pub struct ReviewLoadOrchestrator {
    collaborators: Collaborators,
    projector: Arc<FileCommentProjector>,
    binder: ReviewSessionBinder,
    state: StatePublisher,
    /// `initialize` で確定した接続先。`refresh` はこの接続で再取得する
    connection: Option<Connection>,
    session: Option<Arc<dyn Session>>,
}

impl ReviewLoadOrchestrator {
    pub fn new(collaborators: Collaborators) -> Self {
        let projector = Arc::new(FileCommentProjector::new(Arc::clone(
            &collaborators.editor,
        )));
        Self {
            collaborators,
            projector,
            binder: ReviewSessionBinder::new(),
            state: StatePublisher::new(),
            connection: None,
            session: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReviewSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ReviewSnapshot {
        self.state.current()
    }

    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.session.as_ref()
    }

    pub fn has_live_subscription(&self) -> bool {
        self.binder.is_bound()
    }

    /// Validates the local checkout, fetches the pull request and loads the review.
    ///
    /// A repository name mismatch fails with `InvalidOperation` before anything is published.
    /// Other failures are stored on the snapshot and returned.
    pub async fn initialize(
        &mut self,
        local_repository: &LocalRepository,
        connection: &Connection,
        owner: &str,
        repo_name: &str,
        number: u32,
        review_id: ReviewId,
    ) -> Result<(), SharedError> {
        if repo_name != local_repository.name {
            return Err(Arc::new(ReviewError::InvalidOperation(format!(
                "pull request repository '{}' does not match local repository '{}'",
                repo_name, local_repository.name
            ))));
        }

        let _busy = self.state.begin_loading();
        let key = PullRequestKey::new(owner, repo_name, number);
        debug!(pull_request = %key, review_id, host = %connection.host, "initialize");
        self.connection = Some(connection.clone());

        let result = match self.fetch_pull_request(connection, &key).await {
            Ok(pull_request) => self.load_inner(pull_request, review_id).await,
            Err(e) => Err(e),
        };
        result.map_err(|e| self.state.fail(e))
    }

    /// Binds the orchestrator to a pull request snapshot.
    ///
    /// `review_id > 0` selects an existing review (missing → `ReviewNotFound`); otherwise a
    /// new pending draft owned by the session's current user is created.
    pub async fn load(
        &mut self,
        pull_request: PullRequest,
        review_id: ReviewId,
    ) -> Result<(), SharedError> {
        let _busy = self.state.begin_loading();
        self.load_inner(pull_request, review_id)
            .await
            .map_err(|e| self.state.fail(e))
    }

    /// Re-fetches the published pull request and reloads the current review. Failures are
    /// logged and stored on the snapshot; the last loaded data stays published.
    pub async fn refresh(&mut self) {
        let current = self.state.current();
        let (Some(connection), Some(pull_request), Some(review)) = (
            self.connection.clone(),
            current.pull_request,
            current.review,
        ) else {
            warn!("refresh requested before a review was loaded");
            return;
        };
        let key = pull_request.key.clone();

        self.state.clear_error();
        let _busy = self.state.begin_loading();

        let result = match self.fetch_pull_request(&connection, &key).await {
            Ok(pull_request) => self.load_inner(pull_request, review.id).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!(
                owner = %key.owner,
                repo = %key.repo,
                number = key.number,
                review_id = review.id,
                host = %connection.host,
                error = ?e,
                "failed to refresh review"
            );
            self.state.fail(e);
        }
    }

    /// Updates the draft body shown to the user.
    pub fn set_body(&self, body: impl Into<String>) {
        self.state.set_body(body.into());
    }

    /// Releases the session subscription. Published state is left as is.
    pub async fn shutdown(&mut self) {
        self.binder.unbind().await;
        self.session = None;
    }

    async fn fetch_pull_request(
        &self,
        connection: &Connection,
        key: &PullRequestKey,
    ) -> Result<PullRequest, ReviewError> {
        let fetch_error = |source: anyhow::Error| ReviewError::Fetch {
            pull_request: key.clone(),
            source,
        };
        let service = self
            .collaborators
            .model_services
            .create_model_service(connection)
            .await
            .map_err(fetch_error)?;
        service
            .get_pull_request(&key.owner, &key.repo, key.number)
            .await
            .map_err(fetch_error)
    }

    async fn load_inner(
        &mut self,
        pull_request: PullRequest,
        review_id: ReviewId,
    ) -> Result<(), ReviewError> {
        let pull_request = Arc::new(pull_request);
        let session = self
            .collaborators
            .sessions
            .get_session(&pull_request)
            .await
            .map_err(|source| ReviewError::Session {
                pull_request: pull_request.key.clone(),
                source,
            })?;

        let review = resolve_review(&pull_request, review_id, session.current_user())?;
        let filter = CommentMembershipFilter::new(review.id);

        self.collaborators
            .file_listing
            .initialize(Arc::clone(&session), filter)
            .await
            .map_err(ReviewError::FileListing)?;

        // 初回投影より前に購読し、その間の変更も取りこぼさない
        let changes = session.subscribe();
        // 投影に失敗した場合は旧購読を残したまま返す
        let file_comments = self
            .projector
            .project(&session, filter)
            .await
            .map_err(ReviewError::Projection)?;

        // 旧購読を完全に解除してから公開・再バインドする
        self.binder.unbind().await;

        debug!(
            pull_request = %pull_request.key,
            review_id = review.id,
            comments = file_comments.len(),
            "review loaded"
        );
        self.state
            .publish_loaded(Arc::clone(&pull_request), review, file_comments);
        self.binder.bind(
            changes,
            Arc::clone(&session),
            Arc::clone(&self.projector),
            filter,
            self.state.clone(),
        );
        self.session = Some(session);
        Ok(())
    }
}

/// 既存レビューを探すか、新規ドラフトを作成する
fn resolve_review(
    pull_request: &PullRequest,
    review_id: ReviewId,
    current_user: &User,
) -> Result<Review, ReviewError> {
    if review_id > NEW_REVIEW_ID {
        pull_request
            .find_review(review_id)
            .cloned()
            .ok_or_else(|| ReviewError::ReviewNotFound {
                review_id,
                pull_request: pull_request.key.clone(),
            })
    } else {
        Ok(Review::new_draft(current_user.clone()))
    }
}
