use anyhow::Result;
use std::fmt;
use std::sync::Arc;

use crate::editor::Editor;
use crate::filter::CommentMembershipFilter;
use crate::model::{Comment, SessionFile};
use crate::session::Session;

/// One comment of the active review, as handed to the renderer. Shares the session, the
/// editor and the comment; owns nothing.
#[derive(Clone)]
pub struct FileCommentViewModel {
    editor: Arc<dyn Editor>,
    session: Arc<dyn Session>,
    comment: Arc<Comment>,
    path: String,
    line: Option<u32>,
}

impl FileCommentViewModel {
    pub fn comment(&self) -> &Comment {
        &self.comment
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// コメントのアンカー位置をエディタで開く
    pub fn open_in_editor(&self) -> Result<()> {
        self.editor.open_at(&self.path, self.line)
    }
}

impl fmt::Debug for FileCommentViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCommentViewModel")
            .field("pull_request", self.session.pull_request())
            .field("path", &self.path)
            .field("line", &self.line)
            .field("comment", &self.comment)
            .finish()
    }
}

impl PartialEq for FileCommentViewModel {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.line == other.line && self.comment == other.comment
    }
}

/// Flattens the session's file → thread → comment tree into the comments of one review.
pub struct FileCommentProjector {
    editor: Arc<dyn Editor>,
}

impl FileCommentProjector {
    pub fn new(editor: Arc<dyn Editor>) -> Self {
        Self { editor }
    }

    /// Fetches the session's current files, then walks them synchronously.
    pub async fn project(
        &self,
        session: &Arc<dyn Session>,
        filter: CommentMembershipFilter,
    ) -> Result<Vec<FileCommentViewModel>> {
        let files = session.get_all_files().await?;
        Ok(self.project_files(session, &files, filter))
    }

    /// Always builds a new list in session order; never touches a previous result.
    pub fn project_files(
        &self,
        session: &Arc<dyn Session>,
        files: &[SessionFile],
        filter: CommentMembershipFilter,
    ) -> Vec<FileCommentViewModel> {
        let mut result = Vec::new();
        for file in files {
            for thread in &file.threads {
                for comment in &thread.comments {
                    if filter.owns(comment) {
                        result.push(FileCommentViewModel {
                            editor: Arc::clone(&self.editor),
                            session: Arc::clone(session),
                            comment: Arc::clone(comment),
                            path: thread.path.clone(),
                            line: thread.line,
                        });
                    }
                }
            }
        }
        result
    }
}
