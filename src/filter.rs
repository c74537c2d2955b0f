use crate::model::{Comment, InlineCommentThread, ReviewId};

/// Membership test for the active review. Bound to a review id at load time and handed to
/// the file listing so it only shows threads the review takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentMembershipFilter {
    review_id: ReviewId,
}

impl CommentMembershipFilter {
    pub fn new(review_id: ReviewId) -> Self {
        Self { review_id }
    }

    pub fn review_id(&self) -> ReviewId {
        self.review_id
    }

    /// コメントがアクティブなレビューに属するか
    pub fn owns(&self, comment: &Comment) -> bool {
        comment.review_id == self.review_id
    }

    /// スレッド内に1件でも所属コメントがあれば true
    pub fn matches(&self, thread: &InlineCommentThread) -> bool {
        thread.comments.iter().any(|comment| self.owns(comment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;
    use std::sync::Arc;

    fn thread(review_ids: &[ReviewId]) -> InlineCommentThread {
        InlineCommentThread {
            path: "src/main.rs".to_string(),
            line: Some(1),
            comments: review_ids
                .iter()
                .enumerate()
                .map(|(i, &review_id)| {
                    Arc::new(Comment {
                        id: i as u64 + 1,
                        review_id,
                        user: User::new("alice"),
                        body: String::new(),
                    })
                })
                .collect(),
        }
    }

    #[test]
    fn test_matches_when_any_comment_belongs() {
        let filter = CommentMembershipFilter::new(7);
        assert!(filter.matches(&thread(&[3, 7])));
        assert!(filter.matches(&thread(&[7])));
    }

    #[test]
    fn test_no_match_without_owned_comment() {
        let filter = CommentMembershipFilter::new(7);
        assert!(!filter.matches(&thread(&[3, 4])));
        assert!(!filter.matches(&thread(&[])));
    }

    #[test]
    fn test_new_draft_filter_only_matches_unassigned_comments() {
        let filter = CommentMembershipFilter::new(0);
        assert!(!filter.matches(&thread(&[1, 2])));
        assert!(filter.matches(&thread(&[0])));
    }
}
