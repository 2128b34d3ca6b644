//! Visibility and access rules for posts and comments.
//!
//! Every function here is pure: the viewer identity and the evaluation instant are passed in,
//! so the rules can be exercised without a database or an HTTP request.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Comment, Post};

/// Viewer
///
/// The identity a request is evaluated for, as resolved by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(Uuid),
}

impl Viewer {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(*id),
        }
    }

    /// True when the viewer is authenticated as exactly `user_id`.
    pub fn is(&self, user_id: Uuid) -> bool {
        self.user_id() == Some(user_id)
    }
}

/// A post is publicly visible when it is published, its publish date has been reached,
/// and its category is published.
pub fn is_publicly_visible(post: &Post, now: DateTime<Utc>) -> bool {
    post.is_published && post.pub_date <= now && post.category_is_published
}

/// Whether `viewer` may open the post detail. Callers must report `false` as not-found.
pub fn can_view(post: &Post, viewer: &Viewer, now: DateTime<Utc>) -> bool {
    is_publicly_visible(post, now) || viewer.is(post.author_id)
}

/// Only the author may edit or delete a post.
pub fn can_mutate(post: &Post, viewer: &Viewer) -> bool {
    viewer.is(post.author_id)
}

/// Only the author may edit or delete a comment.
pub fn can_mutate_comment(comment: &Comment, viewer: &Viewer) -> bool {
    viewer.is(comment.author_id)
}

/// FeedScope
///
/// Which listing a feed request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    Home,
    Category(i64),
    Profile(Uuid),
}

/// PostFilter
///
/// Repository-facing description of a post listing. `visible_at`, when set, restricts the
/// result to posts publicly visible at that instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub author_id: Option<Uuid>,
    pub category_id: Option<i64>,
    pub visible_at: Option<DateTime<Utc>>,
}

impl PostFilter {
    /// In-process evaluation of the filter; repositories must agree with it.
    pub fn matches(&self, post: &Post) -> bool {
        if self.author_id.is_some_and(|id| id != post.author_id) {
            return false;
        }
        if self.category_id.is_some_and(|id| id != post.category_id) {
            return false;
        }
        match self.visible_at {
            Some(now) => is_publicly_visible(post, now),
            None => true,
        }
    }
}

/// Builds the listing filter for a feed. Only the owner's own profile feed skips the
/// public-visibility restriction.
pub fn feed_filter(scope: FeedScope, viewer: &Viewer, now: DateTime<Utc>) -> PostFilter {
    match scope {
        FeedScope::Home => PostFilter {
            visible_at: Some(now),
            ..PostFilter::default()
        },
        FeedScope::Category(category_id) => PostFilter {
            category_id: Some(category_id),
            visible_at: Some(now),
            ..PostFilter::default()
        },
        FeedScope::Profile(author_id) => PostFilter {
            author_id: Some(author_id),
            category_id: None,
            visible_at: (!viewer.is(author_id)).then_some(now),
        },
    }
}
