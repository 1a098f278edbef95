use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{Category, Comment, Post},
};

// --- Verdicts ---

/// Verdict
///
/// Outcome of an authorization check on a single post or comment.
///
/// There is no "forbidden" outcome: a requester who may not see or touch an
/// entity gets `NotFound`, exactly as if it did not exist.
/// `RedirectToDetail` is reserved for a non-owner trying to edit a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    NotFound,
    RedirectToDetail(i64),
}

impl Verdict {
    /// Converts the verdict into the handler's error channel.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            Verdict::Allow => Ok(()),
            Verdict::NotFound => Err(AppError::NotFound),
            Verdict::RedirectToDetail(post_id) => Err(AppError::Redirect(post_detail_path(post_id))),
        }
    }
}

/// The kind of mutation requested on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Edit,
    Delete,
}

pub fn post_detail_path(post_id: i64) -> String {
    format!("/posts/{post_id}")
}

// --- Predicates ---

/// Published flag set and publication time reached.
pub fn is_published_as_of(post: &Post, now: DateTime<Utc>) -> bool {
    post.is_published && post.pub_date <= now
}

/// is_publicly_visible
///
/// The public-visibility invariant: published, publication time reached, and
/// either no category or a published one. A post without a category passes the
/// category check vacuously.
pub fn is_publicly_visible(post: &Post, now: DateTime<Utc>) -> bool {
    is_published_as_of(post, now)
        && (post.category_id.is_none() || post.category_is_published.unwrap_or(false))
}

fn is_owner(author_id: Uuid, requester: Option<Uuid>) -> bool {
    requester == Some(author_id)
}

/// Visibility
///
/// How much of the publication state a feed must respect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// No publication checks (an owner's own profile).
    Any,
    /// `is_published` and `pub_date <= now`; the category flag is not consulted.
    PublishedAsOf(DateTime<Utc>),
    /// The full public-visibility invariant.
    PublicAsOf(DateTime<Utc>),
}

/// PostFilter
///
/// A post query expressed as predicates the persistence layer must support:
/// author equality, category equality and a visibility level. The Postgres
/// repository turns it into a WHERE clause; everything else evaluates
/// [`PostFilter::matches`] directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilter {
    pub author_id: Option<Uuid>,
    pub category_id: Option<i64>,
    pub visibility: Visibility,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        if self.author_id.is_some_and(|author| post.author_id != author) {
            return false;
        }
        if self
            .category_id
            .is_some_and(|category| post.category_id != Some(category))
        {
            return false;
        }
        match self.visibility {
            Visibility::Any => true,
            Visibility::PublishedAsOf(now) => is_published_as_of(post, now),
            Visibility::PublicAsOf(now) => is_publicly_visible(post, now),
        }
    }

    /// Keeps the matching posts and returns them in feed order.
    pub fn apply(&self, posts: impl IntoIterator<Item = Post>) -> Vec<Post> {
        let mut selected: Vec<Post> = posts.into_iter().filter(|p| self.matches(p)).collect();
        sort_feed(&mut selected);
        selected
    }
}

/// Feed order: newest publication first, then newest creation first.
/// The id breaks any remaining tie so pages never overlap.
pub fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.pub_date
        .cmp(&a.pub_date)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.id.cmp(&a.id))
}

pub fn sort_feed(posts: &mut [Post]) {
    posts.sort_by(feed_order);
}

// --- Feed Filters ---

/// Home feed: everything publicly visible.
pub fn visible_posts_filter(now: DateTime<Utc>) -> PostFilter {
    PostFilter {
        author_id: None,
        category_id: None,
        visibility: Visibility::PublicAsOf(now),
    }
}

/// profile_posts_filter
///
/// An owner looking at their own profile sees drafts and scheduled posts too;
/// anyone else sees only the public subset.
pub fn profile_posts_filter(target: Uuid, requester: Option<Uuid>, now: DateTime<Utc>) -> PostFilter {
    let visibility = if is_owner(target, requester) {
        Visibility::Any
    } else {
        Visibility::PublicAsOf(now)
    };
    PostFilter {
        author_id: Some(target),
        category_id: None,
        visibility,
    }
}

/// category_posts_filter
///
/// `None` when the category itself is unpublished: its page does not exist.
pub fn category_posts_filter(category: &Category, now: DateTime<Utc>) -> Option<PostFilter> {
    if !category.is_published {
        return None;
    }
    Some(PostFilter {
        author_id: None,
        category_id: Some(category.id),
        visibility: Visibility::PublishedAsOf(now),
    })
}

// --- Feed Operations ---

pub fn list_visible_posts(posts: impl IntoIterator<Item = Post>, now: DateTime<Utc>) -> Vec<Post> {
    visible_posts_filter(now).apply(posts)
}

pub fn list_posts_for_profile(
    posts: impl IntoIterator<Item = Post>,
    target: Uuid,
    requester: Option<Uuid>,
    now: DateTime<Utc>,
) -> Vec<Post> {
    profile_posts_filter(target, requester, now).apply(posts)
}

pub fn list_visible_category_posts(
    category: &Category,
    posts: impl IntoIterator<Item = Post>,
    now: DateTime<Utc>,
) -> Option<Vec<Post>> {
    category_posts_filter(category, now).map(|filter| filter.apply(posts))
}

// --- Single-Entity Checks ---

/// can_view_post_detail
///
/// The author always sees their post. Anyone else sees it only while it is
/// publicly visible, and gets `NotFound` otherwise.
pub fn can_view_post_detail(post: &Post, requester: Option<Uuid>, now: DateTime<Utc>) -> Verdict {
    if is_owner(post.author_id, requester) || is_publicly_visible(post, now) {
        Verdict::Allow
    } else {
        Verdict::NotFound
    }
}

/// can_mutate_post
///
/// Only the author may edit or delete. A refused edit sends the requester back
/// to the post page; a refused delete conceals the post.
pub fn can_mutate_post(post: &Post, requester: Option<Uuid>, action: PostAction) -> Verdict {
    if is_owner(post.author_id, requester) {
        return Verdict::Allow;
    }
    match action {
        PostAction::Edit => Verdict::RedirectToDetail(post.id),
        PostAction::Delete => Verdict::NotFound,
    }
}

pub fn can_mutate_comment(comment: &Comment, requester: Option<Uuid>) -> Verdict {
    if is_owner(comment.author_id, requester) {
        Verdict::Allow
    } else {
        Verdict::NotFound
    }
}
