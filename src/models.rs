use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

/// Upper bound shared by every short text column (titles, names).
pub const MAX_TITLE_LEN: usize = 256;
/// Column widths of the `categories` and `users` tables.
pub const MAX_SLUG_LEN: usize = 50;
pub const MAX_NAME_LEN: usize = 150;
pub const MAX_EMAIL_LEN: usize = 254;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The backend's mirror of an identity supplied by the external auth provider,
/// stored in the `users` table. `username` is unique and addresses the profile page.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    // 'user' or 'admin'.
    pub role: String,
}

/// Category
///
/// A thematic section of the blog, addressed by its unique `slug`.
/// An unpublished category hides its feed and every post filed under it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Location
///
/// A named place a post can be geotagged with.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Post
///
/// A blog entry from the `posts` table, owned by `author_id`.
///
/// A `pub_date` in the future schedules the post: it stays hidden from everyone
/// but its author until that moment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub author_id: Uuid,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub is_published: bool,
    // Reference to an externally stored image.
    pub image: Option<String>,

    // Loaded via LEFT JOIN on categories; None when the post has no category.
    #[sqlx(default)]
    pub category_is_published: Option<bool>,
    // Loaded via a correlated COUNT over comments.
    #[sqlx(default)]
    pub comment_count: i64,
}

/// Comment
///
/// A reader's comment from the `comments` table. Removed together with its post.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// CreatePostRequest
///
/// Input payload for publishing a new post (POST /posts). The author is always
/// the authenticated requester; publication status is an admin concern.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
    pub image: Option<String>,
}

impl CreatePostRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title("title", &self.title)?;
        validate_body("text", &self.text)
    }
}

/// UpdatePostRequest
///
/// Partial update payload for editing a post (PUT /posts/{post_id}).
/// Omitted fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub pub_date: Option<DateTime<Utc>>,

    /// Absent keeps the location, `null` removes it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[ts(type = "bigint | null")]
    #[schema(value_type = Option<i64>)]
    pub location_id: Option<Option<i64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,

    /// Absent keeps the image reference, `null` removes it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub image: Option<Option<String>>,
}

impl UpdatePostRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            validate_title("title", title)?;
        }
        if let Some(text) = &self.text {
            validate_body("text", text)?;
        }
        Ok(())
    }
}

/// CommentRequest
///
/// Input payload for adding or editing a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentRequest {
    pub text: String,
}

impl CommentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_body("text", &self.text)
    }
}

/// UpdateProfileRequest
///
/// Input payload for the profile edit page (PUT /me).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() || self.username.chars().count() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "username must be between 1 and {MAX_NAME_LEN} characters"
            )));
        }
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if value.chars().count() > MAX_NAME_LEN {
                return Err(AppError::Validation(format!(
                    "{field} must be at most {MAX_NAME_LEN} characters"
                )));
            }
        }
        if self.email.chars().count() > MAX_EMAIL_LEN {
            return Err(AppError::Validation(format!(
                "email must be at most {MAX_EMAIL_LEN} characters"
            )));
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            return Err(AppError::Validation("email is not valid".to_string()));
        }
        Ok(())
    }
}

/// CreateCategoryRequest
///
/// Admin payload for adding a category (POST /admin/categories).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCategoryRequest {
    pub title: String,
    pub description: String,
    /// URL identifier: latin letters, digits, hyphen and underscore.
    #[schema(example = "travel")]
    pub slug: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

impl CreateCategoryRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title("title", &self.title)?;
        if !is_valid_slug(&self.slug) {
            return Err(AppError::Validation(
                "slug may only contain latin letters, digits, hyphen and underscore".to_string(),
            ));
        }
        if self.slug.len() > MAX_SLUG_LEN {
            return Err(AppError::Validation(format!(
                "slug must be at most {MAX_SLUG_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// CreateLocationRequest
///
/// Admin payload for adding a location (POST /admin/locations).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateLocationRequest {
    pub name: String,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

impl CreateLocationRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_title("name", &self.name)
    }
}

fn default_published() -> bool {
    true
}

// --- Output Schemas ---

/// PostPage
///
/// One page of an ordered post feed, plus the numbers a pager needs.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub num_pages: i64,
}

/// PostDetail
///
/// The post detail page: the post and its comments, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// CategoryFeed
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryFeed {
    pub category: Category,
    pub page: PostPage,
}

/// UserProfile
///
/// Public profile card. Omits the e-mail address and role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

/// ProfileFeed
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileFeed {
    pub profile: UserProfile,
    pub page: PostPage,
}

// --- Validation Helpers ---

fn validate_title(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_body(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
