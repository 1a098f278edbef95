use crate::{
    error::AppError,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, PostPage, UpdatePostRequest, UpdateProfileRequest, User,
    },
    params::PageRequest,
    policy::{PostFilter, Visibility},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

mod memory;

pub use memory::InMemoryRepository;

/// Repository Trait
///
/// The persistence collaborator. Handlers fetch entities through it and hand
/// them to the policy; visibility rules for feeds arrive pre-built as a
/// [`PostFilter`] so every implementation applies the same predicate.
///
/// **Send + Sync + async_trait** are required to make the trait object (`Arc<dyn Repository>`)
/// safely shareable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;
    // Fails with Conflict when the new username is taken.
    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError>;

    // --- Posts ---
    // Ordered by pub_date DESC, created_at DESC; the page is clamped to the result size.
    async fn find_posts(&self, filter: &PostFilter, page: PageRequest)
    -> Result<PostPage, AppError>;
    // Raw lookup, no visibility check.
    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError>;
    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, AppError>;
    // Partial update: None fields keep their stored value.
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError>;
    async fn set_post_status(&self, id: i64, is_published: bool) -> Result<Option<Post>, AppError>;
    // Removes the post's comments with it.
    async fn delete_post(&self, id: i64) -> Result<bool, AppError>;

    // --- Categories & Locations ---
    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError>;
    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, AppError>;
    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, AppError>;
    async fn set_category_status(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>, AppError>;
    // Clears the reference on dependent posts instead of deleting them.
    async fn delete_category(&self, id: i64) -> Result<bool, AppError>;
    async fn get_location(&self, id: i64) -> Result<Option<Location>, AppError>;
    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, AppError>;
    // Clears the reference on dependent posts instead of deleting them.
    async fn delete_location(&self, id: i64) -> Result<bool, AppError>;

    // --- Comments ---
    // Oldest first.
    async fn get_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError>;
    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError>;
    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, AppError>;
    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, AppError>;
    async fn delete_comment(&self, id: i64) -> Result<bool, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date, p.created_at, p.author_id,
        p.location_id, p.category_id, p.is_published, p.image,
        c.is_published AS category_is_published,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const POST_COUNT: &str = r#"
    SELECT COUNT(*)
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id
"#;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, role";
const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";
const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";
const COMMENT_COLUMNS: &str = "id, post_id, author_id, text, created_at";

/// push_post_filter
///
/// Appends the WHERE clause for a [`PostFilter`]. Must stay in step with
/// `PostFilter::matches`.
fn push_post_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    builder.push(" WHERE TRUE");

    if let Some(author_id) = filter.author_id {
        builder.push(" AND p.author_id = ");
        builder.push_bind(author_id);
    }

    if let Some(category_id) = filter.category_id {
        builder.push(" AND p.category_id = ");
        builder.push_bind(category_id);
    }

    match filter.visibility {
        Visibility::Any => {}
        Visibility::PublishedAsOf(now) => {
            builder.push(" AND p.is_published = TRUE AND p.pub_date <= ");
            builder.push_bind(now);
        }
        Visibility::PublicAsOf(now) => {
            builder.push(" AND p.is_published = TRUE AND p.pub_date <= ");
            builder.push_bind(now);
            builder.push(" AND (p.category_id IS NULL OR c.is_published = TRUE)");
        }
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the PostgreSQL database.
/// Cascades and reference clearing are enforced by the foreign keys in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        let sql = format!(
            "UPDATE users SET first_name = $2, last_name = $3, username = $4, email = $5 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(req.first_name)
            .bind(req.last_name)
            .bind(req.username)
            .bind(req.email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_insert(e, "username"))
    }

    /// find_posts
    ///
    /// Counts first so the requested page can be clamped, then fetches one page.
    /// Filters are bound through QueryBuilder, never interpolated.
    async fn find_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<PostPage, AppError> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new(POST_COUNT);
        push_post_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let resolved = page.resolve(total);

        let mut select: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);
        push_post_filter(&mut select, filter);
        select.push(" ORDER BY p.pub_date DESC, p.created_at DESC, p.id DESC LIMIT ");
        select.push_bind(resolved.per_page);
        select.push(" OFFSET ");
        select.push_bind(resolved.offset);

        let posts = select
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await
            .inspect_err(|e| tracing::error!("find_posts error: {:?}", e))?;

        Ok(resolved.into_post_page(posts))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let sql = format!("{POST_SELECT} WHERE p.id = $1");
        let post = sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO posts (title, text, pub_date, author_id, location_id, category_id, image)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id"#,
        )
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(author_id)
        .bind(req.location_id)
        .bind(req.category_id)
        .bind(req.image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "post"))?;

        self.get_post(id).await?.ok_or(AppError::NotFound)
    }

    /// update_post
    ///
    /// Uses `COALESCE` so only the fields present in `req` are written. The
    /// clearable columns carry a "sent" flag so an explicit null writes NULL.
    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                text = COALESCE($3, text),
                pub_date = COALESCE($4, pub_date),
                location_id = CASE WHEN $5 THEN $6 ELSE location_id END,
                category_id = COALESCE($7, category_id),
                image = CASE WHEN $8 THEN $9 ELSE image END
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.text)
        .bind(req.pub_date)
        .bind(req.location_id.is_some())
        .bind(req.location_id.flatten())
        .bind(req.category_id)
        .bind(req.image.is_some())
        .bind(req.image.flatten())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "post"))?;

        match updated {
            Some(id) => self.get_post(id).await,
            None => Ok(None),
        }
    }

    async fn set_post_status(&self, id: i64, is_published: bool) -> Result<Option<Post>, AppError> {
        let updated: Option<i64> =
            sqlx::query_scalar("UPDATE posts SET is_published = $2 WHERE id = $1 RETURNING id")
                .bind(id)
                .bind(is_published)
                .fetch_optional(&self.pool)
                .await?;

        match updated {
            Some(id) => self.get_post(id).await,
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, AppError> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1");
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, AppError> {
        let sql = format!(
            "INSERT INTO categories (title, description, slug, is_published) \
             VALUES ($1, $2, $3, $4) RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(req.title)
            .bind(req.description)
            .bind(req.slug)
            .bind(req.is_published)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::from_insert(e, "category slug"))
    }

    async fn set_category_status(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>, AppError> {
        let sql = format!(
            "UPDATE categories SET is_published = $2 WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(is_published)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, AppError> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = $1");
        let location = sqlx::query_as::<_, Location>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(location)
    }

    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, AppError> {
        let sql = format!(
            "INSERT INTO locations (name, is_published) VALUES ($1, $2) RETURNING {LOCATION_COLUMNS}"
        );
        let location = sqlx::query_as::<_, Location>(&sql)
            .bind(req.name)
            .bind(req.is_published)
            .fetch_one(&self.pool)
            .await?;
        Ok(location)
    }

    async fn delete_location(&self, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 ORDER BY created_at ASC, id ASC"
        );
        let comments = sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, AppError> {
        let sql = format!(
            "INSERT INTO comments (post_id, author_id, text) VALUES ($1, $2, $3) \
             RETURNING {COMMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .bind(author_id)
            .bind(text)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::from_insert(e, "comment"))
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, AppError> {
        let sql = format!("UPDATE comments SET text = $2 WHERE id = $1 RETURNING {COMMENT_COLUMNS}");
        let comment = sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(text)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, AppError> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
