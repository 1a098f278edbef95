use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::{
    clock::{ClockState, SystemClock},
    error::AppError,
    models::{
        Category, Comment, CreateCategoryRequest, CreateLocationRequest, CreatePostRequest,
        Location, Post, PostPage, UpdatePostRequest, UpdateProfileRequest, User,
    },
    params::PageRequest,
    policy::PostFilter,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    posts: BTreeMap<i64, Post>,
    categories: BTreeMap<i64, Category>,
    locations: BTreeMap<i64, Location>,
    comments: BTreeMap<i64, Comment>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Fills the joined columns the Postgres query would compute.
    fn hydrate(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.category_is_published = post
            .category_id
            .and_then(|id| self.categories.get(&id))
            .map(|c| c.is_published);
        post.comment_count = self
            .comments
            .values()
            .filter(|c| c.post_id == post.id)
            .count() as i64;
        post
    }

    fn check_references(
        &self,
        category_id: Option<i64>,
        location_id: Option<i64>,
    ) -> Result<(), AppError> {
        let category_missing = category_id.is_some_and(|id| !self.categories.contains_key(&id));
        let location_missing = location_id.is_some_and(|id| !self.locations.contains_key(&id));
        if category_missing || location_missing {
            return Err(AppError::Validation(
                "post references a missing record".to_string(),
            ));
        }
        Ok(())
    }
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Mirrors the Postgres
/// schema's cascade and SET NULL rules, and shares the feed predicate through
/// [`PostFilter::apply`]. Used by the test suites.
///
/// Users are provisioned by the identity provider, so they are seeded with
/// [`InMemoryRepository::insert_user`] rather than through the trait.
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
    clock: ClockState,
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Stamps `created_at` columns from `clock` instead of the wall clock.
    pub fn with_clock(clock: ClockState) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
        }
    }

    pub async fn insert_user(&self, user: User) -> User {
        let mut tables = self.tables.write().await;
        tables.users.insert(user.id, user.clone());
        user
    }

    /// Stores a post row as given, assigning a fresh id. Lets tests seed drafts
    /// and backdated rows that the public API cannot produce.
    pub async fn insert_post(&self, mut post: Post) -> Post {
        let mut tables = self.tables.write().await;
        post.id = tables.next_id();
        tables.posts.insert(post.id, post.clone());
        tables.hydrate(&post)
    }

    pub async fn insert_category(&self, mut category: Category) -> Category {
        let mut tables = self.tables.write().await;
        category.id = tables.next_id();
        tables.categories.insert(category.id, category.clone());
        category
    }

    pub async fn insert_location(&self, mut location: Location) -> Location {
        let mut tables = self.tables.write().await;
        location.id = tables.next_id();
        tables.locations.insert(location.id, location.clone());
        location
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;
        let taken = tables
            .users
            .values()
            .any(|u| u.id != id && u.username == req.username);
        if taken {
            return Err(AppError::Conflict("username already exists".to_string()));
        }

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.first_name = req.first_name;
        user.last_name = req.last_name;
        user.username = req.username;
        user.email = req.email;
        Ok(Some(user.clone()))
    }

    async fn find_posts(
        &self,
        filter: &PostFilter,
        page: PageRequest,
    ) -> Result<PostPage, AppError> {
        let tables = self.tables.read().await;
        let selected = filter.apply(tables.posts.values().map(|p| tables.hydrate(p)));

        let resolved = page.resolve(selected.len() as i64);
        let posts = selected
            .into_iter()
            .skip(resolved.offset as usize)
            .take(resolved.per_page as usize)
            .collect();

        Ok(resolved.into_post_page(posts))
    }

    async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.posts.get(&id).map(|p| tables.hydrate(p)))
    }

    async fn create_post(&self, author_id: Uuid, req: CreatePostRequest) -> Result<Post, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_references(req.category_id, req.location_id)?;

        let post = Post {
            id: tables.next_id(),
            title: req.title,
            text: req.text,
            pub_date: req.pub_date,
            created_at: self.clock.now(),
            author_id,
            location_id: req.location_id,
            category_id: req.category_id,
            is_published: true,
            image: req.image,
            ..Post::default()
        };
        tables.posts.insert(post.id, post.clone());
        Ok(tables.hydrate(&post))
    }

    async fn update_post(&self, id: i64, req: UpdatePostRequest) -> Result<Option<Post>, AppError> {
        let mut tables = self.tables.write().await;
        tables.check_references(req.category_id, req.location_id.flatten())?;

        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            post.title = title;
        }
        if let Some(text) = req.text {
            post.text = text;
        }
        if let Some(pub_date) = req.pub_date {
            post.pub_date = pub_date;
        }
        if let Some(location_id) = req.location_id {
            post.location_id = location_id;
        }
        if req.category_id.is_some() {
            post.category_id = req.category_id;
        }
        if let Some(image) = req.image {
            post.image = image;
        }
        let post = post.clone();
        Ok(Some(tables.hydrate(&post)))
    }

    async fn set_post_status(&self, id: i64, is_published: bool) -> Result<Option<Post>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        post.is_published = is_published;
        let post = post.clone();
        Ok(Some(tables.hydrate(&post)))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.posts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.comments.retain(|_, c| c.post_id != id);
        Ok(true)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, AppError> {
        Ok(self.tables.read().await.categories.get(&id).cloned())
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, AppError> {
        let mut tables = self.tables.write().await;
        if tables.categories.values().any(|c| c.slug == req.slug) {
            return Err(AppError::Conflict("category slug already exists".to_string()));
        }

        let category = Category {
            id: tables.next_id(),
            title: req.title,
            description: req.description,
            slug: req.slug,
            is_published: req.is_published,
            created_at: self.clock.now(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn set_category_status(
        &self,
        id: i64,
        is_published: bool,
    ) -> Result<Option<Category>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.categories.get_mut(&id).map(|category| {
            category.is_published = is_published;
            category.clone()
        }))
    }

    async fn delete_category(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.categories.remove(&id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.category_id == Some(id) {
                post.category_id = None;
            }
        }
        Ok(true)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, AppError> {
        Ok(self.tables.read().await.locations.get(&id).cloned())
    }

    async fn create_location(&self, req: CreateLocationRequest) -> Result<Location, AppError> {
        let mut tables = self.tables.write().await;
        let location = Location {
            id: tables.next_id(),
            name: req.name,
            is_published: req.is_published,
            created_at: self.clock.now(),
        };
        tables.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn delete_location(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        if tables.locations.remove(&id).is_none() {
            return Ok(false);
        }
        for post in tables.posts.values_mut() {
            if post.location_id == Some(id) {
                post.location_id = None;
            }
        }
        Ok(true)
    }

    async fn get_comments(&self, post_id: i64) -> Result<Vec<Comment>, AppError> {
        let tables = self.tables.read().await;
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(comments)
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, AppError> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn add_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&post_id) {
            return Err(AppError::Validation(
                "comment references a missing record".to_string(),
            ));
        }

        let comment = Comment {
            id: tables.next_id(),
            post_id,
            author_id,
            text,
            created_at: self.clock.now(),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.get_mut(&id).map(|comment| {
            comment.text = text;
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        Ok(tables.comments.remove(&id).is_some())
    }
}
