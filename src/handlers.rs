use crate::{
    AppState,
    auth::{AuthUser, MaybeUser},
    error::AppError,
    models::{
        Category, CategoryFeed, Comment, CommentRequest, CreateCategoryRequest,
        CreateLocationRequest, CreatePostRequest, Location, Post, PostDetail, PostPage,
        ProfileFeed, UpdatePostRequest, UpdateProfileRequest, User,
    },
    params::PageQuery,
    policy::{self, PostAction},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

// --- Helpers ---

fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Rejects a post payload that points at a category or location that does not exist.
async fn check_post_references(
    state: &AppState,
    category_id: Option<i64>,
    location_id: Option<i64>,
) -> Result<(), AppError> {
    if let Some(id) = category_id {
        if state.repo.get_category(id).await?.is_none() {
            return Err(AppError::Validation(format!("category {id} does not exist")));
        }
    }
    if let Some(id) = location_id {
        if state.repo.get_location(id).await?.is_none() {
            return Err(AppError::Validation(format!("location {id} does not exist")));
        }
    }
    Ok(())
}

async fn load_post(state: &AppState, post_id: i64) -> Result<Post, AppError> {
    state.repo.get_post(post_id).await?.ok_or(AppError::NotFound)
}

/// Resolves a comment addressed through its post. A comment filed under a
/// different post is reported as missing.
async fn load_post_comment(
    state: &AppState,
    post_id: i64,
    comment_id: i64,
) -> Result<Comment, AppError> {
    load_post(state, post_id).await?;
    state
        .repo
        .get_comment(comment_id)
        .await?
        .filter(|comment| comment.post_id == post_id)
        .ok_or(AppError::NotFound)
}

// --- Public Handlers ---

/// index
///
/// [Public Route] The home feed: every publicly visible post, newest first.
#[utoipa::path(
    get,
    path = "/",
    params(PageQuery),
    responses((status = 200, description = "Home feed", body = PostPage))
)]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>, AppError> {
    let filter = policy::visible_posts_filter(state.clock.now());
    let page = query.page_request(state.config.posts_per_page);
    Ok(Json(state.repo.find_posts(&filter, page).await?))
}

/// get_post_detail
///
/// [Public Route] A single post with its comments. The author sees drafts and
/// scheduled posts; everyone else gets 404 for anything not publicly visible.
#[utoipa::path(
    get,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_post_detail(
    requester: MaybeUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<PostDetail>, AppError> {
    let post = load_post(&state, post_id).await?;
    policy::can_view_post_detail(&post, requester.id(), state.clock.now()).into_result()?;

    let comments = state.repo.get_comments(post.id).await?;
    Ok(Json(PostDetail { post, comments }))
}

/// get_category_posts
///
/// [Public Route] A published category and the posts filed under it.
#[utoipa::path(
    get,
    path = "/category/{category_slug}",
    params(("category_slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category feed", body = CategoryFeed),
        (status = 404, description = "Unknown or unpublished category")
    )
)]
pub async fn get_category_posts(
    State(state): State<AppState>,
    Path(category_slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryFeed>, AppError> {
    let category = state
        .repo
        .get_category_by_slug(&category_slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let filter =
        policy::category_posts_filter(&category, state.clock.now()).ok_or(AppError::NotFound)?;

    let page = query.page_request(state.config.posts_per_page);
    let page = state.repo.find_posts(&filter, page).await?;
    Ok(Json(CategoryFeed { category, page }))
}

/// get_profile
///
/// [Public Route] A user's profile and posts. Owners see all of their posts,
/// visitors only the public ones.
#[utoipa::path(
    get,
    path = "/profile/{username}",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Profile", body = ProfileFeed),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn get_profile(
    requester: MaybeUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileFeed>, AppError> {
    let user = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;
    let filter = policy::profile_posts_filter(user.id, requester.id(), state.clock.now());

    let page = query.page_request(state.config.posts_per_page);
    let page = state.repo.find_posts(&filter, page).await?;
    Ok(Json(ProfileFeed {
        profile: user.into(),
        page,
    }))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The requester's own account record.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Account", body = User))
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let user = state.repo.get_user(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

/// update_me
///
/// [Authenticated Route] Edits the requester's own profile. Always acts on the
/// authenticated identity, never on a user named in the request.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    payload.validate()?;
    let user = state
        .repo
        .update_profile(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(user))
}

/// create_post
///
/// [Authenticated Route] Publishes a new post authored by the requester.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 422, description = "Invalid payload")
    )
)]
pub async fn create_post(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    payload.validate()?;
    check_post_references(&state, payload.category_id, payload.location_id).await?;

    let post = state.repo.create_post(id, payload).await?;
    tracing::info!(post_id = post.id, author = %id, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Edits a post. A non-owner is redirected to the post's
/// detail page instead of receiving an error.
#[utoipa::path(
    put,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 303, description = "Not the author; redirected to the detail page"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_post(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let post = load_post(&state, post_id).await?;
    policy::can_mutate_post(&post, Some(id), PostAction::Edit).into_result()?;

    payload.validate()?;
    check_post_references(&state, payload.category_id, payload.location_id.flatten()).await?;

    let post = state
        .repo
        .update_post(post_id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

/// delete_post
///
/// [Authenticated Route] Deletes a post and its comments. A non-owner gets 404.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}",
    params(("post_id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let post = load_post(&state, post_id).await?;
    policy::can_mutate_post(&post, Some(id), PostAction::Delete).into_result()?;

    if !state.repo.delete_post(post_id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(post_id, author = %id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// add_comment
///
/// [Authenticated Route] Comments on a post the requester is allowed to see.
#[utoipa::path(
    post,
    path = "/posts/{post_id}/comments",
    params(("post_id" = i64, Path, description = "Post ID")),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Comment Added", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn add_comment(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let post = load_post(&state, post_id).await?;
    policy::can_view_post_detail(&post, Some(id), state.clock.now()).into_result()?;
    payload.validate()?;

    let comment = state.repo.add_comment(post.id, id, payload.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// update_comment
///
/// [Authenticated Route] Edits the requester's own comment. Anyone else gets 404.
#[utoipa::path(
    put,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let comment = load_post_comment(&state, post_id, comment_id).await?;
    policy::can_mutate_comment(&comment, Some(id)).into_result()?;
    payload.validate()?;

    let comment = state
        .repo
        .update_comment(comment.id, payload.text)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(comment))
}

/// delete_comment
///
/// [Authenticated Route] Deletes the requester's own comment. Anyone else gets 404.
#[utoipa::path(
    delete,
    path = "/posts/{post_id}/comments/{comment_id}",
    params(
        ("post_id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    let comment = load_post_comment(&state, post_id, comment_id).await?;
    policy::can_mutate_comment(&comment, Some(id)).into_result()?;

    if !state.repo.delete_comment(comment.id).await? {
        return Err(AppError::NotFound);
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin Handlers ---

/// create_category
///
/// [Admin Route] Adds a category.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Slug taken")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    require_admin(&user)?;
    payload.validate()?;
    let category = state.repo.create_category(payload).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// set_category_status
///
/// [Admin Route] Publishes or hides a category. Hiding it hides its feed and
/// every post filed under it.
#[utoipa::path(
    put,
    path = "/admin/categories/{id}/status",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = bool,
    responses((status = 200, description = "Updated", body = Category))
)]
pub async fn set_category_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(is_published): Json<bool>,
) -> Result<Json<Category>, AppError> {
    require_admin(&user)?;
    let category = state
        .repo
        .set_category_status(id, is_published)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(category))
}

/// delete_category
///
/// [Admin Route] Removes a category. Its posts survive without a category.
#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_admin(&user)?;
    if state.repo.delete_category(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// create_location
///
/// [Admin Route] Adds a location.
#[utoipa::path(
    post,
    path = "/admin/locations",
    request_body = CreateLocationRequest,
    responses((status = 201, description = "Created", body = Location))
)]
pub async fn create_location(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    require_admin(&user)?;
    payload.validate()?;
    let location = state.repo.create_location(payload).await?;
    Ok((StatusCode::CREATED, Json(location)))
}

/// delete_location
///
/// [Admin Route] Removes a location. Its posts survive without a location.
#[utoipa::path(
    delete,
    path = "/admin/locations/{id}",
    params(("id" = i64, Path, description = "Location ID")),
    responses((status = 204, description = "Deleted"), (status = 404, description = "Not Found"))
)]
pub async fn delete_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    require_admin(&user)?;
    if state.repo.delete_location(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// set_post_status
///
/// [Admin Route] Moderation toggle for a post's published flag.
#[utoipa::path(
    put,
    path = "/admin/posts/{id}/status",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = bool,
    responses((status = 200, description = "Updated", body = Post))
)]
pub async fn set_post_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(is_published): Json<bool>,
) -> Result<Json<Post>, AppError> {
    require_admin(&user)?;
    let post = state
        .repo
        .set_post_status(id, is_published)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(post_id = id, is_published, admin = %user.id, "post status changed");
    Ok(Json(post))
}
