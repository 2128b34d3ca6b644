use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, ErrorBody, RepoError, ValidationErrors},
    feed::select_feed,
    forms::{CategoryForm, CommentForm, LocationForm, PostForm, PresignedUrlRequest, ProfileForm},
    models::{
        Category, CategoryFeed, Comment, Location, Post, PostDetail, PresignedUrlResponse,
        ProfileFeed, User, UserProfile,
    },
    pagination::{Page, PageQuery},
    policy::{self, FeedScope, Viewer},
    repository::Repository,
    storage::post_image_key,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

// --- Helpers ---

/// Maps a failed save to a form error when the store rejected a reference or a unique field.
fn save_error(e: RepoError) -> AppError {
    match e {
        RepoError::MissingReference(field) => {
            AppError::Validation(ValidationErrors::single(&field, "Select a valid choice."))
        }
        RepoError::Conflict(field) => AppError::Validation(ValidationErrors::single(
            &field,
            "This value is already taken.",
        )),
        other => AppError::Repository(other),
    }
}

/// validate_post_form
///
/// Field checks plus existence of the referenced category and location, reported together.
async fn validate_post_form(repo: &dyn Repository, form: &PostForm) -> Result<(), AppError> {
    let mut errors = form.validate().err().unwrap_or_default();
    if repo.get_category(form.category_id).await?.is_none() {
        errors.add("category_id", "Select a valid choice.");
    }
    if let Some(location_id) = form.location_id {
        if repo.get_location(location_id).await?.is_none() {
            errors.add("location_id", "Select a valid choice.");
        }
    }
    errors.into_result().map_err(AppError::Validation)
}

/// Loads a post the viewer is allowed to see. Hidden and missing posts are both `NotFound`.
async fn load_visible_post(
    repo: &dyn Repository,
    id: i64,
    viewer: &Viewer,
) -> Result<Post, AppError> {
    let post = repo.find_post(id).await?.ok_or(AppError::NotFound)?;
    if !policy::can_view(&post, viewer, Utc::now()) {
        return Err(AppError::NotFound);
    }
    Ok(post)
}

/// Loads a post for editing by `user`. Non-owners who can see the post are redirected to
/// its detail page; everyone else gets `NotFound`.
async fn load_owned_post(repo: &dyn Repository, id: i64, user: &AuthUser) -> Result<Post, AppError> {
    let viewer = user.viewer();
    let post = load_visible_post(repo, id, &viewer).await?;
    if !policy::can_mutate(&post, &viewer) {
        tracing::info!(post_id = id, user_id = %user.id, "non-owner mutation redirected");
        return Err(AppError::not_owner_of_post(id));
    }
    Ok(post)
}

/// Loads a comment of `post_id` for editing by `user`, redirecting non-authors to the post.
/// Comments under a post the user cannot see are `NotFound`, existing or not.
async fn load_owned_comment(
    repo: &dyn Repository,
    post_id: i64,
    comment_id: i64,
    user: &AuthUser,
) -> Result<Comment, AppError> {
    load_visible_post(repo, post_id, &user.viewer()).await?;
    let comment = repo
        .find_comment(post_id, comment_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if !policy::can_mutate_comment(&comment, &user.viewer()) {
        tracing::info!(comment_id, user_id = %user.id, "non-author comment mutation redirected");
        return Err(AppError::not_owner_of_post(post_id));
    }
    Ok(comment)
}

fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

// --- Public Handlers ---

/// get_home_feed
///
/// [Public Route] Publicly visible posts, newest first, ten per page.
#[utoipa::path(
    get,
    path = "/posts",
    params(PageQuery),
    responses((status = 200, description = "Home feed", body = Page<Post>))
)]
pub async fn get_home_feed(
    viewer: Viewer,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Post>>, AppError> {
    let page = select_feed(
        state.repo.as_ref(),
        FeedScope::Home,
        &viewer,
        Utc::now(),
        query.number(),
    )
    .await?;
    Ok(Json(page))
}

/// get_post
///
/// [Public Route] A post and its comments. Posts the viewer may not see are reported exactly
/// like posts that do not exist.
#[utoipa::path(
    get,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Found", body = PostDetail),
        (status = 404, description = "Missing or not visible", body = ErrorBody)
    )
)]
pub async fn get_post(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetail>, AppError> {
    let post = load_visible_post(state.repo.as_ref(), id, &viewer).await?;
    let comments = state.repo.list_comments(id).await?;
    Ok(Json(PostDetail { post, comments }))
}

/// get_category_feed
///
/// [Public Route] Publicly visible posts of a published category.
#[utoipa::path(
    get,
    path = "/category/{slug}",
    params(("slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category feed", body = CategoryFeed),
        (status = 404, description = "Missing or unpublished category", body = ErrorBody)
    )
)]
pub async fn get_category_feed(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryFeed>, AppError> {
    let category = state
        .repo
        .find_category(&slug)
        .await?
        .filter(|category| category.is_published)
        .ok_or(AppError::NotFound)?;

    let page = select_feed(
        state.repo.as_ref(),
        FeedScope::Category(category.id),
        &viewer,
        Utc::now(),
        query.number(),
    )
    .await?;
    Ok(Json(CategoryFeed { category, page }))
}

/// get_profile_feed
///
/// [Public Route] A user's profile and posts. The owner also sees unpublished and scheduled
/// posts; everyone else sees only publicly visible ones.
#[utoipa::path(
    get,
    path = "/profile/{username}",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Profile feed", body = ProfileFeed),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
pub async fn get_profile_feed(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileFeed>, AppError> {
    let user = state
        .repo
        .find_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound)?;

    let page = select_feed(
        state.repo.as_ref(),
        FeedScope::Profile(user.id),
        &viewer,
        Utc::now(),
        query.number(),
    )
    .await?;
    Ok(Json(ProfileFeed {
        profile: UserProfile::from(user),
        page,
    }))
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

// --- Authenticated Handlers ---

/// create_post
///
/// [Authenticated Route] Publishes a new post authored by the viewer.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = PostForm,
    responses(
        (status = 201, description = "Created", body = Post),
        (status = 303, description = "Login required"),
        (status = 422, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Json(form): Json<PostForm>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    validate_post_form(state.repo.as_ref(), &form).await?;
    let post = state
        .repo
        .create_post(user.id, form)
        .await
        .map_err(save_error)?;
    tracing::info!(post_id = post.id, author = %user.username, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Replaces the fields of the viewer's own post.
#[utoipa::path(
    put,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = PostForm,
    responses(
        (status = 200, description = "Updated", body = Post),
        (status = 303, description = "Login required, or not the author"),
        (status = 404, description = "Missing or not visible", body = ErrorBody),
        (status = 422, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn update_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<PostForm>,
) -> Result<Json<Post>, AppError> {
    load_owned_post(state.repo.as_ref(), id, &user).await?;
    validate_post_form(state.repo.as_ref(), &form).await?;
    let post = state
        .repo
        .update_post(id, form)
        .await
        .map_err(save_error)?
        .ok_or(AppError::NotFound)?;
    Ok(Json(post))
}

/// delete_post
///
/// [Authenticated Route] Deletes the viewer's own post along with its comments.
#[utoipa::path(
    delete,
    path = "/posts/{id}",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Login required, or not the author"),
        (status = 404, description = "Missing or not visible", body = ErrorBody)
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    load_owned_post(state.repo.as_ref(), id, &user).await?;
    if state.repo.delete_post(id).await? {
        tracing::info!(post_id = id, author = %user.username, "post deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// add_comment
///
/// [Authenticated Route] Comments on a post the viewer can see.
#[utoipa::path(
    post,
    path = "/posts/{id}/comments",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = CommentForm,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 303, description = "Login required"),
        (status = 404, description = "Missing or not visible", body = ErrorBody),
        (status = 422, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(form): Json<CommentForm>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    load_visible_post(state.repo.as_ref(), post_id, &user.viewer()).await?;
    form.validate()?;
    let comment = state
        .repo
        .create_comment(post_id, user.id, form.text)
        .await
        .map_err(|e| match e {
            // The post vanished between the lookup and the insert.
            RepoError::MissingReference(_) => AppError::NotFound,
            other => AppError::Repository(other),
        })?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// update_comment
///
/// [Authenticated Route] Edits the viewer's own comment.
#[utoipa::path(
    put,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body = CommentForm,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 303, description = "Login required, or not the author"),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 422, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn update_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Json(form): Json<CommentForm>,
) -> Result<Json<Comment>, AppError> {
    load_owned_comment(state.repo.as_ref(), post_id, comment_id, &user).await?;
    form.validate()?;
    let comment = state
        .repo
        .update_comment(comment_id, form.text)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(comment))
}

/// delete_comment
///
/// [Authenticated Route] Deletes the viewer's own comment.
#[utoipa::path(
    delete,
    path = "/posts/{id}/comments/{comment_id}",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 303, description = "Login required, or not the author"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> Result<StatusCode, AppError> {
    load_owned_comment(state.repo.as_ref(), post_id, comment_id, &user).await?;
    if state.repo.delete_comment(comment_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// update_profile
///
/// [Authenticated Route] Edits the viewer's own profile. Usernames stay unique.
#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileForm,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 303, description = "Login required"),
        (status = 422, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn update_profile(
    user: AuthUser,
    State(state): State<AppState>,
    Json(form): Json<ProfileForm>,
) -> Result<Json<User>, AppError> {
    form.validate()?;
    let updated = state
        .repo
        .update_user(user.id, form)
        .await
        .map_err(save_error)?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// get_presigned_url
///
/// [Authenticated Route] Issues a short-lived URL for uploading a post image straight to the
/// object store. The returned `resource_key` goes into `PostForm::image`.
#[utoipa::path(
    post,
    path = "/uploads/post-image",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Not an image", body = ErrorBody)
    )
)]
pub async fn get_presigned_url(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PresignedUrlRequest>,
) -> Result<Json<PresignedUrlResponse>, AppError> {
    payload.validate()?;
    let object_key = post_image_key(&payload.filename);

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await
        .map_err(AppError::Storage)?;

    tracing::debug!(user_id = %user.id, key = %object_key, "presigned image upload");
    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Admin Handlers ---

/// create_category
///
/// [Admin Route] Adds a category.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CategoryForm,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 422, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    Json(form): Json<CategoryForm>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    require_admin(&user)?;
    form.validate()?;
    let category = state
        .repo
        .create_category(form)
        .await
        .map_err(save_error)?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// update_category_status
///
/// [Admin Route] Publishes or hides a category, and with it every post it contains.
#[utoipa::path(
    put,
    path = "/admin/categories/{slug}/status",
    params(("slug" = String, Path, description = "Category slug")),
    request_body = bool,
    responses(
        (status = 200, description = "Updated", body = Category),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_category_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(is_published): Json<bool>,
) -> Result<Json<Category>, AppError> {
    require_admin(&user)?;
    let category = state
        .repo
        .set_category_status(&slug, is_published)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(slug = %category.slug, is_published, "category status changed");
    Ok(Json(category))
}

/// create_location
///
/// [Admin Route] Adds a location posts can refer to.
#[utoipa::path(
    post,
    path = "/admin/locations",
    request_body = LocationForm,
    responses(
        (status = 201, description = "Created", body = Location),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 422, description = "Invalid form", body = ErrorBody)
    )
)]
pub async fn create_location(
    user: AuthUser,
    State(state): State<AppState>,
    Json(form): Json<LocationForm>,
) -> Result<(StatusCode, Json<Location>), AppError> {
    require_admin(&user)?;
    form.validate()?;
    let location = state.repo.create_location(form).await?;
    Ok((StatusCode::CREATED, Json(location)))
}
