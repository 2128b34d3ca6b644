mod common;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use blogicum::{
    AppError, AppState, handlers,
    forms::{CategoryForm, CommentForm, PostForm, PresignedUrlRequest, ProfileForm},
    models::Post,
    pagination::PageQuery,
    policy::Viewer,
    repository::Repository,
    storage::MockStorageService,
};
use common::{
    AUTHOR_ID, Fixture, READER_ID, admin, author, fixture, hours_ago, hours_ahead, post_form,
    reader, state_for,
};
use std::sync::Arc;
use tokio::test;

// --- Helpers ---

async fn setup() -> (Fixture, AppState) {
    let fx = fixture().await;
    let state = state_for(fx.repo.clone());
    (fx, state)
}

async fn draft_post(fx: &Fixture) -> Post {
    fx.repo
        .create_post(
            AUTHOR_ID,
            PostForm {
                is_published: false,
                ..post_form("draft", fx.travel.id, hours_ago(1))
            },
        )
        .await
        .unwrap()
}

async fn public_post(fx: &Fixture) -> Post {
    fx.repo
        .create_post(AUTHOR_ID, post_form("public", fx.travel.id, hours_ago(1)))
        .await
        .unwrap()
}

// --- Post Detail ---

#[test]
async fn test_hidden_post_is_not_found_for_others() {
    let (fx, state) = setup().await;
    let post = draft_post(&fx).await;

    for viewer in [Viewer::Anonymous, Viewer::User(READER_ID)] {
        let result = handlers::get_post(viewer, State(state.clone()), Path(post.id)).await;
        assert!(matches!(result, Err(AppError::NotFound)));
    }
}

#[test]
async fn test_hidden_post_is_shown_to_author() {
    let (fx, state) = setup().await;
    let post = draft_post(&fx).await;

    let Json(detail) = handlers::get_post(Viewer::User(AUTHOR_ID), State(state), Path(post.id))
        .await
        .unwrap();
    assert_eq!(detail.post.id, post.id);
    assert!(detail.comments.is_empty());
}

#[test]
async fn test_missing_post_is_not_found() {
    let (_fx, state) = setup().await;
    let result = handlers::get_post(Viewer::Anonymous, State(state), Path(999)).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
async fn test_post_detail_lists_comments_oldest_first() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;
    for text in ["one", "two"] {
        handlers::add_comment(
            reader(),
            State(state.clone()),
            Path(post.id),
            Json(CommentForm {
                text: text.to_string(),
            }),
        )
        .await
        .unwrap();
    }

    let Json(detail) = handlers::get_post(Viewer::Anonymous, State(state), Path(post.id))
        .await
        .unwrap();
    let texts: Vec<&str> = detail.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two"]);
    assert_eq!(detail.post.comment_count, 2);
}

// --- Post Mutation ---

#[test]
async fn test_create_post_returns_created() {
    let (fx, state) = setup().await;
    let form = PostForm {
        location_id: Some(fx.island.id),
        ..post_form("New trip", fx.travel.id, hours_ago(0))
    };

    let (status, Json(post)) = handlers::create_post(author(), State(state), Json(form))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post.author_id, AUTHOR_ID);
    assert_eq!(post.author_username, "leo");
    assert_eq!(post.category_slug, "travel");
    assert_eq!(post.location_name.as_deref(), Some("Island"));
}

#[test]
async fn test_create_post_reports_every_invalid_field() {
    let (_fx, state) = setup().await;
    let form = PostForm {
        title: "  ".to_string(),
        ..post_form("ignored", 404, hours_ago(0))
    };

    let result = handlers::create_post(author(), State(state), Json(form)).await;
    match result {
        Err(AppError::Validation(errors)) => {
            assert!(errors.has("title"));
            assert!(errors.has("category_id"));
            assert!(!errors.has("text"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
async fn test_non_owner_update_redirects_to_post() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;

    let result = handlers::update_post(
        reader(),
        State(state.clone()),
        Path(post.id),
        Json(post_form("hijacked", fx.travel.id, hours_ago(1))),
    )
    .await;

    match result {
        Err(AppError::NotOwner { redirect_to }) => {
            assert_eq!(redirect_to, format!("/posts/{}", post.id))
        }
        other => panic!("expected redirect, got {:?}", other),
    }

    let unchanged = fx.repo.find_post(post.id).await.unwrap().unwrap();
    assert_eq!(unchanged.title, "public");
}

#[test]
async fn test_non_owner_delete_redirects_and_keeps_post() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;

    let result = handlers::delete_post(reader(), State(state), Path(post.id)).await;
    assert!(matches!(result, Err(AppError::NotOwner { .. })));
    assert!(fx.repo.find_post(post.id).await.unwrap().is_some());
}

#[test]
async fn test_non_owner_of_hidden_post_gets_not_found() {
    let (fx, state) = setup().await;
    let post = draft_post(&fx).await;

    let result = handlers::delete_post(reader(), State(state), Path(post.id)).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
async fn test_owner_can_update_and_schedule_post() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;

    let Json(updated) = handlers::update_post(
        author(),
        State(state.clone()),
        Path(post.id),
        Json(post_form("rescheduled", fx.travel.id, hours_ahead(24))),
    )
    .await
    .unwrap();
    assert_eq!(updated.title, "rescheduled");

    // Scheduled again: hidden from everyone else.
    let result = handlers::get_post(Viewer::Anonymous, State(state), Path(post.id)).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
async fn test_owner_delete_removes_post_and_comments() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;
    fx.repo
        .create_comment(post.id, READER_ID, "bye".to_string())
        .await
        .unwrap();

    let status = handlers::delete_post(author(), State(state), Path(post.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(fx.repo.find_post(post.id).await.unwrap().is_none());
    assert!(fx.repo.list_comments(post.id).await.unwrap().is_empty());
}

// --- Comments ---

#[test]
async fn test_comment_on_hidden_post_is_not_found() {
    let (fx, state) = setup().await;
    let post = draft_post(&fx).await;

    let result = handlers::add_comment(
        reader(),
        State(state),
        Path(post.id),
        Json(CommentForm {
            text: "hello".to_string(),
        }),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
async fn test_empty_comment_is_rejected() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;

    let result = handlers::add_comment(
        reader(),
        State(state),
        Path(post.id),
        Json(CommentForm::default()),
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(ref e)) if e.has("text")));
}

#[test]
async fn test_comment_edit_is_author_only() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;
    let comment = fx
        .repo
        .create_comment(post.id, READER_ID, "original".to_string())
        .await
        .unwrap();

    // The post author is not the comment author.
    let result = handlers::update_comment(
        author(),
        State(state.clone()),
        Path((post.id, comment.id)),
        Json(CommentForm {
            text: "edited by someone else".to_string(),
        }),
    )
    .await;
    match result {
        Err(AppError::NotOwner { redirect_to }) => {
            assert_eq!(redirect_to, format!("/posts/{}", post.id))
        }
        other => panic!("expected redirect, got {:?}", other),
    }

    let Json(edited) = handlers::update_comment(
        reader(),
        State(state.clone()),
        Path((post.id, comment.id)),
        Json(CommentForm {
            text: "edited".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(edited.text, "edited");

    let status = handlers::delete_comment(reader(), State(state), Path((post.id, comment.id)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[test]
async fn test_comment_under_wrong_post_is_not_found() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;
    let other = public_post(&fx).await;
    let comment = fx
        .repo
        .create_comment(post.id, READER_ID, "here".to_string())
        .await
        .unwrap();

    let result =
        handlers::delete_comment(reader(), State(state), Path((other.id, comment.id))).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
async fn test_comment_on_hidden_post_is_not_found_for_others() {
    let (fx, state) = setup().await;
    let post = public_post(&fx).await;
    let comment = fx
        .repo
        .create_comment(post.id, AUTHOR_ID, "mine".to_string())
        .await
        .unwrap();

    // The author unpublishes the post afterwards.
    fx.repo
        .update_post(
            post.id,
            PostForm {
                is_published: false,
                ..post_form("public", fx.travel.id, hours_ago(1))
            },
        )
        .await
        .unwrap();

    let existing = handlers::update_comment(
        reader(),
        State(state.clone()),
        Path((post.id, comment.id)),
        Json(CommentForm {
            text: "edited".to_string(),
        }),
    )
    .await;
    assert!(matches!(existing, Err(AppError::NotFound)));

    let existing =
        handlers::delete_comment(reader(), State(state.clone()), Path((post.id, comment.id))).await;
    assert!(matches!(existing, Err(AppError::NotFound)));

    let missing =
        handlers::delete_comment(reader(), State(state.clone()), Path((post.id, 999))).await;
    assert!(matches!(missing, Err(AppError::NotFound)));

    // The post author still manages their own comment.
    let status = handlers::delete_comment(author(), State(state), Path((post.id, comment.id)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// --- Feeds ---

#[test]
async fn test_unpublished_category_feed_is_not_found() {
    let (_fx, state) = setup().await;

    let result = handlers::get_category_feed(
        Viewer::Anonymous,
        State(state.clone()),
        Path("drafts".to_string()),
        Query(PageQuery::default()),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound)));

    let result = handlers::get_category_feed(
        Viewer::Anonymous,
        State(state),
        Path("nowhere".to_string()),
        Query(PageQuery::default()),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
async fn test_profile_feed_hides_email() {
    let (fx, state) = setup().await;
    public_post(&fx).await;

    let Json(feed) = handlers::get_profile_feed(
        Viewer::Anonymous,
        State(state.clone()),
        Path("leo".to_string()),
        Query(PageQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(feed.profile.id, AUTHOR_ID);
    assert_eq!(feed.page.items.len(), 1);

    let json = serde_json::to_value(&feed).unwrap();
    assert!(json["profile"].get("email").is_none());

    let result = handlers::get_profile_feed(
        Viewer::Anonymous,
        State(state),
        Path("ghost".to_string()),
        Query(PageQuery::default()),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
async fn test_home_feed_garbage_page_falls_back_to_first() {
    let (fx, state) = setup().await;
    public_post(&fx).await;

    let Json(page) = handlers::get_home_feed(
        Viewer::Anonymous,
        State(state),
        Query(PageQuery {
            page: Some("banana".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(page.number, 1);
    assert_eq!(page.items.len(), 1);
}

// --- Profile ---

#[test]
async fn test_profile_update_rejects_taken_username() {
    let (_fx, state) = setup().await;
    let form = ProfileForm {
        username: "anna".to_string(),
        email: "leo@blogicum.test".to_string(),
        ..ProfileForm::default()
    };

    let result = handlers::update_profile(author(), State(state), Json(form)).await;
    assert!(matches!(result, Err(AppError::Validation(ref e)) if e.has("username")));
}

#[test]
async fn test_profile_update_succeeds() {
    let (fx, state) = setup().await;
    let form = ProfileForm {
        username: "leo.tolstoy".to_string(),
        email: "leo@blogicum.test".to_string(),
        first_name: "Leo".to_string(),
        last_name: "Tolstoy".to_string(),
    };

    let Json(user) = handlers::update_profile(author(), State(state), Json(form))
        .await
        .unwrap();
    assert_eq!(user.username, "leo.tolstoy");
    assert!(
        fx.repo
            .find_user_by_username("leo.tolstoy")
            .await
            .unwrap()
            .is_some()
    );
}

// --- Admin ---

#[test]
async fn test_admin_handlers_require_admin_role() {
    let (_fx, state) = setup().await;
    let form = CategoryForm {
        title: "Music".to_string(),
        slug: "music".to_string(),
        is_published: true,
        ..CategoryForm::default()
    };

    let result = handlers::create_category(author(), State(state.clone()), Json(form.clone())).await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    let (status, Json(category)) = handlers::create_category(admin(), State(state), Json(form))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(category.slug, "music");
}

#[test]
async fn test_duplicate_slug_is_a_validation_error() {
    let (_fx, state) = setup().await;
    let form = CategoryForm {
        title: "Travel again".to_string(),
        slug: "travel".to_string(),
        ..CategoryForm::default()
    };

    let result = handlers::create_category(admin(), State(state), Json(form)).await;
    assert!(matches!(result, Err(AppError::Validation(ref e)) if e.has("slug")));
}

#[test]
async fn test_category_status_toggle_controls_feed() {
    let (fx, state) = setup().await;
    fx.repo
        .create_post(AUTHOR_ID, post_form("hidden", fx.drafts.id, hours_ago(1)))
        .await
        .unwrap();

    let Json(category) = handlers::update_category_status(
        admin(),
        State(state.clone()),
        Path("drafts".to_string()),
        Json(true),
    )
    .await
    .unwrap();
    assert!(category.is_published);

    let Json(feed) = handlers::get_category_feed(
        Viewer::Anonymous,
        State(state),
        Path("drafts".to_string()),
        Query(PageQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(feed.page.items.len(), 1);
}

// --- Uploads ---

#[test]
async fn test_presigned_url_for_image() {
    let (_fx, state) = setup().await;
    let request = PresignedUrlRequest {
        filename: "Sunset.JPG".to_string(),
        file_type: "image/jpeg".to_string(),
    };

    let Json(response) = handlers::get_presigned_url(author(), State(state), Json(request))
        .await
        .unwrap();
    assert!(response.resource_key.starts_with("posts/"));
    assert!(response.resource_key.ends_with(".jpg"));
    assert!(response.upload_url.contains(&response.resource_key));
}

#[test]
async fn test_presigned_url_storage_failure_is_internal_error() {
    let (fx, _) = setup().await;
    let state = AppState {
        storage: Arc::new(MockStorageService::new_failing()),
        ..state_for(fx.repo.clone())
    };
    let request = PresignedUrlRequest {
        filename: "a.png".to_string(),
        file_type: "image/png".to_string(),
    };

    let result = handlers::get_presigned_url(author(), State(state), Json(request)).await;
    let error = result.unwrap_err();
    assert!(matches!(error, AppError::Storage(_)));
    assert_eq!(
        error.into_response().status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// --- Error Responses ---

#[test]
async fn test_redirect_errors_answer_see_other() {
    let response = AppError::not_owner_of_post(5).into_response();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/posts/5");

    let response = AppError::LoginRequired {
        redirect_to: "/auth/login/?next=%2Fposts%2F5%2Fedit".to_string(),
    }
    .into_response();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[test]
async fn test_error_status_codes() {
    assert_eq!(
        AppError::NotFound.into_response().status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        AppError::Forbidden.into_response().status(),
        StatusCode::FORBIDDEN
    );
    let validation = blogicum::error::ValidationErrors::single("title", "This field is required.");
    assert_eq!(
        AppError::from(validation).into_response().status(),
        StatusCode::UNPROCESSABLE_ENTITY
    );
}
