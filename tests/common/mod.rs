#![allow(dead_code)]

use blogicum::{
    AppConfig, AppState, InMemoryRepository, MockStorageService,
    auth::AuthUser,
    forms::{CategoryForm, LocationForm, PostForm},
    models::{Category, Location, User},
    repository::Repository,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

// --- Test Identities ---

pub const AUTHOR_ID: Uuid = Uuid::from_u128(1);
pub const READER_ID: Uuid = Uuid::from_u128(2);
pub const ADMIN_ID: Uuid = Uuid::from_u128(3);

pub fn user(id: Uuid, username: &str, role: &str) -> User {
    User {
        id,
        username: username.to_string(),
        email: format!("{}@blogicum.test", username),
        role: role.to_string(),
        ..User::default()
    }
}

pub fn author() -> AuthUser {
    AuthUser {
        id: AUTHOR_ID,
        username: "leo".to_string(),
        role: "author".to_string(),
    }
}

pub fn reader() -> AuthUser {
    AuthUser {
        id: READER_ID,
        username: "anna".to_string(),
        role: "author".to_string(),
    }
}

pub fn admin() -> AuthUser {
    AuthUser {
        id: ADMIN_ID,
        username: "root".to_string(),
        role: "admin".to_string(),
    }
}

// --- Seeded Repository ---

/// Repository with three users, a published and an unpublished category, and a location.
pub struct Fixture {
    pub repo: Arc<InMemoryRepository>,
    pub travel: Category,
    pub drafts: Category,
    pub island: Location,
}

pub async fn fixture() -> Fixture {
    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_user(user(AUTHOR_ID, "leo", "author")).await;
    repo.insert_user(user(READER_ID, "anna", "author")).await;
    repo.insert_user(user(ADMIN_ID, "root", "admin")).await;

    let travel = repo
        .create_category(CategoryForm {
            title: "Travel".to_string(),
            description: "Trips and places".to_string(),
            slug: "travel".to_string(),
            is_published: true,
        })
        .await
        .unwrap();
    let drafts = repo
        .create_category(CategoryForm {
            title: "Drafts".to_string(),
            description: String::new(),
            slug: "drafts".to_string(),
            is_published: false,
        })
        .await
        .unwrap();
    let island = repo
        .create_location(LocationForm {
            name: "Island".to_string(),
            is_published: true,
        })
        .await
        .unwrap();

    Fixture {
        repo,
        travel,
        drafts,
        island,
    }
}

pub fn post_form(title: &str, category_id: i64, pub_date: DateTime<Utc>) -> PostForm {
    PostForm {
        title: title.to_string(),
        text: format!("Text of {}", title),
        pub_date,
        category_id,
        location_id: None,
        is_published: true,
        image: None,
    }
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

pub fn hours_ahead(hours: i64) -> DateTime<Utc> {
    Utc::now() + Duration::hours(hours)
}

/// AppState over the fixture repository with mock storage.
pub fn state_for(repo: Arc<InMemoryRepository>) -> AppState {
    AppState {
        repo,
        storage: Arc::new(MockStorageService::new()),
        config: AppConfig::default(),
    }
}
