use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::ValidationErrors;

// --- Request Payloads (Input Schemas) ---

pub const TITLE_MAX_CHARS: usize = 256;
pub const NAME_MAX_CHARS: usize = 150;
pub const SLUG_MAX_CHARS: usize = 64;

/// Key prefix of every uploaded post image.
pub const POST_IMAGE_PREFIX: &str = "posts/";

fn default_true() -> bool {
    true
}

fn check_required(errors: &mut ValidationErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
    }
}

fn check_max_chars(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters (it has {}).", max, len),
        );
    }
}

/// PostForm
///
/// Payload for creating (POST /posts) and editing (PUT /posts/{id}) a post.
/// Setting `pub_date` in the future schedules the post: only its author sees it until then.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostForm {
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    pub category_id: i64,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    /// Object key returned by `POST /uploads/post-image`.
    #[serde(default)]
    pub image: Option<String>,
}

impl PostForm {
    /// Field-level checks. References to categories and locations are verified by the
    /// handler against the repository.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "title", &self.title);
        check_max_chars(&mut errors, "title", &self.title, TITLE_MAX_CHARS);
        check_required(&mut errors, "text", &self.text);
        if let Some(image) = &self.image {
            if !image.starts_with(POST_IMAGE_PREFIX) || image.contains("..") {
                errors.add("image", "Upload the image through /uploads/post-image first.");
            }
        }
        errors.into_result()
    }
}

/// CommentForm
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CommentForm {
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "text", &self.text);
        errors.into_result()
    }
}

/// ProfileForm
///
/// Payload for editing the viewer's own profile (PUT /profile).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_')
}

impl ProfileForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "username", &self.username);
        check_max_chars(&mut errors, "username", &self.username, NAME_MAX_CHARS);
        if !self.username.chars().all(is_username_char) {
            errors.add(
                "username",
                "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        }
        if !self.email.contains('@') {
            errors.add("email", "Enter a valid email address.");
        }
        check_max_chars(&mut errors, "first_name", &self.first_name, NAME_MAX_CHARS);
        check_max_chars(&mut errors, "last_name", &self.last_name, NAME_MAX_CHARS);
        errors.into_result()
    }
}

/// CategoryForm
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CategoryForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub slug: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "title", &self.title);
        check_max_chars(&mut errors, "title", &self.title, TITLE_MAX_CHARS);
        check_required(&mut errors, "slug", &self.slug);
        check_max_chars(&mut errors, "slug", &self.slug, SLUG_MAX_CHARS);
        if !self
            .slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            errors.add(
                "slug",
                "Use only Latin letters, digits, hyphens and underscores.",
            );
        }
        errors.into_result()
    }
}

/// LocationForm
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LocationForm {
    pub name: String,
    #[serde(default = "default_true")]
    pub is_published: bool,
}

impl LocationForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "name", &self.name);
        check_max_chars(&mut errors, "name", &self.name, TITLE_MAX_CHARS);
        errors.into_result()
    }
}

/// PresignedUrlRequest
///
/// Input payload for requesting a short-lived upload URL for a post image.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "sunset.jpg")]
    pub filename: String,
    /// The MIME type; only `image/*` is accepted.
    #[schema(example = "image/jpeg")]
    pub file_type: String,
}

impl PresignedUrlRequest {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_required(&mut errors, "filename", &self.filename);
        if !self.file_type.starts_with("image/") {
            errors.add("file_type", "Only image uploads are accepted.");
        }
        errors.into_result()
    }
}
