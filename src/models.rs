use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::pagination::Page;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The profile record mirrored from the identity provider into the `users` table.
/// `role` is either `"author"` or `"admin"`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    #[ts(type = "string")]
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// UserProfile
///
/// The public face of a user shown on profile pages. The email is never exposed here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[ts(type = "string")]
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            date_joined: user.date_joined,
        }
    }
}

/// Category
///
/// A thematic grouping of posts, addressed publicly by `slug`.
/// Unpublishing a category hides every post in it from public listings.
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
/// A post row joined with the author, category and location it references.
/// `comment_count` is derived at query time and never stored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,

    // Owner reference, plus the username for display.
    pub author_id: Uuid,
    pub author_username: String,

    pub category_id: i64,
    pub category_slug: String,
    pub category_title: String,
    // Part of the public-visibility rule.
    pub category_is_published: bool,

    pub location_id: Option<i64>,
    // Only populated when the referenced location is itself published.
    pub location_name: Option<String>,

    // Object storage key of the attached image, if any.
    pub image: Option<String>,
    pub is_published: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub comment_count: i64,
}

/// Comment
///
/// A comment joined with its author's username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: Uuid,
    pub author_username: String,
    pub text: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Response Envelopes ---

/// PostDetail
///
/// Output of `GET /posts/{id}`: the post and its comments, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PostDetail {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// CategoryFeed
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CategoryFeed {
    pub category: Category,
    pub page: Page<Post>,
}

/// ProfileFeed
///
/// Output of `GET /profile/{username}`. When the viewer is the profile owner the page
/// also contains their unpublished and scheduled posts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProfileFeed {
    pub profile: UserProfile,
    pub page: Page<Post>,
}

/// PresignedUrlResponse
///
/// Output schema containing the temporary URL for a direct client-to-storage image upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// The time-limited URL for the PUT request.
    pub upload_url: String,
    /// The object key to send back as `image` in a `PostForm`.
    pub resource_key: String,
}
