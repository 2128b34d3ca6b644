use crate::{
    error::RepoError,
    forms::{CategoryForm, LocationForm, PostForm, ProfileForm},
    models::{Category, Comment, Location, Post, User},
    pagination::PageWindow,
    policy::PostFilter,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;

pub use memory::InMemoryRepository;

/// Repository Trait
///
/// The persistence contract the handlers and the feed service depend on. Visibility and
/// ownership decisions are not made here: callers pass a `PostFilter` built by the policy
/// module, or check ownership themselves before calling a mutation.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across
/// Axum's request tasks.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    // Fails with `RepoError::Conflict("username")` when the username is taken.
    async fn update_user(&self, id: Uuid, form: ProfileForm) -> Result<Option<User>, RepoError>;

    // --- Categories & Locations ---
    async fn find_category(&self, slug: &str) -> Result<Option<Category>, RepoError>;
    async fn get_category(&self, id: i64) -> Result<Option<Category>, RepoError>;
    // Fails with `RepoError::Conflict("slug")` when the slug is taken.
    async fn create_category(&self, form: CategoryForm) -> Result<Category, RepoError>;
    async fn set_category_status(
        &self,
        slug: &str,
        is_published: bool,
    ) -> Result<Option<Category>, RepoError>;
    async fn get_location(&self, id: i64) -> Result<Option<Location>, RepoError>;
    async fn create_location(&self, form: LocationForm) -> Result<Location, RepoError>;

    // --- Posts ---
    async fn find_post(&self, id: i64) -> Result<Option<Post>, RepoError>;
    // Newest publish date first, ties broken by newest id.
    async fn list_posts(&self, filter: &PostFilter, window: PageWindow)
    -> Result<Vec<Post>, RepoError>;
    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError>;
    async fn create_post(&self, author_id: Uuid, form: PostForm) -> Result<Post, RepoError>;
    async fn update_post(&self, id: i64, form: PostForm) -> Result<Option<Post>, RepoError>;
    // Removes the post together with its comments.
    async fn delete_post(&self, id: i64) -> Result<bool, RepoError>;

    // --- Comments ---
    // Oldest first.
    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, RepoError>;
    async fn find_comment(&self, post_id: i64, comment_id: i64)
    -> Result<Option<Comment>, RepoError>;
    async fn create_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError>;
    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, RepoError>;
    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL (schema in `migrations/`).
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn get_comment(&self, id: i64) -> Result<Option<Comment>, RepoError> {
        let sql = format!("{} WHERE cm.id = $1", COMMENT_SELECT);
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, role, date_joined";
const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";
const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";

// The location name is joined only while the location itself is published.
const POST_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.text, p.pub_date,
        p.author_id, u.username AS author_username,
        p.category_id, c.slug AS category_slug, c.title AS category_title,
        c.is_published AS category_is_published,
        p.location_id, l.name AS location_name,
        p.image, p.is_published, p.created_at,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
    JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id AND l.is_published = true
"#;

const COMMENT_SELECT: &str = r#"
    SELECT cm.id, cm.post_id, cm.author_id, u.username AS author_username, cm.text, cm.created_at
    FROM comments cm
    JOIN users u ON u.id = cm.author_id
"#;

/// push_post_filter
///
/// Appends the WHERE clause for a `PostFilter`. Expects `p` (posts) and `c` (categories)
/// to be in scope. The visibility clause mirrors `policy::is_publicly_visible`.
fn push_post_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &PostFilter) {
    builder.push(" WHERE TRUE");
    if let Some(author_id) = filter.author_id {
        builder.push(" AND p.author_id = ").push_bind(author_id);
    }
    if let Some(category_id) = filter.category_id {
        builder.push(" AND p.category_id = ").push_bind(category_id);
    }
    if let Some(now) = filter.visible_at {
        builder
            .push(" AND p.is_published = true AND c.is_published = true AND p.pub_date <= ")
            .push_bind(now);
    }
}

/// Turns a unique violation into `RepoError::Conflict(field)`.
fn conflict_on(field: &str) -> impl FnOnce(sqlx::Error) -> RepoError + '_ {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepoError::Conflict(field.to_string())
        }
        _ => RepoError::Database(e),
    }
}

/// Turns a foreign key violation on a post or comment write into
/// `RepoError::MissingReference`, named after the offending column.
fn missing_reference(e: sqlx::Error) -> RepoError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            let field = match db.constraint() {
                Some(c) if c.contains("post_id") => "post_id",
                Some(c) if c.contains("location") => "location_id",
                Some(c) if c.contains("author") => "author_id",
                _ => "category_id",
            };
            RepoError::MissingReference(field.to_string())
        }
        _ => RepoError::Database(e),
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_user(&self, id: Uuid, form: ProfileForm) -> Result<Option<User>, RepoError> {
        let sql = format!(
            "UPDATE users SET username = $2, email = $3, first_name = $4, last_name = $5 \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(form.username)
            .bind(form.email)
            .bind(form.first_name)
            .bind(form.last_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(conflict_on("username"))
    }

    async fn find_category(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let sql = format!("SELECT {} FROM categories WHERE slug = $1", CATEGORY_COLUMNS);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, RepoError> {
        let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_category(&self, form: CategoryForm) -> Result<Category, RepoError> {
        let sql = format!(
            "INSERT INTO categories (title, description, slug, is_published) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(form.title)
            .bind(form.description)
            .bind(form.slug)
            .bind(form.is_published)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_on("slug"))
    }

    async fn set_category_status(
        &self,
        slug: &str,
        is_published: bool,
    ) -> Result<Option<Category>, RepoError> {
        let sql = format!(
            "UPDATE categories SET is_published = $2 WHERE slug = $1 RETURNING {}",
            CATEGORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, Category>(&sql)
            .bind(slug)
            .bind(is_published)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, RepoError> {
        let sql = format!("SELECT {} FROM locations WHERE id = $1", LOCATION_COLUMNS);
        Ok(sqlx::query_as::<_, Location>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_location(&self, form: LocationForm) -> Result<Location, RepoError> {
        let sql = format!(
            "INSERT INTO locations (name, is_published) VALUES ($1, $2) RETURNING {}",
            LOCATION_COLUMNS
        );
        Ok(sqlx::query_as::<_, Location>(&sql)
            .bind(form.name)
            .bind(form.is_published)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let sql = format!("{} WHERE p.id = $1", POST_SELECT);
        Ok(sqlx::query_as::<_, Post>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// list_posts
    ///
    /// Uses QueryBuilder so every filter value is bound, never interpolated.
    async fn list_posts(
        &self,
        filter: &PostFilter,
        window: PageWindow,
    ) -> Result<Vec<Post>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(POST_SELECT);
        push_post_filter(&mut builder, filter);
        builder
            .push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ")
            .push_bind(window.limit() as i64)
            .push(" OFFSET ")
            .push_bind(window.offset() as i64);

        Ok(builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) FROM posts p JOIN categories c ON c.id = p.category_id",
        );
        push_post_filter(&mut builder, filter);

        let count: i64 = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn create_post(&self, author_id: Uuid, form: PostForm) -> Result<Post, RepoError> {
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO posts (title, text, pub_date, author_id, category_id, location_id, image, is_published)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id"#,
        )
        .bind(form.title)
        .bind(form.text)
        .bind(form.pub_date)
        .bind(author_id)
        .bind(form.category_id)
        .bind(form.location_id)
        .bind(form.image)
        .bind(form.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(missing_reference)?;

        self.find_post(id)
            .await?
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_post(&self, id: i64, form: PostForm) -> Result<Option<Post>, RepoError> {
        let updated: Option<i64> = sqlx::query_scalar(
            r#"UPDATE posts
               SET title = $2, text = $3, pub_date = $4, category_id = $5,
                   location_id = $6, image = $7, is_published = $8
               WHERE id = $1
               RETURNING id"#,
        )
        .bind(id)
        .bind(form.title)
        .bind(form.text)
        .bind(form.pub_date)
        .bind(form.category_id)
        .bind(form.location_id)
        .bind(form.image)
        .bind(form.is_published)
        .fetch_optional(&self.pool)
        .await
        .map_err(missing_reference)?;

        match updated {
            Some(id) => self.find_post(id).await,
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, RepoError> {
        let sql = format!(
            "{} WHERE cm.post_id = $1 ORDER BY cm.created_at ASC, cm.id ASC",
            COMMENT_SELECT
        );
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_comment(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, RepoError> {
        let sql = format!("{} WHERE cm.id = $1 AND cm.post_id = $2", COMMENT_SELECT);
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(comment_id)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO comments (post_id, author_id, text) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
        .map_err(missing_reference)?;

        self.get_comment(id)
            .await?
            .ok_or(RepoError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, RepoError> {
        let updated: Option<i64> =
            sqlx::query_scalar("UPDATE comments SET text = $2 WHERE id = $1 RETURNING id")
                .bind(id)
                .bind(text)
                .fetch_optional(&self.pool)
                .await?;

        match updated {
            Some(id) => self.get_comment(id).await,
            None => Ok(None),
        }
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
