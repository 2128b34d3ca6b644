use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::Repository;
use crate::{
    error::RepoError,
    forms::{CategoryForm, LocationForm, PostForm, ProfileForm},
    models::{Category, Comment, Location, Post, User},
    pagination::PageWindow,
    policy::PostFilter,
};

/// Stored post columns; the joined fields of `Post` are resolved on read.
#[derive(Debug, Clone)]
struct PostRow {
    id: i64,
    title: String,
    text: String,
    pub_date: DateTime<Utc>,
    author_id: Uuid,
    category_id: i64,
    location_id: Option<i64>,
    image: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
}

// Per-table id sequences, never reused after a delete.
#[derive(Debug, Default)]
struct Sequences {
    category: i64,
    location: i64,
    post: i64,
    comment: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<Uuid, User>,
    categories: BTreeMap<i64, Category>,
    locations: BTreeMap<i64, Location>,
    posts: BTreeMap<i64, PostRow>,
    comments: BTreeMap<i64, CommentRow>,
    seq: Sequences,
}

impl Store {
    fn materialize_post(&self, row: &PostRow) -> Option<Post> {
        let author = self.users.get(&row.author_id)?;
        let category = self.categories.get(&row.category_id)?;
        let location_name = row
            .location_id
            .and_then(|id| self.locations.get(&id))
            .filter(|location| location.is_published)
            .map(|location| location.name.clone());
        let comment_count = self
            .comments
            .values()
            .filter(|comment| comment.post_id == row.id)
            .count() as i64;

        Some(Post {
            id: row.id,
            title: row.title.clone(),
            text: row.text.clone(),
            pub_date: row.pub_date,
            author_id: row.author_id,
            author_username: author.username.clone(),
            category_id: category.id,
            category_slug: category.slug.clone(),
            category_title: category.title.clone(),
            category_is_published: category.is_published,
            location_id: row.location_id,
            location_name,
            image: row.image.clone(),
            is_published: row.is_published,
            created_at: row.created_at,
            comment_count,
        })
    }

    fn materialize_comment(&self, row: &CommentRow) -> Option<Comment> {
        let author = self.users.get(&row.author_id)?;
        Some(Comment {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            author_username: author.username.clone(),
            text: row.text.clone(),
            created_at: row.created_at,
        })
    }

    /// Matching posts, newest publish date first (ties: newest id first).
    fn filtered_posts(&self, filter: &PostFilter) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .values()
            .filter_map(|row| self.materialize_post(row))
            .filter(|post| filter.matches(post))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }

    fn check_post_references(&self, author_id: Uuid, form: &PostForm) -> Result<(), RepoError> {
        if !self.users.contains_key(&author_id) {
            return Err(RepoError::MissingReference("author_id".to_string()));
        }
        if !self.categories.contains_key(&form.category_id) {
            return Err(RepoError::MissingReference("category_id".to_string()));
        }
        if let Some(location_id) = form.location_id {
            if !self.locations.contains_key(&location_id) {
                return Err(RepoError::MissingReference("location_id".to_string()));
            }
        }
        Ok(())
    }
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. Used by the test suites and for running
/// the API without a database; ordering and filtering follow `PostgresRepository`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user, standing in for the identity provider that owns user creation.
    pub async fn insert_user(&self, user: User) -> User {
        let mut store = self.store.write().await;
        store.users.insert(user.id, user.clone());
        user
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.store.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn update_user(&self, id: Uuid, form: ProfileForm) -> Result<Option<User>, RepoError> {
        let mut store = self.store.write().await;
        let taken = store
            .users
            .values()
            .any(|user| user.id != id && user.username == form.username);
        if taken {
            return Err(RepoError::Conflict("username".to_string()));
        }
        Ok(store.users.get_mut(&id).map(|user| {
            user.username = form.username;
            user.email = form.email;
            user.first_name = form.first_name;
            user.last_name = form.last_name;
            user.clone()
        }))
    }

    async fn find_category(&self, slug: &str) -> Result<Option<Category>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .categories
            .values()
            .find(|category| category.slug == slug)
            .cloned())
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, RepoError> {
        Ok(self.store.read().await.categories.get(&id).cloned())
    }

    async fn create_category(&self, form: CategoryForm) -> Result<Category, RepoError> {
        let mut store = self.store.write().await;
        if store.categories.values().any(|c| c.slug == form.slug) {
            return Err(RepoError::Conflict("slug".to_string()));
        }
        let category = Category {
            id: next(&mut store.seq.category),
            title: form.title,
            description: form.description,
            slug: form.slug,
            is_published: form.is_published,
            created_at: Utc::now(),
        };
        store.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn set_category_status(
        &self,
        slug: &str,
        is_published: bool,
    ) -> Result<Option<Category>, RepoError> {
        let mut store = self.store.write().await;
        Ok(store
            .categories
            .values_mut()
            .find(|category| category.slug == slug)
            .map(|category| {
                category.is_published = is_published;
                category.clone()
            }))
    }

    async fn get_location(&self, id: i64) -> Result<Option<Location>, RepoError> {
        Ok(self.store.read().await.locations.get(&id).cloned())
    }

    async fn create_location(&self, form: LocationForm) -> Result<Location, RepoError> {
        let mut store = self.store.write().await;
        let location = Location {
            id: next(&mut store.seq.location),
            name: form.name,
            is_published: form.is_published,
            created_at: Utc::now(),
        };
        store.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn find_post(&self, id: i64) -> Result<Option<Post>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .posts
            .get(&id)
            .and_then(|row| store.materialize_post(row)))
    }

    async fn list_posts(
        &self,
        filter: &PostFilter,
        window: PageWindow,
    ) -> Result<Vec<Post>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .filtered_posts(filter)
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit() as usize)
            .collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> Result<u64, RepoError> {
        let store = self.store.read().await;
        Ok(store.filtered_posts(filter).len() as u64)
    }

    async fn create_post(&self, author_id: Uuid, form: PostForm) -> Result<Post, RepoError> {
        let mut store = self.store.write().await;
        store.check_post_references(author_id, &form)?;
        let row = PostRow {
            id: next(&mut store.seq.post),
            title: form.title,
            text: form.text,
            pub_date: form.pub_date,
            author_id,
            category_id: form.category_id,
            location_id: form.location_id,
            image: form.image,
            is_published: form.is_published,
            created_at: Utc::now(),
        };
        let post = store
            .materialize_post(&row)
            .ok_or_else(|| RepoError::MissingReference("category_id".to_string()))?;
        store.posts.insert(row.id, row);
        Ok(post)
    }

    async fn update_post(&self, id: i64, form: PostForm) -> Result<Option<Post>, RepoError> {
        let mut store = self.store.write().await;
        let Some(author_id) = store.posts.get(&id).map(|row| row.author_id) else {
            return Ok(None);
        };
        store.check_post_references(author_id, &form)?;
        if let Some(row) = store.posts.get_mut(&id) {
            row.title = form.title;
            row.text = form.text;
            row.pub_date = form.pub_date;
            row.category_id = form.category_id;
            row.location_id = form.location_id;
            row.image = form.image;
            row.is_published = form.is_published;
        }
        Ok(store
            .posts
            .get(&id)
            .and_then(|row| store.materialize_post(row)))
    }

    async fn delete_post(&self, id: i64) -> Result<bool, RepoError> {
        let mut store = self.store.write().await;
        let removed = store.posts.remove(&id).is_some();
        if removed {
            store.comments.retain(|_, comment| comment.post_id != id);
        }
        Ok(removed)
    }

    async fn list_comments(&self, post_id: i64) -> Result<Vec<Comment>, RepoError> {
        let store = self.store.read().await;
        let mut rows: Vec<&CommentRow> = store
            .comments
            .values()
            .filter(|comment| comment.post_id == post_id)
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .filter_map(|row| store.materialize_comment(row))
            .collect())
    }

    async fn find_comment(
        &self,
        post_id: i64,
        comment_id: i64,
    ) -> Result<Option<Comment>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .comments
            .get(&comment_id)
            .filter(|row| row.post_id == post_id)
            .and_then(|row| store.materialize_comment(row)))
    }

    async fn create_comment(
        &self,
        post_id: i64,
        author_id: Uuid,
        text: String,
    ) -> Result<Comment, RepoError> {
        let mut store = self.store.write().await;
        if !store.posts.contains_key(&post_id) {
            return Err(RepoError::MissingReference("post_id".to_string()));
        }
        if !store.users.contains_key(&author_id) {
            return Err(RepoError::MissingReference("author_id".to_string()));
        }
        let row = CommentRow {
            id: next(&mut store.seq.comment),
            post_id,
            author_id,
            text,
            created_at: Utc::now(),
        };
        let comment = store
            .materialize_comment(&row)
            .ok_or_else(|| RepoError::MissingReference("author_id".to_string()))?;
        store.comments.insert(row.id, row);
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, text: String) -> Result<Option<Comment>, RepoError> {
        let mut store = self.store.write().await;
        match store.comments.get_mut(&id) {
            Some(row) => row.text = text,
            None => return Ok(None),
        }
        Ok(store
            .comments
            .get(&id)
            .and_then(|row| store.materialize_comment(row)))
    }

    async fn delete_comment(&self, id: i64) -> Result<bool, RepoError> {
        Ok(self.store.write().await.comments.remove(&id).is_some())
    }
}
