use chrono::{DateTime, Utc};

use crate::{
    error::RepoError,
    models::Post,
    pagination::{FEED_PAGE_SIZE, Page, PageWindow},
    policy::{FeedScope, Viewer, feed_filter},
    repository::Repository,
};

/// select_feed
///
/// Resolves one page of a feed for `viewer` at instant `now`. Pages past the end come back
/// empty. Every post carries its comment count.
pub async fn select_feed(
    repo: &dyn Repository,
    scope: FeedScope,
    viewer: &Viewer,
    now: DateTime<Utc>,
    page: u32,
) -> Result<Page<Post>, RepoError> {
    let filter = feed_filter(scope, viewer, now);
    let window = PageWindow::new(page, FEED_PAGE_SIZE);

    let total = repo.count_posts(&filter).await?;
    let items = if window.offset() < total {
        repo.list_posts(&filter, window).await?
    } else {
        Vec::new()
    };

    tracing::debug!(
        ?scope,
        page = window.number,
        total,
        returned = items.len(),
        "feed selected"
    );
    Ok(Page::new(items, window, total))
}
