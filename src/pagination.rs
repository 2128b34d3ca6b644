use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

/// Number of posts on every feed page.
pub const FEED_PAGE_SIZE: u32 = 10;

/// PageQuery
///
/// The `?page=` query parameter accepted by the feed endpoints. It is kept as a raw string
/// so that garbage input falls back to the first page instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number. Missing or invalid values select page 1.
    pub page: Option<String>,
}

impl PageQuery {
    pub fn number(&self) -> u32 {
        parse_page(self.page.as_deref())
    }
}

/// Parses a requested page number, clamping anything below 1 (or unparsable) to 1.
pub fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .map(|n| n.clamp(1, u32::MAX as i64) as u32)
        .unwrap_or(1)
}

/// PageWindow
///
/// The slice of an ordered result set covered by one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub number: u32,
    pub size: u32,
}

impl PageWindow {
    pub fn new(number: u32, size: u32) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number as u64 - 1) * self.size as u64
    }

    pub fn limit(&self) -> u64 {
        self.size as u64
    }
}

/// Page
///
/// One page of a feed plus the navigation metadata a client needs to render pagers.
/// A window past the last page produces an empty `items` list rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub page_size: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow, total_items: u64) -> Self {
        let total_pages = total_items.div_ceil(window.size as u64).max(1);
        let total_pages = u32::try_from(total_pages).unwrap_or(u32::MAX);
        Self {
            items,
            number: window.number,
            page_size: window.size,
            total_items,
            total_pages,
            has_next: window.number < total_pages,
            has_previous: window.number > 1,
        }
    }
}
