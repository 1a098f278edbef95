use serde::Deserialize;

use crate::models::{Post, PostPage};

/// PageQuery
///
/// The `?page=` query parameter of every feed. Kept as a raw string so a
/// malformed value falls back to the first page instead of rejecting the request.
#[derive(Deserialize, Debug, Default, utoipa::IntoParams)]
pub struct PageQuery {
    /// 1-based page number, or `last`.
    pub page: Option<String>,
}

impl PageQuery {
    pub fn page_request(&self, per_page: i64) -> PageRequest {
        let page = match self.page.as_deref().map(str::trim) {
            None => PageNumber::First,
            Some("last") => PageNumber::Last,
            Some(raw) => raw
                .parse::<i64>()
                .map(PageNumber::Number)
                .unwrap_or(PageNumber::First),
        };
        PageRequest::new(page, per_page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageNumber {
    First,
    Last,
    Number(i64),
}

/// PageRequest
///
/// A requested page before the total is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: PageNumber,
    pub per_page: i64,
}

/// A page clamped against the actual number of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPage {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub num_pages: i64,
    pub offset: i64,
}

impl PageRequest {
    pub fn new(page: PageNumber, per_page: i64) -> Self {
        Self {
            page,
            per_page: per_page.max(1),
        }
    }

    pub fn first(per_page: i64) -> Self {
        Self::new(PageNumber::First, per_page)
    }

    /// resolve
    ///
    /// An empty feed still has one (empty) page. Numbers outside `1..=num_pages`
    /// land on the last page.
    pub fn resolve(&self, total: i64) -> ResolvedPage {
        let total = total.max(0);
        let remainder = i64::from(total % self.per_page != 0);
        let num_pages = (total / self.per_page + remainder).max(1);
        let page = match self.page {
            PageNumber::First => 1,
            PageNumber::Last => num_pages,
            PageNumber::Number(n) if (1..=num_pages).contains(&n) => n,
            PageNumber::Number(_) => num_pages,
        };
        ResolvedPage {
            page,
            per_page: self.per_page,
            total,
            num_pages,
            offset: (page - 1) * self.per_page,
        }
    }
}

impl ResolvedPage {
    pub fn into_post_page(self, posts: Vec<Post>) -> PostPage {
        PostPage {
            posts,
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            num_pages: self.num_pages,
        }
    }
}
