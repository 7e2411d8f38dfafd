//! Keyset pagination over `(created_at, id)`
//!
//! Both stores share this logic. The in-memory store hands a filtered
//! collection to [`paginate`]; the PostgreSQL store resolves the cursor and
//! over-fetches one row in SQL, then finishes with [`Page::from_window`].

use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};
use crate::models::Comment;

/// Items that can be paginated: a total order key plus the cursor naming them.
pub trait Keyed {
    fn created_at(&self) -> DateTime<Utc>;
    fn cursor(&self) -> &str;

    fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at(), self.cursor())
    }
}

impl Keyed for Comment {
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn cursor(&self) -> &str {
        &self.id
    }
}

/// Page size and optional start cursor as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub first: Option<i32>,
    pub after: Option<String>,
}

impl PageRequest {
    pub fn new(first: Option<i32>, after: Option<String>) -> Self {
        Self { first, after }
    }

    pub fn first(first: i32) -> Self {
        Self::new(Some(first), None)
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    /// Validated page size. `first` is mandatory and may not be negative.
    pub fn page_size(&self) -> Result<usize> {
        match self.first {
            None => Err(StoreError::MissingParameter("first")),
            Some(n) if n < 0 => Err(StoreError::InvalidArgument(format!(
                "first must not be negative, got {n}"
            ))),
            Some(n) => Ok(n as usize),
        }
    }

    /// Start cursor; an empty string means "from the beginning".
    pub fn cursor(&self) -> Option<&str> {
        self.after.as_deref().filter(|c| !c.is_empty())
    }

    /// Rows to fetch for one page: one extra to detect a following page.
    pub fn fetch_limit(page_size: usize) -> usize {
        page_size.saturating_add(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor of the last returned item, `None` for an empty page
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            end_cursor: None,
            has_next_page: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Keyed> Page<T> {
    /// Builds a page from an ordered window holding up to `page_size + 1`
    /// items that start right after the cursor.
    pub fn from_window(mut window: Vec<T>, page_size: usize) -> Self {
        let has_next_page = window.len() > page_size;
        window.truncate(page_size);
        let end_cursor = window.last().map(|item| item.cursor().to_string());
        Self {
            items: window,
            end_cursor,
            has_next_page,
        }
    }
}

/// Paginates an unordered collection that has already been filtered.
///
/// A cursor that does not name one of `items` is rejected, except that a
/// page size of zero returns an empty page without looking at the cursor.
pub fn paginate<T: Keyed>(
    mut items: Vec<T>,
    page_size: usize,
    after: Option<&str>,
) -> Result<Page<T>> {
    if page_size == 0 {
        return Ok(Page::empty());
    }

    items.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let start = match after {
        None => 0,
        Some(cursor) => {
            items
                .iter()
                .position(|item| item.cursor() == cursor)
                .ok_or_else(|| StoreError::InvalidCursor(cursor.to_string()))?
                + 1
        }
    };

    let window = items
        .into_iter()
        .skip(start)
        .take(PageRequest::fetch_limit(page_size))
        .collect();

    Ok(Page::from_window(window, page_size))
}
