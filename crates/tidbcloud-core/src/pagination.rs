//! One page-at-a-time iteration over both pagination idioms
//!
//! The legacy API pages with `page`/`page_size` and reports a `total`; the
//! newer families page with an opaque `page_token` and return the token for
//! the next page. [`Cursor`] hides which one a list call uses: pass `None`
//! for the first page, then whatever [`Page::next`] returned, until it is
//! `None`.
//!
//! ```rust,ignore
//! let mut cursor = None;
//! loop {
//!     let page = serverless.list_clusters(&ctx, cursor.as_ref(), 100).await?;
//!     handle(page.items);
//!     match page.next {
//!         Some(next) => cursor = Some(next),
//!         None => break,
//!     }
//! }
//! ```

use std::future::Future;
use url::Url;

use crate::error::{CoreError, Result};

/// Which idiom a list call uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    /// `page` (1-based) and `page_size`
    Numeric,
    /// `page_token` and `page_size`
    Token,
}

/// Where to resume a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    Page { number: u32, size: u32 },
    Token { token: String, size: u32 },
}

impl Cursor {
    /// Cursor for the first page of a listing
    pub fn first(style: PaginationStyle, size: u32) -> Self {
        match style {
            PaginationStyle::Numeric => Cursor::Page { number: 1, size },
            PaginationStyle::Token => Cursor::Token {
                token: String::new(),
                size,
            },
        }
    }

    pub fn style(&self) -> PaginationStyle {
        match self {
            Cursor::Page { .. } => PaginationStyle::Numeric,
            Cursor::Token { .. } => PaginationStyle::Token,
        }
    }

    pub fn page_size(&self) -> u32 {
        match self {
            Cursor::Page { size, .. } | Cursor::Token { size, .. } => *size,
        }
    }

    /// Append this cursor's query parameters to a list URL
    pub fn apply(&self, url: &mut Url) {
        let mut query = url.query_pairs_mut();
        match self {
            Cursor::Page { number, size } => {
                query.append_pair("page", &number.to_string());
                query.append_pair("page_size", &size.to_string());
            }
            Cursor::Token { token, size } => {
                if !token.is_empty() {
                    query.append_pair("page_token", token);
                }
                query.append_pair("page_size", &size.to_string());
            }
        }
    }
}

/// One page of results plus the cursor for the next one
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` on the final page
    pub next: Option<Cursor>,
    /// Total item count, when the backend reports it
    pub total: Option<u64>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }

    /// Convert the items, keeping the cursor
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
            total: self.total,
        }
    }
}

/// What a backend returned for one page, before cursor computation
#[derive(Debug, Clone)]
pub enum RawPage<T> {
    Numeric { items: Vec<T>, total: Option<u64> },
    Token {
        items: Vec<T>,
        next_token: Option<String>,
        total: Option<u64>,
    },
}

/// Resolve the cursor for this request
///
/// `None` means the first page with `size_hint`. A cursor from a different
/// idiom, or a zero page size, is rejected.
pub fn resolve_cursor(
    style: PaginationStyle,
    cursor: Option<&Cursor>,
    size_hint: u32,
) -> Result<Cursor> {
    let cursor = match cursor {
        Some(cursor) => cursor.clone(),
        None => Cursor::first(style, size_hint),
    };
    if cursor.style() != style {
        return Err(CoreError::InvalidArgument(format!(
            "{:?} cursor passed to a {:?}-paginated listing",
            cursor.style(),
            style
        )));
    }
    if cursor.page_size() == 0 {
        return Err(CoreError::InvalidArgument(
            "page size must be greater than zero".to_string(),
        ));
    }
    if let Cursor::Page { number: 0, .. } = cursor {
        return Err(CoreError::InvalidArgument(
            "page numbers start at 1".to_string(),
        ));
    }
    Ok(cursor)
}

/// Compute the next cursor from the request cursor and the returned page
///
/// Numeric pages: a backend may cap the page size below what was asked
/// for. A page of a different length than requested that stops short of
/// `total` continues with a page size whose offsets line up with the items
/// already seen, so no item is skipped or repeated. Without a `total` a
/// short page ends the listing. A page number past `u32::MAX` ends it too.
pub fn next_cursor<T>(requested: &Cursor, raw: &RawPage<T>) -> Option<Cursor> {
    match (requested, raw) {
        (Cursor::Page { number, size }, RawPage::Numeric { items, total }) => {
            if items.is_empty() {
                return None;
            }
            let returned = items.len() as u64;
            let requested_size = u64::from(*size);
            let seen = u64::from(number.saturating_sub(1)) * requested_size + returned;

            let Some(total) = total else {
                if returned < requested_size {
                    return None;
                }
                return number.checked_add(1).map(|number| Cursor::Page {
                    number,
                    size: *size,
                });
            };
            if seen >= *total {
                return None;
            }

            let size = if returned == requested_size {
                requested_size
            } else {
                gcd(seen, returned)
            };
            Some(Cursor::Page {
                number: u32::try_from(seen / size + 1).ok()?,
                size: u32::try_from(size).ok()?,
            })
        }
        (Cursor::Token { size, .. }, RawPage::Token { next_token, .. }) => next_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .map(|token| Cursor::Token {
                token: token.to_string(),
                size: *size,
            }),
        _ => None,
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Fetch exactly one page
///
/// Resolves the request cursor, calls `fetch` once with it and returns the
/// items with the cursor for the next page. Never loops.
pub async fn fetch_next_page<T, F, Fut>(
    style: PaginationStyle,
    cursor: Option<&Cursor>,
    size_hint: u32,
    fetch: F,
) -> Result<Page<T>>
where
    F: FnOnce(Cursor) -> Fut,
    Fut: Future<Output = Result<RawPage<T>>>,
{
    let requested = resolve_cursor(style, cursor, size_hint)?;
    let raw = fetch(requested.clone()).await?;
    let next = next_cursor(&requested, &raw);

    let (items, total) = match raw {
        RawPage::Numeric { items, total } => (items, total),
        RawPage::Token { items, total, .. } => (items, total),
    };
    Ok(Page { items, next, total })
}
