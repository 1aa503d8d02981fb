//! Page-by-page retrieval with graceful degradation.
//!
//! [`paginate`] keeps asking a [`PageSource`] for pages until one comes back
//! empty, the page cap is reached, or the source reports there is nothing
//! more. A failure on the first page is the caller's problem. A failure on a
//! later page ends the walk early and the records gathered so far are returned
//! with [`Paginated::incomplete`] set.

use super::resilient_http::FetchError;

const LOG_TARGET: &str = "  paginate";

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default cap on the number of pages fetched for a single listing.
pub const DEFAULT_MAX_PAGES: u32 = 10;

/// Position of a page within a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// One-based page index, for resource-oriented listings.
    Index(u32),

    /// Opaque cursor, for graph-shaped listings. `None` asks for the first page.
    After(Option<String>),
}

/// One page of records plus where to go next, if anywhere.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<PageCursor>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }
}

/// Something that can produce one page of a listing.
pub trait PageSource {
    type Item;

    fn fetch_page(&self, cursor: &PageCursor) -> impl Future<Output = Result<Page<Self::Item>, FetchError>>;
}

/// Page size and page cap for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Records accumulated across pages, in upstream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginated<T> {
    pub items: Vec<T>,

    /// Number of pages successfully fetched.
    pub pages: u32,

    /// A page after the first failed, so `items` may be missing records.
    pub incomplete: bool,
}

/// Walk a listing from `first` until it is exhausted or `max_pages` pages have been read.
///
/// `what` names the listing in log output.
pub async fn paginate<S: PageSource>(
    source: &S,
    first: PageCursor,
    max_pages: u32,
    what: &str,
) -> Result<Paginated<S::Item>, FetchError> {
    let max_pages = max_pages.max(1);
    let mut items = Vec::new();
    let mut pages = 0;
    let mut incomplete = false;
    let mut cursor = first;

    loop {
        let page = match source.fetch_page(&cursor).await {
            Ok(page) => page,
            Err(e) if pages == 0 => return Err(e),
            Err(e) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Stopping pagination of {what} after {pages} page(s) and {} record(s): {e}",
                    items.len()
                );
                incomplete = true;
                break;
            }
        };

        pages += 1;

        if page.items.is_empty() {
            break;
        }

        items.extend(page.items);

        let Some(next) = page.next else {
            break;
        };

        if pages >= max_pages {
            log::debug!(target: LOG_TARGET, "Reached page limit ({max_pages}) for {what}, stopping after {} record(s)", items.len());
            break;
        }

        cursor = next;
    }

    Ok(Paginated { items, pages, incomplete })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Serves canned pages by index and records every cursor it is asked for.
    struct ScriptedSource {
        pages: Vec<Result<Vec<u32>, FetchError>>,
        requested: RefCell<Vec<PageCursor>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<Vec<u32>, FetchError>>) -> Self {
            Self {
                pages,
                requested: RefCell::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requested.borrow().len()
        }
    }

    impl PageSource for ScriptedSource {
        type Item = u32;

        async fn fetch_page(&self, cursor: &PageCursor) -> Result<Page<u32>, FetchError> {
            self.requested.borrow_mut().push(cursor.clone());
            let PageCursor::Index(index) = cursor else {
                panic!("unexpected cursor {cursor:?}");
            };

            let slot = (*index - 1) as usize;
            match self.pages.get(slot) {
                Some(Ok(items)) => Ok(Page {
                    items: items.clone(),
                    next: Some(PageCursor::Index(index + 1)),
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Ok(Page::last(Vec::new())),
            }
        }
    }

    fn server_error() -> FetchError {
        FetchError::Transient {
            status: Some(502),
            attempts: 4,
            message: "Bad Gateway".into(),
        }
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let source = ScriptedSource::new(vec![Ok(vec![1, 2]), Ok(vec![3, 4]), Ok(vec![5]), Ok(vec![])]);

        let result = paginate(&source, PageCursor::Index(1), 50, "numbers").await.unwrap();

        assert_eq!(result.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(source.request_count(), 4);
        assert_eq!(result.pages, 4);
        assert!(!result.incomplete);
    }

    #[tokio::test]
    async fn test_stops_at_page_cap() {
        let source = ScriptedSource::new(vec![Ok(vec![1]), Ok(vec![2]), Ok(vec![3]), Ok(vec![4])]);

        let result = paginate(&source, PageCursor::Index(1), 2, "numbers").await.unwrap();

        assert_eq!(result.items, vec![1, 2]);
        assert_eq!(source.request_count(), 2);
    }

    #[tokio::test]
    async fn test_stops_when_source_reports_no_next() {
        struct Single;

        impl PageSource for Single {
            type Item = &'static str;

            async fn fetch_page(&self, _cursor: &PageCursor) -> Result<Page<&'static str>, FetchError> {
                Ok(Page::last(vec!["only"]))
            }
        }

        let result = paginate(&Single, PageCursor::After(None), 10, "strings").await.unwrap();
        assert_eq!(result.items, vec!["only"]);
        assert_eq!(result.pages, 1);
    }

    #[tokio::test]
    async fn test_first_page_failure_propagates() {
        let source = ScriptedSource::new(vec![Err(server_error())]);

        let result = paginate(&source, PageCursor::Index(1), 10, "numbers").await;

        assert_eq!(result.unwrap_err(), server_error());
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_later_page_failure_returns_partial_result() {
        let source = ScriptedSource::new(vec![Ok(vec![1, 2]), Ok(vec![3]), Err(server_error()), Ok(vec![4])]);

        let result = paginate(&source, PageCursor::Index(1), 10, "numbers").await.unwrap();

        assert_eq!(result.items, vec![1, 2, 3]);
        assert_eq!(result.pages, 2);
        assert!(result.incomplete);
        assert_eq!(source.request_count(), 3);
    }

    #[tokio::test]
    async fn test_zero_page_cap_still_reads_first_page() {
        let source = ScriptedSource::new(vec![Ok(vec![1]), Ok(vec![2])]);

        let result = paginate(&source, PageCursor::Index(1), 0, "numbers").await.unwrap();
        assert_eq!(result.items, vec![1]);
    }
}
