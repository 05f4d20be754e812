//! Pagination over Sonar list endpoints.
//!
//! Two conventions exist on the server side. The total-count idiom returns
//! `{pageIndex, pageSize, total}` and has more pages while
//! `pageIndex * pageSize < total`. The terminal-flag idiom returns
//! `isLastPage` and has more pages while that flag is false.
//! [`PaginatedBuilder`] hides both behind one lazy stream.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::builder::RequestBuilder;
use crate::deprecation::DeprecationRegistry;
use crate::error::Result;
use crate::query::{QueryParams, QueryValue};

/// Maximum pages fetched by one `all()` stream (safety limit).
const MAX_PAGES: u32 = 10_000;

/// A lazy stream of items across every page.
pub type PageStream<Item> = BoxStream<'static, Result<Item>>;

/// Query parameter names for the page cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// `p` / `ps`, used by the original `/api/...` endpoints.
    V1,
    /// `page` / `pageSize`, used by `/api/v2/...`.
    V2,
}

impl PageStyle {
    pub fn page_field(self) -> &'static str {
        match self {
            PageStyle::V1 => "p",
            PageStyle::V2 => "page",
        }
    }

    pub fn size_field(self) -> &'static str {
        match self {
            PageStyle::V1 => "ps",
            PageStyle::V2 => "pageSize",
        }
    }
}

/// Paging block of a total-count response (`paging` in v1, `page` in v2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub page_index: u32,
    pub page_size: u32,
    #[serde(default)]
    pub total: u64,
}

impl Paging {
    pub fn has_more(&self) -> bool {
        has_more_by_total(self)
    }
}

/// Total-count idiom.
pub fn has_more_by_total(paging: &Paging) -> bool {
    u64::from(paging.page_index) * u64::from(paging.page_size) < paging.total
}

/// Terminal-flag idiom.
pub fn has_more_by_flag(is_last_page: bool) -> bool {
    !is_last_page
}

/// A page of results.
#[derive(Debug, Clone, Serialize)]
#[serde(bound = "T: Serialize")]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Page number (1-indexed).
    pub page: u32,
    /// Whether there are more pages.
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Returns true if this page has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of items on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns an iterator over the items in this page.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Page<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

type ItemsFn<Res, Item> = Arc<dyn Fn(Res) -> Vec<Item> + Send + Sync>;
type HasMoreFn<Res> = Arc<dyn Fn(&Res, u32) -> bool + Send + Sync>;

/// A [`RequestBuilder`] for a paginated endpoint.
///
/// The endpoint supplies two pure functions: one projecting a response onto
/// its items, and one deciding from a response and its page number whether
/// another page exists.
pub struct PaginatedBuilder<Res, Item> {
    inner: RequestBuilder<Res>,
    style: PageStyle,
    get_items: ItemsFn<Res, Item>,
    has_more: HasMoreFn<Res>,
}

impl<Res, Item> Clone for PaginatedBuilder<Res, Item> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            style: self.style,
            get_items: Arc::clone(&self.get_items),
            has_more: Arc::clone(&self.has_more),
        }
    }
}

impl<Res, Item> std::fmt::Debug for PaginatedBuilder<Res, Item> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginatedBuilder")
            .field("inner", &self.inner)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl<Res, Item> PaginatedBuilder<Res, Item>
where
    Res: Send + 'static,
    Item: Send + 'static,
{
    pub fn new<I, H>(inner: RequestBuilder<Res>, style: PageStyle, get_items: I, has_more: H) -> Self
    where
        I: Fn(Res) -> Vec<Item> + Send + Sync + 'static,
        H: Fn(&Res, u32) -> bool + Send + Sync + 'static,
    {
        Self {
            inner,
            style,
            get_items: Arc::new(get_items),
            has_more: Arc::new(has_more),
        }
    }

    pub fn style(&self) -> PageStyle {
        self.style
    }

    /// Select the page fetched by `execute()` (1-indexed).
    #[must_use]
    pub fn page(mut self, page: u32) -> Self {
        self.inner = self.inner.set(self.style.page_field(), page);
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.inner = self.inner.set(self.style.size_field(), page_size);
        self
    }

    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.inner = self.inner.set(key, value);
        self
    }

    #[must_use]
    pub fn set_opt<V: Into<QueryValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.inner = self.inner.set_opt(key, value);
        self
    }

    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&QueryParams) -> Result<()> + Send + Sync + 'static,
    {
        self.inner = self.inner.with_validator(validator);
        self
    }

    #[must_use]
    pub fn with_deprecations(mut self, registry: Arc<DeprecationRegistry>) -> Self {
        self.inner = self.inner.with_deprecations(registry);
        self
    }

    #[must_use]
    pub fn deprecated(mut self, name: &str, message: &str) -> Self {
        self.inner = self.inner.deprecated(name, message);
        self
    }

    pub fn params(&self) -> &QueryParams {
        self.inner.params()
    }

    /// Fetch the currently selected page and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns a validation error or the request's error.
    pub async fn execute(&self) -> Result<Res> {
        self.inner.execute().await
    }

    /// Fetch the currently selected page as a [`Page`].
    ///
    /// # Errors
    ///
    /// Returns a validation error or the request's error.
    pub async fn execute_page(&self) -> Result<Page<Item>> {
        let page = match self.inner.params().get(self.style.page_field()) {
            Some(QueryValue::Int(p)) => u32::try_from(*p).unwrap_or(1),
            _ => 1,
        };
        let response = self.inner.execute().await?;
        let has_more = (self.has_more)(&response, page);
        Ok(Page {
            items: (self.get_items)(response),
            page,
            has_more,
        })
    }

    /// Stream every item across every page, starting from page 1.
    ///
    /// Pages are fetched lazily, one per exhausted batch. Each call returns an
    /// independent stream with its own page counter; a single stream must not
    /// be polled from more than one place. The stream ends after the first
    /// error it yields.
    pub fn all(&self) -> PageStream<Item> {
        let state = AllState {
            builder: self.inner.clone(),
            page_field: self.style.page_field(),
            get_items: Arc::clone(&self.get_items),
            has_more: Arc::clone(&self.has_more),
            page: 1,
            buffer: VecDeque::new(),
            finished: false,
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.buffer.pop_front() {
                    return Some((Ok(item), st));
                }
                if st.finished {
                    return None;
                }
                if st.page > MAX_PAGES {
                    tracing::warn!("Reached pagination limit of {} pages, stopping", MAX_PAGES);
                    return None;
                }

                st.builder.params_mut().set(st.page_field, st.page);
                tracing::debug!(page = st.page, "fetching page");

                match st.builder.execute().await {
                    Ok(response) => {
                        let more = (st.has_more)(&response, st.page);
                        st.buffer.extend((st.get_items)(response));
                        st.finished = !more;
                        st.page += 1;
                    }
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }
        })
        .boxed()
    }

    /// Drain [`PaginatedBuilder::all`] into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered while paging.
    pub async fn collect_all(&self) -> Result<Vec<Item>> {
        self.all().try_collect().await
    }
}

struct AllState<Res, Item> {
    builder: RequestBuilder<Res>,
    page_field: &'static str,
    get_items: ItemsFn<Res, Item>,
    has_more: HasMoreFn<Res>,
    page: u32,
    buffer: VecDeque<Item>,
    finished: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SonarError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone)]
    struct FakeResponse {
        paging: Paging,
        items: Vec<u64>,
    }

    /// Serves `total` sequential numbers in pages of `page_size`.
    fn total_count_builder(total: u64, page_size: u32, calls: Arc<AtomicU32>) -> PaginatedBuilder<FakeResponse, u64> {
        let inner = RequestBuilder::new(move |params: QueryParams| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let page = match params.get("p") {
                    Some(QueryValue::Int(p)) => *p as u64,
                    _ => 1,
                };
                let start = (page - 1) * u64::from(page_size);
                let end = (start + u64::from(page_size)).min(total);
                Ok(FakeResponse {
                    paging: Paging {
                        page_index: page as u32,
                        page_size,
                        total,
                    },
                    items: (start..end).collect(),
                })
            }
        });
        PaginatedBuilder::new(
            inner,
            PageStyle::V1,
            |r: FakeResponse| r.items,
            |r: &FakeResponse, _| r.paging.has_more(),
        )
    }

    #[test]
    fn test_page_style_fields() {
        assert_eq!(PageStyle::V1.page_field(), "p");
        assert_eq!(PageStyle::V1.size_field(), "ps");
        assert_eq!(PageStyle::V2.page_field(), "page");
        assert_eq!(PageStyle::V2.size_field(), "pageSize");
    }

    #[test]
    fn test_has_more_predicates() {
        let paging = Paging {
            page_index: 1,
            page_size: 100,
            total: 250,
        };
        assert!(has_more_by_total(&paging));

        let paging = Paging {
            page_index: 3,
            page_size: 100,
            total: 250,
        };
        assert!(!has_more_by_total(&paging));

        let paging = Paging {
            page_index: 2,
            page_size: 100,
            total: 200,
        };
        assert!(!paging.has_more());

        assert!(has_more_by_flag(false));
        assert!(!has_more_by_flag(true));
    }

    #[test]
    fn test_paging_deserialize() {
        let paging: Paging =
            serde_json::from_str(r#"{"pageIndex":2,"pageSize":50,"total":120}"#).unwrap();
        assert_eq!(paging.page_index, 2);
        assert_eq!(paging.page_size, 50);
        assert_eq!(paging.total, 120);
    }

    #[tokio::test]
    async fn test_all_yields_every_item_in_order() {
        let calls = Arc::new(AtomicU32::new(0));
        let builder = total_count_builder(25, 10, calls.clone());

        let items = builder.collect_all().await.unwrap();
        assert_eq!(items, (0..25).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_all_is_lazy() {
        let calls = Arc::new(AtomicU32::new(0));
        let builder = total_count_builder(25, 10, calls.clone());

        let mut stream = builder.all();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first: Vec<u64> = (&mut stream).take(10).try_collect().await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        stream.next().await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_all_streams_are_independent() {
        let calls = Arc::new(AtomicU32::new(0));
        let builder = total_count_builder(15, 10, calls.clone());

        let (a, b) = tokio::join!(builder.collect_all(), builder.collect_all());
        assert_eq!(a.unwrap(), (0..15).collect::<Vec<_>>());
        assert_eq!(b.unwrap(), (0..15).collect::<Vec<_>>());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_terminal_flag_stops_on_last_page() {
        // Three pages of two items; the second claims to be last.
        let inner = RequestBuilder::new(|params: QueryParams| async move {
            let page = match params.get("p") {
                Some(QueryValue::Int(p)) => *p,
                _ => 1,
            };
            Ok::<_, SonarError>((page == 2, vec![page * 10, page * 10 + 1]))
        });
        let builder = PaginatedBuilder::new(
            inner,
            PageStyle::V1,
            |(_, items): (bool, Vec<i64>)| items,
            |(is_last, _): &(bool, Vec<i64>), _| has_more_by_flag(*is_last),
        );

        let items = builder.collect_all().await.unwrap();
        assert_eq!(items, vec![10, 11, 20, 21]);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let inner = RequestBuilder::new(|params: QueryParams| async move {
            match params.get("page") {
                Some(QueryValue::Int(1)) => Ok(vec![1, 2]),
                _ => Err(SonarError::network("connection reset")),
            }
        });
        let builder = PaginatedBuilder::new(inner, PageStyle::V2, |r: Vec<i32>| r, |_: &Vec<i32>, _| true);

        let mut stream = builder.all();
        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), 2);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_execute_page() {
        let calls = Arc::new(AtomicU32::new(0));
        let page = total_count_builder(25, 10, calls)
            .page(3)
            .page_size(10)
            .execute_page()
            .await
            .unwrap();

        assert_eq!(page.page, 3);
        assert_eq!(page.len(), 5);
        assert!(!page.has_more);
    }
}
