//! Paginated Scopus search retrieval
//!
//! A search for one seed identity is fetched page by page, following the
//! `next` link while `start_index + items_per_page < total_results`. The
//! walk is an explicit loop, so stack depth does not grow with the number
//! of pages.

use crate::lenient;
use collabnet_common::config::QueryParams;
use collabnet_common::errors::{AppError, Result};
use collabnet_common::scopus::{redact, ScopusTransport};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A link in a search page or entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Link {
    #[serde(rename = "@ref")]
    pub rel: String,
    #[serde(rename = "@href")]
    pub href: String,
}

/// One page of search results, entries still raw
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    #[serde(rename = "opensearch:totalResults", deserialize_with = "lenient::number")]
    pub total_results: u64,

    #[serde(rename = "opensearch:startIndex", deserialize_with = "lenient::number")]
    pub start_index: u64,

    #[serde(rename = "opensearch:itemsPerPage", deserialize_with = "lenient::number")]
    pub items_per_page: u64,

    #[serde(default)]
    pub link: Vec<Link>,

    #[serde(default)]
    entry: Vec<Value>,
}

#[derive(Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "search-results")]
    results: Page,
}

impl Page {
    /// Decode a search response body
    pub fn from_response(body: Value) -> Result<Self> {
        let envelope: SearchEnvelope = serde_json::from_value(body)
            .map_err(|e| AppError::malformed("search page", e.to_string()))?;
        Ok(envelope.results)
    }

    /// Raw entries; empty for an empty result set, where Scopus sends a
    /// single placeholder entry instead of none.
    pub fn entries(&self) -> &[Value] {
        if self.total_results == 0 {
            &[]
        } else {
            &self.entry
        }
    }

    /// href of the first link with the given relation
    pub fn link(&self, rel: &str) -> Option<&str> {
        self.link.iter().find(|l| l.rel == rel).map(|l| l.href.as_str())
    }

    /// Whether results remain past this page; indices that overflow are malformed
    pub fn has_more(&self) -> Result<bool> {
        let end = self.start_index.checked_add(self.items_per_page).ok_or_else(|| {
            AppError::malformed(
                "search page",
                format!(
                    "start index {} plus {} items overflows",
                    self.start_index, self.items_per_page
                ),
            )
        })?;
        Ok(end < self.total_results)
    }

    /// Locator of the next page, if more results exist
    pub fn next_locator(&self) -> Result<Option<String>> {
        if !self.has_more()? {
            return Ok(None);
        }
        if self.items_per_page == 0 {
            return Err(AppError::malformed(
                "search page",
                format!(
                    "page at index {} reports zero items with {} results outstanding",
                    self.start_index, self.total_results
                ),
            ));
        }
        self.link("next").map(|href| Some(href.to_string())).ok_or_else(|| {
            AppError::malformed(
                "search page",
                format!("more results after index {} but no next link", self.start_index),
            )
        })
    }
}

/// What to fetch: the first page of a seed's search, or a continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    Start {
        seed_author_id: String,
        params: QueryParams,
    },
    Continue(String),
}

impl PageRequest {
    pub fn start(seed_author_id: impl Into<String>, params: QueryParams) -> Self {
        PageRequest::Start {
            seed_author_id: seed_author_id.into(),
            params,
        }
    }

    /// Build from loose arguments: either (identity and params) or a
    /// continuation locator, never both and never neither.
    pub fn from_parts(
        seed_author_id: Option<&str>,
        params: Option<&QueryParams>,
        locator: Option<&str>,
    ) -> Result<Self> {
        match (seed_author_id, params, locator) {
            (Some(id), Some(params), None) => Ok(Self::start(id, params.clone())),
            (None, None, Some(locator)) => Ok(PageRequest::Continue(locator.to_string())),
            _ => Err(AppError::Usage {
                message: "either (seed author id and params) or a next-page locator \
                          must be provided"
                    .to_string(),
            }),
        }
    }
}

/// Fetches search pages through a transport
pub struct PageFetcher {
    transport: Arc<dyn ScopusTransport>,
    search_url: String,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn ScopusTransport>, search_url: impl Into<String>) -> Self {
        Self {
            transport,
            search_url: search_url.into(),
        }
    }

    /// URL of the first page of an author search
    pub fn start_url(&self, seed_author_id: &str, params: &QueryParams) -> Result<String> {
        let query = format!("AU-ID({})", seed_author_id);
        let pairs = std::iter::once(("query", query.as_str()))
            .chain(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        reqwest::Url::parse_with_params(&self.search_url, pairs)
            .map(|url| url.to_string())
            .map_err(|e| {
                AppError::config(format!("invalid search URL '{}': {}", self.search_url, e))
            })
    }

    /// Fetch a single page
    pub async fn fetch(&self, request: &PageRequest) -> Result<Page> {
        let url = match request {
            PageRequest::Start {
                seed_author_id,
                params,
            } => self.start_url(seed_author_id, params)?,
            PageRequest::Continue(locator) => locator.clone(),
        };

        debug!(url = %redact(&url), "Fetching search page");
        let body = self.transport.get_json(&url).await?;
        Page::from_response(body)
    }

    /// Fetch every page of a seed's search, in page order
    #[instrument(skip_all, fields(seed = %seed_author_id))]
    pub async fn fetch_all(&self, seed_author_id: &str, params: &QueryParams) -> Result<Vec<Page>> {
        let mut pages: Vec<Page> = Vec::new();
        let mut request = PageRequest::from_parts(Some(seed_author_id), Some(params), None)?;

        loop {
            let page = self.fetch(&request).await?;

            if let Some(previous) = pages.last() {
                if page.start_index <= previous.start_index {
                    return Err(AppError::malformed(
                        "search page",
                        format!(
                            "next page did not advance (start index {} after {})",
                            page.start_index, previous.start_index
                        ),
                    ));
                }
            }

            let next = page.next_locator()?;
            debug!(
                page = pages.len() + 1,
                start = page.start_index,
                total = page.total_results,
                "Search page received"
            );
            pages.push(page);

            match next {
                Some(locator) => request = PageRequest::Continue(locator),
                None => break,
            }
        }

        Ok(pages)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use collabnet_common::scopus::MockTransport;
    use rand::Rng;
    use serde_json::json;
    use tokio_test::assert_err;

    pub const SEARCH_URL: &str = "https://mock.scopus/content/search/scopus";

    /// A search page fixture in Scopus' shape with entries numbered from `start`
    pub fn page_body(total: u64, start: u64, per_page: u64, next: Option<&str>) -> Value {
        let entries: Vec<Value> = (start..start + per_page)
            .map(|i| {
                let id = 85000000000u64 + i;
                let abstract_url = format!("https://mock.scopus/content/abstract/scopus_id/{}", id);
                json!({
                    "dc:identifier": format!("SCOPUS_ID:{}", id),
                    "prism:coverDate": "2020-05-01",
                    "citedby-count": "3",
                    "link": [
                        {"@ref": "self", "@href": &abstract_url},
                        {
                            "@ref": "author-affiliation",
                            "@href": format!("{}?field=author,affiliation", abstract_url)
                        }
                    ]
                })
            })
            .collect();

        let mut links = vec![json!({"@ref": "self", "@href": "https://mock.scopus/self"})];
        if let Some(next) = next {
            links.push(json!({"@ref": "next", "@href": next}));
        }

        json!({
            "search-results": {
                "opensearch:totalResults": total.to_string(),
                "opensearch:startIndex": start.to_string(),
                "opensearch:itemsPerPage": per_page.to_string(),
                "link": links,
                "entry": entries,
            }
        })
    }

    /// Mock serving `total` results in pages of `page_size`
    pub fn paginated_mock(total: u64, page_size: u64) -> MockTransport {
        if total == 0 {
            return MockTransport::new().on_json(
                "content/search/scopus",
                json!({
                    "search-results": {
                        "opensearch:totalResults": "0",
                        "opensearch:startIndex": "0",
                        "opensearch:itemsPerPage": "0",
                        "entry": [{"@_fa": "true", "error": "Result set was empty"}]
                    }
                }),
            );
        }

        let mut mock = MockTransport::new();
        let mut start = 0;
        while start < total {
            let per_page = page_size.min(total - start);
            let next_start = start + per_page;
            let next = (next_start < total)
                .then(|| format!("https://mock.scopus/next?start={}&end", next_start));
            let pattern = if start == 0 {
                "content/search/scopus".to_string()
            } else {
                format!("next?start={}&end", start)
            };
            mock = mock.on_json(pattern, page_body(total, start, per_page, next.as_deref()));
            start = next_start;
        }
        mock
    }

    fn params() -> QueryParams {
        [("count".to_string(), "25".to_string())].into_iter().collect()
    }

    fn all_ids(pages: &[Page]) -> Vec<String> {
        pages
            .iter()
            .flat_map(|p| p.entries())
            .map(|e| e["dc:identifier"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_single_page() {
        let fetcher = PageFetcher::new(Arc::new(paginated_mock(3, 25)), SEARCH_URL);
        let pages = fetcher.fetch_all("7004212771", &params()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].entries().len(), 3);
    }

    #[tokio::test]
    async fn test_pagination_completeness_random() {
        let mut rng = rand::thread_rng();
        for _ in 0..25 {
            let total = rng.gen_range(0..400u64);
            let page_size = rng.gen_range(1..60u64);
            let fetcher = PageFetcher::new(Arc::new(paginated_mock(total, page_size)), SEARCH_URL);

            let pages = fetcher.fetch_all("7004212771", &params()).await.unwrap();
            let ids = all_ids(&pages);

            let expected: Vec<String> = (0..total)
                .map(|i| format!("SCOPUS_ID:{}", 85000000000u64 + i))
                .collect();
            assert_eq!(ids, expected, "total={} page_size={}", total, page_size);
        }
    }

    #[tokio::test]
    async fn test_many_pages_do_not_grow_the_stack() {
        let fetcher = PageFetcher::new(Arc::new(paginated_mock(1500, 1)), SEARCH_URL);
        let pages = fetcher.fetch_all("7004212771", &params()).await.unwrap();
        assert_eq!(pages.len(), 1500);
    }

    #[tokio::test]
    async fn test_start_url_carries_query_and_params() {
        let mock = Arc::new(paginated_mock(1, 1));
        let fetcher = PageFetcher::new(mock.clone(), SEARCH_URL);
        fetcher.fetch_all("7004212771", &params()).await.unwrap();

        let first = &mock.requests()[0];
        assert!(first.starts_with(SEARCH_URL));
        assert!(first.contains("AU-ID%287004212771%29"));
        assert!(first.contains("count=25"));
    }

    #[tokio::test]
    async fn test_missing_next_link_is_malformed() {
        let mock = MockTransport::new().on_json("content/search/scopus", page_body(10, 0, 5, None));
        let fetcher = PageFetcher::new(Arc::new(mock), SEARCH_URL);
        let err = assert_err!(fetcher.fetch_all("1", &params()).await);
        assert!(matches!(err, AppError::MalformedEntry { .. }));
    }

    #[tokio::test]
    async fn test_non_success_is_fetch_error() {
        let mock = MockTransport::new().on_status("content/search/scopus", 401, "Unauthorized");
        let fetcher = PageFetcher::new(Arc::new(mock), SEARCH_URL);
        let err = assert_err!(fetcher.fetch_all("1", &params()).await);
        assert!(matches!(err, AppError::Fetch { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_stalled_pagination_is_rejected() {
        let mock = MockTransport::new()
            .on_json(
                "content/search/scopus",
                page_body(10, 0, 5, Some("https://mock.scopus/again")),
            )
            .on_json("again", page_body(10, 0, 5, Some("https://mock.scopus/again")));
        let fetcher = PageFetcher::new(Arc::new(mock), SEARCH_URL);
        assert!(fetcher.fetch_all("1", &params()).await.is_err());
    }

    #[test]
    fn test_request_modes_are_exclusive() {
        let p = params();
        assert!(PageRequest::from_parts(Some("1"), Some(&p), None).is_ok());
        assert!(PageRequest::from_parts(None, None, Some("https://x")).is_ok());

        let both = PageRequest::from_parts(Some("1"), Some(&p), Some("https://x")).unwrap_err();
        assert!(matches!(both, AppError::Usage { .. }));
        assert!(PageRequest::from_parts(None, None, None).is_err());
        assert!(PageRequest::from_parts(Some("1"), None, None).is_err());
    }

    #[test]
    fn test_empty_result_set_has_no_entries() {
        let page = Page::from_response(json!({
            "search-results": {
                "opensearch:totalResults": "0",
                "opensearch:startIndex": "0",
                "opensearch:itemsPerPage": "0",
                "entry": [{"error": "Result set was empty"}]
            }
        }))
        .unwrap();
        assert!(page.entries().is_empty());
        assert!(!page.has_more().unwrap());
    }

    #[test]
    fn test_overflowing_start_index_is_malformed() {
        let page = Page::from_response(json!({
            "search-results": {
                "opensearch:totalResults": "10",
                "opensearch:startIndex": u64::MAX.to_string(),
                "opensearch:itemsPerPage": "5",
                "entry": []
            }
        }))
        .unwrap();
        let err = page.has_more().unwrap_err();
        assert!(matches!(err, AppError::MalformedEntry { .. }));
        assert!(page.next_locator().is_err());
    }

    #[tokio::test]
    async fn test_overflowing_page_aborts_fetch_all() {
        let mock = MockTransport::new().on_json(
            "content/search/scopus",
            json!({
                "search-results": {
                    "opensearch:totalResults": "10",
                    "opensearch:startIndex": (u64::MAX - 1).to_string(),
                    "opensearch:itemsPerPage": "2",
                    "link": [{"@ref": "next", "@href": "https://mock.scopus/next"}],
                    "entry": []
                }
            }),
        );
        let fetcher = PageFetcher::new(Arc::new(mock), SEARCH_URL);
        let err = assert_err!(fetcher.fetch_all("1", &params()).await);
        assert!(matches!(err, AppError::MalformedEntry { .. }));
    }
}
