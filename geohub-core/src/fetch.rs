//! Fetch one page of a query.

use log::debug;

use crate::{ContinuationHandle, HubError, Page, QueryError, SearchQuery, Transport};

/// Largest page size the Hub accepts.
pub const MAX_PAGE_SIZE: usize = 100_000;

/// Issues single page requests for a validated query.
///
/// The fetcher holds no paging state; the caller passes the handle returned
/// by the previous page. Wrap the transport in [`Retrying`](crate::Retrying)
/// to ride out rate limiting.
#[derive(Debug)]
pub struct PageFetcher<T> {
    transport: T,
    query: SearchQuery,
    page_size: usize,
}

impl<T: Transport> PageFetcher<T> {
    /// Validate `query` and `page_size` and build a fetcher.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::PageSizeOutOfRange`] when `page_size` is zero or
    /// above [`MAX_PAGE_SIZE`], or the first constraint `query` violates.
    pub fn new(transport: T, query: SearchQuery, page_size: usize) -> Result<Self, QueryError> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(QueryError::PageSizeOutOfRange {
                page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        query.validate()?;
        Ok(Self {
            transport,
            query,
            page_size,
        })
    }

    /// Fetch the page identified by `handle`, or the first page for `None`.
    ///
    /// # Errors
    ///
    /// Propagates transport and retry errors, turns non-success statuses into
    /// [`HubError::Http`] and undecodable bodies into
    /// [`HubError::MalformedResponse`].
    pub fn fetch(&self, handle: Option<&ContinuationHandle>) -> Result<Page, HubError> {
        let request = self.query.to_request(self.page_size, handle);
        let path = request.path();
        let response = self.transport.execute(&request)?.ensure_success(&path)?;
        let page = Page::from_response(&response, &path)?;
        debug!(
            "fetched {} features from {path} (handle returned: {})",
            page.features.len(),
            page.handle.is_some()
        );
        Ok(page)
    }

    /// Query being paged.
    #[must_use]
    pub const fn query(&self) -> &SearchQuery {
        &self.query
    }

    /// Requested page size.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{PagedHub, ScriptedTransport, page_response, sample_features};
    use crate::{HubResponse, SpaceId};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn query() -> SearchQuery {
        SearchQuery::new(SpaceId::new("countries"))
    }

    #[rstest]
    #[case(0)]
    #[case(MAX_PAGE_SIZE + 1)]
    fn page_size_is_checked_before_any_request(query: SearchQuery, #[case] page_size: usize) {
        let transport = ScriptedTransport::default();
        let err = PageFetcher::new(&transport, query, page_size).expect_err("size rejected");
        assert_eq!(
            err,
            QueryError::PageSizeOutOfRange {
                page_size,
                max: MAX_PAGE_SIZE
            }
        );
        assert!(transport.requests().is_empty());
    }

    #[rstest]
    fn invalid_query_is_rejected(query: SearchQuery) {
        let transport = ScriptedTransport::default();
        let err = PageFetcher::new(&transport, query.with_clip(true), 10).expect_err("clip rejected");
        assert_eq!(err, QueryError::ClipUnsupported);
    }

    #[rstest]
    fn returns_exactly_the_server_page(query: SearchQuery) {
        let features = sample_features(3);
        let transport =
            ScriptedTransport::new([Ok(page_response(&features, Some(json!("next-1"))))]);
        let fetcher = PageFetcher::new(&transport, query, MAX_PAGE_SIZE).expect("valid");

        let page = fetcher.fetch(None).expect("page fetched");

        assert_eq!(page.features, features);
        assert_eq!(page.handle, Some(ContinuationHandle::new("next-1")));
        assert_eq!(
            transport.requests()[0].query_value("limit"),
            Some("100000")
        );
    }

    #[rstest]
    fn sends_the_given_handle(query: SearchQuery) {
        let hub = PagedHub::new(sample_features(5));
        let fetcher = PageFetcher::new(&hub, query, 2).expect("valid");

        let first = fetcher.fetch(None).expect("first page");
        let second = fetcher.fetch(first.handle.as_ref()).expect("second page");

        assert_eq!(second.features, sample_features(5)[2..4].to_vec());
        let sent = hub.requests()[1].query_value("handle").map(str::to_owned);
        assert_eq!(sent.as_deref(), first.handle.as_ref().map(ContinuationHandle::as_str));
    }

    #[rstest]
    fn error_status_becomes_http_error(query: SearchQuery) {
        let transport = ScriptedTransport::new([Ok(HubResponse::new(404, "no such space"))]);
        let fetcher = PageFetcher::new(&transport, query, 10).expect("valid");

        let err = fetcher.fetch(None).expect_err("404 surfaces");

        assert_eq!(
            err,
            HubError::Http {
                path: "/hub/spaces/countries/iterate".to_owned(),
                status: 404,
                body: "no such space".to_owned(),
            }
        );
    }

    #[rstest]
    fn non_json_body_is_malformed(query: SearchQuery) {
        let transport = ScriptedTransport::new([Ok(HubResponse::new(200, "<html/>"))]);
        let fetcher = PageFetcher::new(&transport, query, 10).expect("valid");

        let err = fetcher.fetch(None).expect_err("html is not a page");

        assert!(matches!(err, HubError::MalformedResponse { .. }));
    }
}
