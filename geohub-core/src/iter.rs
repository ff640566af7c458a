//! Lazy, page-by-page iteration over a query's result set.

use std::collections::HashSet;
use std::iter::FusedIterator;
use std::mem;
use std::vec;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::{ContinuationHandle, Feature, HubError, PageFetcher, SearchQuery, Transport};

/// Start a paginated search.
///
/// Validation happens here, before any request: an invalid query or page
/// size is returned as [`HubError::Validation`]. The first page is fetched on
/// the first call to [`Iterator::next`].
///
/// # Errors
///
/// Returns [`HubError::Validation`] for an invalid query or page size.
pub fn search<T: Transport>(
    transport: T,
    query: SearchQuery,
    page_size: usize,
    limit: Option<usize>,
) -> Result<FeatureIter<T>, HubError> {
    let fetcher = PageFetcher::new(transport, query, page_size)?;
    Ok(FeatureIter::new(fetcher, limit))
}

#[derive(Debug)]
enum Cursor {
    Start,
    Next(ContinuationHandle),
    End,
}

/// Forward-only sequence of the features of a query.
///
/// Pages are fetched one at a time, only once the previous page has been
/// consumed. The iterator stops when a page carries no continuation handle,
/// when `limit` features have been yielded, or after yielding an error.
/// Features of a page cut short by the limit are discarded.
#[derive(Debug)]
pub struct FeatureIter<T> {
    fetcher: PageFetcher<T>,
    cursor: Cursor,
    buffer: vec::IntoIter<Feature>,
    limit: Option<usize>,
    yielded: usize,
    pages_fetched: usize,
    cancel: Option<CancellationToken>,
    done: bool,
}

impl<T: Transport> FeatureIter<T> {
    /// Iterate the pages served through `fetcher`, stopping after `limit`
    /// features if given.
    #[must_use]
    pub fn new(fetcher: PageFetcher<T>, limit: Option<usize>) -> Self {
        Self {
            fetcher,
            cursor: Cursor::Start,
            buffer: Vec::new().into_iter(),
            limit,
            yielded: 0,
            pages_fetched: 0,
            cancel: None,
            done: false,
        }
    }

    /// Stop before the next page request once `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Pages requested successfully so far.
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Features yielded so far.
    #[must_use]
    pub const fn yielded(&self) -> usize {
        self.yielded
    }

    /// Skip features whose id was already yielded.
    #[must_use]
    pub fn dedup_by_id(self) -> DedupById<Self> {
        DedupById::new(self)
    }

    fn finish(&mut self) {
        self.done = true;
        self.cursor = Cursor::End;
        self.buffer = Vec::new().into_iter();
    }

    fn fail(&mut self, err: HubError) -> Option<Result<Feature, HubError>> {
        self.finish();
        Some(Err(err))
    }

    fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.yielded >= limit)
    }
}

impl<T: Transport> Iterator for FeatureIter<T> {
    type Item = Result<Feature, HubError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if self.limit_reached() {
                debug!("feature limit reached after {} features", self.yielded);
                self.finish();
                return None;
            }
            if let Some(feature) = self.buffer.next() {
                self.yielded += 1;
                return Some(Ok(feature));
            }
            let handle = match mem::replace(&mut self.cursor, Cursor::End) {
                Cursor::End => {
                    self.finish();
                    return None;
                }
                Cursor::Start => None,
                Cursor::Next(handle) => Some(handle),
            };
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return self.fail(HubError::Cancelled);
            }
            let page = match self.fetcher.fetch(handle.as_ref()) {
                Ok(page) => page,
                Err(err) => return self.fail(err),
            };
            self.pages_fetched += 1;
            if page.handle.is_some() && page.handle == handle {
                let path = self.fetcher.query().to_request(self.fetcher.page_size(), None).path();
                return self.fail(HubError::MalformedResponse {
                    path,
                    message: "server returned the continuation handle it was sent".to_owned(),
                });
            }
            self.cursor = page.handle.map_or(Cursor::End, Cursor::Next);
            self.buffer = page.features.into_iter();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = self.limit.map(|limit| limit.saturating_sub(self.yielded));
        let buffered = self.buffer.len();
        let lower = remaining.map_or(buffered, |remaining| buffered.min(remaining));
        let upper = match (&self.cursor, remaining) {
            (Cursor::End, Some(remaining)) => Some(buffered.min(remaining)),
            (Cursor::End, None) => Some(buffered),
            (_, remaining) => remaining,
        };
        (lower, upper)
    }
}

impl<T: Transport> FusedIterator for FeatureIter<T> {}

/// Iterator adapter dropping features whose id was already seen.
///
/// Features without an id and errors always pass through.
#[derive(Debug)]
pub struct DedupById<I> {
    inner: I,
    seen: HashSet<String>,
}

impl<I> DedupById<I> {
    /// Wrap `inner`.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            seen: HashSet::new(),
        }
    }

    /// Wrapped iterator.
    pub const fn get_ref(&self) -> &I {
        &self.inner
    }
}

impl<I> Iterator for DedupById<I>
where
    I: Iterator<Item = Result<Feature, HubError>>,
{
    type Item = Result<Feature, HubError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.inner.next()?;
            let duplicate = match &item {
                Ok(feature) => feature.id().is_some_and(|id| !self.seen.insert(id)),
                Err(_) => false,
            };
            if duplicate {
                continue;
            }
            return Some(item);
        }
    }
}

impl<I> FusedIterator for DedupById<I> where I: FusedIterator<Item = Result<Feature, HubError>> {}
