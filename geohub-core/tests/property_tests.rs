//! Property-based tests for paginated iteration.
//!
//! # Invariants tested
//!
//! - **Flattening:** pages of any sizes flatten into their exact concatenation.
//! - **Limit:** a limit yields exactly `min(limit, total)` features, in order,
//!   without fetching pages it does not need.
//! - **Dedup:** removing repeated ids keeps first occurrences in order.

use std::collections::HashSet;

use geohub_core::test_support::{PagedHub, ScriptedTransport, page_response, sample_features};
use geohub_core::{SearchQuery, SpaceId, search};
use proptest::prelude::*;

fn query() -> SearchQuery {
    SearchQuery::new(SpaceId::new("props"))
}

fn ids<I>(iter: I) -> Vec<String>
where
    I: Iterator<Item = Result<geohub_core::Feature, geohub_core::HubError>>,
{
    iter.map(|item| item.expect("no error expected").id().unwrap_or_default())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: pages are flattened in order, nothing dropped or repeated.
    #[test]
    fn pages_flatten_into_their_concatenation(sizes in prop::collection::vec(1usize..8, 1..12)) {
        let total: usize = sizes.iter().sum();
        let hub = PagedHub::with_page_sizes(&sizes);
        let iter = search(&hub, query(), 8, None).expect("valid search");

        let expected = ids(sample_features(total).into_iter().map(Ok));
        prop_assert_eq!(ids(iter), expected);
        prop_assert_eq!(hub.requests().len(), sizes.len());
    }

    /// Property: a limit yields a prefix and stops fetching once satisfied.
    #[test]
    fn limit_yields_a_prefix(
        total in 0usize..40,
        page_size in 1usize..10,
        limit in 0usize..50,
    ) {
        let hub = PagedHub::new(sample_features(total));
        let iter = search(&hub, query(), page_size, Some(limit)).expect("valid search");

        let yielded = ids(iter);
        let expected_len = limit.min(total);
        prop_assert_eq!(yielded.len(), expected_len);
        prop_assert_eq!(yielded, ids(sample_features(expected_len).into_iter().map(Ok)));

        let pages_needed = expected_len.div_ceil(page_size).max(usize::from(limit > 0));
        prop_assert_eq!(hub.requests().len(), pages_needed);
    }

    /// Property: dedup keeps the first occurrence of every id.
    #[test]
    fn dedup_keeps_first_occurrences(picks in prop::collection::vec(0usize..6, 0..30)) {
        let pool = sample_features(6);
        let features: Vec<_> = picks.iter().filter_map(|&i| pool.get(i).cloned()).collect();
        let transport = ScriptedTransport::new([Ok(page_response(&features, None))]);

        let deduped = ids(search(&transport, query(), 100, None).expect("valid search").dedup_by_id());

        let mut seen = HashSet::new();
        let expected: Vec<String> = picks
            .iter()
            .filter(|&&i| seen.insert(i))
            .map(|i| format!("f{i}"))
            .collect();
        prop_assert_eq!(deduped, expected);
    }
}
