//! Focused unit tests covering search configuration and output.

use super::helpers::{FakeClientBuilder, UnreachableBuilder};
use super::*;
use crate::search::{SearchArgs, SearchConfig, config_from_layers_for_test, run_search_with};
use geohub_core::test_support::{PagedHub, sample_features};
use geohub_core::{BoundingBox, Feature, SpaceId, TagFilter};
use rstest::rstest;
use std::sync::Arc;

fn search_args(space: &str) -> SearchArgs {
    SearchArgs {
        space: Some(space.to_owned()),
        ..SearchArgs::default()
    }
}

fn output_ids(output: &[u8]) -> Vec<String> {
    std::str::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| {
            let feature: Feature = serde_json::from_str(line).expect("one feature per line");
            feature.id().unwrap_or_default()
        })
        .collect()
}

#[rstest]
fn converting_search_without_space_errors() {
    let err = SearchConfig::try_from(SearchArgs::default()).expect_err("space is required");
    match err {
        CliError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_SPACE);
            assert_eq!(env, ENV_SEARCH_SPACE);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
#[case::empty_space(SearchArgs { space: Some(String::new()), ..SearchArgs::default() }, ARG_SPACE)]
#[case::short_bbox(SearchArgs { bbox: Some("1,2,3".to_owned()), ..search_args("roads") }, ARG_BBOX)]
#[case::text_bbox(SearchArgs { bbox: Some("a,b,c,d".to_owned()), ..search_args("roads") }, ARG_BBOX)]
#[case::inverted_bbox(SearchArgs { bbox: Some("0,10,5,-10".to_owned()), ..search_args("roads") }, ARG_BBOX)]
#[case::polar_bbox(SearchArgs { bbox: Some("0,-95,5,10".to_owned()), ..search_args("roads") }, ARG_BBOX)]
#[case::blank_tag(SearchArgs { tags: Some("red,,blue".to_owned()), ..search_args("roads") }, ARG_TAGS)]
fn invalid_search_values_name_the_option(#[case] args: SearchArgs, #[case] expected: &str) {
    let err = SearchConfig::try_from(args).expect_err("invalid value");
    match err {
        CliError::InvalidArgument { field, .. } => assert_eq!(field, expected),
        other => panic!("expected InvalidArgument, found {other:?}"),
    }
}

#[rstest]
fn search_config_builds_the_query() {
    let args = SearchArgs {
        tags: Some("red, blue".to_owned()),
        all_tags: Some(true),
        bbox: Some("-10,-5,10,5".to_owned()),
        page_size: Some(50),
        ..search_args("roads")
    };

    let config = SearchConfig::try_from(args).expect("config should build");

    assert_eq!(config.space, SpaceId::new("roads"));
    assert_eq!(config.tags, Some(TagFilter::all(["red", "blue"])));
    assert_eq!(
        config.bbox,
        Some(BoundingBox::new(-10.0, -5.0, 10.0, 5.0))
    );
    assert_eq!(config.page_size, 50);
    assert!(!config.dedup);
    let request = config.query().to_request(config.page_size, None);
    assert_eq!(request.query_value("tags"), Some("red+blue"));
    assert_eq!(request.query_value("west"), Some("-10"));
}

#[rstest]
fn antimeridian_bbox_keeps_edge_order() {
    let args = SearchArgs {
        bbox: Some("170,-10,-170,10".to_owned()),
        ..search_args("pacific")
    };

    let config = SearchConfig::try_from(args).expect("config should build");

    assert_eq!(config.bbox, Some(BoundingBox::new(170.0, -10.0, -170.0, 10.0)));
    let request = config.query().to_request(config.page_size, None);
    assert_eq!(request.query_value("west"), Some("170"));
    assert_eq!(request.query_value("east"), Some("-170"));
}

#[rstest]
fn merge_layers_honours_precedence() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_file(
        json!({ "space": "from-file", "page_size": 25, "base_url": "http://file.test" }),
        None,
    );
    composer.push_environment(json!({ "space": "from-env", "limit": 9 }));
    composer.push_cli(json!({ "space": "from-cli" }));

    let config =
        config_from_layers_for_test(composer.layers()).expect("merged config should build");
    assert_eq!(config.space, SpaceId::new("from-cli"));
    assert_eq!(config.page_size, 25);
    assert_eq!(config.limit, Some(9));
    assert_eq!(config.client.base_url, "http://file.test");
}

#[rstest]
fn merge_layers_maps_configuration_errors() {
    use ortho_config::MergeComposer;
    use serde_json::json;

    let mut composer = MergeComposer::new();
    composer.push_cli(json!({ "limit": "plenty" }));

    let err = config_from_layers_for_test(composer.layers())
        .expect_err("invalid config layer should map to CliError::Configuration");
    match err {
        CliError::Configuration(_) => {}
        other => panic!("expected CliError::Configuration, found {other:?}"),
    }
}

#[rstest]
fn search_writes_one_feature_per_line() {
    let hub = Arc::new(PagedHub::new(sample_features(5)));
    let builder = FakeClientBuilder::new(hub.clone());
    let args = SearchArgs {
        page_size: Some(2),
        base_url: Some("http://hub.test".to_owned()),
        ..search_args("roads")
    };
    let mut output = Vec::new();

    run_search_with(args, &builder, &mut output).expect("search succeeds");

    assert_eq!(output_ids(&output), ["f0", "f1", "f2", "f3", "f4"]);
    assert_eq!(hub.requests().len(), 3);
    let configs = builder.configs();
    assert_eq!(configs.len(), 1);
    assert_eq!(
        configs.first().map(|config| config.base_url.as_str()),
        Some("http://hub.test")
    );
}

#[rstest]
fn search_limit_stops_paging() {
    let hub = Arc::new(PagedHub::new(sample_features(10)));
    let builder = FakeClientBuilder::new(hub.clone());
    let args = SearchArgs {
        page_size: Some(3),
        limit: Some(4),
        ..search_args("roads")
    };
    let mut output = Vec::new();

    run_search_with(args, &builder, &mut output).expect("search succeeds");

    assert_eq!(output_ids(&output), ["f0", "f1", "f2", "f3"]);
    assert_eq!(hub.requests().len(), 2);
}

#[rstest]
fn search_dedup_skips_repeated_ids() {
    let mut features = sample_features(3);
    features.extend(sample_features(2));
    let hub = Arc::new(PagedHub::new(features));
    let builder = FakeClientBuilder::new(hub);
    let args = SearchArgs {
        dedup: Some(true),
        ..search_args("roads")
    };
    let mut output = Vec::new();

    run_search_with(args, &builder, &mut output).expect("search succeeds");

    assert_eq!(output_ids(&output), ["f0", "f1", "f2"]);
}

#[rstest]
fn search_without_space_never_builds_a_client() {
    let mut output = Vec::new();
    let err = run_search_with(SearchArgs::default(), &UnreachableBuilder, &mut output)
        .expect_err("space is required");
    assert!(matches!(err, CliError::MissingArgument { .. }));
    assert!(output.is_empty());
}
