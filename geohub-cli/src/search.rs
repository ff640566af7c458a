//! Search command implementation for the geohub CLI.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geohub_client::{ClientConfig, DEFAULT_PAGE_SIZE};
use geohub_core::{Area, BoundingBox, Feature, HubError, QueryError, SearchQuery, SpaceId, TagFilter};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_ALL_TAGS, ARG_BASE_URL, ARG_BBOX, ARG_DEDUP, ARG_LIMIT, ARG_PAGE_SIZE, ARG_SPACE,
    ARG_TAGS, ARG_TOKEN, ARG_TOKEN_FILE, ClientBuilder, CliError, ENV_SEARCH_SPACE,
    client_config,
};

/// CLI arguments for the `search` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Stream the features of a space, one GeoJSON feature per \
                 line. Pages are fetched lazily, so --limit stops requests \
                 as soon as enough features have been printed.",
    about = "Search the features of a space"
)]
#[ortho_config(prefix = "GEOHUB")]
pub(crate) struct SearchArgs {
    /// Identifier of the space to read.
    #[arg(long = ARG_SPACE, value_name = "id")]
    #[serde(default)]
    pub(crate) space: Option<String>,
    /// Comma-separated tags; features carrying any of them match.
    #[arg(long = ARG_TAGS, value_name = "a,b")]
    #[serde(default)]
    pub(crate) tags: Option<String>,
    /// Require every tag in --tags instead of any.
    #[arg(long = ARG_ALL_TAGS, num_args = 0..=1, default_missing_value = "true", value_name = "bool")]
    #[serde(default)]
    pub(crate) all_tags: Option<bool>,
    /// Bounding box as `west,south,east,north`.
    #[arg(long = ARG_BBOX, value_name = "w,s,e,n", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
    /// Stop after this many features.
    #[arg(long = ARG_LIMIT, value_name = "n")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// Features requested per page.
    #[arg(long = ARG_PAGE_SIZE, value_name = "n")]
    #[serde(default)]
    pub(crate) page_size: Option<usize>,
    /// Skip features whose id was already printed.
    #[arg(long = ARG_DEDUP, num_args = 0..=1, default_missing_value = "true", value_name = "bool")]
    #[serde(default)]
    pub(crate) dedup: Option<bool>,
    /// Hub base URL.
    #[arg(long = ARG_BASE_URL, value_name = "url")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,
    /// Bearer token.
    #[arg(long = ARG_TOKEN, value_name = "token")]
    #[serde(default)]
    pub(crate) token: Option<String>,
    /// File holding the bearer token.
    #[arg(long = ARG_TOKEN_FILE, value_name = "path")]
    #[serde(default)]
    pub(crate) token_file: Option<Utf8PathBuf>,
}

impl SearchArgs {
    pub(crate) fn into_config(self) -> Result<SearchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        SearchConfig::try_from(merged)
    }
}

/// Resolved `search` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchConfig {
    pub(crate) space: SpaceId,
    pub(crate) tags: Option<TagFilter>,
    pub(crate) bbox: Option<BoundingBox>,
    pub(crate) limit: Option<usize>,
    pub(crate) page_size: usize,
    pub(crate) dedup: bool,
    pub(crate) client: ClientConfig,
}

impl SearchConfig {
    pub(crate) fn query(&self) -> SearchQuery {
        let mut query = SearchQuery::new(self.space.clone());
        if let Some(tags) = &self.tags {
            query = query.with_tags(tags.clone());
        }
        if let Some(bbox) = self.bbox {
            query = query.with_area(Area::BoundingBox(bbox));
        }
        query
    }
}

impl TryFrom<SearchArgs> for SearchConfig {
    type Error = CliError;

    fn try_from(args: SearchArgs) -> Result<Self, Self::Error> {
        let raw_space = args.space.ok_or(CliError::MissingArgument {
            field: ARG_SPACE,
            env: ENV_SEARCH_SPACE,
        })?;
        let space = parse_space(&raw_space)?;
        let tags = args
            .tags
            .as_deref()
            .map(|raw| parse_tags(raw, args.all_tags.unwrap_or(false)))
            .transpose()?;
        let bbox = args.bbox.as_deref().map(parse_bbox).transpose()?;
        Ok(Self {
            space,
            tags,
            bbox,
            limit: args.limit,
            page_size: args.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            dedup: args.dedup.unwrap_or(false),
            client: client_config(args.base_url, args.token, args.token_file),
        })
    }
}

pub(crate) fn parse_space(raw: &str) -> Result<SpaceId, CliError> {
    raw.parse().map_err(|err: QueryError| CliError::InvalidArgument {
        field: ARG_SPACE,
        message: err.to_string(),
    })
}

fn parse_tags(raw: &str, all: bool) -> Result<TagFilter, CliError> {
    let tags: Vec<&str> = raw.split(',').map(str::trim).collect();
    let filter = if all {
        TagFilter::all(tags)
    } else {
        TagFilter::any(tags)
    };
    filter
        .validate()
        .map_err(|err| CliError::InvalidArgument {
            field: ARG_TAGS,
            message: err.to_string(),
        })?;
    Ok(filter)
}

fn parse_bbox(raw: &str) -> Result<BoundingBox, CliError> {
    let invalid = |message: String| CliError::InvalidArgument {
        field: ARG_BBOX,
        message,
    };
    let values = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|err| invalid(err.to_string()))?;
    let bbox = match values.as_slice() {
        [west, south, east, north] => BoundingBox::new(*west, *south, *east, *north),
        _ => {
            return Err(invalid(format!(
                "expected 4 comma-separated numbers, found {}",
                values.len()
            )));
        }
    };
    bbox.validate().map_err(|err| invalid(err.to_string()))?;
    Ok(bbox)
}

pub(crate) fn run_search_with(
    args: SearchArgs,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    let client = builder.build(config.client.clone())?;
    let features = client.search_with(config.query(), config.page_size, config.limit)?;
    let written = if config.dedup {
        write_features(writer, features.dedup_by_id())?
    } else {
        write_features(writer, features)?
    };
    info!("wrote {written} features from {}", config.space);
    Ok(())
}

fn write_features<I>(writer: &mut dyn Write, features: I) -> Result<usize, CliError>
where
    I: Iterator<Item = Result<Feature, HubError>>,
{
    let mut written = 0;
    for feature in features {
        let line = serde_json::to_string(&feature?).map_err(CliError::SerializeFeature)?;
        writeln!(writer, "{line}").map_err(CliError::WriteOutput)?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<SearchConfig, CliError> {
    let merged = SearchArgs::merge_from_layers(layers).map_err(CliError::from)?;
    SearchConfig::try_from(merged)
}
