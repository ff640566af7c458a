//! Upload command implementation for the geohub CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, ValueEnum};
use geohub_client::{ClientConfig, CsvColumns, TagChanges};
use geohub_core::{Feature, SpaceId};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_BASE_URL, ARG_CHUNK_SIZE, ARG_FORMAT, ARG_ID_COLUMN, ARG_INPUT, ARG_LAT_COLUMN,
    ARG_LON_COLUMN, ARG_SPACE, ARG_TAG, ARG_TOKEN, ARG_TOKEN_FILE, ClientBuilder, CliError, ENV_UPLOAD_INPUT, ENV_UPLOAD_SPACE, client_config,
    search::parse_space,
};

/// Features sent per request unless `--chunk-size` says otherwise.
pub(crate) const DEFAULT_CHUNK_SIZE: usize = 2000;
/// CSV column read as longitude unless `--lon-column` says otherwise.
pub(crate) const DEFAULT_LON_COLUMN: &str = "longitude";
/// CSV column read as latitude unless `--lat-column` says otherwise.
pub(crate) const DEFAULT_LAT_COLUMN: &str = "latitude";

/// Encoding of an upload input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum InputFormat {
    /// A GeoJSON feature collection, feature or geometry.
    Geojson,
    /// Comma-separated values with a header row, one point per row.
    Csv,
    /// One WKT geometry per line.
    Wkt,
}

impl InputFormat {
    /// Guess the format from a file extension.
    fn from_extension(path: &Utf8Path) -> Option<Self> {
        match path.extension()?.to_ascii_lowercase().as_str() {
            "geojson" | "json" => Some(Self::Geojson),
            "csv" => Some(Self::Csv),
            "wkt" | "txt" => Some(Self::Wkt),
            _ => None,
        }
    }
}

/// CLI arguments for the `upload` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read features from a GeoJSON, CSV or WKT file and write \
                 them to a space in chunks. CSV rows become points built \
                 from the --lon-column and --lat-column values. The upload stops at the first rejected \
                 chunk.",
    about = "Upload features from a file to a space"
)]
#[ortho_config(prefix = "GEOHUB")]
pub(crate) struct UploadArgs {
    /// Identifier of the target space.
    #[arg(long = ARG_SPACE, value_name = "id")]
    #[serde(default)]
    pub(crate) space: Option<String>,
    /// Path to the GeoJSON, CSV or WKT input.
    #[arg(long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Input encoding; inferred from the file extension when omitted.
    #[arg(long = ARG_FORMAT, value_enum)]
    #[serde(default)]
    pub(crate) format: Option<InputFormat>,
    /// Features sent per request.
    #[arg(long = ARG_CHUNK_SIZE, value_name = "n")]
    #[serde(default)]
    pub(crate) chunk_size: Option<usize>,
    /// Tag added to every uploaded feature; repeatable.
    #[arg(long = ARG_TAG, value_name = "tag")]
    #[serde(default)]
    pub(crate) tag: Option<Vec<String>>,
    /// CSV column holding the longitude.
    #[arg(long = ARG_LON_COLUMN, value_name = "name")]
    #[serde(default)]
    pub(crate) lon_column: Option<String>,
    /// CSV column holding the latitude.
    #[arg(long = ARG_LAT_COLUMN, value_name = "name")]
    #[serde(default)]
    pub(crate) lat_column: Option<String>,
    /// CSV column holding feature ids; rows are numbered when omitted.
    #[arg(long = ARG_ID_COLUMN, value_name = "name")]
    #[serde(default)]
    pub(crate) id_column: Option<String>,
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

impl UploadArgs {
    pub(crate) fn into_config(self) -> Result<UploadConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        UploadConfig::try_from(merged)
    }
}

/// Resolved `upload` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UploadConfig {
    pub(crate) space: SpaceId,
    pub(crate) input: Utf8PathBuf,
    pub(crate) format: InputFormat,
    pub(crate) chunk_size: usize,
    pub(crate) tags: TagChanges,
    pub(crate) csv: CsvColumns,
    pub(crate) client: ClientConfig,
}

impl UploadConfig {
    /// Ensure the input path names an existing regular file.
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.input, ARG_INPUT)
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match geohub_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub(crate) fn read_features(&self) -> Result<Vec<Feature>, CliError> {
        match self.format {
            InputFormat::Geojson => Ok(geohub_client::read_geojson_features(&self.input)?),
            InputFormat::Csv => Ok(geohub_client::read_csv_features(&self.input, &self.csv)?),
            InputFormat::Wkt => read_wkt(&self.input),
        }
    }
}

#[cfg(feature = "wkt")]
fn read_wkt(path: &Utf8Path) -> Result<Vec<Feature>, CliError> {
    Ok(geohub_client::read_wkt_features(path)?)
}

#[cfg(not(feature = "wkt"))]
fn read_wkt(_path: &Utf8Path) -> Result<Vec<Feature>, CliError> {
    Err(CliError::MissingFeature {
        feature: "wkt",
        action: "reading WKT input",
    })
}

impl TryFrom<UploadArgs> for UploadConfig {
    type Error = CliError;

    fn try_from(args: UploadArgs) -> Result<Self, Self::Error> {
        let raw_space = args.space.ok_or(CliError::MissingArgument {
            field: ARG_SPACE,
            env: ENV_UPLOAD_SPACE,
        })?;
        let space = parse_space(&raw_space)?;
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_UPLOAD_INPUT,
        })?;
        let format = args
            .format
            .or_else(|| InputFormat::from_extension(&input))
            .ok_or_else(|| CliError::InvalidArgument {
                field: ARG_FORMAT,
                message: format!("cannot infer the format of {input}; pass --{ARG_FORMAT}"),
            })?;
        let chunk_size = args.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE);
        if chunk_size == 0 {
            return Err(CliError::InvalidArgument {
                field: ARG_CHUNK_SIZE,
                message: "must be at least 1".to_owned(),
            });
        }
        let mut csv = CsvColumns::new(
            args.lon_column.unwrap_or_else(|| DEFAULT_LON_COLUMN.to_owned()),
            args.lat_column.unwrap_or_else(|| DEFAULT_LAT_COLUMN.to_owned()),
        );
        if let Some(id_column) = args.id_column {
            csv = csv.with_id(id_column);
        }
        Ok(Self {
            space,
            input,
            format,
            chunk_size,
            tags: TagChanges::adding(args.tag.unwrap_or_default()),
            csv,
            client: client_config(args.base_url, args.token, args.token_file),
        })
    }
}

pub(crate) fn run_upload_with(
    args: UploadArgs,
    builder: &dyn ClientBuilder,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    let features = config.read_features()?;
    info!("read {} features from {}", features.len(), config.input);
    let client = builder.build(config.client.clone())?;
    let written =
        client.upload_features(&config.space, &features, config.chunk_size, &config.tags)?;
    writeln!(writer, "uploaded {written} features to {}", config.space)
        .map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<UploadConfig, CliError> {
    let merged = UploadArgs::merge_from_layers(layers).map_err(CliError::from)?;
    UploadConfig::try_from(merged)
}
