//! Error types emitted by the geohub CLI.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geohub_client::{ClientBuildError, ConvertError};
use geohub_core::HubError;
use thiserror::Error;

/// Errors emitted by the geohub CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option has a value the command cannot use.
    #[error("invalid --{field}: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },
    /// The requested operation requires a missing compile-time feature.
    #[error("{action} requires the `{feature}` feature to be enabled")]
    MissingFeature {
        feature: &'static str,
        action: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Building the Hub client failed.
    #[error("failed to set up the Hub client: {0}")]
    BuildClient(#[from] ClientBuildError),
    /// A Hub request failed.
    #[error(transparent)]
    Hub(#[from] HubError),
    /// The input file could not be converted into features.
    #[error(transparent)]
    Convert(#[from] ConvertError),
    /// Serializing a feature for output failed.
    #[error("failed to serialize feature: {0}")]
    SerializeFeature(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
