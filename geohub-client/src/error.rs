//! Errors raised while building a client, resolving credentials and
//! converting input files.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Failure to construct a [`HubClient`](crate::HubClient).
#[derive(Debug, Error)]
pub enum ClientBuildError {
    /// The base URL could not be parsed or cannot carry path segments.
    #[error("invalid base URL {url:?}: {message}")]
    InvalidBaseUrl {
        /// URL as configured.
        url: String,
        /// Parser message.
        message: String,
    },
    /// The bearer token could not be resolved.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Failure to resolve a bearer token from its source.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// The environment variable is unset or not valid Unicode.
    #[error("environment variable {var} is not set")]
    MissingEnv {
        /// Variable name.
        var: String,
    },
    /// The token file could not be read.
    #[error("failed to read token file {path:?}: {source}")]
    Read {
        /// Token file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The token file has no `token` entry and no bare token line.
    #[error("token file {path:?} does not contain a token")]
    NoToken {
        /// Token file path.
        path: Utf8PathBuf,
    },
    /// The resolved token is empty or contains whitespace.
    #[error("token from {origin} is empty or contains whitespace")]
    InvalidToken {
        /// Where the token came from.
        origin: String,
    },
}

/// Failure to convert an input file into features.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Read {
        /// Input path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid GeoJSON.
    #[error("invalid GeoJSON in {path:?}: {message}")]
    GeoJson {
        /// Input path.
        path: Utf8PathBuf,
        /// Parser message.
        message: String,
    },
    /// A CSV row could not be read or holds an invalid coordinate.
    #[error("invalid CSV at {location}: {message}")]
    Csv {
        /// `path:line`.
        location: String,
        /// Parser message.
        message: String,
    },
    /// A mapped column is missing from the CSV header.
    #[error("{path:?} has no column named {column:?}")]
    CsvColumn {
        /// Input path.
        path: Utf8PathBuf,
        /// Column that was asked for.
        column: String,
    },
    /// A line is not valid WKT.
    #[error("invalid WKT at {location}: {message}")]
    Wkt {
        /// `path:line`, or `input` for in-memory text.
        location: String,
        /// Parser message.
        message: String,
    },
}
