//! Command-line interface for searching and loading geohub spaces.
#![forbid(unsafe_code)]

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use geohub_client::{ClientConfig, CredentialSource, HubClient};

mod error;
mod search;
mod upload;

pub use error::CliError;

use search::SearchArgs;
use upload::UploadArgs;

const ARG_SPACE: &str = "space";
const ARG_TAGS: &str = "tags";
const ARG_ALL_TAGS: &str = "all-tags";
const ARG_BBOX: &str = "bbox";
const ARG_LIMIT: &str = "limit";
const ARG_PAGE_SIZE: &str = "page-size";
const ARG_DEDUP: &str = "dedup";
const ARG_INPUT: &str = "input";
const ARG_FORMAT: &str = "format";
const ARG_CHUNK_SIZE: &str = "chunk-size";
const ARG_TAG: &str = "tag";
const ARG_LON_COLUMN: &str = "lon-column";
const ARG_LAT_COLUMN: &str = "lat-column";
const ARG_ID_COLUMN: &str = "id-column";
const ARG_BASE_URL: &str = "base-url";
const ARG_TOKEN: &str = "token";
const ARG_TOKEN_FILE: &str = "token-file";
const ENV_SEARCH_SPACE: &str = "GEOHUB_CMDS_SEARCH_SPACE";
const ENV_UPLOAD_SPACE: &str = "GEOHUB_CMDS_UPLOAD_SPACE";
const ENV_UPLOAD_INPUT: &str = "GEOHUB_CMDS_UPLOAD_INPUT";

/// Run the geohub CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns the first argument, configuration, client or Hub failure.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    let builder = DefaultClientBuilder;
    match cli.command {
        Command::Search(args) => search::run_search_with(args, &builder, &mut stdout),
        Command::Upload(args) => upload::run_upload_with(args, &builder, &mut stdout),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geohub",
    about = "Query and load features in geohub spaces",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Stream the features of a space as newline-delimited GeoJSON.
    Search(SearchArgs),
    /// Write the features of a GeoJSON or WKT file to a space.
    Upload(UploadArgs),
}

/// Builds the Hub client for one command invocation.
pub(crate) trait ClientBuilder {
    fn build(&self, config: ClientConfig) -> Result<HubClient, CliError>;
}

pub(crate) struct DefaultClientBuilder;

impl ClientBuilder for DefaultClientBuilder {
    fn build(&self, config: ClientConfig) -> Result<HubClient, CliError> {
        Ok(HubClient::new(config)?)
    }
}

/// Client configuration from the connection options shared by every command.
///
/// An explicit token wins over a token file; without either the token is
/// read from `GEOHUB_TOKEN`.
pub(crate) fn client_config(
    base_url: Option<String>,
    token: Option<String>,
    token_file: Option<Utf8PathBuf>,
) -> ClientConfig {
    let credentials = match (token, token_file) {
        (Some(explicit), _) => CredentialSource::Explicit { token: explicit },
        (None, Some(path)) => CredentialSource::File { path },
        (None, None) => CredentialSource::default(),
    };
    let mut config = ClientConfig::default().with_credentials(credentials);
    if let Some(url) = base_url {
        config.base_url = url;
    }
    config
}

#[cfg(test)]
mod tests;
