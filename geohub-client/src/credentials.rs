//! Bearer token sources.
//!
//! A [`CredentialSource`] is resolved exactly once, when the client is built,
//! into a [`BearerToken`]. The token never appears in `Debug` output.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};

use crate::CredentialsError;

/// Environment variable read by [`CredentialSource::default`].
pub const DEFAULT_TOKEN_ENV: &str = "GEOHUB_TOKEN";

/// Where the bearer token comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read the token from an environment variable.
    Env {
        /// Variable name.
        var: String,
    },
    /// Read the token from a file.
    ///
    /// The file is either a properties file with a `token` entry
    /// (`token = ...` or `token: ...`), or contains the token as its only
    /// line besides blank lines and `#`/`!` comments. A bare token line must
    /// not contain whitespace.
    File {
        /// Token file path.
        path: Utf8PathBuf,
    },
    /// Use the given token.
    Explicit {
        /// Token value.
        token: String,
    },
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::Env {
            var: DEFAULT_TOKEN_ENV.to_owned(),
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env { var } => f.debug_struct("Env").field("var", var).finish(),
            Self::File { path } => f.debug_struct("File").field("path", path).finish(),
            Self::Explicit { .. } => f
                .debug_struct("Explicit")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}

impl CredentialSource {
    /// Resolve the token, reading the process environment if needed.
    ///
    /// # Errors
    ///
    /// See [`CredentialSource::resolve_with`].
    pub fn resolve(&self) -> Result<BearerToken, CredentialsError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolve the token, looking environment variables up through `env`.
    ///
    /// # Errors
    ///
    /// Fails when the variable is unset, the file cannot be read or holds no
    /// token, or the token is empty or contains whitespace.
    pub fn resolve_with<F>(&self, env: F) -> Result<BearerToken, CredentialsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (token, origin) = match self {
            Self::Env { var } => {
                let token = env(var).ok_or_else(|| CredentialsError::MissingEnv { var: var.clone() })?;
                (token, format!("environment variable {var}"))
            }
            Self::File { path } => (read_token_file(path)?, format!("file {path}")),
            Self::Explicit { token } => (token.clone(), "explicit configuration".to_owned()),
        };
        BearerToken::new(token.trim()).ok_or(CredentialsError::InvalidToken { origin })
    }
}

fn read_token_file(path: &Utf8Path) -> Result<String, CredentialsError> {
    let contents =
        geohub_fs::read_utf8_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_token_file(&contents).ok_or_else(|| CredentialsError::NoToken {
        path: path.to_path_buf(),
    })
}

fn parse_token_file(contents: &str) -> Option<String> {
    let lines: Vec<&str> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(['#', '!']))
        .collect();
    let keyed = lines.iter().find_map(|line| {
        let (key, value) = line.split_once(['=', ':'])?;
        (key.trim() == "token").then(|| value.trim().to_owned())
    });
    match (keyed, lines.as_slice()) {
        (Some(token), _) => Some(token),
        (None, [single]) if !single.contains(char::is_whitespace) => Some((*single).to_owned()),
        _ => None,
    }
}

/// Resolved bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Accept a non-empty token without whitespace.
    #[must_use]
    pub fn new(token: &str) -> Option<Self> {
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            None
        } else {
            Some(Self(token.to_owned()))
        }
    }

    /// Token value, for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}
