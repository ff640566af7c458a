//! `reqwest`-backed [`Transport`].

use std::sync::Arc;
use std::time::Duration;

use geohub_core::{HubError, HubRequest, HubResponse, Method, Transport};
use log::trace;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::runtime::BlockingRuntime;
use crate::{BearerToken, ClientBuildError, ClientConfig};

/// Sends Hub requests over HTTPS with a bearer token.
///
/// Every call blocks the calling thread until the response body has been
/// read. Status codes are not interpreted here.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    token: BearerToken,
    timeout: Duration,
    runtime: Arc<BlockingRuntime>,
}

impl HttpTransport {
    /// Build a transport for `config`, authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Fails when the base URL is invalid or the HTTP client cannot be built.
    pub fn new(
        config: &ClientConfig,
        token: BearerToken,
        runtime: Arc<BlockingRuntime>,
    ) -> Result<Self, ClientBuildError> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(ClientBuildError::HttpClient)?;
        Ok(Self {
            client,
            base_url,
            token,
            timeout: config.timeout,
            runtime,
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for `request`, with segments and parameters encoded.
    #[must_use]
    pub fn build_url(&self, request: &HubRequest) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&request.segments);
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        url
    }

    async fn send(&self, request: &HubRequest, url: Url) -> Result<HubResponse, HubError> {
        let url_text = url.to_string();
        let mut builder = self
            .client
            .request(method(request.method), url)
            .bearer_auth(self.token.expose());
        if let Some(body) = &request.body {
            let payload = serde_json::to_vec(body).map_err(|err| HubError::Network {
                url: url_text.clone(),
                message: err.to_string(),
            })?;
            builder = builder
                .header(CONTENT_TYPE, request.content_type.as_str())
                .body(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url_text))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let text = value.to_str().ok()?;
                Some((name.as_str().to_owned(), text.to_owned()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url_text))?;
        Ok(HubResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> HubError {
        if error.is_timeout() {
            HubError::Timeout {
                url: url.to_owned(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            HubError::Network {
                url: url.to_owned(),
                message: error.to_string(),
            }
        }
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: &HubRequest) -> Result<HubResponse, HubError> {
        let url = self.build_url(request);
        trace!("{} {url}", request.method.as_str());
        self.runtime.block_on(self.send(request, url))
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Parse `raw` as an absolute base URL able to carry path segments.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url, ClientBuildError> {
    let invalid = |message: String| ClientBuildError::InvalidBaseUrl {
        url: raw.to_owned(),
        message,
    };
    let url = Url::parse(raw).map_err(|err| invalid(err.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(invalid("URL cannot carry path segments".to_owned()));
    }
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn transport(base_url: &str) -> HttpTransport {
        let config = ClientConfig::new(base_url);
        let token = BearerToken::new("test-token").expect("valid token");
        let runtime = Arc::new(BlockingRuntime::new().expect("runtime should build"));
        HttpTransport::new(&config, token, runtime).expect("transport should build")
    }

    #[rstest]
    #[case("http://hub.example.com")]
    #[case("http://hub.example.com/")]
    fn build_url_joins_segments(#[case] base: &str) {
        let request = HubRequest::get(["hub", "spaces", "abc", "iterate"]).with_param("limit", "10");
        let url = transport(base).build_url(&request);
        assert_eq!(
            url.as_str(),
            "http://hub.example.com/hub/spaces/abc/iterate?limit=10"
        );
    }

    #[rstest]
    fn build_url_keeps_a_base_path() {
        let request = HubRequest::get(["hub", "spaces"]);
        let url = transport("http://proxy.example.com/xyz/").build_url(&request);
        assert_eq!(url.as_str(), "http://proxy.example.com/xyz/hub/spaces");
    }

    #[rstest]
    fn build_url_percent_encodes_segments_and_values() {
        let request = HubRequest::get(["hub", "spaces", "a b", "features", "x/y"])
            .with_param("tags", "red+blue,green")
            .with_param("p.name", "gte=10");
        let url = transport("https://hub.example.com").build_url(&request);

        let mut segments = url.path_segments().expect("hierarchical URL");
        assert_eq!(segments.nth(2), Some("a%20b"));
        assert_eq!(segments.nth(1), Some("x%2Fy"));

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("tags".to_owned(), "red+blue,green".to_owned()),
                ("p.name".to_owned(), "gte=10".to_owned()),
            ]
        );
    }

    #[rstest]
    #[case("not a url")]
    #[case("mailto:someone@example.com")]
    #[case("ftp://hub.example.com")]
    fn invalid_base_urls_are_rejected(#[case] raw: &str) {
        let err = parse_base_url(raw).expect_err("base URL should be rejected");
        assert!(matches!(err, ClientBuildError::InvalidBaseUrl { url, .. } if url == raw));
    }

    #[rstest]
    fn methods_map_onto_reqwest() {
        assert_eq!(method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(method(Method::Delete), reqwest::Method::DELETE);
    }
}
