//! Registry HTTP client.

use crate::error::Error;
use crate::registration::{RegistrationIndex, RegistrationPage};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use std::pin::Pin;
use std::time::Duration;
use url::Url;

/// Default registry service index.
pub const DEFAULT_SOURCE: &str = "https://pwsh.gallery/index.json";

/// Environment variable to override the registry source.
pub const SOURCE_ENV: &str = "MODGET_REGISTRY";

/// Identifying user-agent. The registry keys trimmed, dependency-only
/// registration documents off this header; omitting it still works but
/// downloads larger payloads.
const USER_AGENT: &str = concat!("modget/", env!("CARGO_PKG_VERSION"));

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection ceiling for the HTTP/1.1 fallback case. With HTTP/2 the
/// client multiplexes over a handful of TLS sessions and never gets near
/// this.
const MAX_IDLE_PER_HOST: usize = 100;

/// An in-flight archive body.
pub type ArchiveStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// The registry operations the planner and installer consume.
///
/// `RegistryClient` is the production implementation; tests drive the
/// pipeline with an in-memory fixture.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch `{base}/registration/{name}/index.json`.
    async fn fetch_index(&self, name: &str) -> Result<RegistrationIndex, Error>;

    /// Fetch a page by the absolute URI the index handed out.
    async fn fetch_page(&self, page_uri: &str) -> Result<RegistrationPage, Error>;

    /// Open a module archive for streaming.
    async fn open_archive(&self, uri: &str) -> Result<ArchiveStream, Error>;
}

/// HTTP registry client.
///
/// One long-lived client per run: connections are pooled and reused, and
/// ALPN negotiates HTTP/2 where the registry offers it (HTTP/1.1 fallback
/// widens the pool instead).
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base: Url,
    http: Client,
}

impl RegistryClient {
    /// Create a client for the given source URL.
    ///
    /// A trailing `*.json` path component (the service index document) is
    /// stripped to obtain the base.
    pub fn new(source: &str) -> Result<Self, Error> {
        let mut base = Url::parse(source)
            .map_err(|e| Error::invalid_argument(format!("invalid registry URL '{source}': {e}")))?;

        let trailing_json = base
            .path_segments()
            .and_then(|segments| segments.last().map(|s| s.ends_with(".json")))
            .unwrap_or(false);
        if trailing_json {
            base.path_segments_mut()
                .map_err(|()| Error::invalid_argument(format!("registry URL '{source}' cannot be a base")))?
                .pop();
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { base, http })
    }

    /// Create a client from `MODGET_REGISTRY` or the default source.
    pub fn from_env() -> Result<Self, Error> {
        let source = std::env::var(SOURCE_ENV).unwrap_or_else(|_| DEFAULT_SOURCE.to_string());
        Self::new(&source)
    }

    /// The stripped base URL.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn index_url(&self, name: &str) -> Result<Url, Error> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::invalid_argument("registry URL cannot be a base"))?;
            segments.pop_if_empty();
            segments.extend(["registration", name, "index.json"]);
        }
        Ok(url)
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn fetch_index(&self, name: &str) -> Result<RegistrationIndex, Error> {
        let url = self.index_url(name)?;
        tracing::debug!(%url, "fetching registration index");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::transport(name, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound {
                name: name.to_string(),
            });
        }

        let response = response
            .error_for_status()
            .map_err(|e| Error::transport(name, e))?;

        response
            .json()
            .await
            .map_err(|e| Error::invalid_response(name, e.to_string()))
    }

    async fn fetch_page(&self, page_uri: &str) -> Result<RegistrationPage, Error> {
        tracing::debug!(uri = page_uri, "fetching registration page");

        let response = self
            .http
            .get(page_uri)
            .send()
            .await
            .map_err(|e| Error::transport(page_uri, e))?
            .error_for_status()
            .map_err(|e| Error::transport(page_uri, e))?;

        response
            .json()
            .await
            .map_err(|e| Error::invalid_response(page_uri, e.to_string()))
    }

    async fn open_archive(&self, uri: &str) -> Result<ArchiveStream, Error> {
        tracing::debug!(uri, "opening archive stream");

        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|e| Error::transport(uri, e))?
            .error_for_status()
            .map_err(|e| Error::transport(uri, e))?;

        let context = uri.to_string();
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| Error::transport(context.clone(), e)));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory registry used by resolver and installer tests.

    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Debug, Default)]
    pub(crate) struct FixtureRegistry {
        indexes: HashMap<String, serde_json::Value>,
        pages: HashMap<String, serde_json::Value>,
        archives: HashMap<String, Bytes>,
        missing: HashSet<String>,
    }

    impl FixtureRegistry {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_index(mut self, name: &str, doc: serde_json::Value) -> Self {
            self.indexes.insert(name.to_string(), doc);
            self
        }

        pub(crate) fn with_page(mut self, uri: &str, doc: serde_json::Value) -> Self {
            self.pages.insert(uri.to_string(), doc);
            self
        }

        pub(crate) fn with_archive(mut self, uri: &str, bytes: Bytes) -> Self {
            self.archives.insert(uri.to_string(), bytes);
            self
        }

        pub(crate) fn with_missing(mut self, name: &str) -> Self {
            self.missing.insert(name.to_string());
            self
        }
    }

    #[async_trait]
    impl Registry for FixtureRegistry {
        async fn fetch_index(&self, name: &str) -> Result<RegistrationIndex, Error> {
            if self.missing.contains(name) || !self.indexes.contains_key(name) {
                return Err(Error::NotFound {
                    name: name.to_string(),
                });
            }
            serde_json::from_value(self.indexes[name].clone())
                .map_err(|e| Error::invalid_response(name, e.to_string()))
        }

        async fn fetch_page(&self, page_uri: &str) -> Result<RegistrationPage, Error> {
            let doc = self.pages.get(page_uri).ok_or_else(|| {
                Error::invalid_response(page_uri, "no such page in fixture")
            })?;
            serde_json::from_value(doc.clone())
                .map_err(|e| Error::invalid_response(page_uri, e.to_string()))
        }

        async fn open_archive(&self, uri: &str) -> Result<ArchiveStream, Error> {
            let bytes = self
                .archives
                .get(uri)
                .cloned()
                .ok_or_else(|| Error::invalid_response(uri, "no such archive in fixture"))?;
            let chunks: Vec<Result<Bytes, Error>> = vec![Ok(bytes)];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_strips_service_index() {
        let client = RegistryClient::new("https://registry.test/v3/index.json").unwrap();
        assert_eq!(client.base().as_str(), "https://registry.test/v3");
    }

    #[test]
    fn test_base_without_document_kept() {
        let client = RegistryClient::new("https://registry.test/v3").unwrap();
        assert_eq!(client.base().as_str(), "https://registry.test/v3");
    }

    #[test]
    fn test_index_url_shape() {
        let client = RegistryClient::new("https://registry.test/v3/index.json").unwrap();
        let url = client.index_url("Pester").unwrap();
        assert_eq!(
            url.as_str(),
            "https://registry.test/v3/registration/Pester/index.json"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(RegistryClient::new("not a url").is_err());
    }
}
