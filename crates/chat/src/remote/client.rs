//! HTTP clients for the Souk backend
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic; concurrency is
//! added by the caller.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::debug;
use url::Url;

use super::api::{ProductSearchRequest, ProductSearchResponse, StoreDto};
use super::{FetchError, ProductSearch, StoreFetcher};
use crate::models::{StoreId, StoreProfile};

/// HTTP client for `GET {base}/hermes/store?storeId={id}`
pub struct HttpStoreFetcher {
    base_url: Url,
    agent: ureq::Agent,
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;
    if url.cannot_be_a_base() {
        return Err(anyhow!("Base URL cannot have path segments: {}", url));
    }
    Ok(url)
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// `base` with `segments` appended to its path
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

impl HttpStoreFetcher {
    /// Create a client rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            agent: build_agent(timeout),
        })
    }

    /// Build the profile URL for a store
    pub fn store_url(&self, id: &StoreId) -> Url {
        let mut url = endpoint(&self.base_url, &["hermes", "store"]);
        url.query_pairs_mut().append_pair("storeId", id.as_str());
        url
    }
}

impl StoreFetcher for HttpStoreFetcher {
    fn fetch_store(&self, id: &StoreId) -> Result<StoreProfile, FetchError> {
        let url = self.store_url(id);
        debug!("Fetching store profile from {}", url);

        let response = self.agent.get(url.as_str()).call();

        match response {
            Ok(mut resp) => {
                let dto: StoreDto = resp
                    .body_mut()
                    .read_json()
                    .map_err(|e| FetchError::Decode(e.to_string()))?;
                Ok(StoreProfile::from(dto))
            }
            Err(ureq::Error::StatusCode(404)) => Err(FetchError::NotFound(id.0.clone())),
            Err(ureq::Error::StatusCode(code)) => Err(FetchError::Status(code)),
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }
}

/// HTTP client for `POST {base}/hermes`, the shopping assistant
pub struct AssistantClient {
    base_url: Url,
    agent: ureq::Agent,
}

impl AssistantClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            agent: build_agent(timeout),
        })
    }

    pub fn search_url(&self) -> Url {
        endpoint(&self.base_url, &["hermes"])
    }
}

impl ProductSearch for AssistantClient {
    fn search_products(
        &self,
        request: &ProductSearchRequest,
    ) -> Result<ProductSearchResponse, FetchError> {
        let url = self.search_url();
        debug!("Searching products near {:?} via {}", request.location.coordinates, url);

        match self.agent.post(url.as_str()).send_json(request) {
            Ok(mut resp) => resp
                .body_mut()
                .read_json()
                .map_err(|e| FetchError::Decode(e.to_string())),
            Err(ureq::Error::StatusCode(code)) => Err(FetchError::Status(code)),
            Err(e) => Err(FetchError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_url() {
        let client =
            HttpStoreFetcher::new("https://api.example.com", Duration::from_secs(5)).unwrap();
        let url = client.store_url(&StoreId::new("abc 123"));
        assert_eq!(
            url.as_str(),
            "https://api.example.com/hermes/store?storeId=abc+123"
        );
    }

    #[test]
    fn test_store_url_keeps_base_path() {
        let client =
            HttpStoreFetcher::new("https://api.example.com/v2/", Duration::from_secs(5)).unwrap();
        let url = client.store_url(&StoreId::new("s1"));
        assert_eq!(url.as_str(), "https://api.example.com/v2/hermes/store?storeId=s1");
    }

    #[test]
    fn test_search_url() {
        let client =
            AssistantClient::new("https://api.example.com/v2", Duration::from_secs(5)).unwrap();
        assert_eq!(client.search_url().as_str(), "https://api.example.com/v2/hermes");
    }

    #[test]
    fn test_unreachable_backend_is_transport_error() {
        let client = AssistantClient::new("http://127.0.0.1:1", Duration::from_secs(5)).unwrap();
        let request = ProductSearchRequest {
            key: None,
            query: "bread".to_string(),
            client_id: "u1".to_string(),
            location: crate::models::GeoPoint::default().into(),
            distance: 10,
        };

        assert!(matches!(
            client.search_products(&request),
            Err(FetchError::Transport(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpStoreFetcher::new("not a url", Duration::from_secs(5)).is_err());
        assert!(HttpStoreFetcher::new("mailto:shop@example.com", Duration::from_secs(5)).is_err());
        assert!(AssistantClient::new("mailto:shop@example.com", Duration::from_secs(5)).is_err());
    }
}
