//! Probe transports: how one measurement round downloads the reference payload

use async_trait::async_trait;

use crate::errors::ClipError;

/// One uncached transfer of the reference payload.
///
/// Returns the number of body bytes received. Implementations must bypass
/// any cache so repeated rounds measure the network.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<u64, ClipError>;
}

#[cfg(feature = "http-probe")]
pub use http::{HttpProbe, CACHE_BUST_PARAM};

#[cfg(feature = "http-probe")]
mod http {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
    use std::time::Duration;
    use uuid::Uuid;

    /// Query parameter appended to every probe request
    pub const CACHE_BUST_PARAM: &str = "crabclip_nocache";

    /// reqwest-backed transport
    #[derive(Debug, Clone)]
    pub struct HttpProbe {
        client: reqwest::Client,
    }

    impl HttpProbe {
        pub fn new(timeout: Duration) -> Result<Self, ClipError> {
            let mut headers = HeaderMap::new();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

            let client = reqwest::Client::builder()
                .default_headers(headers)
                .timeout(timeout)
                .build()
                .map_err(|e| ClipError::Config(format!("Failed to build HTTP client: {}", e)))?;

            Ok(Self { client })
        }

        /// Same URL with a unique cache-busting parameter
        pub fn cache_busted(url: &str) -> Result<reqwest::Url, ClipError> {
            let mut url = reqwest::Url::parse(url)
                .map_err(|e| ClipError::NetworkMeasurement(format!("Invalid probe URL: {}", e)))?;
            url.query_pairs_mut()
                .append_pair(CACHE_BUST_PARAM, &Uuid::new_v4().simple().to_string());
            Ok(url)
        }
    }

    #[async_trait]
    impl ProbeTransport for HttpProbe {
        async fn fetch(&self, url: &str) -> Result<u64, ClipError> {
            let url = Self::cache_busted(url)?;

            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| ClipError::NetworkMeasurement(format!("Probe request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                return Err(ClipError::NetworkMeasurement(format!(
                    "Probe returned HTTP {}",
                    status
                )));
            }

            let body = response.bytes().await.map_err(|e| {
                ClipError::NetworkMeasurement(format!("Probe body read failed: {}", e))
            })?;

            Ok(body.len() as u64)
        }
    }

}
