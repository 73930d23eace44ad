//! Thin JSON client for the examprep REST API.

use std::time::Duration;

use anyhow::Context;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{check_status, from_transport, RemoteError};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Bearer-authenticated JSON client. Every failure surfaces as a [`RemoteError`].
pub struct ApiClient {
    base_url: Url,
    token: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid API base URL: {base_url}"))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "API base URL cannot be used as a base: {base_url}"
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build a URL from path segments, each percent-encoded.
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| from_transport(e, self.timeout_secs))?;
        check_status(response).await
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| from_transport(e, self.timeout_secs))?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::MalformedResponse(e.to_string()))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let response = self.execute(self.request(Method::GET, url)).await?;
        self.decode(response).await
    }

    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<T, RemoteError> {
        let response = self.execute(self.request(method, url).json(body)).await?;
        self.decode(response).await
    }

    /// Send a JSON body and ignore the response body.
    pub async fn send_json_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<(), RemoteError> {
        self.execute(self.request(method, url).json(body)).await?;
        Ok(())
    }

    /// Send a bodyless request and ignore the response body.
    pub async fn send_empty(&self, method: Method, url: Url) -> Result<(), RemoteError> {
        self.execute(self.request(method, url)).await?;
        Ok(())
    }
}
