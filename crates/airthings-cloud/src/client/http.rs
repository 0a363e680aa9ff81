//! HTTP client for the Airthings consumer API
//!
//! Handles the token exchange on the accounts host and the device
//! endpoints on the ext-api host.

use crate::config::{AuthScheme, CloudConfig};
use crate::error::{CloudError, CloudResult};
use crate::token::TokenExchange;
use crate::types::{
    AccessTokenResponse, Credentials, DevicesResponse, PageRequest, Sample, SampleResponse, Token,
};
use airthings_core::EXPORTER_VERSION;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};
use url::Url;

/// Body of the client-credentials grant
#[derive(Debug, serde::Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
}

/// HTTP client for the Airthings API
pub struct HttpClient {
    client: Client,
    token_url: Url,
    api_base_url: Url,
    auth_scheme: AuthScheme,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(config: &CloudConfig) -> CloudResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("airthings-exporter/{}", EXPORTER_VERSION))
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            token_url: Url::parse(&config.token_url)?,
            api_base_url: Url::parse(config.api_base_url.trim_end_matches('/'))?,
            auth_scheme: config.auth_scheme,
        })
    }

    /// Exchange client credentials for an access token
    pub async fn request_token(
        &self,
        credentials: &Credentials,
    ) -> CloudResult<AccessTokenResponse> {
        debug!(client_id = %credentials.client_id(), "Requesting access token");

        let form = TokenRequest {
            grant_type: "client_credentials",
            client_id: credentials.client_id(),
            client_secret: credentials.client_secret(),
        };

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(CloudError::from_transport)?;

        self.handle_response(response).await
    }

    /// Fetch one page of the device listing
    ///
    /// Without a page request no query parameters are sent and the API
    /// returns its default first page.
    pub async fn list_devices(
        &self,
        token: &Token,
        page: Option<PageRequest>,
    ) -> CloudResult<DevicesResponse> {
        let url = self.endpoint(&["devices"])?;

        let authorization = self.authorization(token);
        let mut request = self.client.get(url).header("Authorization", authorization);

        if let Some(page) = page {
            debug!(limit = page.limit, offset = page.offset, "Listing devices");
            request = request.query(&[
                ("limit", page.limit.to_string()),
                ("offset", page.offset.to_string()),
            ]);
        }

        let response = request.send().await.map_err(CloudError::from_transport)?;
        self.handle_response(response).await
    }

    /// Fetch the latest sample for one device
    pub async fn latest_sample(&self, token: &Token, serial: &str) -> CloudResult<Sample> {
        let url = self.endpoint(&["devices", serial, "latest-samples"])?;

        let response = self
            .client
            .get(url)
            .header("Authorization", self.authorization(token))
            .send()
            .await
            .map_err(CloudError::from_transport)?;

        let body: SampleResponse = self.handle_response(response).await?;
        Ok(body.data)
    }

    fn authorization(&self, token: &Token) -> String {
        self.auth_scheme.header_value(token.value())
    }

    /// API URL with escaped path segments appended to the base
    fn endpoint(&self, segments: &[&str]) -> CloudResult<Url> {
        let base = &self.api_base_url;
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::Config(format!("API base URL cannot be a base: {base}")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Generic response handler; anything other than 200 is an error
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> CloudResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(CloudError::from_transport)?;

        match status {
            StatusCode::OK => Ok(serde_json::from_str(&body)?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("Request rejected with {}", status);
                Err(CloudError::server(status.as_u16(), error_message(status, &body)))
            }
            _ if status.is_server_error() => {
                error!("Server error {}", status);
                Err(CloudError::server(status.as_u16(), error_message(status, &body)))
            }
            _ => Err(CloudError::server(status.as_u16(), error_message(status, &body))),
        }
    }
}

#[async_trait]
impl TokenExchange for HttpClient {
    async fn exchange(&self, credentials: &Credentials) -> CloudResult<AccessTokenResponse> {
        self.request_token(credentials).await
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.chars().take(200).collect()
    }
}
