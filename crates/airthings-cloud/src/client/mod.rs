//! Cloud client module
//!
//! Central client that owns the HTTP connection pool and the token cache.

mod http;

pub use http::HttpClient;

use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::token::TokenCache;
use crate::types::{Device, PageRequest, Sample, Token};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cloud client for the Airthings consumer API
pub struct CloudClient {
    config: CloudConfig,
    http: Arc<HttpClient>,
    tokens: TokenCache,
}

impl CloudClient {
    /// Create a new cloud client with an empty token cache
    pub fn new(config: CloudConfig) -> CloudResult<Self> {
        let http = Arc::new(HttpClient::new(&config)?);
        let tokens = TokenCache::new(
            http.clone(),
            config.credentials.clone(),
            config.token_safety_margin,
        );

        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    /// Get configuration reference
    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// Get token cache reference
    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Valid access token, renewed if the cached one has expired
    pub async fn ensure_valid_token(&self) -> CloudResult<Token> {
        self.tokens.ensure_valid().await
    }

    /// List every device on the account
    ///
    /// When pagination is enabled, pages are requested until an empty
    /// page, a short page without a newer offset, or `max_pages`.
    /// Devices are returned in listing order with duplicates dropped.
    pub async fn list_all_devices(&self, token: &Token) -> CloudResult<Vec<Device>> {
        let mut devices = Vec::new();
        let mut seen = HashSet::new();

        if !self.config.follow_pagination {
            let page = self
                .http
                .list_devices(token, None)
                .await
                .map_err(CloudError::into_list)?;
            push_unique(&mut devices, &mut seen, page.devices);
            return Ok(devices);
        }

        let page_size = self.config.page_size;
        let mut offset = 0u64;
        let mut pages = 0usize;

        loop {
            if pages == self.config.max_pages {
                warn!(
                    max_pages = self.config.max_pages,
                    devices = devices.len(),
                    "Stopped device listing at page limit"
                );
                break;
            }

            let request = PageRequest {
                limit: page_size,
                offset,
            };
            let page = self
                .http
                .list_devices(token, Some(request))
                .await
                .map_err(CloudError::into_list)?;
            pages += 1;

            let count = page.devices.len();
            debug!(offset, count, next = ?page.offset, "Received device page");
            if count == 0 {
                break;
            }

            push_unique(&mut devices, &mut seen, page.devices);

            offset = match page.offset {
                Some(next) if next > offset => next,
                _ if count >= page_size => offset + count as u64,
                _ => break,
            };
        }

        Ok(devices)
    }

    /// Latest sample for one device
    pub async fn latest_sample(&self, token: &Token, device: &Device) -> CloudResult<Sample> {
        self.http
            .latest_sample(token, &device.id)
            .await
            .map_err(|e| e.into_sample(&device.id))
    }
}

fn push_unique(devices: &mut Vec<Device>, seen: &mut HashSet<String>, page: Vec<Device>) {
    for device in page {
        if seen.insert(device.id.clone()) {
            devices.push(device);
        }
    }
}
