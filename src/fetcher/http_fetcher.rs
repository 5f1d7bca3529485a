use std::error::Error as _;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{redirect, Client, StatusCode};

use crate::app::error::error_chain;
use crate::app::{FeedCacheError, Result};
use crate::config::RequestOptions;
use crate::fetcher::{FeedClient, FetchRequest, FetchResult};
use crate::parser::parse_feed;

/// reqwest + feed-rs implementation of [`FeedClient`].
pub struct HttpFeedClient {
    client: Client,
    options: RequestOptions,
}

impl HttpFeedClient {
    pub fn new(options: RequestOptions) -> Result<Self> {
        let client = build_client(&options)?;
        Ok(Self { client, options })
    }

    /// Reuse the shared client unless the request carries its own options.
    fn client_for(&self, options: &RequestOptions) -> Result<Client> {
        if *options == self.options {
            Ok(self.client.clone())
        } else {
            build_client(options)
        }
    }
}

fn build_client(options: &RequestOptions) -> Result<Client> {
    let policy = if options.allow_redirects {
        redirect::Policy::limited(options.max_redirects)
    } else {
        redirect::Policy::none()
    };

    Client::builder()
        .timeout(options.timeout())
        .connect_timeout(options.connect_timeout())
        .gzip(true)
        .brotli(true)
        .redirect(policy)
        .danger_accept_invalid_certs(!options.verify_tls)
        .user_agent(options.user_agent.as_str())
        .build()
        .map_err(FeedCacheError::from)
}

/// TLS verification failures surface as connect errors; the certificate
/// problem is only visible further down the source chain.
fn is_certificate_error(e: &reqwest::Error) -> bool {
    let mut cur: Option<&(dyn std::error::Error + 'static)> = e.source();
    while let Some(err) = cur {
        let msg = err.to_string().to_lowercase();
        if msg.contains("certificate") || msg.contains("unknownissuer") {
            return true;
        }
        cur = err.source();
    }
    false
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[async_trait]
impl FeedClient for HttpFeedClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult> {
        let mut headers = HeaderMap::new();

        if let Some(etag) = request.etag.as_deref() {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        if let Some(last_modified) = request.last_modified.as_deref() {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        let client = self.client_for(&request.options)?;
        let response = client
            .get(&request.url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                if is_certificate_error(&e) {
                    FeedCacheError::Certificate {
                        source_url: request.url.clone(),
                        message: error_chain(&e),
                    }
                } else {
                    FeedCacheError::from(e)
                }
            })?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchResult::NotModified);
        }

        response.error_for_status_ref()?;

        let etag = header_string(response.headers(), ETAG);
        let last_modified = header_string(response.headers(), LAST_MODIFIED);

        let body = response.bytes().await?;
        let feed = parse_feed(&body, &request.extra_tags)?;

        Ok(FetchResult::Content {
            feed,
            etag,
            last_modified,
        })
    }
}
