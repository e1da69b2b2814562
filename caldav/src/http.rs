// SPDX-FileCopyrightText: 2025-2026 Calsync Contributors
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP client wrapper with authentication and `ETag` handling.

use reqwest::{Client, RequestBuilder, Response};

use crate::config::{AuthMethod, CalDavConfig};
use crate::error::CalDavError;
use crate::types::{ETag, Href};

/// HTTP client for `CalDAV` operations.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: CalDavConfig,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: CalDavConfig) -> Result<Self, CalDavError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client, config })
    }

    /// Builds a request with authentication headers.
    pub fn build_request(&self, method: reqwest::Method, url: &str) -> RequestBuilder {
        let mut req = self.client.request(method, url);

        match &self.config.auth {
            AuthMethod::Basic { username, password } => {
                req = req.basic_auth(username, Some(password));
            }
            AuthMethod::Bearer { token } => {
                req = req.bearer_auth(token);
            }
            AuthMethod::None => {}
        }

        req
    }

    /// Executes a request and checks for HTTP errors.
    ///
    /// A 404 is passed through as `Ok` when `treat_404_as_success` is set by
    /// the caller (DELETE, MOVE source cleanup) before calling this method;
    /// this method itself always surfaces 404 as [`CalDavError::NotFound`]
    /// against `fallback_href`, leaving that decision to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or returns an error status code.
    pub async fn execute(
        &self,
        req: RequestBuilder,
        fallback_href: &Href,
    ) -> Result<Response, CalDavError> {
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                CalDavError::Timeout
            } else {
                CalDavError::Network(e)
            }
        })?;

        match resp.status() {
            reqwest::StatusCode::OK
            | reqwest::StatusCode::CREATED
            | reqwest::StatusCode::NO_CONTENT
            | reqwest::StatusCode::MULTI_STATUS => Ok(resp),
            reqwest::StatusCode::NOT_FOUND => Err(CalDavError::NotFound(fallback_href.clone())),
            reqwest::StatusCode::PRECONDITION_FAILED => {
                Err(CalDavError::PreconditionFailed {
                    etag: resp
                        .headers()
                        .get("ETag")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown")
                        .to_string(),
                })
            }
            status => {
                let body = resp
                    .text()
                    .await
                    .unwrap_or_else(|_| "unable to read response body".to_string());
                Err(CalDavError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Adds If-Match header for conditional updates.
    pub fn if_match(req: RequestBuilder, etag: &ETag) -> RequestBuilder {
        req.header("If-Match", etag.as_str())
    }

    /// Adds If-None-Match header for conditional creation.
    pub fn if_none_match(req: RequestBuilder, etag: &ETag) -> RequestBuilder {
        req.header("If-None-Match", etag.as_str())
    }

    /// Extracts `ETag` from response headers.
    ///
    /// # Errors
    ///
    /// Returns an error if the `ETag` header is missing.
    pub fn extract_etag(resp: &Response) -> Result<ETag, CalDavError> {
        resp.headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .map(|s| ETag::new(s.to_string()))
            .ok_or_else(|| CalDavError::InvalidResponse("missing ETag header".to_string()))
    }
}
