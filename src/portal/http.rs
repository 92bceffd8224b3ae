//! reqwest-backed `PortalSession`.
//!
//! Sends the same headers the portal's own SPA sends (XHR marker, JSON
//! accept, bearer token, session cookie) and appends the `_` cache-buster
//! the SPA uses. Login is handled elsewhere; this type only replays the
//! credentials it was given.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, COOKIE, RETRY_AFTER};
use url::Url;

use super::{PortalSession, RawResponse};
use crate::error::PortalError;
use crate::types::PortalConfig;

/// Page that only renders for a logged-in staff user.
const LIVENESS_PATH: &str = "/action/Dashboard";

pub struct HttpPortalSession {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPortalSession {
    pub fn new(config: &PortalConfig) -> Result<Self, PortalError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| PortalError::InvalidUrl(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        if let Some(token) = config.bearer_token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| PortalError::NotAuthenticated)?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(cookie) = config.cookie.as_deref() {
            let value = HeaderValue::from_str(cookie).map_err(|_| PortalError::NotAuthenticated)?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self { client, base_url })
    }

    fn url_for(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, PortalError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| PortalError::InvalidUrl(format!("{}: {}", path, e)))?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params {
                query.append_pair(key, value);
            }
            query.append_pair("_", &chrono::Utc::now().timestamp_millis().to_string());
        }
        Ok(url)
    }
}

#[async_trait]
impl PortalSession for HttpPortalSession {
    async fn fetch(&self, path: &str, params: &[(&str, &str)]) -> Result<RawResponse, PortalError> {
        let url = self.url_for(path, params)?;
        log::debug!("portal GET {}", url.path());

        let resp = self.client.get(url).send().await?;
        let status = resp.status().as_u16();
        let retry_after_secs = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = resp.text().await?;

        Ok(RawResponse {
            status,
            body,
            retry_after_secs,
        })
    }

    async fn is_alive(&self) -> bool {
        let url = match self.url_for(LIVENESS_PATH, &[]) {
            Ok(url) => url,
            Err(_) => return false,
        };
        match self.client.get(url).send().await {
            // An expired session is redirected to the login page
            Ok(resp) => resp.status().is_success() && !resp.url().path().contains("Login"),
            Err(e) => {
                log::warn!("portal liveness check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> PortalConfig {
        PortalConfig {
            base_url: base.to_string(),
            bearer_token: Some("tok".to_string()),
            cookie: None,
            timeout_secs: 5,
            max_attempts: 2,
        }
    }

    #[test]
    fn test_url_for_joins_path_and_params() {
        let session = HttpPortalSession::new(&config("https://portal.example")).expect("session");
        let url = session
            .url_for("/action/UserSuggest/attendee-search", &[("keyword", "Dennis Rost")])
            .expect("url");
        assert_eq!(url.path(), "/action/UserSuggest/attendee-search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("keyword".to_string(), "Dennis Rost".to_string()));
        assert_eq!(pairs[1].0, "_");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(matches!(
            HttpPortalSession::new(&config("not a url")),
            Err(PortalError::InvalidUrl(_))
        ));
    }
}
