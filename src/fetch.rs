use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};

use crate::config::Credentials;
use crate::domain::ProfileId;
use crate::error::{FetchError, RankscanError};

/// Source of profile documents. One call per id, no retries.
pub trait ProfileFetcher: Send + Sync {
    fn fetch(&self, id: ProfileId) -> Result<String, FetchError>;

    /// Locator recorded next to the rank in the output artifact.
    fn reference(&self, id: ProfileId) -> String;
}

impl<T: ProfileFetcher + ?Sized> ProfileFetcher for &T {
    fn fetch(&self, id: ProfileId) -> Result<String, FetchError> {
        (**self).fetch(id)
    }

    fn reference(&self, id: ProfileId) -> String {
        (**self).reference(id)
    }
}

#[derive(Debug, Clone)]
pub struct ProfileHttpClient {
    client: Client,
    base_url: String,
}

impl ProfileHttpClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, RankscanError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("rankscan/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| RankscanError::HttpClient(err.to_string()))?,
        );
        let mut cookie = HeaderValue::from_str(&credentials.cookie_header())
            .map_err(|err| RankscanError::HttpClient(format!("invalid credentials: {err}")))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| RankscanError::HttpClient(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn profile_url(&self, id: ProfileId) -> String {
        id.reference(&self.base_url)
    }
}

impl ProfileFetcher for ProfileHttpClient {
    fn fetch(&self, id: ProfileId) -> Result<String, FetchError> {
        let url = self.profile_url(id);
        let request = self
            .client
            .get(&url)
            .build()
            .map_err(|err| FetchError::Request(err.to_string()))?;
        let response = self
            .client
            .execute(request)
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
            });
        }
        response
            .text()
            .map_err(|err| FetchError::Body(err.to_string()))
    }

    fn reference(&self, id: ProfileId) -> String {
        self.profile_url(id)
    }
}
