use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use crate::{Error, Result, DEFAULT_BASE_URL, DEFAULT_PAGE_SIZE};

/// Query parameter carrying the number of rows per page.
const PAGE_SIZE_PARAM: &str = "aantal";
/// Query parameter carrying the 1-based page number.
const PAGE_NUM_PARAM: &str = "pagina";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    pub page_size: usize,
    pub request_timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Why a single page could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    HttpStatus(u16),
    Network,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            FetchErrorKind::Network => write!(f, "network error"),
        }
    }
}

/// A transient, per-page failure. The harvest loop skips the page and moves on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Something that can hand out the raw HTML of a listing page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Makes exactly one attempt at fetching `page_num`.
    async fn fetch_page(&self, page_num: usize) -> core::result::Result<String, FetchError>;
}

/// Fetches listing pages over HTTP with a single shared `Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    base_url: Url,
    page_size: usize,
}

impl ReqwestFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url).map_err(|err| Error::InvalidBaseUrl {
            url: settings.base_url.clone(),
            reason: err.to_string(),
        })?;
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            page_size: settings.page_size,
        })
    }

    pub fn page_url(&self, page_num: usize) -> Url {
        page_url(&self.base_url, self.page_size, page_num)
    }
}

/// Embeds the page size and page number as query parameters on `base_url`.
/// Query parameters already present on `base_url` are kept.
pub fn page_url(base_url: &Url, page_size: usize, page_num: usize) -> Url {
    let mut url = base_url.clone();
    url.query_pairs_mut()
        .append_pair(PAGE_SIZE_PARAM, &page_size.to_string())
        .append_pair(PAGE_NUM_PARAM, &page_num.to_string());
    url
}

#[async_trait]
impl PageFetcher for ReqwestFetcher {
    /// Requests a page and returns its body as text.
    /// Bytes that aren't valid UTF-8 are replaced rather than rejected.
    async fn fetch_page(&self, page_num: usize) -> core::result::Result<String, FetchError> {
        let res = self
            .client
            .get(self.page_url(page_num))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FetchErrorKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = res.bytes().await.map_err(map_reqwest_error)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FetchErrorKind::Timeout, err.to_string());
    }
    FetchError::new(FetchErrorKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_url_embeds_size_and_number() {
        let base = Url::parse("https://www.p2000-online.net/p2000.py").unwrap();
        let url = page_url(&base, 50, 3);
        assert_eq!(
            url.as_str(),
            "https://www.p2000-online.net/p2000.py?aantal=50&pagina=3"
        );
    }

    #[test]
    fn page_url_keeps_existing_query() {
        let base = Url::parse("http://localhost/list?regio=7").unwrap();
        let url = page_url(&base, 10, 1);
        assert_eq!(url.query(), Some("regio=7&aantal=10&pagina=1"));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let settings = FetchSettings {
            base_url: "not a url".into(),
            ..FetchSettings::default()
        };
        let err = ReqwestFetcher::new(&settings).unwrap_err();
        assert!(matches!(err, Error::InvalidBaseUrl { .. }));
    }
}
