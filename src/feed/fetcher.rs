use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::config::Config;
use crate::error::Result;

/// Raw feed document as returned by the server.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub status: u16,
    pub body: String,
}

impl FetchedFeed {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Retrieves the raw document behind a source url.
///
/// Only network-level failures are errors; any HTTP status is a successful fetch.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedFeed>> + Send;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client })
    }
}

impl Fetch for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();

        // Always decode as UTF-8, whatever charset the server declares
        let bytes = response.bytes().await?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        tracing::debug!("Fetched {} ({} bytes, HTTP {})", url, bytes.len(), status);
        Ok(FetchedFeed { status, body })
    }
}
