use std::sync::Arc;

use url::Url;

use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::feed::FeedFetcher;
use crate::models::{Keyword, NewsItem, Source};
use crate::scheduler::{run_cycle, CycleReport, Scheduler, SchedulerHandle};

pub struct App {
    config: Config,
    repository: Arc<Repository>,
    fetcher: Arc<FeedFetcher>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        let fetcher = FeedFetcher::new(&config)?;

        Ok(Self {
            config,
            repository: Arc::new(repository),
            fetcher: Arc::new(fetcher),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // Sources

    /// Adding a url that is already configured is a no-op.
    pub async fn add_source(&self, url: &str) -> Result<()> {
        let url = validate_source_url(url)?;
        swallow_duplicate(self.repository.add_source(&url).await)
    }

    pub async fn remove_source(&self, url: &str) -> Result<bool> {
        self.repository.delete_source(url.trim()).await
    }

    pub async fn sources(&self) -> Result<Vec<Source>> {
        self.repository.list_sources().await
    }

    // Keywords

    /// Adding a keyword that is already configured is a no-op.
    pub async fn add_keyword(&self, word: &str) -> Result<()> {
        let word = word.trim();
        if word.is_empty() {
            return Err(AppError::Usage("keyword must not be empty".to_string()));
        }
        swallow_duplicate(self.repository.add_keyword(word).await)
    }

    pub async fn remove_keyword(&self, word: &str) -> Result<bool> {
        self.repository.delete_keyword(word.trim()).await
    }

    pub async fn keywords(&self) -> Result<Vec<Keyword>> {
        self.repository.list_keywords().await
    }

    // News

    pub async fn recent_news(&self, limit: Option<usize>) -> Result<Vec<NewsItem>> {
        let limit = limit.unwrap_or(self.config.recent_news_limit);
        self.repository.list_recent_news(limit).await
    }

    /// Run a single cycle in the foreground.
    pub async fn check_once(&self) -> Result<CycleReport> {
        run_cycle(&self.repository, self.fetcher.as_ref()).await
    }

    /// Start the repeating background check.
    pub fn start_scheduler(&self) -> SchedulerHandle {
        Scheduler::new(
            Arc::clone(&self.repository),
            Arc::clone(&self.fetcher),
            self.config.check_interval(),
        )
        .spawn()
    }
}

fn swallow_duplicate(result: Result<i64>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_duplicate_key() => {
            tracing::debug!("{}", e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Accept only absolute http(s) urls, returned as given (trimmed).
fn validate_source_url(url: &str) -> Result<String> {
    let url = url.trim();
    let parsed = Url::parse(url).map_err(|e| AppError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(url.to_string()),
        scheme => Err(AppError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme {scheme:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_app(dir: &tempfile::TempDir) -> App {
        let config = Config {
            db_path: dir.path().join("rss.db").to_string_lossy().to_string(),
            ..Config::default()
        };
        App::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_source_and_keyword_are_silent() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        app.add_source("https://news.example/rss").await.unwrap();
        app.add_source(" https://news.example/rss ").await.unwrap();
        app.add_keyword("funding").await.unwrap();
        app.add_keyword("funding").await.unwrap();

        assert_eq!(app.sources().await.unwrap().len(), 1);
        assert_eq!(app.keywords().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;

        assert!(matches!(
            app.add_source("not a url").await,
            Err(AppError::InvalidUrl { .. })
        ));
        assert!(matches!(
            app.add_source("ftp://files.example/feed.xml").await,
            Err(AppError::InvalidUrl { .. })
        ));
        assert!(matches!(app.add_keyword("   ").await, Err(AppError::Usage(_))));
    }

    #[tokio::test]
    async fn check_once_without_sources_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir).await;
        app.add_keyword("funding").await.unwrap();

        let report = app.check_once().await.unwrap();
        assert_eq!(report.sources_checked + report.sources_failed, 0);
        assert!(app.recent_news(None).await.unwrap().is_empty());
    }
}
