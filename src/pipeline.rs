//! Per-source ingestion: fetch, parse, keyword-filter, dedupe by title, persist.

use std::collections::HashSet;

use crate::db::Repository;
use crate::error::Result;
use crate::feed::{parse_feed, FeedItem, Fetch};
use crate::models::{Keyword, NewNewsItem};

/// Case-insensitive substring filter over item title and description.
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    words: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// True as soon as any keyword is found; the rest are not checked.
    pub fn matches(&self, item: &FeedItem) -> bool {
        let title = item.title.to_lowercase();
        let description = item.description.to_lowercase();
        self.words
            .iter()
            .any(|w| title.contains(w.as_str()) || description.contains(w.as_str()))
    }
}

impl From<&[Keyword]> for KeywordSet {
    fn from(keywords: &[Keyword]) -> Self {
        Self::new(keywords.iter().map(|k| &k.word))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Server answered with something other than 200; nothing was parsed.
    Skipped { status: u16 },
    Ingested {
        parsed: usize,
        matched: usize,
        inserted: usize,
    },
}

/// Check one source against the keyword set and store new matching items.
///
/// Fetch and parse errors are returned to the caller. A storage-level
/// duplicate link is logged and skipped.
pub async fn check_source<F: Fetch>(
    repository: &Repository,
    fetcher: &F,
    url: &str,
    keywords: &KeywordSet,
) -> Result<SourceOutcome> {
    let fetched = fetcher.fetch(url).await?;
    if !fetched.is_ok() {
        tracing::debug!("Skipping {}: HTTP {}", url, fetched.status);
        return Ok(SourceOutcome::Skipped {
            status: fetched.status,
        });
    }

    let items = parse_feed(&fetched.body)?;

    // Snapshot of every stored title, grown as this run accepts items so
    // repeated titles within one pull are rejected too.
    let mut seen_titles: HashSet<String> =
        repository.list_all_news_titles().await?.into_iter().collect();

    let parsed = items.len();
    let mut matched = 0;
    let mut inserted = 0;

    for item in items {
        if !keywords.matches(&item) {
            continue;
        }
        matched += 1;

        if seen_titles.contains(&item.title) {
            continue;
        }

        let title = item.title.clone();
        let news = NewNewsItem {
            title: item.title,
            description: item.description,
            link: item.link,
            source: url.to_string(),
            published: item.published,
        };

        match repository.insert_news(news).await {
            Ok(_) => {
                tracing::debug!("Stored {:?} from {}", title, url);
                seen_titles.insert(title);
                inserted += 1;
            }
            Err(e) if e.is_duplicate_key() => {
                tracing::debug!("Ignoring {:?} from {}: {}", title, url, e);
            }
            Err(e) => return Err(e),
        }
    }

    Ok(SourceOutcome::Ingested {
        parsed,
        matched,
        inserted,
    })
}
