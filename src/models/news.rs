use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub word: String,
}

/// A persisted feed entry that matched at least one keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub link: String,
    /// Url of the feed the item was pulled from.
    pub source: String,
    /// Raw `pubDate` text, in whatever format the feed uses.
    pub published: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNewsItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub source: String,
    pub published: String,
}
