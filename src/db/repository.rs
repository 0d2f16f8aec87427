use rusqlite::{params, ErrorCode, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{Keyword, NewNewsItem, NewsItem, Source};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Source operations

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, url FROM sources ORDER BY id")?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    /// Fails with [`AppError::DuplicateKey`] when the url is already stored.
    pub async fn add_source(&self, url: &str) -> Result<i64> {
        let value = url.to_string();
        let id = self
            .conn
            .call(move |conn| {
                insert_unique(conn, "INSERT INTO sources (url) VALUES (?1)", &value)
            })
            .await?;

        id.ok_or_else(|| AppError::DuplicateKey {
            table: "sources",
            value: url.to_string(),
        })
    }

    pub async fn delete_source(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM sources WHERE url = ?1", params![url])?;
                Ok(n > 0)
            })
            .await?;
        Ok(removed)
    }

    // Keyword operations

    pub async fn list_keywords(&self) -> Result<Vec<Keyword>> {
        let keywords = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, word FROM keywords ORDER BY id")?;
                let keywords = stmt
                    .query_map([], keyword_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(keywords)
            })
            .await?;
        Ok(keywords)
    }

    /// Fails with [`AppError::DuplicateKey`] when the word is already stored.
    pub async fn add_keyword(&self, word: &str) -> Result<i64> {
        let value = word.to_string();
        let id = self
            .conn
            .call(move |conn| {
                insert_unique(conn, "INSERT INTO keywords (word) VALUES (?1)", &value)
            })
            .await?;

        id.ok_or_else(|| AppError::DuplicateKey {
            table: "keywords",
            value: word.to_string(),
        })
    }

    pub async fn delete_keyword(&self, word: &str) -> Result<bool> {
        let word = word.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM keywords WHERE word = ?1", params![word])?;
                Ok(n > 0)
            })
            .await?;
        Ok(removed)
    }

    // News operations

    pub async fn list_all_news_titles(&self) -> Result<Vec<String>> {
        let titles = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT title FROM news")?;
                let titles = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(titles)
            })
            .await?;
        Ok(titles)
    }

    /// Fails with [`AppError::DuplicateKey`] when an item with the same link exists.
    pub async fn insert_news(&self, item: NewNewsItem) -> Result<i64> {
        let link = item.link.clone();
        let id = self
            .conn
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT INTO news (title, description, link, source, published) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![item.title, item.description, item.link, item.source, item.published],
                );
                match result {
                    Ok(_) => Ok(Some(conn.last_insert_rowid())),
                    Err(e) if is_constraint_violation(&e) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        id.ok_or(AppError::DuplicateKey {
            table: "news",
            value: link,
        })
    }

    /// Most recent news first, ordered by the raw `published` text.
    pub async fn list_recent_news(&self, limit: usize) -> Result<Vec<NewsItem>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let news = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, title, description, link, source, published
                       FROM news
                       ORDER BY published DESC, id DESC
                       LIMIT ?1"#,
                )?;
                let news = stmt
                    .query_map(params![limit], news_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(news)
            })
            .await?;
        Ok(news)
    }
}

/// Runs a single-value insert, returning `None` when a uniqueness constraint rejects it.
fn insert_unique(
    conn: &mut rusqlite::Connection,
    sql: &str,
    value: &str,
) -> tokio_rusqlite::Result<Option<i64>> {
    match conn.execute(sql, params![value]) {
        Ok(_) => Ok(Some(conn.last_insert_rowid())),
        Err(e) if is_constraint_violation(&e) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    Ok(Source {
        id: row.get(0)?,
        url: row.get(1)?,
    })
}

fn keyword_from_row(row: &Row) -> rusqlite::Result<Keyword> {
    Ok(Keyword {
        id: row.get(0)?,
        word: row.get(1)?,
    })
}

fn news_from_row(row: &Row) -> rusqlite::Result<NewsItem> {
    Ok(NewsItem {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        link: row.get(3)?,
        source: row.get(4)?,
        published: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn news(title: &str, link: &str, published: &str) -> NewNewsItem {
        NewNewsItem {
            title: title.to_string(),
            description: "desc".to_string(),
            link: link.to_string(),
            source: "http://feed.example/rss".to_string(),
            published: published.to_string(),
        }
    }

    #[tokio::test]
    async fn sources_are_unique() {
        let repo = Repository::open_in_memory().await.unwrap();

        assert_ok!(repo.add_source("http://a.example/rss").await);
        let err = repo.add_source("http://a.example/rss").await.unwrap_err();
        assert!(err.is_duplicate_key());

        let sources = repo.list_sources().await.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].url, "http://a.example/rss");
    }

    #[tokio::test]
    async fn keywords_add_and_delete() {
        let repo = Repository::open_in_memory().await.unwrap();

        assert_ok!(repo.add_keyword("funding").await);
        assert_ok!(repo.add_keyword("merger").await);
        assert!(repo.add_keyword("funding").await.unwrap_err().is_duplicate_key());

        assert!(repo.delete_keyword("funding").await.unwrap());
        assert!(!repo.delete_keyword("funding").await.unwrap());

        let words: Vec<_> = repo
            .list_keywords()
            .await
            .unwrap()
            .into_iter()
            .map(|k| k.word)
            .collect();
        assert_eq!(words, vec!["merger"]);
    }

    #[tokio::test]
    async fn news_link_is_unique() {
        let repo = Repository::open_in_memory().await.unwrap();

        assert_ok!(repo.insert_news(news("A", "http://x/1", "2024-01-01")).await);
        let err = repo
            .insert_news(news("B", "http://x/1", "2024-01-02"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate_key());

        assert_eq!(repo.list_all_news_titles().await.unwrap(), vec!["A"]);
    }

    #[tokio::test]
    async fn recent_news_is_ordered_and_limited() {
        let repo = Repository::open_in_memory().await.unwrap();
        repo.insert_news(news("old", "http://x/1", "2024-01-01")).await.unwrap();
        repo.insert_news(news("new", "http://x/2", "2024-03-01")).await.unwrap();
        repo.insert_news(news("mid", "http://x/3", "2024-02-01")).await.unwrap();

        let recent = repo.list_recent_news(2).await.unwrap();
        let titles: Vec<_> = recent.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn news_survives_source_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feeds.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();

        repo.add_source("http://feed.example/rss").await.unwrap();
        repo.insert_news(news("A", "http://x/1", "2024-01-01")).await.unwrap();
        assert!(repo.delete_source("http://feed.example/rss").await.unwrap());

        assert!(repo.list_sources().await.unwrap().is_empty());
        assert_eq!(repo.list_recent_news(10).await.unwrap().len(), 1);
    }
}
