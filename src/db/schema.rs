pub const SCHEMA: &str = r#"
-- sources table
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE
);

-- keywords table
CREATE TABLE IF NOT EXISTS keywords (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    word TEXT NOT NULL UNIQUE
);

-- news table (source is the polled url, deliberately not a foreign key)
CREATE TABLE IF NOT EXISTS news (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    link TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    published TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_news_published ON news(published DESC);
CREATE INDEX IF NOT EXISTS idx_news_title ON news(title);
"#;
