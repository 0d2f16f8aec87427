mod news;

pub use news::{Keyword, NewNewsItem, NewsItem, Source};
