mod fetcher;
mod parser;

pub use fetcher::{Fetch, FeedFetcher, FetchedFeed};
pub use parser::{parse_feed, FeedItem};
