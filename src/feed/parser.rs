use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{AppError, Result};

/// One `<item>` of an RSS document. Every field is required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published: String,
}

/// Parse an RSS 2.0 document into its items.
///
/// An item lacking any of `title`, `description`, `link` or `pubDate`
/// fails the whole document rather than yielding a partial record. An
/// element that is present but empty yields an empty string.
///
/// The text is always read as UTF-8; an `encoding` in the XML
/// declaration is ignored.
pub fn parse_feed(raw: &str) -> Result<Vec<FeedItem>> {
    let raw = raw.trim_start_matches('\u{feff}').trim_start();
    let mut reader = Reader::from_str(raw);

    let mut items = Vec::new();
    let mut seen_root = false;
    let mut current: Option<ItemBuilder> = None;
    // Nesting below the open <item>; 1 is a direct child
    let mut depth = 0usize;
    let mut capture: Option<Field> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            AppError::Parse(format!(
                "XML error at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.name();
                check_root(&mut seen_root, name.as_ref())?;

                if let Some(builder) = current.as_mut() {
                    depth += 1;
                    if depth == 1 {
                        // first occurrence of a field wins
                        capture = Field::from_tag(name.as_ref())
                            .filter(|field| builder.slot(*field).is_none());
                        if let Some(field) = capture {
                            *builder.slot(field) = Some(String::new());
                        }
                    }
                } else if name.as_ref() == b"item" {
                    current = Some(ItemBuilder::default());
                    depth = 0;
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                check_root(&mut seen_root, name.as_ref())?;

                if let Some(builder) = current.as_mut() {
                    if depth == 0 {
                        if let Some(field) = Field::from_tag(name.as_ref()) {
                            builder.slot(field).get_or_insert_with(String::new);
                        }
                    }
                } else if name.as_ref() == b"item" {
                    items.push(ItemBuilder::default().build()?);
                }
            }
            Event::End(_) if current.is_some() => {
                if depth == 0 {
                    if let Some(builder) = current.take() {
                        items.push(builder.build()?);
                    }
                } else {
                    depth -= 1;
                    if depth == 0 {
                        capture = None;
                    }
                }
            }
            Event::Text(e) => {
                if let (Some(builder), Some(field)) = (current.as_mut(), capture) {
                    // Unknown entities such as &nbsp; are kept as written
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    append(builder.slot(field), &text);
                }
            }
            Event::CData(e) => {
                if let (Some(builder), Some(field)) = (current.as_mut(), capture) {
                    append(builder.slot(field), &String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => {
                if current.is_some() {
                    return Err(AppError::Parse(
                        "document ends inside an <item>".to_string(),
                    ));
                }
                if !seen_root {
                    return Err(AppError::Parse("no <rss> element found".to_string()));
                }
                break;
            }
            _ => {}
        }
    }

    Ok(items)
}

fn check_root(seen_root: &mut bool, name: &[u8]) -> Result<()> {
    if !*seen_root {
        if name != b"rss" {
            return Err(AppError::Parse(format!(
                "expected <rss> root element, found <{}>",
                String::from_utf8_lossy(name)
            )));
        }
        *seen_root = true;
    }
    Ok(())
}

fn append(slot: &mut Option<String>, text: &str) {
    slot.get_or_insert_with(String::new).push_str(text);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    Link,
    PubDate,
}

impl Field {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Field::Title),
            b"description" => Some(Field::Description),
            b"link" => Some(Field::Link),
            b"pubDate" => Some(Field::PubDate),
            _ => None,
        }
    }
}

#[derive(Default)]
struct ItemBuilder {
    title: Option<String>,
    description: Option<String>,
    link: Option<String>,
    published: Option<String>,
}

impl ItemBuilder {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::Link => &mut self.link,
            Field::PubDate => &mut self.published,
        }
    }

    fn build(self) -> Result<FeedItem> {
        Ok(FeedItem {
            title: self.title.ok_or(AppError::MissingField { field: "title" })?,
            description: self
                .description
                .ok_or(AppError::MissingField { field: "description" })?,
            link: self.link.ok_or(AppError::MissingField { field: "link" })?,
            published: self
                .published
                .ok_or(AppError::MissingField { field: "pubDate" })?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Example</title>
    <link>http://x/</link>
    <description>Example feed</description>
    {items}
  </channel>
</rss>"#
        )
    }

    #[test]
    fn parses_all_fields() {
        let raw = document(
            r#"<item>
                <title>A raises funding</title>
                <description>Series A round</description>
                <link>http://x/1</link>
                <pubDate>2024-01-01</pubDate>
            </item>
            <item>
                <title>Б новости</title>
                <description><![CDATA[<p>html body</p>]]></description>
                <link>http://x/2</link>
                <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
            </item>"#,
        );

        let items = parse_feed(&raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            FeedItem {
                title: "A raises funding".to_string(),
                description: "Series A round".to_string(),
                link: "http://x/1".to_string(),
                published: "2024-01-01".to_string(),
            }
        );
        assert_eq!(items[1].title, "Б новости");
        assert_eq!(items[1].description, "<p>html body</p>");
        assert_eq!(items[1].published, "Mon, 01 Jan 2024 10:00:00 +0000");
    }

    #[test]
    fn tolerates_leading_bom_and_whitespace() {
        let raw = format!("\u{feff}\n\n   {}", document(""));
        assert!(parse_feed(&raw).unwrap().is_empty());
    }

    #[test]
    fn missing_field_fails_whole_document() {
        let raw = document(
            r#"<item>
                <title>ok</title>
                <description>d</description>
                <link>http://x/1</link>
                <pubDate>2024-01-01</pubDate>
            </item>
            <item>
                <title>no date</title>
                <description>d</description>
                <link>http://x/2</link>
            </item>"#,
        );

        match parse_feed(&raw) {
            Err(AppError::MissingField { field }) => assert_eq!(field, "pubDate"),
            other => panic!("expected missing pubDate, got {other:?}"),
        }
    }

    #[test]
    fn empty_elements_are_kept_as_empty_strings() {
        let raw = document(
            r#"<item>
                <title></title>
                <description/>
                <link>http://x/1</link>
                <pubDate>2024-01-01</pubDate>
            </item>"#,
        );

        let items = parse_feed(&raw).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "");
        assert_eq!(items[0].description, "");
        assert_eq!(items[0].link, "http://x/1");
    }

    #[test]
    fn declared_encoding_is_ignored() {
        let raw = r#"<?xml version="1.0" encoding="windows-1251"?>
<rss version="2.0"><channel><title>Лента</title>
<item>
  <title>Привет funding</title>
  <description>д</description>
  <link>http://x/1</link>
  <pubDate>2024-01-01</pubDate>
</item>
</channel></rss>"#;

        let items = parse_feed(raw).unwrap();
        assert_eq!(items[0].title, "Привет funding");
        assert_eq!(items[0].description, "д");
    }

    #[test]
    fn unescapes_text_and_ignores_prefixed_links() {
        let raw = document(
            r#"<item>
                <title>Q&amp;A: funding</title>
                <description>caf&#233; &nbsp;menu</description>
                <atom:link href="http://x/self" rel="self"/>
                <link>http://x/1</link>
                <pubDate>2024-01-01</pubDate>
            </item>"#,
        );

        let items = parse_feed(&raw).unwrap();
        assert_eq!(items[0].title, "Q&A: funding");
        assert_eq!(items[0].link, "http://x/1");
        assert!(items[0].description.starts_with("caf"));
    }

    #[test]
    fn rejects_non_rss() {
        assert!(matches!(
            parse_feed("<html><body>not a feed</body></html>"),
            Err(AppError::Parse(_))
        ));
        assert!(matches!(parse_feed("not xml at all"), Err(AppError::Parse(_))));
    }

    #[test]
    fn rejects_truncated_document() {
        let raw = r#"<rss version="2.0"><channel><item><title>cut"#;
        assert!(parse_feed(raw).is_err());
    }
}
