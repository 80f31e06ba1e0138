use std::borrow::Cow;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// Maximum element nesting accepted in a feed document
const MAX_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum FeedParseError {
    #[error("Malformed XML: {0}")]
    Xml(String),
    #[error("Document is not an RSS feed: no <rss><channel> element")]
    MissingChannel,
    #[error("Document ended before all elements were closed")]
    Truncated,
    #[error("Document nesting exceeds maximum depth of {0}")]
    MaxDepthExceeded(usize),
}

/// A parsed RSS channel. Lives only for the duration of one ingestion cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub items: Vec<FeedItem>,
}

/// One `<item>` in document order. `pub_date` is the raw, unnormalized text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

/// Which text field the reader is currently inside
#[derive(Debug, Clone, Copy)]
enum Field {
    ChannelTitle,
    ChannelLink,
    ChannelDescription,
    ItemTitle,
    ItemLink,
    ItemDescription,
    ItemPubDate,
}

/// Parse an RSS 2.0 document.
///
/// Only unprefixed `title`, `link`, `description` and `pubDate` children are
/// read, so namespaced siblings such as `<atom:link>` are ignored. Every title
/// and description is HTML-unescaped once after XML decoding, since feeds
/// routinely double-encode entities.
pub fn parse_feed(content: &str) -> Result<FeedDocument, FeedParseError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations. Entity
    // references are resolved only by `decode_entities()` below.
    let mut reader = Reader::from_str(content);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut document: Option<FeedDocument> = None;
    let mut item: Option<FeedItem> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.name().as_ref().to_vec();
                stack.push(name);
                if stack.len() > MAX_DEPTH {
                    return Err(FeedParseError::MaxDepthExceeded(MAX_DEPTH));
                }

                field = None;
                match path_of(&stack).as_slice() {
                    [b"rss", b"channel"] => {
                        document.get_or_insert_with(FeedDocument::default);
                    }
                    [b"rss", b"channel", b"item"] => item = Some(FeedItem::default()),
                    [b"rss", b"channel", leaf] => field = channel_field(leaf),
                    [b"rss", b"channel", b"item", leaf] => field = item_field(leaf),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if matches!(path_of(&stack).as_slice(), [b"rss", b"channel", b"item"]) {
                    if let (Some(doc), Some(done)) = (document.as_mut(), item.take()) {
                        doc.items.push(done);
                    }
                }
                stack.pop();
                field = None;
            }
            Ok(Event::Text(e)) => {
                let raw = String::from_utf8_lossy(&e);
                append(&mut document, &mut item, field, &decode_entities(&raw));
            }
            Ok(Event::CData(e)) => {
                let raw = String::from_utf8_lossy(&e);
                append(&mut document, &mut item, field, &raw);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(FeedParseError::Xml(e.to_string())),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(FeedParseError::Truncated);
    }

    let mut document = document.ok_or(FeedParseError::MissingChannel)?;
    unescape_fields(&mut document);
    Ok(document)
}

/// Element names on the stack as byte slices, for slice-pattern matching
fn path_of(stack: &[Vec<u8>]) -> Vec<&[u8]> {
    stack.iter().map(Vec::as_slice).collect()
}

fn channel_field(leaf: &[u8]) -> Option<Field> {
    match leaf {
        b"title" => Some(Field::ChannelTitle),
        b"link" => Some(Field::ChannelLink),
        b"description" => Some(Field::ChannelDescription),
        _ => None,
    }
}

fn item_field(leaf: &[u8]) -> Option<Field> {
    match leaf {
        b"title" => Some(Field::ItemTitle),
        b"link" => Some(Field::ItemLink),
        b"description" => Some(Field::ItemDescription),
        b"pubDate" => Some(Field::ItemPubDate),
        _ => None,
    }
}

fn append(
    document: &mut Option<FeedDocument>,
    item: &mut Option<FeedItem>,
    field: Option<Field>,
    text: &str,
) {
    let target = match (field, document.as_mut(), item.as_mut()) {
        (Some(Field::ChannelTitle), Some(doc), _) => &mut doc.title,
        (Some(Field::ChannelLink), Some(doc), _) => &mut doc.link,
        (Some(Field::ChannelDescription), Some(doc), _) => &mut doc.description,
        (Some(Field::ItemTitle), _, Some(it)) => &mut it.title,
        (Some(Field::ItemLink), _, Some(it)) => &mut it.link,
        (Some(Field::ItemDescription), _, Some(it)) => &mut it.description,
        (Some(Field::ItemPubDate), _, Some(it)) => &mut it.pub_date,
        _ => return,
    };
    target.push_str(text);
}

fn unescape_fields(document: &mut FeedDocument) {
    finish(&mut document.title, true);
    finish(&mut document.link, false);
    finish(&mut document.description, true);
    for item in &mut document.items {
        finish(&mut item.title, true);
        finish(&mut item.link, false);
        finish(&mut item.description, true);
        finish(&mut item.pub_date, false);
    }
}

/// Trim a completed field, then apply the HTML pass to human-readable text
fn finish(field: &mut String, html: bool) {
    let trimmed = field.trim();
    let done = if html {
        unescape_html(trimmed).into_owned()
    } else {
        trimmed.to_string()
    };
    *field = done;
}

/// Entity decoding of element text. Unknown references stay as written.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(raw)
}

/// Resolve HTML entities a single time.
///
/// Covers numeric references and the full HTML5 named entity table. Each
/// reference is decoded on its own, so a bare `&` or an unknown name leaves
/// only that spot untouched.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
    <title>Example Blog</title>
    <link>https://example.com/</link>
    <description>Posts about things</description>
    <atom:link href="https://example.com/index.xml" rel="self" type="application/rss+xml"/>
    <item>
        <title>First</title>
        <link>https://example.com/first</link>
        <description>The first post</description>
        <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
    <item>
        <title>Second</title>
        <link>https://example.com/second</link>
        <pubDate>Tue, 03 Jan 2006 15:04:05 -0700</pubDate>
        <guid>https://example.com/second</guid>
    </item>
</channel>
</rss>"#;

    #[test]
    fn test_parse_channel_and_items_in_order() {
        let doc = parse_feed(SAMPLE).unwrap();
        assert_eq!(doc.title, "Example Blog");
        assert_eq!(doc.link, "https://example.com/");
        assert_eq!(doc.description, "Posts about things");
        assert_eq!(doc.items.len(), 2);
        assert_eq!(
            doc.items[0],
            FeedItem {
                title: "First".to_string(),
                link: "https://example.com/first".to_string(),
                description: "The first post".to_string(),
                pub_date: "Mon, 02 Jan 2006 15:04:05 -0700".to_string(),
            }
        );
        assert_eq!(doc.items[1].title, "Second");
        assert_eq!(doc.items[1].description, "");
    }

    #[test]
    fn test_double_encoded_title_unescaped_once() {
        let xml = r#"<rss><channel><title>T</title>
            <item><title>&amp;amp;Example&amp;amp;</title><link>https://e.com/1</link></item>
        </channel></rss>"#;
        let doc = parse_feed(xml).unwrap();
        assert_eq!(doc.items[0].title, "&Example&");
    }

    #[test]
    fn test_cdata_title_unescaped_once() {
        let xml = r#"<rss><channel><title>T</title>
            <item><title><![CDATA[&amp;Example&amp;]]></title>
            <description><![CDATA[<p>Tom &amp;amp; Jerry</p>]]></description></item>
        </channel></rss>"#;
        let doc = parse_feed(xml).unwrap();
        assert_eq!(doc.items[0].title, "&Example&");
        // Only one pass: the inner &amp;amp; becomes &amp;, not &
        assert_eq!(doc.items[0].description, "<p>Tom &amp; Jerry</p>");
    }

    #[test]
    fn test_named_html_entities() {
        assert_eq!(unescape_html("Wait&hellip; &mdash; done"), "Wait\u{2026} \u{2014} done");
        assert_eq!(unescape_html("&#8217;quoted&#x2019;"), "\u{2019}quoted\u{2019}");
    }

    #[test]
    fn test_malformed_entity_kept_verbatim() {
        assert_eq!(unescape_html("AT&T rocks"), "AT&T rocks");
        assert_eq!(unescape_html("&bogus; entity"), "&bogus; entity");
    }

    #[test]
    fn test_mixed_valid_and_invalid_entities() {
        assert_eq!(unescape_html("AT&T &amp; Verizon"), "AT&T & Verizon");
        assert_eq!(unescape_html("Caf&eacute; &amp; Bar"), "Caf\u{e9} & Bar");
        assert_eq!(unescape_html("&bogus; &rarr; &lt;b&gt;"), "&bogus; \u{2192} <b>");
    }

    #[test]
    fn test_double_encoded_named_entities_in_item() {
        let xml = r#"<rss><channel><title>T</title>
            <item><title>Next &amp;rarr; &amp;amp;Example&amp;amp;</title>
            <description>Caf&amp;eacute; AT&amp;T</description></item>
        </channel></rss>"#;
        let doc = parse_feed(xml).unwrap();
        assert_eq!(doc.items[0].title, "Next \u{2192} &Example&");
        assert_eq!(doc.items[0].description, "Caf\u{e9} AT&T");
    }

    #[test]
    fn test_whitespace_between_text_pieces_kept() {
        let xml = r#"<rss><channel><title>T</title>
            <item><title>
                Hello <![CDATA[world]]> and <!-- note --> more
            </title></item>
        </channel></rss>"#;
        let doc = parse_feed(xml).unwrap();
        assert_eq!(doc.items[0].title, "Hello world and  more");
    }

    #[test]
    fn test_link_is_not_unescaped_twice() {
        let xml = r#"<rss><channel><item><link>https://e.com/?a=1&amp;amp;b=2</link></item></channel></rss>"#;
        let doc = parse_feed(xml).unwrap();
        assert_eq!(doc.items[0].link, "https://e.com/?a=1&amp;b=2");
    }

    #[test]
    fn test_empty_channel() {
        let doc = parse_feed(r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#)
            .unwrap();
        assert!(doc.items.is_empty());
    }

    #[test]
    fn test_malformed_xml_error() {
        assert!(parse_feed("<not valid xml").is_err());
        assert!(matches!(
            parse_feed("<rss><channel><item></channel></rss>"),
            Err(FeedParseError::Xml(_))
        ));
    }

    #[test]
    fn test_truncated_document() {
        assert!(parse_feed("<rss><channel><title>x</title>").is_err());
    }

    #[test]
    fn test_non_rss_document() {
        assert!(matches!(
            parse_feed("<html><body>Hello</body></html>"),
            Err(FeedParseError::MissingChannel)
        ));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let open = "<a>".repeat(MAX_DEPTH + 1);
        let close = "</a>".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            parse_feed(&format!("{}{}", open, close)),
            Err(FeedParseError::MaxDepthExceeded(_))
        ));
    }

    #[test]
    fn test_xxe_entity_not_expanded() {
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE rss [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<rss><channel><item><title>&xxe;</title></item></channel></rss>"#;
        let doc = parse_feed(xml).unwrap();
        assert_eq!(doc.items[0].title, "&xxe;");
    }
}
