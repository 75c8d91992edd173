//! Recognition of messaging-platform links inside forum post bodies.
//!
//! Three shapes are recognised: bare `t.me`/`telegram.me` URLs, the forum's
//! `[MEDIA=telegram]...[/MEDIA]` embed tag, and the rendered
//! `data-telegram-post="..."` attribute. Every match is normalised to
//! `https://t.me/<channel>[/<message-index>]`.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

pub const CANONICAL_HOST: &str = "t.me";

/// Channel handle plus optional message index parsed from a canonical link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkTarget {
    pub channel: String,
    pub message_id: Option<i64>,
}

impl LinkTarget {
    /// Peer reference understood by the messaging client.
    pub fn peer(&self) -> String {
        format!("@{}", self.channel)
    }
}

impl std::fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message_id {
            Some(id) => write!(f, "@{}/{}", self.channel, id),
            None => write!(f, "@{}", self.channel),
        }
    }
}

fn extraction_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?i)https?://(?:www\.)?(?:t\.me|telegram\.me)/([a-z0-9_]+(?:/\d+)?)")
                .expect("bare link pattern is valid"),
            Regex::new(r"(?i)\[MEDIA=telegram\]([a-z0-9_]+(?:/\d+)?)\[/MEDIA\]")
                .expect("media tag pattern is valid"),
            Regex::new(r#"(?i)data-telegram-post="([a-z0-9_]+/\d+)""#)
                .expect("data attribute pattern is valid"),
        ]
    })
}

fn canonical_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"t\.me/([^/\s]+)(?:/(\d+))?").expect("canonical link pattern is valid")
    })
}

/// Extract every recognised link from `text`, normalised and deduplicated.
pub fn extract_links(text: &str) -> Vec<String> {
    let mut links = BTreeSet::new();
    for pattern in extraction_patterns() {
        for captures in pattern.captures_iter(text) {
            if let Some(path) = captures.get(1) {
                links.insert(format!("https://{}/{}", CANONICAL_HOST, path.as_str()));
            }
        }
    }
    links.into_iter().collect()
}

/// Parse a canonical link back into its channel and optional message index.
///
/// Returns `None` when the link does not have the expected shape or the
/// message index does not fit in an `i64`.
pub fn parse_link(link: &str) -> Option<LinkTarget> {
    let captures = canonical_pattern().captures(link)?;
    let channel = captures.get(1)?.as_str().to_string();
    let message_id = match captures.get(2) {
        Some(index) => Some(index.as_str().parse::<i64>().ok()?),
        None => None,
    };

    Some(LinkTarget {
        channel,
        message_id,
    })
}
