use std::fmt;
use std::ops::Range;

use regex::{Regex, RegexBuilder};
use roxmltree::{Document, Node, ParsingOptions};

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="utf-8"?>"#;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorKind {
    ParseRejected,
    MissingChannel,
    DuplicateChannel,
    MissingTitle { position: usize },
    ContradictoryFilter,
    Matcher,
}

impl fmt::Display for FilterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseRejected => f.write_str("feed document rejected by the xml parser"),
            Self::MissingChannel => f.write_str("feed document has no channel"),
            Self::DuplicateChannel => f.write_str("feed document has more than one channel"),
            Self::MissingTitle { position } => write!(f, "item {position} has no title"),
            Self::ContradictoryFilter => {
                f.write_str("empty name mixed with non-empty names in filter")
            }
            Self::Matcher => f.write_str("name matcher could not be built"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("filtering failed: {kind}")]
pub struct FilterError {
    kind: FilterErrorKind,
    #[source]
    cause: Option<BoxedCause>,
}

impl FilterError {
    fn new(kind: FilterErrorKind) -> Self {
        Self { kind, cause: None }
    }

    fn with_cause(kind: FilterErrorKind, cause: impl Into<BoxedCause>) -> Self {
        Self {
            kind,
            cause: Some(cause.into()),
        }
    }

    pub fn kind(&self) -> FilterErrorKind {
        self.kind
    }
}

#[derive(Debug, Clone)]
pub struct NameMatcher {
    pattern: Option<Regex>,
}

impl NameMatcher {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, FilterError> {
        let has_empty = names.iter().any(|name| name.as_ref().is_empty());
        let literals: Vec<String> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !name.is_empty())
            .map(regex::escape)
            .collect();

        if literals.is_empty() {
            return Ok(Self { pattern: None });
        }
        if has_empty {
            return Err(FilterError::new(FilterErrorKind::ContradictoryFilter));
        }

        let pattern = RegexBuilder::new(&literals.join("|"))
            .case_insensitive(true)
            .build()
            .map_err(|error| FilterError::with_cause(FilterErrorKind::Matcher, error))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn matches_nothing(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn is_match(&self, title: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(title))
    }
}

pub fn filter_writeups<S: AsRef<str>>(feed: &str, names: &[S]) -> Result<String, FilterError> {
    let matcher = NameMatcher::new(names)?;
    filter_with_matcher(feed, &matcher)
}

pub fn filter_writeups_bytes<S: AsRef<str>>(
    feed: &[u8],
    names: &[S],
) -> Result<String, FilterError> {
    let text = std::str::from_utf8(feed)
        .map_err(|error| FilterError::with_cause(FilterErrorKind::ParseRejected, error))?;
    filter_writeups(text, names)
}

pub fn filter_with_matcher(feed: &str, matcher: &NameMatcher) -> Result<String, FilterError> {
    let options = ParsingOptions {
        allow_dtd: false,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(feed, options)
        .map_err(|error| FilterError::with_cause(FilterErrorKind::ParseRejected, error))?;

    let root = doc.root_element();
    let mut channels = root
        .children()
        .filter(|node| is_plain_element(node, "channel"));
    let channel = channels
        .next()
        .ok_or_else(|| FilterError::new(FilterErrorKind::MissingChannel))?;
    if channels.next().is_some() {
        return Err(FilterError::new(FilterErrorKind::DuplicateChannel));
    }

    let mut removed = Vec::new();
    let mut kept = 0_usize;
    let items = channel
        .children()
        .filter(|node| is_plain_element(node, "item"));
    for (position, item) in items.enumerate() {
        let title = item
            .children()
            .find(|node| is_plain_element(node, "title"))
            .map(title_text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| FilterError::new(FilterErrorKind::MissingTitle { position }))?;
        if matcher.is_match(&title) {
            kept += 1;
        } else {
            removed.push(removal_range(item));
        }
    }
    tracing::debug!(kept, removed = removed.len(), "filtered feed items");

    let root_range = root.range();
    let mut output = String::with_capacity(XML_DECLARATION.len() + 1 + root_range.len());
    output.push_str(XML_DECLARATION);
    output.push('\n');
    // Stylesheet instructions and comments ahead of the root survive.
    let prolog_start = doc
        .root()
        .first_child()
        .filter(|node| *node != root)
        .map_or(root_range.start, |node| node.range().start);
    let mut cursor = prolog_start;
    for range in removed {
        output.push_str(&feed[cursor..range.start]);
        cursor = range.end;
    }
    output.push_str(&feed[cursor..root_range.end]);
    Ok(output)
}

// Comments inside a title split its text; the pieces are read as one.
fn title_text(title: Node<'_, '_>) -> String {
    title
        .descendants()
        .filter(Node::is_text)
        .filter_map(|node| node.text())
        .collect()
}

fn is_plain_element(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().namespace().is_none() && node.tag_name().name() == name
}

// The indentation in front of a dropped item goes with it.
fn removal_range(item: Node<'_, '_>) -> Range<usize> {
    let end = item.range().end;
    let start = item
        .prev_sibling()
        .filter(|node| node.is_text() && node.text().is_some_and(|text| text.trim().is_empty()))
        .map(|node| node.range().start)
        .unwrap_or_else(|| item.range().start);
    start..end
}
