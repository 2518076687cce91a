//! Rendering of feed entries into chat messages.
//!
//! A message is an immutable list of [`Segment`]s in a fixed order:
//!
//! ```text
//! header, title, time
//! image (or placeholder)
//! link
//! ----------
//! commits | issue | issue comment | pull request | pull request comment
//! footer
//! ```
//!
//! Sections whose data was never requested are left out. Sections whose
//! lookup failed render a "no data" placeholder, and inside a section every
//! field falls back on its own.

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::config::ComposeConfig;
use crate::domain::{BinaryResource, FeedEntry};
use crate::enrich::{EnrichmentBundle, Slot};

pub const HEADER: &str = "GitHub feed update";
pub const FOOTER: &str = "from octofeed";
pub const SEPARATOR: &str = "----------";
pub const IMAGE_PLACEHOLDER: &str = "Image unavailable";
pub const NO_DATA: &str = "No data available";

const NO_TITLE: &str = "(no title)";
const NO_CONTENT: &str = "(no content)";
const NO_COMMIT_MESSAGE: &str = "(no commit message)";
const UNKNOWN_AUTHOR: &str = "unknown author";
const UNKNOWN_TIME: &str = "unknown time";

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Image(Arc<BinaryResource>),
}

/// Display strings for a collapsed, forwarded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardSummary {
    pub title: String,
    pub brief: String,
    pub source: String,
    pub summary: String,
}

impl Default for ForwardSummary {
    fn default() -> Self {
        Self {
            title: "octofeed subscription".to_string(),
            brief: "[GitHub feed]".to_string(),
            source: "GitHub feed".to_string(),
            summary: "View full feed update".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Framing {
    Flat,
    Forward(ForwardSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComposedMessage {
    pub framing: Framing,
    pub segments: Vec<Segment>,
}

impl ComposedMessage {
    /// Number of characters across the text segments.
    pub fn text_len(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.chars().count(),
                Segment::Image(_) => 0,
            })
            .sum()
    }

    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => text.as_str(),
                Segment::Image(_) => "[image]\n",
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Composer {
    forward_threshold: usize,
    forward: ForwardSummary,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new(&ComposeConfig::default())
    }
}

impl Composer {
    pub fn new(config: &ComposeConfig) -> Self {
        Self {
            forward_threshold: config.forward_threshold,
            forward: ForwardSummary::default(),
        }
    }

    pub fn compose(&self, entry: &FeedEntry, bundle: &EnrichmentBundle) -> ComposedMessage {
        let head = Segment::Text(format!(
            "{}\n{}\nTime: {}\n",
            HEADER,
            entry.title,
            local_time(&entry.published_at)
        ));

        let image = match &bundle.image {
            Slot::Ready(image) => Some(Segment::Image(image.clone())),
            Slot::Unavailable => Some(Segment::Text(format!("{}\n", IMAGE_PLACEHOLDER))),
            Slot::Skipped => None,
        };

        let link = Segment::Text(format!("{}\n{}\n", entry.link, SEPARATOR));

        let sections = [
            section("Commits", &bundle.commits, |c| commit_lines(c)),
            section("Issue", &bundle.issue, |v| post_lines(v, true, "issue")),
            section("Issue comment", &bundle.issue_comment, |v| {
                post_lines(v, false, "comment")
            }),
            section("Pull request", &bundle.pull_request, |v| {
                post_lines(v, true, "pull request")
            }),
            section("Pull request comment", &bundle.pull_request_comment, |v| {
                post_lines(v, false, "comment")
            }),
        ];

        let segments: Vec<Segment> = std::iter::once(head)
            .chain(image)
            .chain(std::iter::once(link))
            .chain(sections.into_iter().flatten().map(Segment::Text))
            .chain(std::iter::once(Segment::Text(FOOTER.to_string())))
            .collect();

        let mut message = ComposedMessage {
            framing: Framing::Flat,
            segments,
        };
        if message.text_len() > self.forward_threshold {
            message.framing = Framing::Forward(self.forward.clone());
        }
        message
    }
}

/// Renders one section, or nothing when it was never requested.
fn section<T>(heading: &str, slot: &Slot<T>, body: impl Fn(&T) -> Vec<String>) -> Option<String> {
    let lines = match slot {
        Slot::Skipped => return None,
        Slot::Unavailable => vec![NO_DATA.to_string()],
        Slot::Ready(value) => body(value),
    };

    let mut text = format!("{}:\n", heading);
    for line in lines {
        text.push_str(&line);
        text.push('\n');
    }
    text.push_str(SEPARATOR);
    text.push('\n');
    Some(text)
}

fn commit_lines(commits: &[Value]) -> Vec<String> {
    let lines: Vec<String> = commits.iter().filter_map(commit_line).collect();
    if lines.is_empty() {
        vec![NO_DATA.to_string()]
    } else {
        lines
    }
}

fn commit_line(commit: &Value) -> Option<String> {
    let sha = text_field(commit, "sha")?;
    let detail = commit.get("commit");

    let message = detail
        .and_then(|d| text_field(d, "message"))
        .and_then(|m| m.lines().next().map(str::to_string))
        .unwrap_or_else(|| NO_COMMIT_MESSAGE.to_string());
    let author = detail.and_then(|d| d.get("author"));
    let name = author
        .and_then(|a| text_field(a, "name"))
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    let date = author
        .and_then(|a| text_field(a, "date"))
        .map(|d| display_time(&d))
        .unwrap_or_else(|| UNKNOWN_TIME.to_string());

    Some(format!(
        "- commit#{}: {} (on {} by {})",
        short_sha(&sha),
        message,
        date,
        name
    ))
}

/// Issue, pull request and comment bodies share one layout; comments have no
/// title.
fn post_lines(post: &Value, with_title: bool, noun: &str) -> Vec<String> {
    let mut lines = Vec::new();
    if with_title {
        let title = text_field(post, "title").unwrap_or_else(|| NO_TITLE.to_string());
        lines.push(format!("Title: {}", title));
    }

    let body = text_field(post, "body").unwrap_or_else(|| NO_CONTENT.to_string());
    lines.push(format!("Content: {}", body));

    let login = post
        .get("user")
        .and_then(|u| text_field(u, "login"))
        .unwrap_or_else(|| format!("unknown {} author", noun));
    let created = text_field(post, "created_at")
        .map(|c| display_time(&c))
        .unwrap_or_else(|| format!("unknown {} time", noun));
    lines.push(format!("(On {} by {})", created, login));

    lines
}

/// A non-empty string field. JSON `null` and the literal text "null" count as
/// missing.
fn text_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "null")
        .map(str::to_string)
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn display_time(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| local_time(&dt.with_timezone(&Utc)))
        .unwrap_or_else(|_| raw.to_string())
}

pub fn local_time(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
