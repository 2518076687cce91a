use std::sync::Arc;

use serde_json::Value;

use crate::domain::BinaryResource;
use crate::enrich::classify::LinkKind;

/// Outcome of one enrichment lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    /// The link shape does not call for this data
    Skipped,
    /// Requested, but the fetch or decode failed
    Unavailable,
    Ready(T),
}

impl<T> Slot<T> {
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Slot::Unavailable, Slot::Ready)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }

    pub fn as_ready(&self) -> Option<&T> {
        match self {
            Slot::Ready(value) => Some(value),
            _ => None,
        }
    }
}

// Not derived: a derive would require `T: Default`.
impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Skipped
    }
}

/// Everything fetched for one entry. Each field is independent of the others.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentBundle {
    pub image: Slot<Arc<BinaryResource>>,
    /// The `commits` array of a compare response
    pub commits: Slot<Vec<Value>>,
    pub issue: Slot<Value>,
    pub issue_comment: Slot<Value>,
    pub pull_request: Slot<Value>,
    pub pull_request_comment: Slot<Value>,
}

impl EnrichmentBundle {
    /// Bundle for a link whose every lookup failed. Sections the link shape
    /// does not call for stay skipped.
    pub fn unavailable_for(kind: &LinkKind) -> Self {
        use crate::enrich::classify::Resource;

        let mut bundle = Self::default();
        if kind.repo().is_some() {
            bundle.image = Slot::Unavailable;
        }
        for (resource, _) in kind.api_requests() {
            match resource {
                Resource::Commits => bundle.commits = Slot::Unavailable,
                Resource::Issue => bundle.issue = Slot::Unavailable,
                Resource::IssueComment => bundle.issue_comment = Slot::Unavailable,
                Resource::PullRequest => bundle.pull_request = Slot::Unavailable,
                Resource::PullRequestComment => bundle.pull_request_comment = Slot::Unavailable,
            }
        }
        bundle
    }
}
