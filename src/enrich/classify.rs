//! Classification of entry links into the shapes that carry extra data.
//!
//! Matchers run in order and the first hit wins. Specific shapes come before
//! general ones because every compare, issue or pull request link is also a
//! valid repository link.

use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Compare {
        repo: RepoRef,
        from: String,
        to: String,
    },
    /// Comment on an issue; the issue itself is fetched alongside.
    IssueComment {
        repo: RepoRef,
        issue: u64,
        comment_id: u64,
    },
    Issue {
        repo: RepoRef,
        issue: u64,
    },
    /// Review comment on a pull request; the pull request is fetched
    /// alongside.
    PrComment {
        repo: RepoRef,
        pr: u64,
        comment_id: u64,
    },
    Pr {
        repo: RepoRef,
        pr: u64,
    },
    RepoRoot {
        repo: RepoRef,
    },
    Unmatched,
}

/// A secondary API resource an entry can be enriched with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Commits,
    Issue,
    IssueComment,
    PullRequest,
    PullRequestComment,
}

impl LinkKind {
    pub fn repo(&self) -> Option<&RepoRef> {
        match self {
            LinkKind::Compare { repo, .. }
            | LinkKind::IssueComment { repo, .. }
            | LinkKind::Issue { repo, .. }
            | LinkKind::PrComment { repo, .. }
            | LinkKind::Pr { repo, .. }
            | LinkKind::RepoRoot { repo } => Some(repo),
            LinkKind::Unmatched => None,
        }
    }

    /// API paths (relative to the REST root) to fetch for this link.
    pub fn api_requests(&self) -> Vec<(Resource, String)> {
        match self {
            LinkKind::Compare { repo, from, to } => vec![(
                Resource::Commits,
                format!("{}/compare/{}...{}", repo.slug(), from, to),
            )],
            LinkKind::IssueComment {
                repo,
                issue,
                comment_id,
            } => vec![
                (Resource::Issue, format!("{}/issues/{}", repo.slug(), issue)),
                (
                    Resource::IssueComment,
                    format!("{}/issues/comments/{}", repo.slug(), comment_id),
                ),
            ],
            LinkKind::Issue { repo, issue } => {
                vec![(Resource::Issue, format!("{}/issues/{}", repo.slug(), issue))]
            }
            LinkKind::PrComment {
                repo,
                pr,
                comment_id,
            } => vec![
                (Resource::PullRequest, format!("{}/pulls/{}", repo.slug(), pr)),
                (
                    Resource::PullRequestComment,
                    format!("{}/pulls/comments/{}", repo.slug(), comment_id),
                ),
            ],
            LinkKind::Pr { repo, pr } => {
                vec![(Resource::PullRequest, format!("{}/pulls/{}", repo.slug(), pr))]
            }
            LinkKind::RepoRoot { .. } | LinkKind::Unmatched => Vec::new(),
        }
    }
}

/// The parts of a repository link every matcher looks at.
struct RepoLink<'a> {
    repo: RepoRef,
    rest: Vec<&'a str>,
    fragment: Option<&'a str>,
}

type Matcher = fn(&RepoLink<'_>) -> Option<LinkKind>;

const MATCHERS: &[(&str, Matcher)] = &[
    ("compare", match_compare),
    ("issue-comment", match_issue_comment),
    ("issue", match_issue),
    ("pr-comment", match_pr_comment),
    ("pr", match_pr),
    ("repo", match_repo_root),
];

#[derive(Debug, Clone)]
pub struct Classifier {
    host: String,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new("github.com")
    }
}

impl Classifier {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().to_ascii_lowercase(),
        }
    }

    pub fn classify(&self, link: &str) -> LinkKind {
        let Ok(url) = Url::parse(link) else {
            return LinkKind::Unmatched;
        };
        if url.scheme() != "https" || url.host_str() != Some(self.host.as_str()) {
            return LinkKind::Unmatched;
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        let [owner, repo, rest @ ..] = segments.as_slice() else {
            return LinkKind::Unmatched;
        };
        if !is_owner(owner) || !is_repo(repo) {
            return LinkKind::Unmatched;
        }

        let parts = RepoLink {
            repo: RepoRef {
                owner: owner.to_string(),
                repo: repo.to_string(),
            },
            rest: rest.to_vec(),
            fragment: url.fragment(),
        };

        MATCHERS
            .iter()
            .find_map(|(name, matcher)| {
                let kind = matcher(&parts)?;
                tracing::trace!(link, matcher = name, "Classified link");
                Some(kind)
            })
            .unwrap_or(LinkKind::Unmatched)
    }
}

fn is_owner(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn is_repo(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn is_ref(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
}

fn match_compare(link: &RepoLink<'_>) -> Option<LinkKind> {
    let ["compare", range] = link.rest.as_slice() else {
        return None;
    };
    let (from, to) = range.split_once("...")?;
    if !is_ref(from) || !is_ref(to) {
        return None;
    }
    Some(LinkKind::Compare {
        repo: link.repo.clone(),
        from: from.to_string(),
        to: to.to_string(),
    })
}

fn match_issue_comment(link: &RepoLink<'_>) -> Option<LinkKind> {
    let ["issues", issue] = link.rest.as_slice() else {
        return None;
    };
    let comment_id = link.fragment?.strip_prefix("issuecomment-").and_then(number)?;
    Some(LinkKind::IssueComment {
        repo: link.repo.clone(),
        issue: number(issue)?,
        comment_id,
    })
}

fn match_issue(link: &RepoLink<'_>) -> Option<LinkKind> {
    let ["issues", issue, ..] = link.rest.as_slice() else {
        return None;
    };
    Some(LinkKind::Issue {
        repo: link.repo.clone(),
        issue: number(issue)?,
    })
}

fn match_pr_comment(link: &RepoLink<'_>) -> Option<LinkKind> {
    let ["pull", pr, ..] = link.rest.as_slice() else {
        return None;
    };
    let comment_id = link.fragment?.strip_prefix("discussion_r").and_then(number)?;
    Some(LinkKind::PrComment {
        repo: link.repo.clone(),
        pr: number(pr)?,
        comment_id,
    })
}

fn match_pr(link: &RepoLink<'_>) -> Option<LinkKind> {
    let ["pull", pr, ..] = link.rest.as_slice() else {
        return None;
    };
    Some(LinkKind::Pr {
        repo: link.repo.clone(),
        pr: number(pr)?,
    })
}

fn match_repo_root(link: &RepoLink<'_>) -> Option<LinkKind> {
    Some(LinkKind::RepoRoot {
        repo: link.repo.clone(),
    })
}
