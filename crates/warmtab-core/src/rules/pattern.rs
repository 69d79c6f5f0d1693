//! Glob-style URL patterns.
//!
//! `*` matches any run of characters and everything else is literal,
//! compared case-insensitively. What part of the URL a pattern is tested
//! against depends on its shape:
//!
//! - `https://example.com/*` (has a scheme) matches the full URL
//! - `example.com/docs/*` (has a path) matches host and path
//! - `*.example.com` (bare) matches the host only

use regex::Regex;
use tracing::warn;
use url::Url;

use super::{DEFAULT_PROMPT, RuleConfig};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    FullUrl,
    HostAndPath,
    Host,
}

#[derive(Debug, Clone)]
pub struct UrlPattern {
    scope: Scope,
    regex: Regex,
}

impl UrlPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(Error::Pattern("empty pattern".to_string()));
        }

        let scope = if pattern.contains("://") {
            Scope::FullUrl
        } else if pattern.contains('/') {
            Scope::HostAndPath
        } else {
            Scope::Host
        };

        let regex = Regex::new(&glob_to_regex(pattern))
            .map_err(|e| Error::Pattern(format!("{pattern}: {e}")))?;

        Ok(Self { scope, regex })
    }

    /// Unparseable URLs match nothing.
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };
        match self.scope {
            Scope::FullUrl => self.regex.is_match(url.as_str()),
            Scope::HostAndPath => url
                .host_str()
                .is_some_and(|host| self.regex.is_match(&format!("{host}{}", path_and_query(&url)))),
            Scope::Host => url.host_str().is_some_and(|host| self.regex.is_match(host)),
        }
    }
}

fn glob_to_regex(glob: &str) -> String {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?i)^{body}$")
}

/// Path plus query, without the fragment.
fn path_and_query(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

/// Prompt and selector chosen for a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub prompt: String,
    pub css_selector: String,
}

/// First matching rule of the non-default groups, in order, else the
/// default group. A rule's own selector wins over its group's.
#[must_use]
pub fn find_matching_group(url: &str, config: &RuleConfig) -> MatchResult {
    for group in config.rule_groups.iter().filter(|g| !g.is_default) {
        for rule in &group.rules {
            if rule.url_pattern.trim().is_empty() {
                continue;
            }
            let pattern = match UrlPattern::parse(&rule.url_pattern) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!("Skipping rule {}: {e}", rule.id);
                    continue;
                }
            };
            if pattern.matches(url) {
                let selector = if rule.css_selector.trim().is_empty() {
                    &group.css_selector
                } else {
                    &rule.css_selector
                };
                return MatchResult {
                    prompt: group.prompt.clone(),
                    css_selector: selector.clone(),
                };
            }
        }
    }

    match config.default_group() {
        Some(group) => MatchResult {
            prompt: group.prompt.clone(),
            css_selector: group.css_selector.clone(),
        },
        None => MatchResult {
            prompt: DEFAULT_PROMPT.to_string(),
            css_selector: String::new(),
        },
    }
}
