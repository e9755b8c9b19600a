//! Service names and the wildcard patterns used to select them.
//!
//! A [`ServiceName`] is a `/`-separated list of non-empty segments such as
//! `app/db/pool`. A [`NamePattern`] is compiled once from text like
//! `app/*/pool` or `app/**` and then matched segment by segment:
//!
//! - `*` inside a segment matches any run of characters (including none),
//! - `?` inside a segment matches exactly one character,
//! - a segment that is exactly `**` matches zero or more whole segments.
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::kernel::error::{Error, Result};

/// Segment separator for service names and patterns
pub const SEGMENT_SEPARATOR: char = '/';

/// Immutable identifier of a service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// Create a validated service name
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(invalid(&name, "name is empty"));
        }
        if name.contains(['*', '?']) {
            return Err(invalid(&name, "wildcards are only allowed in patterns"));
        }
        if name.split(SEGMENT_SEPARATOR).any(|segment| segment.trim().is_empty()) {
            return Err(invalid(&name, "name contains an empty segment"));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the `/`-separated segments of this name
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEGMENT_SEPARATOR)
    }

    /// Check this name against a compiled pattern
    pub fn matches(&self, pattern: &NamePattern) -> bool {
        pattern.matches(self)
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServiceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ServiceName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ServiceName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ServiceName> for String {
    fn from(name: ServiceName) -> Self {
        name.0
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn invalid(name: &str, reason: &str) -> Error {
    Error::InvalidServiceName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GlobToken {
    Literal(char),
    AnyRun,
    AnyChar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SegmentMatcher {
    Literal(String),
    Glob(Vec<GlobToken>),
    AnySegments,
}

impl SegmentMatcher {
    fn compile(segment: &str) -> Self {
        if segment == "**" {
            return SegmentMatcher::AnySegments;
        }
        if !segment.contains(['*', '?']) {
            return SegmentMatcher::Literal(segment.to_string());
        }
        let mut tokens = Vec::with_capacity(segment.len());
        for c in segment.chars() {
            let token = match c {
                '*' => GlobToken::AnyRun,
                '?' => GlobToken::AnyChar,
                other => GlobToken::Literal(other),
            };
            // Collapse runs of `*`
            if token == GlobToken::AnyRun && tokens.last() == Some(&GlobToken::AnyRun) {
                continue;
            }
            tokens.push(token);
        }
        SegmentMatcher::Glob(tokens)
    }

    fn matches_segment(&self, segment: &str) -> bool {
        match self {
            SegmentMatcher::Literal(literal) => literal == segment,
            SegmentMatcher::Glob(tokens) => {
                let chars: Vec<char> = segment.chars().collect();
                glob_match(tokens, &chars)
            }
            // match_segments treats it as a star before getting here
            SegmentMatcher::AnySegments => true,
        }
    }
}

/// Wildcard match with backtracking to the last star only.
///
/// Star tokens match any run of items, empty included; every other token
/// matches exactly one item. Worst case is O(tokens * items).
fn wildcard_match<P, T>(
    tokens: &[P],
    items: &[T],
    is_star: impl Fn(&P) -> bool,
    matches_one: impl Fn(&P, &T) -> bool,
) -> bool {
    let (mut t, mut i) = (0, 0);
    // Token after the last star seen, and the item that star absorbs up to
    let mut resume: Option<(usize, usize)> = None;
    while i < items.len() {
        if t < tokens.len() && is_star(&tokens[t]) {
            t += 1;
            resume = Some((t, i));
        } else if t < tokens.len() && matches_one(&tokens[t], &items[i]) {
            t += 1;
            i += 1;
        } else if let Some((after_star, absorbed)) = resume {
            resume = Some((after_star, absorbed + 1));
            t = after_star;
            i = absorbed + 1;
        } else {
            return false;
        }
    }
    tokens[t..].iter().all(|token| is_star(token))
}

fn glob_match(tokens: &[GlobToken], text: &[char]) -> bool {
    wildcard_match(
        tokens,
        text,
        |token| *token == GlobToken::AnyRun,
        |token, c| match token {
            GlobToken::Literal(literal) => literal == c,
            GlobToken::AnyChar => true,
            GlobToken::AnyRun => false,
        },
    )
}

fn match_segments(matchers: &[SegmentMatcher], segments: &[&str]) -> bool {
    wildcard_match(
        matchers,
        segments,
        |matcher| *matcher == SegmentMatcher::AnySegments,
        |matcher, segment| matcher.matches_segment(segment),
    )
}

/// Compiled wildcard pattern over service names
#[derive(Debug, Clone)]
pub struct NamePattern {
    source: String,
    matchers: Vec<SegmentMatcher>,
}

impl NamePattern {
    /// Compile a pattern such as `app/*/pool` or `app/**`
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let source = pattern.into();
        if source.is_empty() {
            return Err(invalid(&source, "pattern is empty"));
        }
        let mut matchers = Vec::new();
        for segment in source.split(SEGMENT_SEPARATOR) {
            if segment.trim().is_empty() {
                return Err(invalid(&source, "pattern contains an empty segment"));
            }
            matchers.push(SegmentMatcher::compile(segment));
        }
        Ok(Self { source, matchers })
    }

    /// Pattern matching every service name
    pub fn any() -> Self {
        Self {
            source: "**".to_string(),
            matchers: vec![SegmentMatcher::AnySegments],
        }
    }

    /// Pattern matching exactly one name
    pub fn exact(name: &ServiceName) -> Self {
        Self {
            source: name.as_str().to_string(),
            matchers: name
                .segments()
                .map(|segment| SegmentMatcher::Literal(segment.to_string()))
                .collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern contains any wildcard
    pub fn is_wildcard(&self) -> bool {
        self.matchers
            .iter()
            .any(|matcher| !matches!(matcher, SegmentMatcher::Literal(_)))
    }

    pub fn matches(&self, name: &ServiceName) -> bool {
        let segments: Vec<&str> = name.segments().collect();
        match_segments(&self.matchers, &segments)
    }
}

/// Returns true when `patterns` is empty or any pattern matches `name`
pub fn matches_any(patterns: &[NamePattern], name: &ServiceName) -> bool {
    patterns.is_empty() || patterns.iter().any(|pattern| pattern.matches(name))
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for NamePattern {}

impl Hash for NamePattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for NamePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<&ServiceName> for NamePattern {
    fn from(name: &ServiceName) -> Self {
        Self::exact(name)
    }
}
