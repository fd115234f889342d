//! Admission policy for container images.
//!
//! The orchestrator only ever sees the [`ImageFilter`] predicate; which
//! policy is behind it is decided at process start.

use crate::error::{JobExecError, Result};
use regex::Regex;
use std::sync::Arc;

/// Decides whether a container image may be run.
pub trait ImageFilter: Send + Sync {
    fn is_allowed(&self, image: &str) -> bool;
}

impl<F: ImageFilter + ?Sized> ImageFilter for Box<F> {
    fn is_allowed(&self, image: &str) -> bool {
        (**self).is_allowed(image)
    }
}

impl<F: ImageFilter + ?Sized> ImageFilter for Arc<F> {
    fn is_allowed(&self, image: &str) -> bool {
        (**self).is_allowed(image)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl ImageFilter for AllowAll {
    fn is_allowed(&self, _image: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl ImageFilter for DenyAll {
    fn is_allowed(&self, _image: &str) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// PatternFilter
// ---------------------------------------------------------------------------

/// Allow-list / deny-list matching on glob patterns where `*` matches any
/// run of characters (including `/` and `:`).
///
/// A denied image is rejected even if it is also allowed. An empty allow-list
/// admits every image that is not denied.
#[derive(Debug, Clone, Default)]
pub struct PatternFilter {
    allowed: Vec<Regex>,
    denied: Vec<Regex>,
}

impl PatternFilter {
    pub fn new<A, D>(allowed: A, denied: D) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Ok(Self {
            allowed: compile_all(allowed)?,
            denied: compile_all(denied)?,
        })
    }

    /// Build from comma-separated pattern lists, as found in environment
    /// variables. Blank entries are ignored.
    pub fn from_lists(allowed: Option<&str>, denied: Option<&str>) -> Result<Self> {
        Self::new(split_list(allowed), split_list(denied))
    }

    pub fn allow_list_len(&self) -> usize {
        self.allowed.len()
    }

    pub fn deny_list_len(&self) -> usize {
        self.denied.len()
    }
}

impl ImageFilter for PatternFilter {
    fn is_allowed(&self, image: &str) -> bool {
        let image = image.trim();
        if self.denied.iter().any(|re| re.is_match(image)) {
            return false;
        }
        self.allowed.is_empty() || self.allowed.iter().any(|re| re.is_match(image))
    }
}

fn split_list(list: Option<&str>) -> Vec<&str> {
    list.map(|l| {
        l.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn compile_all<I>(patterns: I) -> Result<Vec<Regex>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| glob_to_regex(p.as_ref()))
        .collect()
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err(JobExecError::InvalidImagePattern {
            pattern: pattern.to_string(),
            reason: "empty pattern".into(),
        });
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{body}$")).map_err(|e| JobExecError::InvalidImagePattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
