/*!
 * Path Pattern Matcher
 * Segment-wise glob matching with recursive `**` support
 *
 * Both pattern and path are normalized to forward-slash form and lexically
 * cleaned before matching, so callers never have to pre-canonicalize.
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pattern compilation errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error")]
pub enum PatternError {
    #[error("invalid path pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl PatternError {
    fn invalid(pattern: &str, reason: impl Into<String>) -> Self {
        PatternError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.into(),
        }
    }
}

/// Lexically clean a path into canonical forward-slash form.
///
/// Collapses `.` and `..`, de-duplicates separators, strips trailing slashes,
/// and keeps the leading slash for rooted paths. The empty path cleans to
/// `"."`. Backslash separators are normalized to forward slashes first so
/// Windows-style input behaves identically.
pub fn clean_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !rooted {
                    // Relative paths keep leading ".." components
                    out.push("..");
                }
                // ".." above the root is dropped
            }
            seg => out.push(seg),
        }
    }

    if out.is_empty() {
        return if rooted { "/" } else { "." }.to_string();
    }

    let joined = out.join("/");
    if rooted {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Match a single path segment against a glob segment (`*`, `?` only).
///
/// `*` matches any run of characters within the segment (including empty);
/// `?` matches exactly one. Separators never appear because both sides are
/// single segments.
fn match_segment(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = name.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < txt.len() {
        if pi < pat.len() && (pat[pi] == '?' || pat[pi] == txt[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pat.len() && pat[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = backtrack {
            // Give the last `*` one more character and retry
            pi = star_pi + 1;
            ti = star_ti + 1;
            backtrack = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    while pi < pat.len() && pat[pi] == '*' {
        pi += 1;
    }
    pi == pat.len()
}

/// Match pattern segments against path segments, recursing greedily for `**`.
fn match_segments(pattern: &[String], path: &[&str], pi: usize, xi: usize) -> bool {
    if pi >= pattern.len() {
        return xi >= path.len();
    }

    if xi >= path.len() {
        // Remaining pattern may only be `**`, which matches zero segments
        return pattern[pi..].iter().all(|seg| seg == "**");
    }

    if pattern[pi] == "**" {
        // Zero segments first, then one, then more
        if match_segments(pattern, path, pi + 1, xi) {
            return true;
        }
        for next in xi..path.len() {
            if match_segments(pattern, path, pi + 1, next + 1) {
                return true;
            }
        }
        return false;
    }

    match_segment(&pattern[pi], path[xi]) && match_segments(pattern, path, pi + 1, xi + 1)
}

/// A compiled path pattern.
///
/// Compilation cleans the source pattern and pre-splits it into segments;
/// matching cleans the candidate path the same way, so results depend only on
/// the canonical forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatcher {
    pattern: String,
    segments: Vec<String>,
    has_glob: bool,
    has_double_star: bool,
}

impl PatternMatcher {
    /// Compile a glob pattern. `***` is rejected here, before any matching.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.contains("***") {
            return Err(PatternError::invalid(pattern, "*** is not supported, use **"));
        }

        let cleaned = clean_path(pattern);
        let segments: Vec<String> = cleaned.split('/').map(str::to_string).collect();
        let has_glob = cleaned.contains('*') || cleaned.contains('?');

        Ok(Self {
            has_double_star: segments.iter().any(|seg| seg == "**"),
            pattern: cleaned,
            segments,
            has_glob,
        })
    }

    /// The cleaned source pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Test a path against this pattern
    pub fn matches(&self, path: &str) -> bool {
        let cleaned = clean_path(path);

        // Exact equality short-circuits, glob or not
        if self.pattern == cleaned {
            return true;
        }
        if !self.has_glob {
            return false;
        }

        let path_segments: Vec<&str> = cleaned.split('/').collect();

        if self.has_double_star {
            return match_segments(&self.segments, &path_segments, 0, 0);
        }

        // Without `**` every pattern segment consumes exactly one path segment
        self.segments.len() == path_segments.len()
            && self
                .segments
                .iter()
                .zip(&path_segments)
                .all(|(pat, seg)| match_segment(pat, seg))
    }
}
