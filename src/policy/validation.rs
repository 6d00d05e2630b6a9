/*!
 * Policy Validation and Maintenance Checks
 * Field-qualified validation, conflict detection, and duplicate removal
 */

use super::entry::{Acl, AclEntry};
use super::types::Subject;
use crate::pattern::{clean_path, PatternMatcher};
use std::fmt;

/// A single field-qualified validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `entries[2].path_pattern`
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Outcome of validating an entry or a whole policy
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

/// Validate every entry of a policy.
pub fn validate_acl(acl: &Acl) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (index, entry) in acl.entries.iter().enumerate() {
        validate_entry_into(entry, &format!("entries[{index}]"), &mut report);
    }
    report
}

/// Validate a single entry.
pub fn validate_entry(entry: &AclEntry) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_entry_into(entry, "entry", &mut report);
    report
}

fn validate_entry_into(entry: &AclEntry, prefix: &str, report: &mut ValidationReport) {
    if !matches!(entry.subject, Subject::Everyone)
        && entry.subject.id().map_or(true, str::is_empty)
    {
        report.add(format!("{prefix}.subject.id"), "subject id cannot be empty");
    }

    if entry.path_pattern.is_empty() {
        report.add(format!("{prefix}.path_pattern"), "path pattern cannot be empty");
    } else if let Err(err) = PatternMatcher::compile(&entry.path_pattern) {
        report.add(format!("{prefix}.path_pattern"), err.to_string());
    }

    if entry.permissions.is_empty() {
        report.add(
            format!("{prefix}.permissions"),
            "at least one permission must be specified",
        );
    }

    if entry.priority < 0 {
        report.add(format!("{prefix}.priority"), "priority cannot be negative");
    }
}

/// A pair of rules that can contradict each other at evaluation time
#[derive(Debug, Clone)]
pub struct RuleConflict {
    pub first: AclEntry,
    pub second: AclEntry,
    pub description: String,
}

/// Find rule pairs with equal priority, overlapping subjects, opposite
/// effects, and overlapping patterns.
///
/// The pattern-overlap test is deliberately conservative: equality, cleaned
/// prefix containment, or either pattern containing `**` all count as
/// overlap.
pub fn find_conflicts(acl: &Acl) -> Vec<RuleConflict> {
    let mut conflicts = Vec::new();

    for (i, first) in acl.entries.iter().enumerate() {
        for second in &acl.entries[i + 1..] {
            if rules_can_conflict(first, second) {
                conflicts.push(RuleConflict {
                    first: first.clone(),
                    second: second.clone(),
                    description: format!(
                        "rules share priority {} with opposite effects ({} vs {}) on overlapping patterns",
                        first.priority, first.effect, second.effect
                    ),
                });
            }
        }
    }

    conflicts
}

fn rules_can_conflict(first: &AclEntry, second: &AclEntry) -> bool {
    first.priority == second.priority
        && first.effect != second.effect
        && first.subject.overlaps(&second.subject)
        && patterns_overlap(&first.path_pattern, &second.path_pattern)
}

fn patterns_overlap(first: &str, second: &str) -> bool {
    if first == second {
        return true;
    }

    let first_clean = clean_path(first);
    let second_clean = clean_path(second);
    if first_clean.starts_with(&second_clean) || second_clean.starts_with(&first_clean) {
        return true;
    }

    first.contains("**") || second.contains("**")
}

/// Remove duplicate rules, keyed by (subject, pattern, permissions, effect),
/// preserving the first occurrence.
pub fn optimize(acl: &Acl) -> Acl {
    let mut kept: Vec<AclEntry> = Vec::with_capacity(acl.entries.len());

    for entry in &acl.entries {
        if !kept.iter().any(|existing| existing.same_rule(entry)) {
            kept.push(entry.clone());
        }
    }

    Acl::new(kept, acl.default_effect)
}
