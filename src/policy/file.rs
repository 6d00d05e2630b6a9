/*!
 * Policy Documents
 * Serializable policy format (version 1.0) with JSON and YAML backends
 */

use super::entry::{Acl, AclEntry};
use super::types::{Effect, Operation, Subject};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use thiserror::Error;

/// Document format version written by [`export_policy`]
pub const POLICY_VERSION: &str = "1.0";

/// Serialization format of a policy document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFormat {
    Json,
    Yaml,
}

/// Errors from loading, saving, or converting policy documents
#[derive(Error, Debug)]
pub enum PolicyFileError {
    #[error("entry {index}: invalid subject type {value:?}")]
    InvalidSubjectType { index: usize, value: String },

    #[error("entry {index}: invalid operation {value:?}")]
    InvalidOperation { index: usize, value: String },

    #[error("entry {index}: invalid effect {value:?}")]
    InvalidEffect { index: usize, value: String },

    #[error("invalid default effect {value:?}")]
    InvalidDefault { value: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level policy document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub default: String,
    pub entries: Vec<PolicyDocEntry>,
}

/// One serialized rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocEntry {
    pub subject: PolicyDocSubject,
    pub path_pattern: String,
    pub permissions: Vec<String>,
    pub effect: String,
    #[serde(default)]
    pub priority: i32,
}

/// One serialized subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocSubject {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: String,
}

fn effect_name(effect: Effect) -> &'static str {
    match effect {
        Effect::Allow => "allow",
        Effect::Deny => "deny",
    }
}

fn parse_effect(value: &str) -> Option<Effect> {
    match value {
        "allow" => Some(Effect::Allow),
        "deny" => Some(Effect::Deny),
        _ => None,
    }
}

fn operation_names(operations: Operation) -> Vec<String> {
    const NAMES: [(Operation, &str); 6] = [
        (Operation::READ, "read"),
        (Operation::WRITE, "write"),
        (Operation::EXECUTE, "execute"),
        (Operation::DELETE, "delete"),
        (Operation::METADATA, "metadata"),
        (Operation::ADMIN, "admin"),
    ];
    NAMES
        .iter()
        .filter(|(bit, _)| operations.has(*bit))
        .map(|(_, name)| (*name).to_string())
        .collect()
}

fn parse_operation(value: &str) -> Option<Operation> {
    Some(match value {
        "read" => Operation::READ,
        "write" => Operation::WRITE,
        "execute" => Operation::EXECUTE,
        "delete" => Operation::DELETE,
        "metadata" => Operation::METADATA,
        "admin" => Operation::ADMIN,
        "all" => Operation::ALL,
        _ => return None,
    })
}

/// Convert an ACL into a serializable document.
///
/// Conditions are runtime-only and are not exported.
pub fn export_policy(acl: &Acl, description: Option<&str>) -> PolicyDocument {
    PolicyDocument {
        version: POLICY_VERSION.to_string(),
        description: description.map(str::to_string),
        default: effect_name(acl.default_effect).to_string(),
        entries: acl
            .entries
            .iter()
            .map(|entry| PolicyDocEntry {
                subject: match &entry.subject {
                    Subject::User(id) => PolicyDocSubject {
                        kind: "user".into(),
                        id: id.clone(),
                    },
                    Subject::Group(id) => PolicyDocSubject {
                        kind: "group".into(),
                        id: id.clone(),
                    },
                    Subject::Role(id) => PolicyDocSubject {
                        kind: "role".into(),
                        id: id.clone(),
                    },
                    Subject::Everyone => PolicyDocSubject {
                        kind: "everyone".into(),
                        id: "*".into(),
                    },
                },
                path_pattern: entry.path_pattern.clone(),
                permissions: operation_names(entry.permissions),
                effect: effect_name(entry.effect).to_string(),
                priority: entry.priority,
            })
            .collect(),
    }
}

/// Convert a document back into an ACL.
pub fn import_policy(document: &PolicyDocument) -> Result<Acl, PolicyFileError> {
    let default_effect =
        parse_effect(&document.default).ok_or_else(|| PolicyFileError::InvalidDefault {
            value: document.default.clone(),
        })?;

    let mut entries = Vec::with_capacity(document.entries.len());
    for (index, doc_entry) in document.entries.iter().enumerate() {
        let subject = match doc_entry.subject.kind.as_str() {
            "user" => Subject::User(doc_entry.subject.id.clone()),
            "group" => Subject::Group(doc_entry.subject.id.clone()),
            "role" => Subject::Role(doc_entry.subject.id.clone()),
            "everyone" => Subject::Everyone,
            other => {
                return Err(PolicyFileError::InvalidSubjectType {
                    index,
                    value: other.to_string(),
                })
            }
        };

        let mut permissions = Operation::empty();
        for name in &doc_entry.permissions {
            permissions |= parse_operation(name).ok_or_else(|| {
                PolicyFileError::InvalidOperation {
                    index,
                    value: name.clone(),
                }
            })?;
        }

        let effect =
            parse_effect(&doc_entry.effect).ok_or_else(|| PolicyFileError::InvalidEffect {
                index,
                value: doc_entry.effect.clone(),
            })?;

        entries.push(
            AclEntry::new(subject, doc_entry.path_pattern.clone(), permissions, effect)
                .with_priority(doc_entry.priority),
        );
    }

    Ok(Acl::new(entries, default_effect))
}

/// Write a document to any writer.
pub fn save_policy(
    document: &PolicyDocument,
    writer: &mut dyn Write,
    format: PolicyFormat,
) -> Result<(), PolicyFileError> {
    match format {
        PolicyFormat::Json => serde_json::to_writer_pretty(&mut *writer, document)?,
        PolicyFormat::Yaml => serde_yaml::to_writer(&mut *writer, document)?,
    }
    writer.flush()?;
    Ok(())
}

/// Read a document from any reader.
pub fn load_policy(
    reader: &mut dyn Read,
    format: PolicyFormat,
) -> Result<PolicyDocument, PolicyFileError> {
    Ok(match format {
        PolicyFormat::Json => serde_json::from_reader(reader)?,
        PolicyFormat::Yaml => serde_yaml::from_reader(reader)?,
    })
}

/// Write a document to a filesystem path.
pub fn save_policy_file(
    document: &PolicyDocument,
    path: impl AsRef<Path>,
    format: PolicyFormat,
) -> Result<(), PolicyFileError> {
    let mut writer = BufWriter::new(File::create(path)?);
    save_policy(document, &mut writer, format)
}

/// Read a document from a filesystem path.
pub fn load_policy_file(
    path: impl AsRef<Path>,
    format: PolicyFormat,
) -> Result<PolicyDocument, PolicyFileError> {
    let mut reader = BufReader::new(File::open(path)?);
    load_policy(&mut reader, format)
}
