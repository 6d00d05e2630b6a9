/*!
 * Policy Module
 * The access-control model: subjects, entries, conditions, validation,
 * and the serializable policy document format
 */

pub mod conditions;
pub mod entry;
pub mod file;
pub mod types;
pub mod validation;

pub use conditions::{
    Condition, FuncCondition, HourRange, IpCondition, MetadataCondition, TimeWindow,
    SOURCE_IP_KEY,
};
pub use entry::{Acl, AclEntry, EvaluationContext};
pub use file::{
    export_policy, import_policy, load_policy, load_policy_file, save_policy, save_policy_file,
    PolicyDocument, PolicyFileError, PolicyFormat,
};
pub use types::{Effect, Identity, Operation, Subject};
pub use validation::{
    find_conflicts, optimize, validate_acl, validate_entry, RuleConflict, ValidationError,
    ValidationReport,
};
