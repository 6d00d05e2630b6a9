/*!
 * Policy Round-Trips, Validation, and Maintenance
 */

use std::sync::Arc;

use wardenfs::pattern::PatternMatcher;
use wardenfs::policy::{
    export_policy, find_conflicts, import_policy, load_policy, optimize, save_policy,
    validate_acl, Acl, AclEntry, Effect, Operation, PolicyFormat, Subject,
};

fn rule(
    subject: Subject,
    pattern: &str,
    permissions: Operation,
    effect: Effect,
    priority: i32,
) -> AclEntry {
    AclEntry::new(subject, pattern, permissions, effect).with_priority(priority)
}

fn realistic_acl() -> Acl {
    Acl::new(
        vec![
            rule(
                Subject::User("alice".into()),
                "/home/alice/**",
                Operation::READ_WRITE,
                Effect::Allow,
                100,
            ),
            rule(
                Subject::Group("auditors".into()),
                "/logs/**",
                Operation::READ | Operation::METADATA,
                Effect::Allow,
                50,
            ),
            rule(Subject::Role("admin".into()), "/**", Operation::ALL, Effect::Allow, 500),
            rule(Subject::Everyone, "/secrets/**", Operation::ALL, Effect::Deny, 1000),
        ],
        Effect::Deny,
    )
}

#[test]
fn export_import_round_trip_preserves_semantics() {
    let acl = realistic_acl();
    let doc = export_policy(&acl, Some("production policy"));

    for format in [PolicyFormat::Json, PolicyFormat::Yaml] {
        let mut buffer = Vec::new();
        save_policy(&doc, &mut buffer, format).unwrap();
        let loaded = load_policy(&mut buffer.as_slice(), format).unwrap();
        let imported = import_policy(&loaded).unwrap();

        assert_eq!(imported.default_effect, acl.default_effect);
        assert_eq!(imported.entries.len(), acl.entries.len());
        for (original, round_tripped) in acl.entries.iter().zip(&imported.entries) {
            assert!(original.same_rule(round_tripped));
            assert_eq!(original.priority, round_tripped.priority);
        }
    }
}

#[test]
fn validation_boundary_cases() {
    // Valid realistic policy
    assert!(validate_acl(&realistic_acl()).is_valid());

    // Empty pattern
    let acl = Acl::new(
        vec![rule(Subject::Everyone, "", Operation::READ, Effect::Allow, 0)],
        Effect::Deny,
    );
    assert!(!validate_acl(&acl).is_valid());

    // Triple star
    let acl = Acl::new(
        vec![rule(Subject::Everyone, "/a/***", Operation::READ, Effect::Allow, 0)],
        Effect::Deny,
    );
    let report = validate_acl(&acl);
    assert_eq!(report.errors[0].field, "entries[0].path_pattern");

    // Zero priority accepted, negative rejected
    let acl = Acl::new(
        vec![
            rule(Subject::Everyone, "/ok", Operation::READ, Effect::Allow, 0),
            rule(Subject::Everyone, "/bad", Operation::READ, Effect::Allow, -1),
        ],
        Effect::Deny,
    );
    let report = validate_acl(&acl);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].field, "entries[1].priority");

    // Empty permission set rejected
    let acl = Acl::new(
        vec![rule(Subject::Everyone, "/x", Operation::empty(), Effect::Allow, 0)],
        Effect::Deny,
    );
    assert!(!validate_acl(&acl).is_valid());
}

#[test]
fn conflict_detection_is_conservative() {
    let acl = Acl::new(
        vec![
            rule(Subject::User("a".into()), "/data/**", Operation::READ, Effect::Allow, 7),
            // Same priority, opposite effect, ** overlap, Everyone overlaps any subject
            rule(Subject::Everyone, "/unrelated/**", Operation::READ, Effect::Deny, 7),
        ],
        Effect::Deny,
    );
    assert_eq!(find_conflicts(&acl).len(), 1);

    // Same pair at different priorities is resolved by priority, not a conflict
    let acl = Acl::new(
        vec![
            rule(Subject::User("a".into()), "/data/**", Operation::READ, Effect::Allow, 7),
            rule(Subject::Everyone, "/data/**", Operation::READ, Effect::Deny, 8),
        ],
        Effect::Deny,
    );
    assert!(find_conflicts(&acl).is_empty());
}

#[test]
fn optimize_deduplicates_preserving_first() {
    let first = rule(Subject::User("a".into()), "/x/**", Operation::READ, Effect::Allow, 5);
    let duplicate = rule(Subject::User("a".into()), "/x/**", Operation::READ, Effect::Allow, 9);

    let acl = Acl::new(vec![first, duplicate], Effect::Deny);
    let optimized = optimize(&acl);
    assert_eq!(optimized.entries.len(), 1);
    assert_eq!(optimized.entries[0].priority, 5);
}

#[test]
fn double_star_subsumes_zero_or_more_segments() {
    let matcher = PatternMatcher::compile("/a/**").unwrap();
    assert!(matcher.matches("/a"));
    assert!(matcher.matches("/a/b"));
    assert!(matcher.matches("/a/b/c"));
    assert!(!matcher.matches("/ab"));

    assert!(PatternMatcher::compile("/a/***").is_err());
}

#[test]
fn matcher_is_deterministic_over_canonical_forms() {
    let matcher = PatternMatcher::compile("/srv/*/logs/**").unwrap();
    for _ in 0..3 {
        assert!(matcher.matches("/srv/web/logs/2024/01.log"));
        assert!(matcher.matches("/srv/web//logs/./2024"));
        assert!(!matcher.matches("/srv/logs"));
    }
}

#[test]
fn explain_lists_matching_rules() {
    use std::path::Path;
    use wardenfs::audit::AuditConfig;
    use wardenfs::kernel::{Config, WardenFs};
    use wardenfs::vfs::MemFs;
    use wardenfs::Identity;

    let config = Config {
        acl: realistic_acl(),
        audit: AuditConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let fs = WardenFs::new(Arc::new(MemFs::new()), config).unwrap();

    let admin = Arc::new(Identity::user("root").with_role("admin"));
    let (allowed, result) =
        fs.test_permission(&admin, Path::new("/secrets/key"), Operation::READ);

    // Admin allow at 500 loses to the Everyone deny at 1000
    assert!(!allowed);
    assert_eq!(result.matching_entries.len(), 2);
    let text = result.explain();
    assert!(text.contains("DENIED"));
    assert!(text.contains("Matching rules (2)"));
}
