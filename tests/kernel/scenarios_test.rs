/*!
 * End-to-End Policy Scenarios
 * Whole-kernel checks through the public façade over the memory backend
 */

use std::path::Path;
use std::sync::Arc;

use wardenfs::audit::AuditConfig;
use wardenfs::kernel::{Config, PerformanceConfig, RequestContext, WardenFs};
use wardenfs::policy::{Acl, AclEntry, Effect, Operation, Subject};
use wardenfs::vfs::{FileMode, MemFs, OpenFlags};
use wardenfs::{Identity, KernelError};

fn kernel(entries: Vec<AclEntry>, default_effect: Effect) -> WardenFs {
    let config = Config {
        acl: Acl::new(entries, default_effect),
        performance: PerformanceConfig::default(),
        audit: AuditConfig {
            enabled: false,
            ..Default::default()
        },
    };
    WardenFs::new(Arc::new(MemFs::new()), config).unwrap()
}

fn rule(
    subject: Subject,
    pattern: &str,
    permissions: Operation,
    effect: Effect,
    priority: i32,
) -> AclEntry {
    AclEntry::new(subject, pattern, permissions, effect).with_priority(priority)
}

fn seed_file(fs: &WardenFs, owner: &RequestContext, path: &str) {
    use std::io::Write as _;
    let parent = Path::new(path).parent().unwrap();
    if parent != Path::new("/") {
        fs.mkdir_all(owner, parent, FileMode::new(0o755)).unwrap();
    }
    let mut file = fs
        .open_file(owner, Path::new(path), OpenFlags::create(), FileMode::default())
        .unwrap();
    file.write_all(b"contents").unwrap();
}

#[test]
fn alice_home_directory() {
    let fs = kernel(
        vec![rule(
            Subject::User("alice".into()),
            "/home/alice/**",
            Operation::READ_WRITE,
            Effect::Allow,
            100,
        )],
        Effect::Deny,
    );
    let alice = RequestContext::new().with_user("alice");
    let bob = RequestContext::new().with_user("bob");

    seed_file(&fs, &alice, "/home/alice/doc.txt");

    // Alice reads her own file
    fs.open_file(
        &alice,
        Path::new("/home/alice/doc.txt"),
        OpenFlags::read_only(),
        FileMode::default(),
    )
    .unwrap();

    // Bob cannot
    let err = fs
        .open_file(
            &bob,
            Path::new("/home/alice/doc.txt"),
            OpenFlags::read_only(),
            FileMode::default(),
        )
        .unwrap_err();
    assert!(err.is_permission_denied());

    // Alice has read|write but not delete
    let err = fs.remove(&alice, Path::new("/home/alice/doc.txt")).unwrap_err();
    assert!(err.is_permission_denied());
}

#[test]
fn deny_overrides_allow_at_higher_priority() {
    let fs = kernel(
        vec![
            rule(Subject::User("a".into()), "/**", Operation::ALL, Effect::Allow, 100),
            rule(
                Subject::User("a".into()),
                "/secrets/**",
                Operation::ALL,
                Effect::Deny,
                1000,
            ),
        ],
        Effect::Deny,
    );
    let ctx = RequestContext::new().with_user("a");

    seed_file(&fs, &ctx, "/data/f");

    let err = fs
        .open_file(
            &ctx,
            Path::new("/secrets/k"),
            OpenFlags::read_only(),
            FileMode::default(),
        )
        .unwrap_err();
    assert!(err.is_permission_denied());

    fs.open_file(
        &ctx,
        Path::new("/data/f"),
        OpenFlags::read_only(),
        FileMode::default(),
    )
    .unwrap();
}

#[test]
fn group_read_only_access() {
    let fs = kernel(
        vec![rule(
            Subject::Group("mgrs".into()),
            "/**",
            Operation::READ | Operation::METADATA,
            Effect::Allow,
            50,
        )],
        Effect::Deny,
    );

    let manager =
        RequestContext::new().with_identity(Identity::user("m1").with_group("mgrs"));

    // Reads and stats are fine; the root listing exercises Read
    fs.read_dir(&manager, Path::new("/")).unwrap();
    fs.stat(&manager, Path::new("/")).unwrap();

    // Any write is refused
    let err = fs
        .mkdir(&manager, Path::new("/reports"), FileMode::new(0o755))
        .unwrap_err();
    assert!(err.is_permission_denied());

    // Non-member falls through to default deny
    let outsider = RequestContext::new().with_user("intern");
    assert!(fs.read_dir(&outsider, Path::new("/")).unwrap_err().is_permission_denied());
}

#[test]
fn everyone_reads_public_area() {
    let fs = kernel(
        vec![
            rule(Subject::User("admin".into()), "/**", Operation::ALL, Effect::Allow, 500),
            rule(Subject::Everyone, "/public/**", Operation::READ, Effect::Allow, 1),
        ],
        Effect::Deny,
    );
    let admin = RequestContext::new().with_user("admin");
    seed_file(&fs, &admin, "/public/x");
    seed_file(&fs, &admin, "/private/x");

    for user in ["alice", "bob", "anyone-at-all"] {
        let ctx = RequestContext::new().with_user(user);
        fs.open_file(
            &ctx,
            Path::new("/public/x"),
            OpenFlags::read_only(),
            FileMode::default(),
        )
        .unwrap();

        let err = fs
            .open_file(
                &ctx,
                Path::new("/private/x"),
                OpenFlags::read_only(),
                FileMode::default(),
            )
            .unwrap_err();
        assert!(err.is_permission_denied());
    }
}

#[test]
fn open_for_read_write_needs_combined_grant() {
    // Read-only grant must not satisfy a read-write open
    let fs = kernel(
        vec![rule(
            Subject::User("a".into()),
            "/data/**",
            Operation::READ,
            Effect::Allow,
            10,
        )],
        Effect::Deny,
    );
    let ctx = RequestContext::new().with_user("a");

    let err = fs
        .open_file(
            &ctx,
            Path::new("/data/f"),
            OpenFlags::read_write(),
            FileMode::default(),
        )
        .unwrap_err();
    assert!(err.is_permission_denied());
}

#[test]
fn no_identity_and_cancellation() {
    let fs = kernel(vec![], Effect::Allow);

    assert!(matches!(
        fs.stat(&RequestContext::new(), Path::new("/x")),
        Err(KernelError::NoIdentity)
    ));

    let token = wardenfs::kernel::CancelToken::new();
    let ctx = RequestContext::new().with_user("a").with_cancel_token(token.clone());
    token.cancel();
    assert!(matches!(
        fs.stat(&ctx, Path::new("/x")),
        Err(KernelError::Cancelled)
    ));
}

#[test]
fn rename_emits_two_independent_checks() {
    let fs = kernel(
        vec![
            rule(Subject::User("a".into()), "/inbox/**", Operation::ALL, Effect::Allow, 10),
            rule(
                Subject::User("a".into()),
                "/archive/**",
                Operation::WRITE | Operation::READ,
                Effect::Allow,
                10,
            ),
        ],
        Effect::Deny,
    );
    let ctx = RequestContext::new().with_user("a");
    seed_file(&fs, &ctx, "/inbox/mail-1");
    fs.mkdir(&ctx, Path::new("/archive"), FileMode::new(0o755)).unwrap();

    // Delete on /inbox, write on /archive: both grants present
    fs.rename(&ctx, Path::new("/inbox/mail-1"), Path::new("/archive/mail-1"))
        .unwrap();

    // The reverse direction needs delete on /archive, which is missing
    let err = fs
        .rename(&ctx, Path::new("/archive/mail-1"), Path::new("/inbox/mail-1"))
        .unwrap_err();
    assert!(err.is_permission_denied());
}

#[test]
fn path_canonicalization_applies_to_checks() {
    let fs = kernel(
        vec![rule(
            Subject::User("a".into()),
            "/data/**",
            Operation::ALL,
            Effect::Allow,
            10,
        )],
        Effect::Deny,
    );
    let ctx = RequestContext::new().with_user("a");

    fs.mkdir_all(&ctx, Path::new("/data/sub"), FileMode::new(0o755)).unwrap();

    // Messy spellings of a granted path are still granted
    fs.stat(&ctx, Path::new("/data//sub/./")).unwrap();

    // Dot-dot escapes out of the granted subtree are caught after cleaning
    let err = fs.stat(&ctx, Path::new("/data/../etc")).unwrap_err();
    assert!(err.is_permission_denied());
}
