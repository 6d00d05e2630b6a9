/*!
 * Decision Cache Behavior Through the Façade
 */

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use wardenfs::audit::AuditConfig;
use wardenfs::kernel::{Config, PerformanceConfig, RequestContext, WardenFs};
use wardenfs::policy::{Acl, AclEntry, Effect, Operation, Subject};
use wardenfs::vfs::{FileMode, MemFs};

fn cached_kernel(entries: Vec<AclEntry>, performance: PerformanceConfig) -> WardenFs {
    let config = Config {
        acl: Acl::new(entries, Effect::Deny),
        performance,
        audit: AuditConfig {
            enabled: false,
            ..Default::default()
        },
    };
    WardenFs::new(Arc::new(MemFs::new()), config).unwrap()
}

fn allow_all(user: &str) -> AclEntry {
    AclEntry::new(Subject::User(user.into()), "/**", Operation::ALL, Effect::Allow)
        .with_priority(10)
}

#[test]
fn repeated_checks_hit_the_cache() {
    let fs = cached_kernel(vec![allow_all("alice")], PerformanceConfig::default());
    let ctx = RequestContext::new().with_user("alice");

    fs.stat(&ctx, Path::new("/")).unwrap();
    fs.stat(&ctx, Path::new("/")).unwrap();
    fs.stat(&ctx, Path::new("/")).unwrap();

    let stats = fs.get_cache_stats().unwrap();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

#[test]
fn add_rule_invalidates_cached_decisions() {
    let fs = cached_kernel(vec![allow_all("alice")], PerformanceConfig::default());
    let ctx = RequestContext::new().with_user("alice");

    // Populate
    fs.stat(&ctx, Path::new("/f")).err(); // backend NotFound; decision cached anyway
    let before = fs.get_cache_stats().unwrap();
    assert_eq!(before.size, 1);

    fs.add_rule(
        AclEntry::new(Subject::User("alice".into()), "/f", Operation::ALL, Effect::Deny)
            .with_priority(100),
    );

    // Cache emptied by the mutation; next check is a miss and sees the deny
    let after = fs.get_cache_stats().unwrap();
    assert_eq!(after.size, 0);

    let misses_before = after.misses;
    let err = fs.stat(&ctx, Path::new("/f")).unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(fs.get_cache_stats().unwrap().misses, misses_before + 1);
}

#[test]
fn remove_rule_invalidates_cached_decisions() {
    let rule = allow_all("alice");
    let fs = cached_kernel(vec![rule.clone()], PerformanceConfig::default());
    let ctx = RequestContext::new().with_user("alice");

    fs.stat(&ctx, Path::new("/")).unwrap();
    assert_eq!(fs.get_cache_stats().unwrap().size, 1);

    fs.remove_rule(&rule);
    assert_eq!(fs.get_cache_stats().unwrap().size, 0);

    // With the rule gone the default deny applies
    assert!(fs.stat(&ctx, Path::new("/")).unwrap_err().is_permission_denied());
}

#[test]
fn selective_invalidation_by_user_and_prefix() {
    let fs = cached_kernel(
        vec![allow_all("alice"), allow_all("bob")],
        PerformanceConfig::default(),
    );
    let alice = RequestContext::new().with_user("alice");
    let bob = RequestContext::new().with_user("bob");

    fs.mkdir_all(&alice, Path::new("/home/alice"), FileMode::new(0o755)).unwrap();
    fs.stat(&alice, Path::new("/home/alice")).unwrap();
    fs.stat(&bob, Path::new("/home/alice")).unwrap();
    assert_eq!(fs.get_cache_stats().unwrap().size, 3);

    fs.invalidate_cache(Some("alice"), Some("/home/alice"));

    // Alice's /home/alice decisions are gone; bob's survives
    let stats = fs.get_cache_stats().unwrap();
    assert_eq!(stats.size, 1);

    // Invalidation twice is the same as once
    fs.invalidate_cache(Some("alice"), Some("/home/alice"));
    assert_eq!(fs.get_cache_stats().unwrap().size, 1);
}

#[test]
fn clear_cache_removes_everything() {
    let fs = cached_kernel(vec![allow_all("alice")], PerformanceConfig::default());
    let ctx = RequestContext::new().with_user("alice");

    fs.stat(&ctx, Path::new("/")).unwrap();
    fs.read_dir(&ctx, Path::new("/")).unwrap();
    assert!(fs.get_cache_stats().unwrap().size >= 2);

    fs.clear_cache();
    assert_eq!(fs.get_cache_stats().unwrap().size, 0);
}

#[test]
fn ttl_expiry_forces_reevaluation() {
    let fs = cached_kernel(
        vec![allow_all("alice")],
        PerformanceConfig {
            cache_ttl: Duration::from_millis(20),
            ..Default::default()
        },
    );
    let ctx = RequestContext::new().with_user("alice");

    fs.stat(&ctx, Path::new("/")).unwrap();
    std::thread::sleep(Duration::from_millis(40));
    fs.stat(&ctx, Path::new("/")).unwrap();

    let stats = fs.get_cache_stats().unwrap();
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 2);
}

#[test]
fn disabled_cache_reports_no_stats() {
    let fs = cached_kernel(vec![allow_all("alice")], PerformanceConfig::uncached());
    let ctx = RequestContext::new().with_user("alice");

    fs.stat(&ctx, Path::new("/")).unwrap();
    assert!(fs.get_cache_stats().is_none());
}

#[test]
fn capacity_bound_evicts_exactly_lru() {
    let fs = cached_kernel(
        vec![allow_all("alice")],
        PerformanceConfig {
            cache_max_size: 2,
            ..Default::default()
        },
    );
    let ctx = RequestContext::new().with_user("alice");

    fs.stat(&ctx, Path::new("/")).unwrap(); // key A
    fs.read_dir(&ctx, Path::new("/")).unwrap(); // key B
    fs.stat(&ctx, Path::new("/")).unwrap(); // touch A, B is LRU
    fs.chown(&ctx, Path::new("/"), 0, 0).unwrap(); // key C evicts B

    let stats = fs.get_cache_stats().unwrap();
    assert_eq!(stats.size, 2);
    assert_eq!(stats.evictions, 1);

    // A is still cached (hit), B was evicted (miss)
    let hits_before = stats.hits;
    fs.stat(&ctx, Path::new("/")).unwrap();
    assert_eq!(fs.get_cache_stats().unwrap().hits, hits_before + 1);

    let misses_before = fs.get_cache_stats().unwrap().misses;
    fs.read_dir(&ctx, Path::new("/")).unwrap();
    assert_eq!(fs.get_cache_stats().unwrap().misses, misses_before + 1);
}
