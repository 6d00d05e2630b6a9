/*!
 * Audit Pipeline Through the Façade
 */

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use wardenfs::audit::{AuditConfig, AuditEvent, AuditLevel, AuditOutcome};
use wardenfs::kernel::{Config, PerformanceConfig, RequestContext, WardenFs};
use wardenfs::policy::{Acl, AclEntry, Effect, Operation, Subject};
use wardenfs::vfs::MemFs;

/// Sink shared between the kernel and the test assertions
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn events(&self) -> Vec<AuditEvent> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn audited_kernel(audit: AuditConfig) -> WardenFs {
    let acl = Acl::new(
        vec![
            AclEntry::new(Subject::User("alice".into()), "/**", Operation::ALL, Effect::Allow)
                .with_priority(10),
        ],
        Effect::Deny,
    );
    let config = Config {
        acl,
        performance: PerformanceConfig::uncached(),
        audit,
    };
    WardenFs::new(Arc::new(MemFs::new()), config).unwrap()
}

#[test]
fn async_close_drains_every_event_exactly_once() {
    let sink = SharedBuf::default();
    let fs = audited_kernel(AuditConfig {
        sink: Some(Box::new(sink.clone())),
        async_mode: true,
        buffer_size: 4,
        ..Default::default()
    });
    let ctx = RequestContext::new().with_user("alice");

    for i in 0..20 {
        let _ = fs.stat(&ctx, Path::new(&format!("/file-{i:02}")));
    }
    fs.close();

    let events = sink.events();
    assert_eq!(events.len(), 20);

    let mut paths: Vec<String> = events.iter().map(|e| e.path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 20, "each check audited exactly once");
}

#[test]
fn async_events_arrive_in_submission_order() {
    let sink = SharedBuf::default();
    let fs = audited_kernel(AuditConfig {
        sink: Some(Box::new(sink.clone())),
        async_mode: true,
        buffer_size: 64,
        ..Default::default()
    });
    let ctx = RequestContext::new().with_user("alice");

    for i in 0..20 {
        let _ = fs.stat(&ctx, Path::new(&format!("/file-{i:02}")));
    }
    fs.close();

    let paths: Vec<String> = sink.events().iter().map(|e| e.path.clone()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[test]
fn close_twice_is_safe() {
    let sink = SharedBuf::default();
    let fs = audited_kernel(AuditConfig {
        sink: Some(Box::new(sink.clone())),
        async_mode: true,
        buffer_size: 8,
        ..Default::default()
    });
    let ctx = RequestContext::new().with_user("alice");

    fs.stat(&ctx, Path::new("/")).unwrap();
    fs.close();
    fs.close();
    assert_eq!(sink.events().len(), 1);
}

#[test]
fn denied_level_keeps_only_denials() {
    let sink = SharedBuf::default();
    let fs = audited_kernel(AuditConfig {
        sink: Some(Box::new(sink.clone())),
        level: AuditLevel::Denied,
        ..Default::default()
    });

    let alice = RequestContext::new().with_user("alice");
    let eve = RequestContext::new().with_user("eve");

    fs.stat(&alice, Path::new("/")).unwrap();
    let _ = fs.stat(&eve, Path::new("/"));
    fs.close();

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].user_id, "eve");
    assert_eq!(events[0].result, AuditOutcome::Denied);
    assert_eq!(events[0].reason.as_deref(), Some("access denied by policy"));
}

#[test]
fn events_carry_identity_request_id_and_source_ip() {
    let sink = SharedBuf::default();
    let fs = audited_kernel(AuditConfig {
        sink: Some(Box::new(sink.clone())),
        ..Default::default()
    });

    let ctx = RequestContext::new()
        .with_identity(
            wardenfs::Identity::user("alice")
                .with_group("staff")
                .with_role("auditor"),
        )
        .with_request_id("req-42")
        .insert_metadata("source_ip", serde_json::json!("10.1.2.3"));

    fs.stat(&ctx, Path::new("/")).unwrap();
    fs.close();

    let events = sink.events();
    let event = &events[0];
    assert_eq!(event.request_id.as_deref(), Some("req-42"));
    assert_eq!(event.groups, vec!["staff".to_string()]);
    assert_eq!(event.roles, vec!["auditor".to_string()]);
    assert_eq!(event.source_ip.as_deref(), Some("10.1.2.3"));
    assert_eq!(event.operation, "Metadata");
}

#[test]
fn metrics_aggregate_results_and_top_n() {
    let sink = SharedBuf::default();
    let fs = audited_kernel(AuditConfig {
        sink: Some(Box::new(sink.clone())),
        ..Default::default()
    });

    let alice = RequestContext::new().with_user("alice");
    let eve = RequestContext::new().with_user("eve");
    let mallory = RequestContext::new().with_user("mallory");

    fs.stat(&alice, Path::new("/")).unwrap();
    let _ = fs.stat(&eve, Path::new("/blocked"));
    let _ = fs.stat(&mallory, Path::new("/blocked"));
    let _ = fs.stat(&mallory, Path::new("/blocked"));
    fs.close();

    let stats = fs.get_audit_stats();
    assert_eq!(stats.total_events, 4);
    assert_eq!(stats.allowed_events, 1);
    assert_eq!(stats.denied_events, 3);
    assert_eq!(stats.error_events, 0);

    let metrics = fs.get_audit_metrics();
    let top_users = metrics.top_denied_users(1);
    assert_eq!(top_users[0].user_id, "mallory");
    assert_eq!(top_users[0].count, 2);

    let top_paths = metrics.top_accessed_paths(1);
    assert_eq!(top_paths[0].path, "/blocked");
    assert_eq!(top_paths[0].count, 3);
}

#[test]
fn custom_handler_runs_before_emission() {
    let sink = SharedBuf::default();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_handler = Arc::clone(&seen);

    let fs = audited_kernel(AuditConfig {
        sink: Some(Box::new(sink.clone())),
        handler: Some(Arc::new(move |event: &AuditEvent| {
            seen_by_handler.lock().unwrap().push(event.path.clone());
        })),
        ..Default::default()
    });

    let ctx = RequestContext::new().with_user("alice");
    fs.stat(&ctx, Path::new("/")).unwrap();
    fs.close();

    assert_eq!(seen.lock().unwrap().as_slice(), ["/".to_string()]);
    assert_eq!(sink.events().len(), 1);
}
