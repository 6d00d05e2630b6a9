/*!
 * Condition Algebra
 * Pluggable predicates gating ACL entries: time windows, source networks,
 * metadata matches, user functions, and boolean combinators
 */

use super::entry::EvaluationContext;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use ipnet::IpNet;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// Context metadata key the IP condition reads the caller address from
pub const SOURCE_IP_KEY: &str = "source_ip";

/// An inclusive range of hours, 0-23 on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourRange {
    pub start: u8,
    pub end: u8,
}

impl HourRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    fn contains(&self, hour: u8) -> bool {
        hour >= self.start && hour <= self.end
    }
}

/// Restricts access to configured hours and days of week.
///
/// An empty list for either dimension means no restriction in that dimension.
/// Evaluation converts the current instant to `timezone` when set, UTC
/// otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub allowed_hours: Vec<HourRange>,
    pub allowed_days: Vec<Weekday>,
    pub timezone: Option<FixedOffset>,
}

impl TimeWindow {
    /// Standard business hours: 09:00-17:59, Monday through Friday
    pub fn business_hours() -> Self {
        Self {
            allowed_hours: vec![HourRange::new(9, 17)],
            allowed_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            timezone: None,
        }
    }

    fn evaluate_now(&self) -> bool {
        self.evaluate_at(Utc::now())
    }

    fn evaluate_at(&self, instant: DateTime<Utc>) -> bool {
        let (weekday, hour) = match self.timezone {
            Some(tz) => {
                let local = instant.with_timezone(&tz);
                (local.weekday(), local.hour() as u8)
            }
            None => (instant.weekday(), instant.hour() as u8),
        };

        if !self.allowed_days.is_empty() && !self.allowed_days.contains(&weekday) {
            return false;
        }

        if !self.allowed_hours.is_empty() && !self.allowed_hours.iter().any(|r| r.contains(hour)) {
            return false;
        }

        true
    }
}

/// Restricts access by the caller's source address.
///
/// The address is read from request metadata under [`SOURCE_IP_KEY`]; a
/// missing or unparseable address fails the condition. Denied networks win
/// over allowed ones, and an empty allow list admits every address that was
/// not denied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpCondition {
    pub allowed: Vec<IpNet>,
    pub denied: Vec<IpNet>,
}

impl IpCondition {
    /// Build from CIDR strings such as `"10.0.0.0/8"`.
    pub fn from_cidrs(
        allowed: &[&str],
        denied: &[&str],
    ) -> Result<Self, ipnet::AddrParseError> {
        Ok(Self {
            allowed: allowed.iter().map(|c| c.parse()).collect::<Result<_, _>>()?,
            denied: denied.iter().map(|c| c.parse()).collect::<Result<_, _>>()?,
        })
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> bool {
        let Some(ip) = ctx
            .metadata
            .get(SOURCE_IP_KEY)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<IpAddr>().ok())
        else {
            return false;
        };

        if self.denied.iter().any(|net| net.contains(&ip)) {
            return false;
        }

        self.allowed.is_empty() || self.allowed.iter().any(|net| net.contains(&ip))
    }
}

/// Requires a request metadata value to be one of a fixed set of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataCondition {
    pub key: String,
    pub values: Vec<String>,
    pub case_sensitive: bool,
}

impl MetadataCondition {
    pub fn new(key: impl Into<String>, values: Vec<String>, case_sensitive: bool) -> Self {
        Self {
            key: key.into(),
            values,
            case_sensitive,
        }
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> bool {
        let Some(value) = ctx.metadata.get(&self.key).and_then(|v| v.as_str()) else {
            return false;
        };

        self.values.iter().any(|allowed| {
            if self.case_sensitive {
                value == allowed
            } else {
                value.eq_ignore_ascii_case(allowed)
            }
        })
    }
}

/// Caller-supplied predicate over the evaluation context
pub type ConditionFn = dyn Fn(&EvaluationContext) -> bool + Send + Sync;

/// Wraps a user function as a condition. The name appears in diagnostics.
#[derive(Clone)]
pub struct FuncCondition {
    pub name: String,
    func: Arc<ConditionFn>,
}

impl FuncCondition {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&EvaluationContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FuncCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncCondition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A predicate that must hold for an ACL entry to apply.
///
/// Conditions are side-effect free; combinators short-circuit.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Hour/day-of-week window, optionally in a fixed-offset timezone
    TimeWindow(TimeWindow),
    /// Source-address allow/deny networks
    Ip(IpCondition),
    /// Request metadata string match
    Metadata(MetadataCondition),
    /// User-defined function
    Func(FuncCondition),
    /// All sub-conditions must hold
    All(Vec<Condition>),
    /// At least one sub-condition must hold
    Any(Vec<Condition>),
    /// The wrapped condition must not hold
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluate against the context. Pure with respect to the context; the
    /// time window additionally reads the current clock.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> bool {
        match self {
            Condition::TimeWindow(tw) => tw.evaluate_now(),
            Condition::Ip(ip) => ip.evaluate(ctx),
            Condition::Metadata(md) => md.evaluate(ctx),
            Condition::Func(func) => (func.func)(ctx),
            Condition::All(subs) => subs.iter().all(|c| c.evaluate(ctx)),
            Condition::Any(subs) => subs.iter().any(|c| c.evaluate(ctx)),
            Condition::Not(sub) => !sub.evaluate(ctx),
        }
    }

    /// Deterministic evaluation at a fixed instant, for time-dependent tests
    pub fn evaluate_at(&self, ctx: &EvaluationContext, instant: DateTime<Utc>) -> bool {
        match self {
            Condition::TimeWindow(tw) => tw.evaluate_at(instant),
            Condition::All(subs) => subs.iter().all(|c| c.evaluate_at(ctx, instant)),
            Condition::Any(subs) => subs.iter().any(|c| c.evaluate_at(ctx, instant)),
            Condition::Not(sub) => !sub.evaluate_at(ctx, instant),
            other => other.evaluate(ctx),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::TimeWindow(_) => f.write_str("TimeWindow"),
            Condition::Ip(_) => f.write_str("Ip"),
            Condition::Metadata(md) => write!(f, "Metadata:{}", md.key),
            Condition::Func(func) => write!(f, "Func:{}", func.name),
            Condition::All(subs) => write!(f, "All[{}]", subs.len()),
            Condition::Any(subs) => write!(f, "Any[{}]", subs.len()),
            Condition::Not(_) => f.write_str("Not"),
        }
    }
}
