use crate::clock::format_rfc3339;
use crate::model::TaskRecord;
use rand::Rng;
use time::{Duration, OffsetDateTime};

/// Number of records produced for demo mode and for placeholder data.
pub const SYNTHETIC_TASK_COUNT: usize = 15;
const LOOKBACK_DAYS: i64 = 30;

const TASK_NAMES: &[&str] = &[
    "Review quarterly roadmap",
    "Fix login redirect",
    "Write release notes",
    "Plan team offsite",
    "Update onboarding guide",
    "Triage support inbox",
    "Refactor billing module",
    "Prepare demo for customers",
    "Audit access permissions",
    "Draft hiring plan",
    "Clean up staging data",
    "Ship dark mode",
    "Renew SSL certificates",
    "Sync with design",
    "Close out sprint",
    "Benchmark search latency",
    "Archive old projects",
    "Record product walkthrough",
];

/// Records shown when the session runs against the demo credential.
pub fn demo_tasks<R: Rng + ?Sized>(rng: &mut R, now: OffsetDateTime) -> Vec<TaskRecord> {
    generate(rng, now, "demo")
}

/// Records shown after a failed foreground fetch so the garden is never empty.
pub fn placeholder_tasks<R: Rng + ?Sized>(rng: &mut R, now: OffsetDateTime) -> Vec<TaskRecord> {
    generate(rng, now, "placeholder")
}

fn generate<R: Rng + ?Sized>(rng: &mut R, now: OffsetDateTime, prefix: &str) -> Vec<TaskRecord> {
    (0..SYNTHETIC_TASK_COUNT)
        .map(|index| {
            let name = TASK_NAMES[rng.random_range(0..TASK_NAMES.len())];
            let age = Duration::days(rng.random_range(0..LOOKBACK_DAYS))
                + Duration::minutes(rng.random_range(0..24 * 60));
            let completed_at = format_rfc3339(now - age).ok();
            TaskRecord::new(format!("{prefix}-{}", index + 1), name, completed_at)
        })
        .collect()
}
