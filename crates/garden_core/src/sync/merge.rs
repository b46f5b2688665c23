use crate::model::TaskRecord;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub new: usize,
    pub updated: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub tasks: Vec<TaskRecord>,
    pub stats: MergeStats,
}

enum Upsert {
    Inserted,
    Replaced,
    Dropped,
}

/// Task list keyed by identifier that remembers insertion order.
#[derive(Debug, Default)]
struct TaskIndex {
    tasks: Vec<TaskRecord>,
    positions: HashMap<String, usize>,
}

impl TaskIndex {
    fn upsert(&mut self, task: TaskRecord) -> Upsert {
        let Some(key) = task.identifier().map(str::to_string) else {
            warn!(name = %task.name, "dropping task without identifier");
            return Upsert::Dropped;
        };

        match self.positions.get(&key) {
            Some(&index) => {
                self.tasks[index] = task;
                Upsert::Replaced
            }
            None => {
                self.positions.insert(key, self.tasks.len());
                self.tasks.push(task);
                Upsert::Inserted
            }
        }
    }
}

/// Merges `incoming` into `existing` by identifier.
///
/// The incoming record wins on conflict and keeps the position of the record
/// it replaces. New identifiers are appended in the order they arrive.
/// Counts describe `incoming` only.
pub fn merge_by_identifier(existing: Vec<TaskRecord>, incoming: Vec<TaskRecord>) -> MergeOutcome {
    let mut index = TaskIndex {
        tasks: Vec::with_capacity(existing.len() + incoming.len()),
        positions: HashMap::with_capacity(existing.len() + incoming.len()),
    };
    for task in existing {
        index.upsert(task);
    }

    let mut stats = MergeStats::default();
    for task in incoming {
        match index.upsert(task) {
            Upsert::Inserted => stats.new += 1,
            Upsert::Replaced => stats.updated += 1,
            Upsert::Dropped => stats.dropped += 1,
        }
    }

    MergeOutcome {
        tasks: index.tasks,
        stats,
    }
}
