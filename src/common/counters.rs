use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::common::ids::PlanNodeId;

/// Group holding operator warnings, keyed by warning name.
pub const WARNING_GROUP: &str = "VOLGA_WARN";
/// Group holding records read per load operator.
pub const INPUT_RECORDS_GROUP: &str = "MultiInputCounters";
/// Group holding records written per store operator.
pub const OUTPUT_RECORDS_GROUP: &str = "MultiStoreCounters";

pub fn input_counter_name(load: PlanNodeId) -> String {
    format!("input_records_{}", load.0)
}

pub fn output_counter_name(store: PlanNodeId) -> String {
    format!("output_records_{}", store.0)
}

type Groups = IndexMap<String, IndexMap<String, u64>>;

/// Named counter groups shared by all tasks of one physical job.
#[derive(Debug, Default)]
pub struct CounterGroups {
    groups: Mutex<Groups>,
}

impl CounterGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, group: &str, name: &str, by: u64) {
        let mut groups = self.groups.lock();
        let counters = groups.entry(group.to_string()).or_default();
        *counters.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn value(&self, group: &str, name: &str) -> Option<u64> {
        self.groups.lock().get(group)?.get(name).copied()
    }

    pub fn group(&self, group: &str) -> Option<IndexMap<String, u64>> {
        self.groups.lock().get(group).cloned()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            groups: self.groups.lock().clone(),
        }
    }
}

/// Read-only copy of counter groups, as reported back to the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    groups: Groups,
}

impl CounterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counter(mut self, group: &str, name: &str, value: u64) -> Self {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(name.to_string(), value);
        self
    }

    pub fn get(&self, group: &str, name: &str) -> Option<u64> {
        self.groups.get(group)?.get(name).copied()
    }

    pub fn group(&self, group: &str) -> Option<&IndexMap<String, u64>> {
        self.groups.get(group)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(|g| g.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_from_many_threads() {
        let counters = Arc::new(CounterGroups::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = counters.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        counters.increment(WARNING_GROUP, "DIVIDE_BY_ZERO", 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.value(WARNING_GROUP, "DIVIDE_BY_ZERO"), Some(400));
        assert_eq!(counters.value(WARNING_GROUP, "missing"), None);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.get(WARNING_GROUP, "DIVIDE_BY_ZERO"), Some(400));
        assert!(!snapshot.is_empty());
    }
}
