use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::common::counters::CounterSnapshot;

pub const METRIC_EXECUTOR_RUN_TIME: &str = "ExecutorRunTime";
pub const METRIC_GC_TIME: &str = "GcTime";
pub const METRIC_RESULT_SIZE: &str = "ResultSize";
pub const METRIC_RECORDS_READ: &str = "RecordsRead";
pub const METRIC_BYTES_READ: &str = "BytesRead";
pub const METRIC_RECORDS_WRITTEN: &str = "RecordsWritten";
pub const METRIC_BYTES_WRITTEN: &str = "BytesWritten";

// per-task metrics reported by the framework
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub run_time_ms: u64,
    pub gc_time_ms: u64,
    pub result_size: u64,
    pub records_read: u64,
    pub bytes_read: u64,
    pub records_written: u64,
    pub bytes_written: u64,
}

impl TaskMetrics {
    pub fn merge(stats: Vec<&TaskMetrics>) -> Self {
        Self {
            run_time_ms: stats.iter().map(|s| s.run_time_ms).sum(),
            gc_time_ms: stats.iter().map(|s| s.gc_time_ms).sum(),
            result_size: stats.iter().map(|s| s.result_size).sum(),
            records_read: stats.iter().map(|s| s.records_read).sum(),
            bytes_read: stats.iter().map(|s| s.bytes_read).sum(),
            records_written: stats.iter().map(|s| s.records_written).sum(),
            bytes_written: stats.iter().map(|s| s.bytes_written).sum(),
        }
    }
}

/// What the coordinator measured for one physical job: task metrics summed
/// over all tasks, plus the job's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMeasurements {
    task_count: usize,
    metrics: IndexMap<String, u64>,
    counters: CounterSnapshot,
}

impl JobMeasurements {
    pub fn from_tasks(tasks: &[TaskMetrics], counters: CounterSnapshot) -> Self {
        let total = TaskMetrics::merge(tasks.iter().collect());
        let metrics = IndexMap::from([
            (METRIC_EXECUTOR_RUN_TIME.to_string(), total.run_time_ms),
            (METRIC_GC_TIME.to_string(), total.gc_time_ms),
            (METRIC_RESULT_SIZE.to_string(), total.result_size),
            (METRIC_RECORDS_READ.to_string(), total.records_read),
            (METRIC_BYTES_READ.to_string(), total.bytes_read),
            (METRIC_RECORDS_WRITTEN.to_string(), total.records_written),
            (METRIC_BYTES_WRITTEN.to_string(), total.bytes_written),
        ]);
        Self {
            task_count: tasks.len(),
            metrics,
            counters,
        }
    }

    pub fn task_count(&self) -> usize {
        self.task_count
    }

    pub fn metric(&self, name: &str) -> Option<u64> {
        self.metrics.get(name).copied()
    }

    pub fn metrics(&self) -> &IndexMap<String, u64> {
        &self.metrics
    }

    pub fn counters(&self) -> &CounterSnapshot {
        &self.counters
    }
}
