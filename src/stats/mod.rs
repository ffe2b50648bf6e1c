pub mod aggregator;
pub mod dedup;
pub mod job_graph;
pub mod job_stats;
pub mod metrics;
pub mod warnings;

pub use aggregator::{AggregatorState, StatsAggregator};
pub use dedup::StatsDeduplicator;
pub use job_graph::AggregateJobGraph;
pub use job_stats::{InputStats, JobFailure, JobStatsRecord, OutputStats};
pub use metrics::{JobMeasurements, TaskMetrics};
pub use warnings::{WarningAggregator, WarningKey, WarningSummary};
