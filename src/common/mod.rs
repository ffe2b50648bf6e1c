pub mod config;
pub mod counters;
pub mod error;
pub mod ids;
pub mod test_utils;

pub use config::JobConf;
pub use counters::{CounterGroups, CounterSnapshot};
pub use error::BridgeError;
pub use ids::{JobId, PlanNodeId, TaskAttemptId};
