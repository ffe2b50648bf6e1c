pub mod common;
pub mod plan;
pub mod runtime;
pub mod stats;

pub use common::error::BridgeError;
pub use runtime::input_format::SplitAdapter;
pub use stats::aggregator::StatsAggregator;
