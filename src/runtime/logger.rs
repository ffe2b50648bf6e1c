use std::sync::Arc;

use crate::common::counters::{CounterGroups, WARNING_GROUP};

/// Warning sink installed for operators and UDFs running inside a task.
///
/// With aggregation on, each warning bumps a counter under its key and the
/// coordinator reports totals once the script finishes. Otherwise every
/// warning is logged where it happens.
#[derive(Debug, Clone)]
pub struct CountersLogger {
    counters: Arc<CounterGroups>,
    aggregate: bool,
}

impl CountersLogger {
    pub fn new(counters: Arc<CounterGroups>, aggregate: bool) -> Self {
        Self { counters, aggregate }
    }

    pub fn is_aggregate(&self) -> bool {
        self.aggregate
    }

    pub fn warn(&self, origin: &str, message: &str, key: &str) {
        if self.aggregate {
            self.counters.increment(WARNING_GROUP, key, 1);
        } else {
            tracing::warn!(origin, key, "{}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_warnings_land_in_counters() {
        let counters = Arc::new(CounterGroups::new());
        let logger = CountersLogger::new(counters.clone(), true);
        logger.warn("Divide", "division by zero", "DIVIDE_BY_ZERO");
        logger.warn("Divide", "division by zero", "DIVIDE_BY_ZERO");
        assert_eq!(counters.value(WARNING_GROUP, "DIVIDE_BY_ZERO"), Some(2));
    }

    #[test]
    fn test_non_aggregate_warnings_skip_counters() {
        let counters = Arc::new(CounterGroups::new());
        let logger = CountersLogger::new(counters.clone(), false);
        logger.warn("Divide", "division by zero", "DIVIDE_BY_ZERO");
        assert_eq!(counters.group(WARNING_GROUP), None);
    }
}
