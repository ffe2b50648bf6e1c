use std::collections::HashSet;

use tracing::debug;

use crate::common::ids::PlanNodeId;
use crate::plan::OperatorSubgraph;
use crate::stats::job_stats::JobStatsRecord;
use crate::stats::metrics::JobMeasurements;

/// Remembers which subgraphs (and which loads) already contributed input stats
/// to the job graph, so fused jobs sharing loads do not report them twice.
#[derive(Debug, Default)]
pub struct StatsDeduplicator {
    processed: HashSet<PlanNodeId>,
    contributed_loads: HashSet<PlanNodeId>,
}

impl StatsDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds input stats for the subgraph's loads to `record`. Returns false,
    /// leaving the record untouched, when the subgraph was already processed.
    pub fn add_input_info_for_operator(
        &mut self,
        subgraph: &OperatorSubgraph,
        record: &mut JobStatsRecord,
        success: bool,
        measurements: Option<&JobMeasurements>,
    ) -> bool {
        if !self.processed.insert(subgraph.id) {
            return false;
        }

        let loads = subgraph.loads();
        let sole_input = loads.len() == 1;
        for load in loads {
            if load.is_tmp_load {
                continue;
            }
            // a load node shared by two subgraphs still reports once
            if !self.contributed_loads.insert(load.id) {
                debug!(load = %load.id, subgraph = %subgraph.id, "load already reported");
                continue;
            }
            record.add_input_stats(load, success, sole_input, measurements);
        }
        true
    }

    pub fn is_processed(&self, subgraph: PlanNodeId) -> bool {
        self.processed.contains(&subgraph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ids::JobId;
    use crate::common::test_utils::fused_subgraph;
    use crate::plan::{LoadOperator, PhysicalOperator};

    #[test]
    fn test_second_call_is_a_no_op() {
        let subgraph = fused_subgraph(10, &[(1, "a"), (2, "b")], &[(5, "out")]);
        let mut dedup = StatsDeduplicator::new();

        let mut once = JobStatsRecord::new(JobId::from(1), true);
        assert!(dedup.add_input_info_for_operator(&subgraph, &mut once, true, None));
        assert!(!dedup.add_input_info_for_operator(&subgraph, &mut once, true, None));

        let mut fresh = StatsDeduplicator::new();
        let mut expected = JobStatsRecord::new(JobId::from(1), true);
        fresh.add_input_info_for_operator(&subgraph, &mut expected, true, None);

        assert_eq!(once.inputs(), expected.inputs());
        assert_eq!(once.inputs().len(), 2);
        assert!(!once.inputs()[0].sole_input);
        assert!(dedup.is_processed(PlanNodeId(10)));
    }

    #[test]
    fn test_tmp_loads_are_skipped() {
        let subgraph = fused_subgraph(10, &[(1, "a")], &[(5, "out")]).with_operator(PhysicalOperator::Load(
            LoadOperator::new(PlanNodeId(3), "/tmp/intermediate").tmp(),
        ));
        let mut dedup = StatsDeduplicator::new();
        let mut record = JobStatsRecord::new(JobId::from(1), true);
        dedup.add_input_info_for_operator(&subgraph, &mut record, true, None);

        assert_eq!(record.inputs().len(), 1);
        assert_eq!(record.inputs()[0].location, "a");
    }

    #[test]
    fn test_shared_load_reports_once_across_subgraphs() {
        let first = fused_subgraph(10, &[(1, "a")], &[(5, "out1")]);
        let second = fused_subgraph(11, &[(1, "a"), (2, "b")], &[(6, "out2")]);
        let mut dedup = StatsDeduplicator::new();

        let mut r1 = JobStatsRecord::new(JobId::from(1), true);
        let mut r2 = JobStatsRecord::new(JobId::from(2), true);
        dedup.add_input_info_for_operator(&first, &mut r1, true, None);
        dedup.add_input_info_for_operator(&second, &mut r2, true, None);

        assert_eq!(r1.inputs().len(), 1);
        assert!(r1.inputs()[0].sole_input);
        assert_eq!(r2.inputs().len(), 1);
        assert_eq!(r2.inputs()[0].location, "b");
    }
}
