use std::convert::Infallible;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::common::config::JobConf;
use crate::common::error::BridgeError;
use crate::common::ids::JobId;
use crate::plan::{JobPlan, OperatorSubgraph, StoreOperator};
use crate::runtime::engine_context::EngineContext;
use crate::stats::dedup::StatsDeduplicator;
use crate::stats::job_graph::AggregateJobGraph;
use crate::stats::job_stats::JobStatsRecord;
use crate::stats::metrics::JobMeasurements;
use crate::stats::warnings::{WarningAggregator, WarningSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    NotStarted,
    Running,
    Finished,
}

impl AggregatorState {
    fn as_str(&self) -> &'static str {
        match self {
            AggregatorState::NotStarted => "not started",
            AggregatorState::Running => "running",
            AggregatorState::Finished => "finished",
        }
    }
}

/// Script-level statistics, fed by the coordinator as physical jobs complete.
///
/// Callbacks are expected one at a time per script execution; the aggregator
/// does no internal locking.
#[derive(Debug)]
pub struct StatsAggregator {
    state: AggregatorState,
    engine: Option<Arc<EngineContext>>,
    job_plan: Option<Arc<JobPlan>>,
    conf: JobConf,
    job_graph: AggregateJobGraph,
    dedup: StatsDeduplicator,
    warnings: WarningAggregator,
    warning_summary: Option<WarningSummary>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            state: AggregatorState::NotStarted,
            engine: None,
            job_plan: None,
            conf: JobConf::new(),
            job_graph: AggregateJobGraph::new(),
            dedup: StatsDeduplicator::new(),
            warnings: WarningAggregator::default(),
            warning_summary: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn initialize(
        &mut self,
        engine: Arc<EngineContext>,
        job_plan: Arc<JobPlan>,
        conf: JobConf,
    ) -> Result<(), BridgeError> {
        if self.state != AggregatorState::NotStarted {
            return Err(BridgeError::InvalidState {
                operation: "initialize",
                state: self.state.as_str(),
            });
        }
        info!(jobs = job_plan.len(), "starting script statistics");
        self.engine = Some(engine);
        self.job_plan = Some(job_plan);
        self.conf = conf;
        self.started_at = Some(Instant::now());
        self.state = AggregatorState::Running;
        Ok(())
    }

    fn check_running(&self, operation: &'static str) {
        if self.state != AggregatorState::Running {
            warn!(operation, state = self.state.as_str(), "job stats recorded outside a running script");
        }
    }

    /// Records a job that completed (successfully or not) with measurements.
    pub fn add_job_stats(
        &mut self,
        store: &StoreOperator,
        subgraph: Arc<OperatorSubgraph>,
        job_id: JobId,
        success: bool,
        measurements: &JobMeasurements,
    ) -> &JobStatsRecord {
        self.check_running("add_job_stats");
        let mut record = JobStatsRecord::new(job_id, success);
        record.collect_stats(measurements);
        self.fill_outputs_and_inputs(&mut record, store, &subgraph, success, Some(measurements));
        record.init_warning_counters(measurements);
        self.append(record, subgraph)
    }

    /// Records a failed job. Partial measurements, if the framework reported
    /// any, still produce best-effort input and output stats.
    pub fn add_fail_job_stats(
        &mut self,
        store: &StoreOperator,
        subgraph: Arc<OperatorSubgraph>,
        job_id: JobId,
        measurements: Option<&JobMeasurements>,
        cause: anyhow::Error,
    ) -> &JobStatsRecord {
        self.check_running("add_fail_job_stats");
        let mut record = JobStatsRecord::new(job_id, false);
        if let Some(measurements) = measurements {
            record.collect_stats(measurements);
            record.init_warning_counters(measurements);
        }
        self.fill_outputs_and_inputs(&mut record, store, &subgraph, false, measurements);
        record.set_failure(cause);
        self.append(record, subgraph)
    }

    /// Records a job that ran a user-supplied program outside the engine.
    /// Such jobs carry no metrics, inputs or outputs.
    pub fn add_native_job_stats(
        &mut self,
        subgraph: Arc<OperatorSubgraph>,
        job_id: JobId,
        success: bool,
        cause: Option<anyhow::Error>,
    ) -> &JobStatsRecord {
        self.check_running("add_native_job_stats");
        let mut record = JobStatsRecord::new(job_id, success);
        if let Some(cause) = cause {
            record.set_failure(cause);
        }
        self.append(record, subgraph)
    }

    fn fill_outputs_and_inputs(
        &mut self,
        record: &mut JobStatsRecord,
        store: &StoreOperator,
        subgraph: &OperatorSubgraph,
        success: bool,
        measurements: Option<&JobMeasurements>,
    ) {
        let single_store = subgraph.stores().iter().filter(|s| !s.is_tmp_store).count() == 1;
        record.add_output_info(store, success, single_store, measurements);
        self.dedup
            .add_input_info_for_operator(subgraph, record, success, measurements);
    }

    /// Stamps the record with its subgraph's alias and adds it to the graph.
    fn append(&mut self, mut record: JobStatsRecord, subgraph: Arc<OperatorSubgraph>) -> &JobStatsRecord {
        let alias = subgraph.alias();
        if !alias.is_empty() {
            record.set_alias(alias);
        }
        debug!(
            job_id = %record.job_id(),
            success = record.is_successful(),
            subgraph = %subgraph.id,
            "recorded job stats"
        );
        let index = self.job_graph.push(record);
        &self.job_graph[index]
    }

    pub fn finish(&mut self) -> Result<&WarningSummary, BridgeError> {
        if self.state != AggregatorState::Running {
            return Err(BridgeError::InvalidState {
                operation: "finish",
                state: self.state.as_str(),
            });
        }
        self.finished_at = Some(Instant::now());
        self.state = AggregatorState::Finished;

        info!("{}", self.display_string());

        let summary = self.warnings.merge(&self.job_graph);
        summary.log();
        let summary = self.warning_summary.insert(summary);
        Ok(&*summary)
    }

    /// One block per job in completion order: a header, its metrics and its
    /// inputs. Recomputed on every call.
    pub fn display_string(&self) -> String {
        let mut out = String::new();
        for record in &self.job_graph {
            let _ = writeln!(out, "Job [{}] Metrics", record.job_id());
            let Some(stats) = record.stats() else {
                let _ = writeln!(out, "No statistics found for job {}", record.job_id());
                continue;
            };
            for (name, value) in stats {
                let _ = writeln!(out, "\t{} : {}", name, value);
            }
            for input in record.inputs() {
                let _ = writeln!(out, "\t{}", input.display_string());
            }
        }
        out
    }

    pub fn number_jobs(&self) -> usize {
        self.job_graph.len()
    }

    pub fn job_graph(&self) -> &AggregateJobGraph {
        &self.job_graph
    }

    pub fn failed_jobs(&self) -> Vec<&JobStatsRecord> {
        self.job_graph.failed().collect()
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    /// Wall time between `initialize` and `finish`, or up to now while running.
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        Some(self.finished_at.unwrap_or_else(Instant::now) - started)
    }

    pub fn is_embedded(&self) -> bool {
        false
    }

    pub fn warning_summary(&self) -> Option<&WarningSummary> {
        self.warning_summary.as_ref()
    }

    pub fn job_plan(&self) -> Option<&Arc<JobPlan>> {
        self.job_plan.as_ref()
    }

    pub fn engine(&self) -> Option<&Arc<EngineContext>> {
        self.engine.as_ref()
    }

    pub fn conf(&self) -> &JobConf {
        &self.conf
    }

    pub fn job_client(&self) -> Result<Infallible, BridgeError> {
        Err(BridgeError::unsupported("job client"))
    }

    pub fn all_stats(&self) -> Result<Infallible, BridgeError> {
        Err(BridgeError::unsupported("per-engine stats"))
    }

    pub fn all_error_messages(&self) -> Result<Vec<String>, BridgeError> {
        Err(BridgeError::unsupported("all error messages"))
    }

    pub fn smm_spill_count(&self) -> Result<u64, BridgeError> {
        Err(BridgeError::unsupported("spillable memory manager spill count"))
    }

    pub fn proactive_spill_count_objects(&self) -> Result<u64, BridgeError> {
        Err(BridgeError::unsupported("proactive spill count of objects"))
    }

    pub fn proactive_spill_count_records(&self) -> Result<u64, BridgeError> {
        Err(BridgeError::unsupported("proactive spill count of records"))
    }
}
