use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use crate::common::counters::{
    input_counter_name, output_counter_name, INPUT_RECORDS_GROUP, OUTPUT_RECORDS_GROUP, WARNING_GROUP,
};
use crate::common::ids::{JobId, PlanNodeId};
use crate::plan::{LoadOperator, StoreOperator};
use crate::stats::metrics::{
    JobMeasurements, METRIC_BYTES_READ, METRIC_BYTES_WRITTEN, METRIC_RECORDS_READ, METRIC_RECORDS_WRITTEN,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputStats {
    pub load_id: PlanNodeId,
    pub location: String,
    pub alias: Option<String>,
    /// `None` when the count is unknown (typically a failed job without counters).
    pub records: Option<u64>,
    pub bytes: Option<u64>,
    pub success: bool,
    /// The load was the only input of its job, so job-level read metrics belong to it.
    pub sole_input: bool,
}

impl InputStats {
    pub fn display_string(&self) -> String {
        if !self.success {
            return format!("Failed to read data from \"{}\"", self.location);
        }
        let records = self.records.map_or_else(|| "unknown".to_string(), |r| r.to_string());
        match self.bytes.filter(|b| *b > 0) {
            Some(bytes) => format!(
                "Successfully read {} records ({} bytes) from: \"{}\"",
                records, bytes, self.location
            ),
            None => format!("Successfully read {} records from: \"{}\"", records, self.location),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputStats {
    pub store_id: PlanNodeId,
    pub location: String,
    pub alias: Option<String>,
    pub records: Option<u64>,
    pub bytes: Option<u64>,
    pub success: bool,
}

impl OutputStats {
    pub fn display_string(&self) -> String {
        if !self.success {
            return format!("Failed to produce result in \"{}\"", self.location);
        }
        let records = self.records.map_or_else(|| "unknown".to_string(), |r| r.to_string());
        match self.bytes.filter(|b| *b > 0) {
            Some(bytes) => format!(
                "Successfully stored {} records ({} bytes) in: \"{}\"",
                records, bytes, self.location
            ),
            None => format!("Successfully stored {} records in: \"{}\"", records, self.location),
        }
    }
}

/// Why a job failed, as reported by the framework.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    message: String,
    #[serde(skip)]
    cause: Arc<anyhow::Error>,
}

impl JobFailure {
    pub fn new(cause: anyhow::Error) -> Self {
        Self {
            message: format!("{:#}", cause),
            cause: Arc::new(cause),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> &anyhow::Error {
        &self.cause
    }
}

/// Outcome of one physical job. Only the alias changes once the record is in
/// the job graph.
#[derive(Debug, Serialize)]
pub struct JobStatsRecord {
    job_id: JobId,
    success: bool,
    stats: Option<IndexMap<String, u64>>,
    inputs: Vec<InputStats>,
    outputs: Vec<OutputStats>,
    #[serde(skip)]
    warning_counters: Option<IndexMap<String, u64>>,
    failure: Option<JobFailure>,
    alias: Option<String>,
}

impl JobStatsRecord {
    pub fn new(job_id: JobId, success: bool) -> Self {
        Self {
            job_id,
            success,
            stats: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            warning_counters: None,
            failure: None,
            alias: None,
        }
    }

    pub fn collect_stats(&mut self, measurements: &JobMeasurements) {
        self.stats = Some(measurements.metrics().clone());
    }

    /// Records read come from the load's input counter, falling back to the
    /// job-level metric when this is the sole input. Bytes are only
    /// attributable to a sole input.
    pub fn add_input_stats(
        &mut self,
        load: &LoadOperator,
        success: bool,
        sole_input: bool,
        measurements: Option<&JobMeasurements>,
    ) {
        let records = measurements.and_then(|m| {
            m.counters()
                .get(INPUT_RECORDS_GROUP, &input_counter_name(load.id))
                .or_else(|| sole_input.then(|| m.metric(METRIC_RECORDS_READ)).flatten())
                .or(success.then_some(0))
        });
        let bytes = measurements
            .filter(|_| sole_input)
            .and_then(|m| m.metric(METRIC_BYTES_READ));

        self.inputs.push(InputStats {
            load_id: load.id,
            location: load.location.clone(),
            alias: load.alias.clone(),
            records,
            bytes,
            success,
            sole_input,
        });
    }

    /// Temporary stores are not script outputs and are skipped.
    pub fn add_output_info(
        &mut self,
        store: &StoreOperator,
        success: bool,
        single_store: bool,
        measurements: Option<&JobMeasurements>,
    ) {
        if store.is_tmp_store {
            return;
        }
        let records = measurements.and_then(|m| {
            m.counters()
                .get(OUTPUT_RECORDS_GROUP, &output_counter_name(store.id))
                .or_else(|| single_store.then(|| m.metric(METRIC_RECORDS_WRITTEN)).flatten())
                .or(success.then_some(0))
        });
        let bytes = measurements
            .filter(|_| single_store)
            .and_then(|m| m.metric(METRIC_BYTES_WRITTEN));

        self.outputs.push(OutputStats {
            store_id: store.id,
            location: store.location.clone(),
            alias: store.alias.clone(),
            records,
            bytes,
            success,
        });
    }

    pub fn init_warning_counters(&mut self, measurements: &JobMeasurements) {
        self.warning_counters = measurements.counters().group(WARNING_GROUP).cloned();
    }

    pub fn set_failure(&mut self, cause: anyhow::Error) {
        self.failure = Some(JobFailure::new(cause));
    }

    pub(crate) fn set_alias(&mut self, alias: String) {
        self.alias = Some(alias);
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    pub fn stats(&self) -> Option<&IndexMap<String, u64>> {
        self.stats.as_ref()
    }

    pub fn inputs(&self) -> &[InputStats] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputStats] {
        &self.outputs
    }

    pub fn warning_counters(&self) -> Option<&IndexMap<String, u64>> {
        self.warning_counters.as_ref()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }
}
