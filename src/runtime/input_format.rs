use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::common::counters::{input_counter_name, CounterGroups, INPUT_RECORDS_GROUP};
use crate::runtime::framework::{InputFormat, JobContext, Record, RecordReader, TaskAttemptContext};
use crate::runtime::job_context::{JobContextCell, SharedJobContext};
use crate::runtime::split::{classify, BoundSplit, NativeSplit, SplitEnvelope};
use crate::runtime::task_context::{ExecutionContextBridge, TaskExecutionContext};
use crate::runtime::udf_context::ThreadStateScrub;

/// The engine's own split computation and record reader construction.
pub trait NativeInputFormat: Send + Sync {
    /// May leave UDF state on the calling thread.
    fn get_splits(&self, job: &JobContext) -> Result<Vec<NativeSplit>>;

    fn create_record_reader(
        &self,
        split: &BoundSplit,
        context: Arc<TaskExecutionContext>,
    ) -> Result<Box<dyn RecordReader>>;
}

/// Presents a [`NativeInputFormat`] to the framework.
pub struct SplitAdapter<F> {
    native: F,
    job_context: JobContextCell,
}

impl<F: NativeInputFormat> SplitAdapter<F> {
    /// Shares the process-wide job context slot.
    pub fn new(native: F) -> Self {
        Self::with_job_context_cell(native, JobContextCell::process())
    }

    pub fn with_job_context_cell(native: F, job_context: JobContextCell) -> Self {
        Self { native, job_context }
    }

    pub fn job_context(&self) -> Option<Arc<SharedJobContext>> {
        self.job_context.get()
    }

    pub fn native(&self) -> &F {
        &self.native
    }
}

impl<F: NativeInputFormat> InputFormat for SplitAdapter<F> {
    type Split = SplitEnvelope;

    /// Runs on the scheduler's coordination thread, which is shared with other
    /// scripts: whatever UDF state the native computation creates there is
    /// scrubbed again if the thread started out without any.
    fn get_splits(&self, job: &JobContext) -> Result<Vec<SplitEnvelope>> {
        let splits = {
            let _scrub = ThreadStateScrub::arm();
            self.native.get_splits(job)?
        };

        let classification = classify(&splits);
        debug!(
            job_id = %job.job_id,
            splits = splits.len(),
            ?classification,
            "wrapping native splits"
        );
        Ok(SplitEnvelope::wrap_all(splits, classification))
    }

    fn create_record_reader(
        &self,
        split: &SplitEnvelope,
        task: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordReader>> {
        ExecutionContextBridge::reset();

        let bound = split.native().clone().bind(task.conf.clone());
        let split_index = bound.split.split_index();

        let shared = self.job_context.get_or_init(&task.conf);
        shared.set_split_index(split_index);

        let context = ExecutionContextBridge::restore(task, split_index)?;
        let reader = self.native.create_record_reader(&bound, context.clone())?;
        Ok(Box::new(SplitRecordReader::new(reader, &bound.split, &context)))
    }
}

/// Applies the input's record limit and counts records per load for stats.
#[derive(Debug)]
pub struct SplitRecordReader {
    inner: Box<dyn RecordReader>,
    limit: Option<u64>,
    records_read: u64,
    counter_name: String,
    counters: Arc<CounterGroups>,
}

impl SplitRecordReader {
    pub fn new(inner: Box<dyn RecordReader>, split: &NativeSplit, context: &TaskExecutionContext) -> Self {
        Self {
            inner,
            limit: context.config().input_limit(split.input_index()),
            records_read: 0,
            counter_name: input_counter_name(split.load_id()),
            counters: context.counters().clone(),
        }
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

#[async_trait]
impl RecordReader for SplitRecordReader {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        if self.limit.is_some_and(|limit| self.records_read >= limit) {
            return Ok(None);
        }
        let record = self.inner.next_record().await?;
        if record.is_some() {
            self.records_read += 1;
            self.counters.increment(INPUT_RECORDS_GROUP, &self.counter_name, 1);
        }
        Ok(record)
    }

    fn progress(&self) -> f32 {
        self.inner.progress()
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}
