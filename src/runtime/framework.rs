//! Contract the host framework drives: split computation on the scheduler,
//! record readers on worker threads.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::config::JobConf;
use crate::common::counters::CounterGroups;
use crate::common::ids::{JobId, TaskAttemptId};

pub type Tuple = Vec<Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: Option<String>,
    pub tuple: Tuple,
}

impl Record {
    pub fn new(key: Option<String>, tuple: Tuple) -> Self {
        Self { key, tuple }
    }
}

/// Job-scoped view handed to split computation.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub conf: JobConf,
}

impl JobContext {
    pub fn new(job_id: JobId, conf: JobConf) -> Self {
        Self { job_id, conf }
    }
}

/// Task-scoped view handed to record reader construction.
#[derive(Debug, Clone)]
pub struct TaskAttemptContext {
    pub task_attempt_id: TaskAttemptId,
    pub conf: JobConf,
    pub counters: Arc<CounterGroups>,
}

impl TaskAttemptContext {
    pub fn new(task_attempt_id: TaskAttemptId, conf: JobConf, counters: Arc<CounterGroups>) -> Self {
        Self {
            task_attempt_id,
            conf,
            counters,
        }
    }
}

#[async_trait]
pub trait RecordReader: Send + fmt::Debug {
    /// `Ok(None)` once the split is exhausted.
    async fn next_record(&mut self) -> Result<Option<Record>>;

    fn progress(&self) -> f32 {
        0.0
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

pub trait InputFormat: Send + Sync {
    type Split;

    fn get_splits(&self, job: &JobContext) -> Result<Vec<Self::Split>>;

    fn create_record_reader(
        &self,
        split: &Self::Split,
        task: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordReader>>;
}

/// Drains `reader` and closes it.
pub async fn read_all(reader: &mut dyn RecordReader) -> Result<Vec<Record>> {
    let mut records = Vec::new();
    while let Some(record) = reader.next_record().await? {
        records.push(record);
    }
    reader.close().await?;
    Ok(records)
}
