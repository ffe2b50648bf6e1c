use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::common::config::JobConf;
use crate::common::counters::CounterGroups;
use crate::common::ids::{PlanNodeId, TaskAttemptId};
use crate::plan::{LoadOperator, OperatorSubgraph, PhysicalOperator, StoreOperator};
use crate::runtime::engine_context::{EngineContext, UdfDefinition};
use crate::runtime::framework::{JobContext, Record, RecordReader, TaskAttemptContext};
use crate::runtime::input_format::NativeInputFormat;
use crate::runtime::split::{BoundSplit, FileSplit, GenericSplit, NativeSplit, WrappedSplit};
use crate::runtime::task_context::TaskExecutionContext;
use crate::runtime::udf_context::with_thread_state;

pub fn file_split(split_index: usize, path: &str) -> NativeSplit {
    NativeSplit::new(
        split_index,
        0,
        PlanNodeId(1),
        WrappedSplit::File(FileSplit {
            path: path.to_string(),
            start: 0,
            length: 128,
            hosts: vec![format!("host-{}", split_index)],
        }),
    )
}

pub fn generic_split(split_index: usize) -> NativeSplit {
    NativeSplit::new(
        split_index,
        0,
        PlanNodeId(1),
        WrappedSplit::Generic(GenericSplit {
            description: format!("range-{}", split_index),
            length: 0,
            locations: Vec::new(),
        }),
    )
}

pub fn create_test_records(values: &[&str]) -> Vec<Record> {
    values
        .iter()
        .map(|v| Record::new(None, vec![json!(v)]))
        .collect()
}

pub fn engine_context_with_udf(package: &str, name: &str) -> EngineContext {
    let mut engine = EngineContext::default();
    engine.udf_registry.register(UdfDefinition {
        name: format!("{}{}", package, name),
        implementation: "builtin".to_string(),
        arguments: Vec::new(),
    });
    engine.package_import_list.push(package.to_string());
    engine
}

pub fn task_attempt(id: &str, conf: JobConf) -> TaskAttemptContext {
    TaskAttemptContext::new(
        TaskAttemptId(id.to_string()),
        conf,
        Arc::new(CounterGroups::new()),
    )
}

/// Subgraph with the given loads feeding the given stores, ids as plan node ids.
pub fn fused_subgraph(id: u64, loads: &[(u64, &str)], stores: &[(u64, &str)]) -> OperatorSubgraph {
    let mut subgraph = OperatorSubgraph::new(PlanNodeId(id));
    for (load_id, location) in loads {
        subgraph.add_operator(PhysicalOperator::Load(
            LoadOperator::new(PlanNodeId(*load_id), *location).with_alias(format!("in_{}", load_id)),
        ));
    }
    for (store_id, location) in stores {
        subgraph.add_operator(PhysicalOperator::Store(
            StoreOperator::new(PlanNodeId(*store_id), *location).with_alias(format!("out_{}", store_id)),
        ));
    }
    subgraph
}

/// In-memory native input format: one record vector per split.
#[derive(Debug, Default)]
pub struct VectorInputFormat {
    splits: Vec<NativeSplit>,
    records: HashMap<usize, Vec<Record>>,
    /// When set, split computation leaves UDF properties under this signature on the thread.
    udf_signature: Option<String>,
    fail_splits: bool,
}

impl VectorInputFormat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_split(mut self, split: NativeSplit, records: Vec<Record>) -> Self {
        self.records.insert(split.split_index(), records);
        self.splits.push(split);
        self
    }

    pub fn storing_udf_properties(mut self, signature: &str) -> Self {
        self.udf_signature = Some(signature.to_string());
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_splits = true;
        self
    }
}

impl NativeInputFormat for VectorInputFormat {
    fn get_splits(&self, _job: &JobContext) -> Result<Vec<NativeSplit>> {
        if let Some(signature) = &self.udf_signature {
            with_thread_state(|state| {
                state
                    .udf_context
                    .udf_properties_mut(signature)
                    .insert("location".to_string(), "memory".to_string());
                state.package_import_list = Some(vec!["volga.builtin.".to_string()]);
            });
        }
        if self.fail_splits {
            return Err(anyhow!("input location is unreachable"));
        }
        Ok(self.splits.clone())
    }

    fn create_record_reader(
        &self,
        split: &BoundSplit,
        _context: Arc<TaskExecutionContext>,
    ) -> Result<Box<dyn RecordReader>> {
        let records = self
            .records
            .get(&split.split.split_index())
            .cloned()
            .ok_or_else(|| anyhow!("no records for split {}", split.split.split_index()))?;
        Ok(Box::new(VectorRecordReader::new(records)))
    }
}

#[derive(Debug)]
pub struct VectorRecordReader {
    records: VecDeque<Record>,
    total: usize,
}

impl VectorRecordReader {
    pub fn new(records: Vec<Record>) -> Self {
        let total = records.len();
        Self {
            records: records.into(),
            total,
        }
    }
}

#[async_trait]
impl RecordReader for VectorRecordReader {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.records.pop_front())
    }

    fn progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        1.0 - self.records.len() as f32 / self.total as f32
    }
}
