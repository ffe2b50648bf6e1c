use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::common::config::{
    parse_bridge_config_from_job_config, BridgeConfig, JobConf, ENGINE_CONTEXT_KEY,
    PLAN_FRAGMENT_KEY,
};
use crate::common::counters::CounterGroups;
use crate::common::error::BridgeError;
use crate::common::ids::TaskAttemptId;
use crate::plan::OperatorSubgraph;
use crate::runtime::engine_context::{EngineContext, SchemaRuntime, UdfDefinition};
use crate::runtime::framework::TaskAttemptContext;
use crate::runtime::logger::CountersLogger;
use crate::runtime::udf_context::{clear_thread_state, replace_thread_state, ThreadState, UdfContext};

/// Everything a task needs from the engine, rebuilt from the task configuration
/// for each task and handed explicitly to the record reader.
#[derive(Debug)]
pub struct TaskExecutionContext {
    task_attempt_id: TaskAttemptId,
    split_index: usize,
    engine: EngineContext,
    schema_runtime: SchemaRuntime,
    config: BridgeConfig,
    logger: CountersLogger,
    counters: Arc<CounterGroups>,
    plan_fragment: Option<OperatorSubgraph>,
    job_conf: JobConf,
}

impl TaskExecutionContext {
    pub fn task_attempt_id(&self) -> &TaskAttemptId {
        &self.task_attempt_id
    }

    pub fn split_index(&self) -> usize {
        self.split_index
    }

    pub fn engine(&self) -> &EngineContext {
        &self.engine
    }

    pub fn schema_runtime(&self) -> &SchemaRuntime {
        &self.schema_runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn logger(&self) -> &CountersLogger {
        &self.logger
    }

    pub fn counters(&self) -> &Arc<CounterGroups> {
        &self.counters
    }

    pub fn plan_fragment(&self) -> Option<&OperatorSubgraph> {
        self.plan_fragment.as_ref()
    }

    pub fn job_conf(&self) -> &JobConf {
        &self.job_conf
    }

    pub fn resolve_udf(&self, name: &str) -> Option<&UdfDefinition> {
        self.engine
            .udf_registry
            .resolve(name, &self.engine.package_import_list)
    }
}

/// Moves engine state across the coordinator/task boundary.
///
/// Mutates this thread's [`ThreadState`]: it is cleared before anything is
/// decoded and replaced as a whole once decoding succeeds, so a reused worker
/// thread never sees a previous task's state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContextBridge;

impl ExecutionContextBridge {
    /// Coordinator side: writes what [`ExecutionContextBridge::restore`] reads.
    pub fn publish(
        conf: &mut JobConf,
        engine: &EngineContext,
        udf_context: &UdfContext,
        plan_fragment: Option<&OperatorSubgraph>,
    ) -> Result<()> {
        conf.set_object(ENGINE_CONTEXT_KEY, engine)?;
        udf_context.serialize_into(conf)?;
        if let Some(fragment) = plan_fragment {
            conf.set_object(PLAN_FRAGMENT_KEY, fragment)?;
        }
        Ok(())
    }

    /// Task side. Any decoding failure is returned as-is and fails the task;
    /// the thread is left empty rather than half initialised.
    pub fn restore(
        task: &TaskAttemptContext,
        split_index: usize,
    ) -> Result<Arc<TaskExecutionContext>, BridgeError> {
        clear_thread_state();

        let conf = &task.conf;
        let udf_context = UdfContext::from_job_conf(conf)?;
        let engine: EngineContext = conf.require_object(ENGINE_CONTEXT_KEY)?;
        let plan_fragment: Option<OperatorSubgraph> = conf.get_object(PLAN_FRAGMENT_KEY)?;
        let config = parse_bridge_config_from_job_config(conf);
        let schema_runtime =
            SchemaRuntime::initialize(&engine.schema_runtime, config.schema_tuple_enabled);
        let logger = CountersLogger::new(task.counters.clone(), config.aggregate_warning);

        let context = Arc::new(TaskExecutionContext {
            task_attempt_id: task.task_attempt_id.clone(),
            split_index,
            engine,
            schema_runtime,
            config,
            logger,
            counters: task.counters.clone(),
            plan_fragment,
            job_conf: conf.clone(),
        });

        replace_thread_state(ThreadState {
            udf_context,
            package_import_list: Some(context.engine.package_import_list.clone()),
            task: Some(context.clone()),
        });

        debug!(
            task_attempt_id = %context.task_attempt_id,
            split_index,
            udfs = context.engine.udf_registry.len(),
            aggregate_warning = context.config.aggregate_warning,
            "restored task execution context"
        );
        Ok(context)
    }

    /// Drops all engine state held by this thread.
    pub fn reset() {
        clear_thread_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{AGGREGATE_WARNING_KEY, UDF_CONTEXT_KEY};
    use crate::common::counters::WARNING_GROUP;
    use crate::common::test_utils::{engine_context_with_udf, task_attempt};
    use crate::runtime::udf_context::{current_task_context, is_udf_conf_empty, with_thread_state};

    fn published_conf() -> JobConf {
        let mut udf_context = UdfContext::new();
        udf_context
            .udf_properties_mut("Upper")
            .insert("locale".to_string(), "en".to_string());
        let mut conf = JobConf::new();
        conf.set(AGGREGATE_WARNING_KEY, "true");
        ExecutionContextBridge::publish(
            &mut conf,
            &engine_context_with_udf("volga.builtin.", "Upper"),
            &udf_context,
            None,
        )
        .unwrap();
        conf
    }

    #[test]
    fn test_restore_installs_fresh_thread_state() {
        let task = task_attempt("attempt_0", published_conf());
        let context = ExecutionContextBridge::restore(&task, 4).unwrap();

        assert_eq!(context.split_index(), 4);
        assert!(context.resolve_udf("Upper").is_some());
        assert!(!is_udf_conf_empty());
        let installed = current_task_context().unwrap();
        assert!(Arc::ptr_eq(&installed, &context));

        context.logger().warn("Upper", "bad input", "UDF_WARNING_1");
        assert_eq!(task.counters.value(WARNING_GROUP, "UDF_WARNING_1"), Some(1));

        ExecutionContextBridge::reset();
        assert!(with_thread_state(|state| state.is_empty()));
    }

    #[test]
    fn test_restore_replaces_rather_than_merges() {
        with_thread_state(|state| {
            state
                .udf_context
                .udf_properties_mut("StaleUdf")
                .insert("k".to_string(), "v".to_string());
        });

        let task = task_attempt("attempt_1", published_conf());
        ExecutionContextBridge::restore(&task, 0).unwrap();

        with_thread_state(|state| {
            assert!(state.udf_context.udf_properties("StaleUdf").is_none());
            assert!(state.udf_context.udf_properties("Upper").is_some());
        });
        ExecutionContextBridge::reset();
    }

    #[test]
    fn test_missing_engine_context_fails_and_leaves_thread_empty() {
        let stale = task_attempt("attempt_2", published_conf());
        ExecutionContextBridge::restore(&stale, 0).unwrap();

        let task = task_attempt("attempt_3", JobConf::new());
        let err = ExecutionContextBridge::restore(&task, 0).unwrap_err();
        assert!(matches!(err, BridgeError::MissingTaskConfig { ref key } if key == ENGINE_CONTEXT_KEY));
        assert!(with_thread_state(|state| state.is_empty()));
    }

    #[test]
    fn test_corrupt_udf_payload_is_task_context_error() {
        let mut conf = published_conf();
        conf.set(UDF_CONTEXT_KEY, "%%%");
        let task = task_attempt("attempt_4", conf);

        let err = ExecutionContextBridge::restore(&task, 0).unwrap_err();
        assert!(matches!(err, BridgeError::TaskContext { ref key, .. } if key == UDF_CONTEXT_KEY));
        assert!(current_task_context().is_none());
    }
}
