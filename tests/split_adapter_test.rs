use serde_json::json;

use volga_bridge::common::config::{JobConf, ENGINE_CONTEXT_KEY, INPUT_LIMITS_KEY};
use volga_bridge::common::counters::{input_counter_name, INPUT_RECORDS_GROUP};
use volga_bridge::common::ids::{JobId, PlanNodeId};
use volga_bridge::common::test_utils::{
    create_test_records, engine_context_with_udf, file_split, generic_split, task_attempt, VectorInputFormat,
};
use volga_bridge::plan::MergeCogroupOperator;
use volga_bridge::runtime::framework::read_all;
use volga_bridge::runtime::job_context::JobContextCell;
use volga_bridge::runtime::udf_context::{
    clear_thread_state, current_task_context, is_udf_conf_empty, with_thread_state, UdfContext,
};
use volga_bridge::runtime::{ExecutionContextBridge, InputFormat, JobContext, SplitAdapter};
use volga_bridge::BridgeError;

fn job() -> JobContext {
    JobContext::new(JobId::from(1), JobConf::new())
}

fn task_conf() -> JobConf {
    let mut conf = JobConf::new();
    ExecutionContextBridge::publish(
        &mut conf,
        &engine_context_with_udf("volga.builtin.", "Upper"),
        &UdfContext::new(),
        None,
    )
    .unwrap();
    conf
}

fn adapter(native: VectorInputFormat) -> SplitAdapter<VectorInputFormat> {
    SplitAdapter::with_job_context_cell(native, JobContextCell::new())
}

#[test]
fn test_file_backed_splits_keep_file_envelope() {
    let native = VectorInputFormat::new()
        .with_split(file_split(0, "part-0"), Vec::new())
        .with_split(file_split(1, "part-1"), Vec::new())
        .with_split(file_split(2, "part-2"), Vec::new());

    let envelopes = adapter(native).get_splits(&job()).unwrap();
    assert_eq!(envelopes.len(), 3);
    assert!(envelopes.iter().all(|e| e.is_file()));
    assert_eq!(
        envelopes.iter().map(|e| e.split_index()).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn test_one_generic_split_forces_generic_envelopes() {
    let native = VectorInputFormat::new()
        .with_split(file_split(0, "part-0"), Vec::new())
        .with_split(generic_split(1), Vec::new())
        .with_split(file_split(2, "part-2"), Vec::new());

    let envelopes = adapter(native).get_splits(&job()).unwrap();
    assert_eq!(envelopes.len(), 3);
    assert!(envelopes.iter().all(|e| !e.is_file()));
}

#[test]
fn test_get_splits_scrubs_udf_state_on_success() {
    clear_thread_state();
    let native = VectorInputFormat::new()
        .with_split(file_split(0, "part-0"), Vec::new())
        .storing_udf_properties("Upper");

    adapter(native).get_splits(&job()).unwrap();
    assert!(is_udf_conf_empty());
    assert!(with_thread_state(|state| state.package_import_list.is_none()));
}

#[test]
fn test_get_splits_scrubs_udf_state_on_failure() {
    clear_thread_state();
    let native = VectorInputFormat::new()
        .storing_udf_properties("Upper")
        .failing();

    assert!(adapter(native).get_splits(&job()).is_err());
    assert!(is_udf_conf_empty());
    assert!(with_thread_state(|state| state.is_empty()));
}

#[test]
fn test_get_splits_keeps_state_the_thread_already_had() {
    clear_thread_state();
    with_thread_state(|state| {
        state
            .udf_context
            .udf_properties_mut("Lower")
            .insert("k".to_string(), "v".to_string());
    });
    let native = VectorInputFormat::new().storing_udf_properties("Upper");

    adapter(native).get_splits(&job()).unwrap();
    with_thread_state(|state| {
        assert!(state.udf_context.udf_properties("Lower").is_some());
        assert!(state.udf_context.udf_properties("Upper").is_some());
    });
    clear_thread_state();
}

#[tokio::test]
async fn test_record_reader_stamps_split_index_for_cogroup() {
    let native = VectorInputFormat::new()
        .with_split(file_split(0, "part-0"), create_test_records(&["a"]))
        .with_split(file_split(1, "part-1"), create_test_records(&["b", "c"]));
    let adapter = adapter(native);
    let envelopes = adapter.get_splits(&job()).unwrap();
    let task = task_attempt("attempt_1", task_conf());

    let mut reader = adapter.create_record_reader(&envelopes[1], &task).unwrap();
    let records = read_all(reader.as_mut()).await.unwrap();
    assert_eq!(records, create_test_records(&["b", "c"]));

    let shared = adapter.job_context().unwrap();
    let mut cogroup = MergeCogroupOperator::new(PlanNodeId(9));
    cogroup.setup(&shared).unwrap();
    assert_eq!(cogroup.current_split_index(), Some(1));

    let context = current_task_context().unwrap();
    assert_eq!(context.split_index(), 1);
    assert!(context.resolve_udf("Upper").is_some());
    ExecutionContextBridge::reset();
}

#[test]
fn test_first_task_creates_shared_job_context() {
    let native = VectorInputFormat::new()
        .with_split(file_split(0, "part-0"), create_test_records(&["a"]))
        .with_split(file_split(1, "part-1"), create_test_records(&["b"]));
    let adapter = adapter(native);
    let envelopes = adapter.get_splits(&job()).unwrap();
    assert!(adapter.job_context().is_none());

    let mut first_conf = task_conf();
    first_conf.set("origin", "first");
    let mut second_conf = task_conf();
    second_conf.set("origin", "second");

    adapter
        .create_record_reader(&envelopes[0], &task_attempt("attempt_0", first_conf))
        .unwrap();
    let shared = adapter.job_context().unwrap();
    adapter
        .create_record_reader(&envelopes[1], &task_attempt("attempt_1", second_conf))
        .unwrap();

    let again = adapter.job_context().unwrap();
    assert!(std::sync::Arc::ptr_eq(&shared, &again));
    assert_eq!(again.conf().get_str("origin"), Some("first"));
    assert_eq!(again.split_index(), Some(1));
    ExecutionContextBridge::reset();
}

#[tokio::test]
async fn test_input_limit_and_counters() {
    let native = VectorInputFormat::new().with_split(
        file_split(0, "part-0"),
        create_test_records(&["a", "b", "c", "d"]),
    );
    let adapter = adapter(native);
    let envelopes = adapter.get_splits(&job()).unwrap();

    let mut conf = task_conf();
    conf.set(INPUT_LIMITS_KEY, json!([2]));
    let task = task_attempt("attempt_0", conf);

    let mut reader = adapter.create_record_reader(&envelopes[0], &task).unwrap();
    let records = read_all(reader.as_mut()).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(
        task.counters
            .value(INPUT_RECORDS_GROUP, &input_counter_name(PlanNodeId(1))),
        Some(2)
    );
    ExecutionContextBridge::reset();
}

#[test]
fn test_reused_thread_gets_fresh_context() {
    let native = VectorInputFormat::new()
        .with_split(file_split(0, "part-0"), Vec::new())
        .with_split(file_split(1, "part-1"), Vec::new());
    let adapter = adapter(native);
    let envelopes = adapter.get_splits(&job()).unwrap();

    let first = task_attempt("attempt_0", task_conf());
    adapter.create_record_reader(&envelopes[0], &first).unwrap();
    let first_context = current_task_context().unwrap();

    let second = task_attempt("attempt_1", task_conf());
    adapter.create_record_reader(&envelopes[1], &second).unwrap();
    let second_context = current_task_context().unwrap();

    assert!(!std::sync::Arc::ptr_eq(&first_context, &second_context));
    assert_eq!(second_context.task_attempt_id().0, "attempt_1");
    assert_eq!(second_context.split_index(), 1);
    ExecutionContextBridge::reset();
}

#[test]
fn test_corrupt_task_conf_fails_the_task() {
    let native = VectorInputFormat::new().with_split(file_split(0, "part-0"), Vec::new());
    let adapter = adapter(native);
    let envelopes = adapter.get_splits(&job()).unwrap();

    let mut conf = task_conf();
    conf.set(ENGINE_CONTEXT_KEY, "not base64 at all!");
    let err = adapter
        .create_record_reader(&envelopes[0], &task_attempt("attempt_0", conf))
        .unwrap_err();

    let bridge_error = err.downcast_ref::<BridgeError>().unwrap();
    assert!(bridge_error.is_task_context());
    assert!(current_task_context().is_none());
}
