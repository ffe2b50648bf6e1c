//! Per-thread engine state.
//!
//! The framework reuses threads across unrelated tasks and job coordination
//! work, so everything here is either replaced wholesale at a task boundary
//! (see [`replace_thread_state`]) or scrubbed after borrowing a thread we do
//! not own (see [`ThreadStateScrub`]).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::common::config::{JobConf, UDF_CONTEXT_KEY};
use crate::common::error::BridgeError;
use crate::runtime::task_context::TaskExecutionContext;

pub type UdfProperties = BTreeMap<String, String>;

/// Properties UDFs stash on the coordinator (keyed by UDF signature) and read
/// back inside tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UdfContext {
    job_conf: Option<JobConf>,
    udf_confs: BTreeMap<String, UdfProperties>,
}

#[derive(Serialize, Deserialize)]
struct SerializedUdfContext {
    udf_confs: BTreeMap<String, UdfProperties>,
}

impl UdfContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the context a task sees from the job configuration.
    pub fn from_job_conf(conf: &JobConf) -> Result<Self, BridgeError> {
        let serialized: Option<SerializedUdfContext> = conf.get_object(UDF_CONTEXT_KEY)?;
        Ok(Self {
            job_conf: Some(conf.clone()),
            udf_confs: serialized.map(|s| s.udf_confs).unwrap_or_default(),
        })
    }

    pub fn serialize_into(&self, conf: &mut JobConf) -> Result<()> {
        conf.set_object(
            UDF_CONTEXT_KEY,
            &SerializedUdfContext {
                udf_confs: self.udf_confs.clone(),
            },
        )
    }

    pub fn is_udf_conf_empty(&self) -> bool {
        self.udf_confs.is_empty()
    }

    pub fn udf_properties_mut(&mut self, signature: &str) -> &mut UdfProperties {
        self.udf_confs.entry(signature.to_string()).or_default()
    }

    pub fn udf_properties(&self, signature: &str) -> Option<&UdfProperties> {
        self.udf_confs.get(signature)
    }

    pub fn add_job_conf(&mut self, conf: Option<JobConf>) {
        self.job_conf = conf;
    }

    pub fn job_conf(&self) -> Option<&JobConf> {
        self.job_conf.as_ref()
    }

    pub fn reset(&mut self) {
        self.udf_confs.clear();
        self.job_conf = None;
    }
}

#[derive(Debug, Default)]
pub struct ThreadState {
    pub udf_context: UdfContext,
    pub package_import_list: Option<Vec<String>>,
    pub task: Option<Arc<TaskExecutionContext>>,
}

impl ThreadState {
    pub fn is_empty(&self) -> bool {
        self.udf_context.is_udf_conf_empty()
            && self.udf_context.job_conf().is_none()
            && self.package_import_list.is_none()
            && self.task.is_none()
    }
}

thread_local! {
    static THREAD_STATE: RefCell<ThreadState> = RefCell::new(ThreadState::default());
}

/// Runs `f` against this thread's state. Must not be re-entered from inside `f`.
pub fn with_thread_state<R>(f: impl FnOnce(&mut ThreadState) -> R) -> R {
    THREAD_STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Installs `state` as this thread's state and returns what was there before.
pub fn replace_thread_state(state: ThreadState) -> ThreadState {
    THREAD_STATE.with(|current| current.replace(state))
}

pub fn clear_thread_state() {
    replace_thread_state(ThreadState::default());
}

pub fn is_udf_conf_empty() -> bool {
    with_thread_state(|state| state.udf_context.is_udf_conf_empty())
}

pub fn current_task_context() -> Option<Arc<TaskExecutionContext>> {
    with_thread_state(|state| state.task.clone())
}

/// Guard for work done on a thread that must not keep engine state, such as
/// the scheduler thread computing splits. If the thread had no UDF properties
/// when the guard was armed, dropping it removes whatever the guarded work
/// left behind, on success, error and unwind alike.
#[must_use = "the scrub runs when the guard is dropped"]
#[derive(Debug)]
pub struct ThreadStateScrub {
    udf_conf_was_empty: bool,
}

impl ThreadStateScrub {
    pub fn arm() -> Self {
        Self {
            udf_conf_was_empty: is_udf_conf_empty(),
        }
    }

    pub fn will_scrub(&self) -> bool {
        self.udf_conf_was_empty
    }
}

impl Drop for ThreadStateScrub {
    fn drop(&mut self) {
        if !self.udf_conf_was_empty {
            return;
        }
        match scrub_thread_state() {
            Ok(()) => tracing::debug!("scrubbed udf context left on coordination thread"),
            Err(reason) => tracing::warn!(reason, "udf context left on coordination thread"),
        }
    }
}

/// Clears the UDF state of this thread. Fails instead of panicking when the
/// state is borrowed further up the stack or already torn down.
fn scrub_thread_state() -> Result<(), &'static str> {
    THREAD_STATE
        .try_with(|state| {
            let mut state = state
                .try_borrow_mut()
                .map_err(|_| "thread state is borrowed")?;
            state.package_import_list = None;
            state.udf_context.add_job_conf(None);
            state.udf_context.reset();
            Ok(())
        })
        .unwrap_or(Err("thread state is destroyed"))
}
