use std::sync::{Arc, OnceLock};

use lazy_static::lazy_static;
use parking_lot::RwLock;

use crate::common::config::{JobConf, SPLIT_INDEX_KEY};
use crate::common::ids::JobId;

/// Job-scoped configuration shared by every task in a worker process.
///
/// Created by the first task that needs it and never replaced. Entries are
/// append-only; the split index is the one field tasks overwrite, and cogroup
/// merge only reads it for the split its own task stamped.
#[derive(Debug)]
pub struct SharedJobContext {
    job_id: JobId,
    conf: RwLock<JobConf>,
}

impl SharedJobContext {
    pub fn new(conf: JobConf) -> Self {
        Self {
            job_id: JobId::fresh(),
            conf: RwLock::new(conf),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn set_split_index(&self, split_index: usize) {
        self.conf.write().set_int(SPLIT_INDEX_KEY, split_index as i64);
    }

    pub fn split_index(&self) -> Option<usize> {
        self.conf
            .read()
            .get_i64(SPLIT_INDEX_KEY)
            .and_then(|index| usize::try_from(index).ok())
    }

    /// Adds `key` unless it is already set. Returns whether the value was stored.
    pub fn set_if_absent(&self, key: &str, value: serde_json::Value) -> bool {
        let mut conf = self.conf.write();
        if conf.contains_key(key) {
            return false;
        }
        conf.set(key, value);
        true
    }

    pub fn conf(&self) -> JobConf {
        self.conf.read().clone()
    }
}

/// Lazily initialised slot for a [`SharedJobContext`]. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct JobContextCell {
    inner: Arc<OnceLock<Arc<SharedJobContext>>>,
}

lazy_static! {
    static ref PROCESS_JOB_CONTEXT: JobContextCell = JobContextCell::default();
}

impl JobContextCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot shared by the whole worker process.
    pub fn process() -> Self {
        PROCESS_JOB_CONTEXT.clone()
    }

    /// First caller's configuration wins; later calls get the existing context.
    pub fn get_or_init(&self, conf: &JobConf) -> Arc<SharedJobContext> {
        self.inner
            .get_or_init(|| Arc::new(SharedJobContext::new(conf.clone())))
            .clone()
    }

    pub fn get(&self) -> Option<Arc<SharedJobContext>> {
        self.inner.get().cloned()
    }
}
