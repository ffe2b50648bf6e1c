use thiserror::Error;

/// Failures callers need to tell apart. Everything else travels as `anyhow::Error`.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A task configuration entry was present but could not be decoded.
    /// Fatal to the task.
    #[error("failed to restore task context from '{key}': {source}")]
    TaskContext {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required task configuration entry is absent. Fatal to the task.
    #[error("task configuration is missing '{key}'")]
    MissingTaskConfig { key: String },

    /// Legacy API surface that has no meaning in this backend.
    #[error("{capability} is not supported by this backend")]
    UnsupportedCapability { capability: &'static str },

    #[error("cannot {operation} while stats aggregator is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

impl BridgeError {
    pub fn task_context(
        key: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        BridgeError::TaskContext {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn unsupported(capability: &'static str) -> Self {
        BridgeError::UnsupportedCapability { capability }
    }

    pub fn is_task_context(&self) -> bool {
        matches!(
            self,
            BridgeError::TaskContext { .. } | BridgeError::MissingTaskConfig { .. }
        )
    }
}
