pub mod engine_context;
pub mod framework;
pub mod input_format;
pub mod job_context;
pub mod logger;
pub mod split;
pub mod task_context;
pub mod udf_context;

pub use framework::{InputFormat, JobContext, Record, RecordReader, TaskAttemptContext};
pub use input_format::{NativeInputFormat, SplitAdapter};
pub use split::{NativeSplit, SplitEnvelope, WrappedSplit};
pub use task_context::{ExecutionContextBridge, TaskExecutionContext};
