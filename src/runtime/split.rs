use serde::{Deserialize, Serialize};

use crate::common::config::JobConf;
use crate::common::ids::PlanNodeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSplit {
    pub path: String,
    pub start: u64,
    pub length: u64,
    pub hosts: Vec<String>,
}

/// Input that is not a byte range of a file (a table scan, a generated range...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericSplit {
    pub description: String,
    pub length: u64,
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrappedSplit {
    File(FileSplit),
    Generic(GenericSplit),
}

impl WrappedSplit {
    pub fn is_file_backed(&self) -> bool {
        matches!(self, WrappedSplit::File(_))
    }

    pub fn length(&self) -> u64 {
        match self {
            WrappedSplit::File(split) => split.length,
            WrappedSplit::Generic(split) => split.length,
        }
    }

    pub fn locations(&self) -> &[String] {
        match self {
            WrappedSplit::File(split) => &split.hosts,
            WrappedSplit::Generic(split) => &split.locations,
        }
    }
}

/// The engine's own split: one loader-specific split plus the bookkeeping the
/// operator pipeline needs. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeSplit {
    /// Position among all splits of the job; lines up merge-cogroup inputs across tasks.
    split_index: usize,
    /// Which of the job's inputs this split reads.
    input_index: usize,
    load_id: PlanNodeId,
    wrapped: WrappedSplit,
}

impl NativeSplit {
    pub fn new(split_index: usize, input_index: usize, load_id: PlanNodeId, wrapped: WrappedSplit) -> Self {
        Self {
            split_index,
            input_index,
            load_id,
            wrapped,
        }
    }

    pub fn split_index(&self) -> usize {
        self.split_index
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    pub fn load_id(&self) -> PlanNodeId {
        self.load_id
    }

    pub fn wrapped(&self) -> &WrappedSplit {
        &self.wrapped
    }

    /// Pairs the split with the configuration of the task that will read it.
    pub fn bind(self, conf: JobConf) -> BoundSplit {
        BoundSplit { split: self, conf }
    }
}

/// A native split together with the task-supplied configuration.
#[derive(Debug, Clone)]
pub struct BoundSplit {
    pub split: NativeSplit,
    pub conf: JobConf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitClassification {
    /// Every split is file backed.
    Uniform,
    Mixed,
}

/// All-or-nothing: a single split without file backing makes the whole job `Mixed`.
pub fn classify(splits: &[NativeSplit]) -> SplitClassification {
    if splits.iter().all(|split| split.wrapped.is_file_backed()) {
        SplitClassification::Uniform
    } else {
        SplitClassification::Mixed
    }
}

/// Wrapper the framework sees. The file variant keeps the file-range view so
/// locality hints derived from paths and hosts keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitEnvelope {
    File(FileSplitEnvelope),
    Generic(GenericSplitEnvelope),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSplitEnvelope {
    split: NativeSplit,
}

impl FileSplitEnvelope {
    /// Hands the split back when it is not file backed.
    pub fn try_new(split: NativeSplit) -> Result<Self, NativeSplit> {
        if split.wrapped.is_file_backed() {
            Ok(Self { split })
        } else {
            Err(split)
        }
    }

    fn file(&self) -> Option<&FileSplit> {
        match &self.split.wrapped {
            WrappedSplit::File(file) => Some(file),
            WrappedSplit::Generic(_) => None,
        }
    }

    pub fn path(&self) -> &str {
        self.file().map(|f| f.path.as_str()).unwrap_or_default()
    }

    pub fn start(&self) -> u64 {
        self.file().map(|f| f.start).unwrap_or_default()
    }

    pub fn length(&self) -> u64 {
        self.split.wrapped.length()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericSplitEnvelope {
    split: NativeSplit,
}

impl GenericSplitEnvelope {
    pub fn new(split: NativeSplit) -> Self {
        Self { split }
    }
}

impl SplitEnvelope {
    /// Wraps every split with the variant `classification` calls for.
    pub fn wrap_all(splits: Vec<NativeSplit>, classification: SplitClassification) -> Vec<SplitEnvelope> {
        splits
            .into_iter()
            .map(|split| match classification {
                SplitClassification::Uniform => match FileSplitEnvelope::try_new(split) {
                    Ok(envelope) => SplitEnvelope::File(envelope),
                    Err(split) => SplitEnvelope::Generic(GenericSplitEnvelope::new(split)),
                },
                SplitClassification::Mixed => SplitEnvelope::Generic(GenericSplitEnvelope::new(split)),
            })
            .collect()
    }

    pub fn native(&self) -> &NativeSplit {
        match self {
            SplitEnvelope::File(envelope) => &envelope.split,
            SplitEnvelope::Generic(envelope) => &envelope.split,
        }
    }

    pub fn into_native(self) -> NativeSplit {
        match self {
            SplitEnvelope::File(envelope) => envelope.split,
            SplitEnvelope::Generic(envelope) => envelope.split,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, SplitEnvelope::File(_))
    }

    pub fn split_index(&self) -> usize {
        self.native().split_index
    }

    pub fn length(&self) -> u64 {
        self.native().wrapped.length()
    }

    /// Preferred hosts for scheduling the task that reads this split.
    pub fn locations(&self) -> &[String] {
        self.native().wrapped.locations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_utils::{file_split, generic_split};

    #[test]
    fn test_uniform_file_splits_use_file_envelope() {
        let splits = vec![file_split(0, "a"), file_split(1, "b"), file_split(2, "c")];
        assert_eq!(classify(&splits), SplitClassification::Uniform);

        let envelopes = SplitEnvelope::wrap_all(splits, SplitClassification::Uniform);
        assert!(envelopes.iter().all(|e| e.is_file()));
        let SplitEnvelope::File(first) = &envelopes[0] else {
            panic!("expected file envelope");
        };
        assert_eq!(first.path(), "a");
        assert_eq!(first.start(), 0);
        assert_eq!(envelopes[1].locations(), &["host-1".to_string()]);
    }

    #[test]
    fn test_one_generic_split_makes_all_generic() {
        let splits = vec![file_split(0, "a"), generic_split(1), file_split(2, "c")];
        assert_eq!(classify(&splits), SplitClassification::Mixed);

        let envelopes = SplitEnvelope::wrap_all(splits, SplitClassification::Mixed);
        assert_eq!(envelopes.len(), 3);
        assert!(envelopes.iter().all(|e| !e.is_file()));
        // file-backed splits keep their host hints even in the generic envelope
        assert_eq!(envelopes[0].locations(), &["host-0".to_string()]);
    }

    #[test]
    fn test_unwrap_returns_original_split() {
        let original = file_split(7, "part-7");
        let envelope = SplitEnvelope::wrap_all(vec![original.clone()], SplitClassification::Uniform)
            .remove(0);
        assert_eq!(envelope.split_index(), 7);
        assert_eq!(envelope.into_native(), original);

        let generic = generic_split(3);
        assert!(FileSplitEnvelope::try_new(generic.clone()).is_err());
        let envelope = SplitEnvelope::wrap_all(vec![generic.clone()], SplitClassification::Mixed).remove(0);
        assert_eq!(envelope.native(), &generic);
    }
}
