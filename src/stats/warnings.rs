use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use lazy_static::lazy_static;
use serde::Serialize;
use tracing::warn;

use crate::stats::job_stats::JobStatsRecord;

macro_rules! vocabulary {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

vocabulary! {
    /// Warnings raised by engine operators and user-defined functions.
    EngineWarning {
        ACCESSING_NON_EXISTENT_FIELD,
        DID_NOT_FIND_LOAD_ONLY_MAP_PLAN,
        DIVIDE_BY_ZERO,
        FIELD_DISCARDED_TYPE_CONVERSION_FAILED,
        GROUP_BY_INCOMPATIBLE_TYPES,
        IMPLICIT_CAST_TO_BAG,
        IMPLICIT_CAST_TO_CHARARRAY,
        IMPLICIT_CAST_TO_DOUBLE,
        IMPLICIT_CAST_TO_FLOAT,
        IMPLICIT_CAST_TO_INT,
        IMPLICIT_CAST_TO_LONG,
        IMPLICIT_CAST_TO_BOOLEAN,
        IMPLICIT_CAST_TO_DATETIME,
        IMPLICIT_CAST_TO_MAP,
        IMPLICIT_CAST_TO_TUPLE,
        TOO_LARGE_FOR_INT,
        MULTI_LEAF_MAP,
        MULTI_LEAF_REDUCE,
        NON_PACKAGE_REDUCE_PLAN_ROOT,
        NON_EMPTY_COMBINE_PLAN,
        PROGRESS_REPORTER_NOT_PROVIDED,
        REDUCE_PLAN_NOT_EMPTY_WHILE_MAP_PLAN_UNDER_PROCESS,
        UDF_WARNING_1,
        UDF_WARNING_2,
        UDF_WARNING_3,
        UDF_WARNING_4,
        UDF_WARNING_5,
        UDF_WARNING_6,
        UDF_WARNING_7,
        UDF_WARNING_8,
        UDF_WARNING_9,
        UDF_WARNING_10,
        UDF_WARNING_11,
        UDF_WARNING_12,
        UNABLE_TO_CREATE_FILE_TO_SPILL,
        UNABLE_TO_SPILL,
        UNABLE_TO_CLOSE_SPILL_FILE,
        UNREACHABLE_CODE_BOTH_MAP_AND_REDUCE_PLANS_PROCESSED,
        USING_OVERLOADED_FUNCTION,
        REDUCER_COUNT_LOW,
        NULL_COUNTER_COUNT,
        DELETE_FAILED,
    }
}

vocabulary! {
    /// Engine-internal counters that travel in the warning group.
    EngineCounter {
        SPILLABLE_MEMORY_MANAGER_SPILL_COUNT,
        PROACTIVE_SPILL_COUNT_BAGS,
        PROACTIVE_SPILL_COUNT_RECS,
    }
}

/// A warning-group counter name resolved to its symbolic key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum WarningKey {
    Warning(EngineWarning),
    Counter(EngineCounter),
}

impl WarningKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningKey::Warning(w) => w.as_str(),
            WarningKey::Counter(c) => c.as_str(),
        }
    }
}

impl fmt::Display for WarningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type LookupTable = HashMap<&'static str, WarningKey>;

lazy_static! {
    static ref WARNING_TABLE: LookupTable = EngineWarning::ALL
        .iter()
        .map(|w| (w.as_str(), WarningKey::Warning(*w)))
        .collect();
    static ref COUNTER_TABLE: LookupTable = EngineCounter::ALL
        .iter()
        .map(|c| (c.as_str(), WarningKey::Counter(*c)))
        .collect();
}

#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    pub name: &'static str,
    table: &'static LookupTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResolution {
    Resolved {
        key: WarningKey,
        vocabulary: &'static str,
    },
    Unresolved,
}

/// Ordered list of vocabularies; the first one that knows a name wins.
#[derive(Debug, Clone)]
pub struct WarningResolver {
    vocabularies: Vec<Vocabulary>,
}

impl Default for WarningResolver {
    fn default() -> Self {
        Self {
            vocabularies: vec![
                Vocabulary {
                    name: "engine_warning",
                    table: &WARNING_TABLE,
                },
                Vocabulary {
                    name: "engine_counter",
                    table: &COUNTER_TABLE,
                },
            ],
        }
    }
}

impl WarningResolver {
    pub fn resolve(&self, name: &str) -> KeyResolution {
        self.vocabularies
            .iter()
            .find_map(|vocabulary| {
                vocabulary.table.get(name).map(|key| KeyResolution::Resolved {
                    key: *key,
                    vocabulary: vocabulary.name,
                })
            })
            .unwrap_or(KeyResolution::Unresolved)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarningSummary {
    pub totals: BTreeMap<WarningKey, u64>,
    /// Distinct names no vocabulary knew, in the order they were first seen.
    pub unresolved: Vec<String>,
}

impl WarningSummary {
    pub fn get(&self, key: WarningKey) -> Option<u64> {
        self.totals.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn log(&self) {
        for (key, count) in &self.totals {
            warn!("Encountered Warning {} {} time(s).", key, count);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WarningAggregator {
    resolver: WarningResolver,
}

impl WarningAggregator {
    pub fn new(resolver: WarningResolver) -> Self {
        Self { resolver }
    }

    /// Sums every job's warning counters by symbolic key. Unknown names are
    /// dropped with one notice per distinct name per call.
    pub fn merge<'a>(&self, records: impl IntoIterator<Item = &'a JobStatsRecord>) -> WarningSummary {
        let mut summary = WarningSummary::default();
        let mut noticed = HashSet::new();

        for record in records {
            let Some(counters) = record.warning_counters() else {
                continue;
            };
            for (name, count) in counters {
                match self.resolver.resolve(name) {
                    KeyResolution::Resolved { key, .. } => {
                        let total = summary.totals.entry(key).or_insert(0);
                        *total = total.saturating_add(*count);
                    }
                    KeyResolution::Unresolved => {
                        if noticed.insert(name.clone()) {
                            warn!(key = %name, job_id = %record.job_id(), "unmatched warning key");
                            summary.unresolved.push(name.clone());
                        }
                    }
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::counters::{CounterSnapshot, WARNING_GROUP};
    use crate::common::ids::JobId;
    use crate::stats::metrics::JobMeasurements;

    fn record_with_warnings(job: u64, warnings: &[(&str, u64)]) -> JobStatsRecord {
        let counters = warnings
            .iter()
            .fold(CounterSnapshot::new(), |snapshot, (name, count)| {
                snapshot.with_counter(WARNING_GROUP, name, *count)
            });
        let mut record = JobStatsRecord::new(JobId::from(job), true);
        record.init_warning_counters(&JobMeasurements::from_tasks(&[], counters));
        record
    }

    #[test]
    fn test_resolution_order() {
        let resolver = WarningResolver::default();
        assert_eq!(
            resolver.resolve("DIVIDE_BY_ZERO"),
            KeyResolution::Resolved {
                key: WarningKey::Warning(EngineWarning::DIVIDE_BY_ZERO),
                vocabulary: "engine_warning",
            }
        );
        assert_eq!(
            resolver.resolve("PROACTIVE_SPILL_COUNT_BAGS"),
            KeyResolution::Resolved {
                key: WarningKey::Counter(EngineCounter::PROACTIVE_SPILL_COUNT_BAGS),
                vocabulary: "engine_counter",
            }
        );
        assert_eq!(resolver.resolve("divide_by_zero"), KeyResolution::Unresolved);
    }

    #[test]
    fn test_primary_key_accumulates_across_jobs() {
        let jobs = vec![
            record_with_warnings(1, &[("DIVIDE_BY_ZERO", 3)]),
            record_with_warnings(2, &[("DIVIDE_BY_ZERO", 5), ("UDF_WARNING_2", 1)]),
        ];
        let summary = WarningAggregator::default().merge(&jobs);

        assert_eq!(summary.get(WarningKey::Warning(EngineWarning::DIVIDE_BY_ZERO)), Some(8));
        assert_eq!(summary.get(WarningKey::Warning(EngineWarning::UDF_WARNING_2)), Some(1));
        assert!(summary.unresolved.is_empty());
    }

    #[test]
    fn test_merge_is_order_independent() {
        let jobs = vec![
            record_with_warnings(1, &[("DIVIDE_BY_ZERO", 3), ("SPILLABLE_MEMORY_MANAGER_SPILL_COUNT", 2)]),
            record_with_warnings(2, &[("TOO_LARGE_FOR_INT", 4)]),
            record_with_warnings(3, &[("DIVIDE_BY_ZERO", 1), ("TOO_LARGE_FOR_INT", 6)]),
        ];
        let aggregator = WarningAggregator::default();
        let forward = aggregator.merge(&jobs);
        let backward = aggregator.merge(jobs.iter().rev());

        assert_eq!(forward.totals, backward.totals);
    }

    #[test]
    fn test_unresolved_key_noticed_once_per_merge() {
        let jobs = vec![
            record_with_warnings(1, &[("SOMETHING_ELSE", 2), ("DIVIDE_BY_ZERO", 1)]),
            record_with_warnings(2, &[("SOMETHING_ELSE", 7)]),
            record_with_warnings(3, &[("ANOTHER_ONE", 1)]),
        ];
        let summary = WarningAggregator::default().merge(&jobs);

        assert_eq!(summary.unresolved, vec!["SOMETHING_ELSE".to_string(), "ANOTHER_ONE".to_string()]);
        assert_eq!(summary.totals.len(), 1);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let jobs = vec![
            record_with_warnings(1, &[("DIVIDE_BY_ZERO", u64::MAX - 1)]),
            record_with_warnings(2, &[("DIVIDE_BY_ZERO", 5)]),
        ];
        let summary = WarningAggregator::default().merge(&jobs);
        assert_eq!(summary.get(WarningKey::Warning(EngineWarning::DIVIDE_BY_ZERO)), Some(u64::MAX));
    }

    #[test]
    fn test_jobs_without_warning_counters_are_skipped() {
        let jobs = vec![JobStatsRecord::new(JobId::from(1), false)];
        assert!(WarningAggregator::default().merge(&jobs).is_empty());
    }
}
