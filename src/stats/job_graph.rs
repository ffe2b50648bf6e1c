use std::ops::Index;

use anyhow::Result;
use serde::Serialize;

use crate::stats::job_stats::JobStatsRecord;

/// Every job of one script execution, in completion order. Append only.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct AggregateJobGraph {
    records: Vec<JobStatsRecord>,
}

impl AggregateJobGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: JobStatsRecord) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&JobStatsRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JobStatsRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobStatsRecord> {
        self.records.iter().filter(|r| !r.is_successful())
    }

    pub fn successful(&self) -> impl Iterator<Item = &JobStatsRecord> {
        self.records.iter().filter(|r| r.is_successful())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Index<usize> for AggregateJobGraph {
    type Output = JobStatsRecord;

    fn index(&self, index: usize) -> &Self::Output {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a AggregateJobGraph {
    type Item = &'a JobStatsRecord;
    type IntoIter = std::slice::Iter<'a, JobStatsRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
