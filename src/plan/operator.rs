use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::common::ids::PlanNodeId;
use crate::runtime::job_context::SharedJobContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOperator {
    pub id: PlanNodeId,
    pub alias: Option<String>,
    pub location: String,
    /// Intermediate input introduced by the optimizer; never reported as a script input.
    pub is_tmp_load: bool,
}

impl LoadOperator {
    pub fn new(id: PlanNodeId, location: impl Into<String>) -> Self {
        Self {
            id,
            alias: None,
            location: location.into(),
            is_tmp_load: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn tmp(mut self) -> Self {
        self.is_tmp_load = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOperator {
    pub id: PlanNodeId,
    pub alias: Option<String>,
    pub location: String,
    pub is_tmp_store: bool,
}

impl StoreOperator {
    pub fn new(id: PlanNodeId, location: impl Into<String>) -> Self {
        Self {
            id,
            alias: None,
            location: location.into(),
            is_tmp_store: false,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn tmp(mut self) -> Self {
        self.is_tmp_store = true;
        self
    }
}

/// Sorted-merge cogroup. Each task merges the slice of the side inputs that lines
/// up with the split it is reading, so it needs the current split index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCogroupOperator {
    pub id: PlanNodeId,
    pub alias: Option<String>,
    #[serde(skip)]
    current_split_index: Option<usize>,
}

impl MergeCogroupOperator {
    pub fn new(id: PlanNodeId) -> Self {
        Self {
            id,
            alias: None,
            current_split_index: None,
        }
    }

    pub fn setup(&mut self, job_context: &SharedJobContext) -> Result<()> {
        let split_index = job_context.split_index().ok_or_else(|| {
            anyhow!("merge cogroup {} started before a split index was recorded", self.id)
        })?;
        self.current_split_index = Some(split_index);
        Ok(())
    }

    pub fn current_split_index(&self) -> Option<usize> {
        self.current_split_index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhysicalOperator {
    Load(LoadOperator),
    Store(StoreOperator),
    MergeCogroup(MergeCogroupOperator),
    Transform {
        id: PlanNodeId,
        name: String,
        alias: Option<String>,
    },
}

impl PhysicalOperator {
    pub fn id(&self) -> PlanNodeId {
        match self {
            PhysicalOperator::Load(op) => op.id,
            PhysicalOperator::Store(op) => op.id,
            PhysicalOperator::MergeCogroup(op) => op.id,
            PhysicalOperator::Transform { id, .. } => *id,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            PhysicalOperator::Load(op) => op.alias.as_deref(),
            PhysicalOperator::Store(op) => op.alias.as_deref(),
            PhysicalOperator::MergeCogroup(op) => op.alias.as_deref(),
            PhysicalOperator::Transform { alias, .. } => alias.as_deref(),
        }
    }
}
