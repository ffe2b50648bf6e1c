use std::sync::Arc;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::common::ids::PlanNodeId;
use crate::plan::operator::{LoadOperator, PhysicalOperator, StoreOperator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubgraphKind {
    /// Compiled from engine operators; reports counters.
    Engine,
    /// Hands a user-supplied program to the framework and reports only success or failure.
    Native { command: String },
}

/// The part of the physical plan executed by one physical job. After
/// multi-output fusion a subgraph can hold several stores fed by shared loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSubgraph {
    pub id: PlanNodeId,
    pub kind: SubgraphKind,
    operators: Vec<PhysicalOperator>,
}

impl OperatorSubgraph {
    pub fn new(id: PlanNodeId) -> Self {
        Self {
            id,
            kind: SubgraphKind::Engine,
            operators: Vec::new(),
        }
    }

    pub fn native(id: PlanNodeId, command: impl Into<String>) -> Self {
        Self {
            id,
            kind: SubgraphKind::Native {
                command: command.into(),
            },
            operators: Vec::new(),
        }
    }

    pub fn with_operator(mut self, operator: PhysicalOperator) -> Self {
        self.operators.push(operator);
        self
    }

    pub fn add_operator(&mut self, operator: PhysicalOperator) {
        self.operators.push(operator);
    }

    pub fn operators(&self) -> &[PhysicalOperator] {
        &self.operators
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, SubgraphKind::Native { .. })
    }

    pub fn loads(&self) -> Vec<&LoadOperator> {
        self.operators
            .iter()
            .filter_map(|op| match op {
                PhysicalOperator::Load(load) => Some(load),
                _ => None,
            })
            .collect()
    }

    pub fn stores(&self) -> Vec<&StoreOperator> {
        self.operators
            .iter()
            .filter_map(|op| match op {
                PhysicalOperator::Store(store) => Some(store),
                _ => None,
            })
            .collect()
    }

    /// Distinct operator aliases in plan order, comma separated.
    pub fn alias(&self) -> String {
        self.operators
            .iter()
            .filter_map(|op| op.alias())
            .unique()
            .join(",")
    }
}

/// Compiled job plan: one subgraph per physical job, in submission order.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    subgraphs: Vec<Arc<OperatorSubgraph>>,
}

impl JobPlan {
    pub fn new(subgraphs: Vec<Arc<OperatorSubgraph>>) -> Self {
        Self { subgraphs }
    }

    pub fn subgraphs(&self) -> &[Arc<OperatorSubgraph>] {
        &self.subgraphs
    }

    pub fn subgraph(&self, id: PlanNodeId) -> Option<&Arc<OperatorSubgraph>> {
        self.subgraphs.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.subgraphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subgraphs.is_empty()
    }
}
