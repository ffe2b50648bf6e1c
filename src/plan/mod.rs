pub mod operator;
pub mod subgraph;

pub use operator::{LoadOperator, MergeCogroupOperator, PhysicalOperator, StoreOperator};
pub use subgraph::{JobPlan, OperatorSubgraph, SubgraphKind};
