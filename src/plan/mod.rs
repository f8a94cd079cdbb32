//! Logical plan model.
//!
//! A deliberately small relational algebra: just enough structure for the
//! router to fingerprint plans and collapse literals. The embedding system's
//! planner produces these trees after binding.

mod logical_expr;
mod logical_plan;

pub use logical_expr::{BinaryOp, Column, LogicalExpr, ScalarValue};
pub use logical_plan::{
    AggregateCall, Distribution, JoinType, LogicalPlan, ModifyOp, SortKey, TableRef,
};
