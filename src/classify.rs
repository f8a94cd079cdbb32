//! Query classification.
//!
//! Routing decisions are learned per *query class*: an equivalence class of
//! logical plans under a classification function. Two strategies are
//! supported, selected through [`RouterConfig`](crate::RouterConfig):
//!
//! - **Structural shuttle**: walks the plan tree and collects one
//!   discriminator string per operator into an ordered set. Cheap, but
//!   plans with different constants in otherwise identical shapes may still
//!   diverge through operator payloads (e.g. aggregate call lists).
//! - **Parameterizer**: rewrites the plan by extracting literal constants
//!   into positional parameters and uses the canonical plan string, so
//!   `x = 3` and `x = 7` always classify identically.
//!
//! Both strategies are deterministic and stateless. Modification plans are
//! never classified; they bypass the routing table.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ClassifierStrategy;
use crate::plan::{AggregateCall, LogicalExpr, LogicalPlan, SortKey};

/// Opaque identifier for an equivalence class of logical plans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QueryClass(String);

impl QueryClass {
    /// Wrap a raw class string.
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into())
    }

    /// The underlying class string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive the query class of a logical plan under the given strategy.
pub fn classify(plan: &LogicalPlan, strategy: ClassifierStrategy) -> QueryClass {
    match strategy {
        ClassifierStrategy::StructuralShuttle => {
            let mut basis = BTreeSet::new();
            collect_fingerprint(plan, &mut basis);
            let joined: Vec<String> = basis.into_iter().collect();
            QueryClass::new(format!("[{}]", joined.join(", ")))
        }
        ClassifierStrategy::Parameterizer => {
            QueryClass::new(parameterize(plan).display_indent(0))
        }
    }
}

/// Accumulate one discriminator per operator into the hash basis.
fn collect_fingerprint(plan: &LogicalPlan, basis: &mut BTreeSet<String>) {
    match plan {
        LogicalPlan::TableScan { table } => {
            basis.insert(format!("TableScan#{}", table.qualified_name()));
            return;
        }
        LogicalPlan::Aggregate { agg_calls, .. } => {
            let calls: Vec<String> = agg_calls.iter().map(|c| c.to_string()).collect();
            basis.insert(format!("LogicalAggregate#[{}]", calls.join(", ")));
        }
        LogicalPlan::Filter { .. } => {
            basis.insert("LogicalFilter".to_string());
        }
        LogicalPlan::Project { exprs, .. } => {
            basis.insert(format!("LogicalProject#{}", exprs.len()));
        }
        LogicalPlan::Join { left, right, .. } => {
            basis.insert(format!(
                "LogicalJoin#{}#{}",
                side_label(left),
                side_label(right)
            ));
        }
        LogicalPlan::Sort { .. } => {
            basis.insert("LogicalSort".to_string());
        }
        LogicalPlan::Union { .. } => {
            basis.insert("LogicalUnion".to_string());
        }
        LogicalPlan::Intersect { .. } => {
            basis.insert("LogicalIntersect".to_string());
        }
        LogicalPlan::Minus { .. } => {
            basis.insert("LogicalMinus".to_string());
        }
        LogicalPlan::Exchange { distribution, .. } => {
            basis.insert(format!("LogicalExchange#{}", distribution.short_name()));
        }
        LogicalPlan::Correlate { .. } => {
            basis.insert("LogicalCorrelate".to_string());
        }
        LogicalPlan::Match { table, .. } => {
            basis.insert(format!("LogicalMatch#{}", table.qualified_name()));
        }
        // Inline values carry no routable structure; the node is terminal.
        LogicalPlan::Values { .. } => {
            return;
        }
        other => {
            basis.insert(format!("other#{}", operator_kind(other)));
        }
    }
    for child in plan.children() {
        collect_fingerprint(child, basis);
    }
}

/// Label for a join input: the qualified name of its leftmost scan.
fn side_label(plan: &LogicalPlan) -> String {
    plan.leftmost_scan()
        .map(|t| t.qualified_name())
        .unwrap_or_else(|| "?".to_string())
}

fn operator_kind(plan: &LogicalPlan) -> &'static str {
    match plan {
        LogicalPlan::TableScan { .. } => "TableScan",
        LogicalPlan::Project { .. } => "Project",
        LogicalPlan::Filter { .. } => "Filter",
        LogicalPlan::Aggregate { .. } => "Aggregate",
        LogicalPlan::Join { .. } => "Join",
        LogicalPlan::Sort { .. } => "Sort",
        LogicalPlan::Union { .. } => "Union",
        LogicalPlan::Intersect { .. } => "Intersect",
        LogicalPlan::Minus { .. } => "Minus",
        LogicalPlan::Exchange { .. } => "Exchange",
        LogicalPlan::Correlate { .. } => "Correlate",
        LogicalPlan::Match { .. } => "Match",
        LogicalPlan::Values { .. } => "Values",
        LogicalPlan::Modify { .. } => "Modify",
    }
}

/// Rewrite a plan by extracting every literal into a positional parameter.
///
/// Parameters are numbered in pre-order traversal, so structurally equal
/// plans produce identical rewrites regardless of the constants they carry.
pub fn parameterize(plan: &LogicalPlan) -> LogicalPlan {
    let mut next = 0usize;
    parameterize_node(plan, &mut next)
}

fn parameterize_node(plan: &LogicalPlan, next: &mut usize) -> LogicalPlan {
    match plan {
        LogicalPlan::TableScan { table } => LogicalPlan::TableScan {
            table: table.clone(),
        },
        LogicalPlan::Project { exprs, input } => LogicalPlan::Project {
            exprs: exprs.iter().map(|e| parameterize_expr(e, next)).collect(),
            input: Arc::new(parameterize_node(input, next)),
        },
        LogicalPlan::Filter { predicate, input } => LogicalPlan::Filter {
            predicate: parameterize_expr(predicate, next),
            input: Arc::new(parameterize_node(input, next)),
        },
        LogicalPlan::Aggregate {
            group_by,
            agg_calls,
            input,
        } => LogicalPlan::Aggregate {
            group_by: group_by.iter().map(|e| parameterize_expr(e, next)).collect(),
            agg_calls: agg_calls
                .iter()
                .map(|c| AggregateCall {
                    function: c.function.clone(),
                    args: c.args.iter().map(|a| parameterize_expr(a, next)).collect(),
                })
                .collect(),
            input: Arc::new(parameterize_node(input, next)),
        },
        LogicalPlan::Join {
            left,
            right,
            join_type,
            condition,
        } => LogicalPlan::Join {
            condition: condition.as_ref().map(|c| parameterize_expr(c, next)),
            left: Arc::new(parameterize_node(left, next)),
            right: Arc::new(parameterize_node(right, next)),
            join_type: *join_type,
        },
        LogicalPlan::Sort { keys, input } => LogicalPlan::Sort {
            keys: keys
                .iter()
                .map(|k| SortKey {
                    expr: parameterize_expr(&k.expr, next),
                    descending: k.descending,
                })
                .collect(),
            input: Arc::new(parameterize_node(input, next)),
        },
        LogicalPlan::Union { inputs, all } => LogicalPlan::Union {
            inputs: inputs
                .iter()
                .map(|p| Arc::new(parameterize_node(p, next)))
                .collect(),
            all: *all,
        },
        LogicalPlan::Intersect { inputs, all } => LogicalPlan::Intersect {
            inputs: inputs
                .iter()
                .map(|p| Arc::new(parameterize_node(p, next)))
                .collect(),
            all: *all,
        },
        LogicalPlan::Minus { inputs, all } => LogicalPlan::Minus {
            inputs: inputs
                .iter()
                .map(|p| Arc::new(parameterize_node(p, next)))
                .collect(),
            all: *all,
        },
        LogicalPlan::Exchange {
            distribution,
            input,
        } => LogicalPlan::Exchange {
            distribution: *distribution,
            input: Arc::new(parameterize_node(input, next)),
        },
        LogicalPlan::Correlate { left, right } => LogicalPlan::Correlate {
            left: Arc::new(parameterize_node(left, next)),
            right: Arc::new(parameterize_node(right, next)),
        },
        LogicalPlan::Match { table, input } => LogicalPlan::Match {
            table: table.clone(),
            input: Arc::new(parameterize_node(input, next)),
        },
        LogicalPlan::Values { rows } => LogicalPlan::Values {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|e| parameterize_expr(e, next)).collect())
                .collect(),
        },
        LogicalPlan::Modify { table, op, source } => LogicalPlan::Modify {
            table: table.clone(),
            op: *op,
            source: source
                .as_ref()
                .map(|p| Arc::new(parameterize_node(p, next))),
        },
    }
}

fn parameterize_expr(expr: &LogicalExpr, next: &mut usize) -> LogicalExpr {
    match expr {
        LogicalExpr::Literal(_) => {
            let index = *next;
            *next += 1;
            LogicalExpr::Placeholder { index }
        }
        LogicalExpr::BinaryExpr { left, op, right } => LogicalExpr::BinaryExpr {
            left: Box::new(parameterize_expr(left, next)),
            op: *op,
            right: Box::new(parameterize_expr(right, next)),
        },
        LogicalExpr::ScalarFunction { name, args } => LogicalExpr::ScalarFunction {
            name: name.clone(),
            args: args.iter().map(|a| parameterize_expr(a, next)).collect(),
        },
        LogicalExpr::Column(_) | LogicalExpr::Placeholder { .. } => expr.clone(),
    }
}
