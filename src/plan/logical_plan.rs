//! Logical plan representation consumed by the routing engine.
//!
//! The router sits between the query planner and the storage adapters: it
//! receives the already-bound logical tree, derives a query class from it,
//! and decides which adapters execute it. Parsing SQL and producing these
//! trees is the planner's job; executing them is the adapters' job.

use std::fmt;
use std::sync::Arc;

use super::logical_expr::LogicalExpr;

/// Reference to a table in the catalog, as it appears in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Schema (namespace) name
    pub schema: String,
    /// Table name
    pub table: String,
}

impl TableRef {
    /// Create a new table reference.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Get the fully qualified name.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Join type for logical plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "Inner"),
            JoinType::Left => write!(f, "Left"),
            JoinType::Right => write!(f, "Right"),
            JoinType::Full => write!(f, "Full"),
        }
    }
}

/// An aggregate call inside an `Aggregate` node.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    /// Function name (SUM, COUNT, ...)
    pub function: String,
    /// Arguments
    pub args: Vec<LogicalExpr>,
}

impl AggregateCall {
    /// Create a new aggregate call.
    pub fn new(function: impl Into<String>, args: Vec<LogicalExpr>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        write!(f, "{}({})", self.function, rendered.join(", "))
    }
}

/// A sort key inside a `Sort` node.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// Sort expression
    pub expr: LogicalExpr,
    /// Descending order
    pub descending: bool,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.expr,
            if self.descending { " DESC" } else { "" }
        )
    }
}

/// Data distribution requested by an `Exchange` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Singleton,
    Broadcast,
    Hashed,
    RoundRobin,
    Range,
    Any,
}

impl Distribution {
    /// Short name used in plan fingerprints.
    pub fn short_name(&self) -> &'static str {
        match self {
            Distribution::Singleton => "single",
            Distribution::Broadcast => "broadcast",
            Distribution::Hashed => "hash",
            Distribution::RoundRobin => "rr",
            Distribution::Range => "range",
            Distribution::Any => "any",
        }
    }
}

/// Kind of a table modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOp {
    Insert,
    Update,
    Delete,
    Merge,
}

impl fmt::Display for ModifyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifyOp::Insert => write!(f, "Insert"),
            ModifyOp::Update => write!(f, "Update"),
            ModifyOp::Delete => write!(f, "Delete"),
            ModifyOp::Merge => write!(f, "Merge"),
        }
    }
}

/// A logical query plan.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Table scan
    TableScan {
        /// Table reference
        table: TableRef,
    },

    /// Projection
    Project {
        /// The expressions to project
        exprs: Vec<LogicalExpr>,
        /// Input plan
        input: Arc<LogicalPlan>,
    },

    /// Filter
    Filter {
        /// Filter predicate
        predicate: LogicalExpr,
        /// Input plan
        input: Arc<LogicalPlan>,
    },

    /// Aggregate
    Aggregate {
        /// Grouping expressions
        group_by: Vec<LogicalExpr>,
        /// Aggregate calls
        agg_calls: Vec<AggregateCall>,
        /// Input plan
        input: Arc<LogicalPlan>,
    },

    /// Join
    Join {
        /// Left input
        left: Arc<LogicalPlan>,
        /// Right input
        right: Arc<LogicalPlan>,
        /// Join type
        join_type: JoinType,
        /// Join condition
        condition: Option<LogicalExpr>,
    },

    /// Sort
    Sort {
        /// Sort keys
        keys: Vec<SortKey>,
        /// Input plan
        input: Arc<LogicalPlan>,
    },

    /// Union of several inputs
    Union {
        inputs: Vec<Arc<LogicalPlan>>,
        all: bool,
    },

    /// Intersection of several inputs
    Intersect {
        inputs: Vec<Arc<LogicalPlan>>,
        all: bool,
    },

    /// Set difference
    Minus {
        inputs: Vec<Arc<LogicalPlan>>,
        all: bool,
    },

    /// Redistribution of rows
    Exchange {
        /// Requested distribution
        distribution: Distribution,
        /// Input plan
        input: Arc<LogicalPlan>,
    },

    /// Correlated nested-loop evaluation
    Correlate {
        left: Arc<LogicalPlan>,
        right: Arc<LogicalPlan>,
    },

    /// Row-pattern match over a table
    Match {
        /// Table reference
        table: TableRef,
        /// Input plan
        input: Arc<LogicalPlan>,
    },

    /// Inline values
    Values {
        /// Rows of expressions
        rows: Vec<Vec<LogicalExpr>>,
    },

    /// Table modification (insert/update/delete/merge)
    Modify {
        /// Target table
        table: TableRef,
        /// Modification kind
        op: ModifyOp,
        /// Source plan, if any
        source: Option<Arc<LogicalPlan>>,
    },
}

impl LogicalPlan {
    /// Get the child plans.
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::TableScan { .. } => vec![],
            LogicalPlan::Project { input, .. } => vec![input.as_ref()],
            LogicalPlan::Filter { input, .. } => vec![input.as_ref()],
            LogicalPlan::Aggregate { input, .. } => vec![input.as_ref()],
            LogicalPlan::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            LogicalPlan::Sort { input, .. } => vec![input.as_ref()],
            LogicalPlan::Union { inputs, .. }
            | LogicalPlan::Intersect { inputs, .. }
            | LogicalPlan::Minus { inputs, .. } => inputs.iter().map(|p| p.as_ref()).collect(),
            LogicalPlan::Exchange { input, .. } => vec![input.as_ref()],
            LogicalPlan::Correlate { left, right } => vec![left.as_ref(), right.as_ref()],
            LogicalPlan::Match { input, .. } => vec![input.as_ref()],
            LogicalPlan::Values { .. } => vec![],
            LogicalPlan::Modify { source, .. } => {
                source.iter().map(|p| p.as_ref()).collect()
            }
        }
    }

    /// Whether this plan is a table modification.
    ///
    /// Modification plans bypass query classification and the routing table
    /// entirely; they are dispatched to every store holding the table.
    pub fn is_modification(&self) -> bool {
        matches!(self, LogicalPlan::Modify { .. })
    }

    /// The modification kind, if this plan is one.
    pub fn modify_op(&self) -> Option<ModifyOp> {
        match self {
            LogicalPlan::Modify { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// The leftmost table scan reachable from this node, if any.
    pub fn leftmost_scan(&self) -> Option<&TableRef> {
        match self {
            LogicalPlan::TableScan { table } => Some(table),
            LogicalPlan::Match { table, .. } => Some(table),
            _ => self.children().into_iter().find_map(|c| c.leftmost_scan()),
        }
    }

    /// Display the plan with indentation.
    pub fn display_indent(&self, indent: usize) -> String {
        let mut result = String::new();
        self.format_indent(&mut result, indent);
        result
    }

    fn format_indent(&self, f: &mut String, indent: usize) {
        let prefix = "  ".repeat(indent);
        match self {
            LogicalPlan::TableScan { table } => {
                f.push_str(&format!("{}TableScan: {}\n", prefix, table));
            }
            LogicalPlan::Project { exprs, input } => {
                let rendered: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                f.push_str(&format!("{}Project: {}\n", prefix, rendered.join(", ")));
                input.format_indent(f, indent + 1);
            }
            LogicalPlan::Filter { predicate, input } => {
                f.push_str(&format!("{}Filter: {}\n", prefix, predicate));
                input.format_indent(f, indent + 1);
            }
            LogicalPlan::Aggregate {
                group_by,
                agg_calls,
                input,
            } => {
                let groups: Vec<String> = group_by.iter().map(|e| e.to_string()).collect();
                let aggs: Vec<String> = agg_calls.iter().map(|a| a.to_string()).collect();
                f.push_str(&format!(
                    "{}Aggregate: groupBy=[{}], aggs=[{}]\n",
                    prefix,
                    groups.join(", "),
                    aggs.join(", ")
                ));
                input.format_indent(f, indent + 1);
            }
            LogicalPlan::Join {
                left,
                right,
                join_type,
                condition,
            } => {
                let on = condition
                    .as_ref()
                    .map(|c| c.to_string())
                    .unwrap_or_default();
                f.push_str(&format!("{}{}Join: on=[{}]\n", prefix, join_type, on));
                left.format_indent(f, indent + 1);
                right.format_indent(f, indent + 1);
            }
            LogicalPlan::Sort { keys, input } => {
                let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
                f.push_str(&format!("{}Sort: [{}]\n", prefix, rendered.join(", ")));
                input.format_indent(f, indent + 1);
            }
            LogicalPlan::Union { inputs, all } => {
                f.push_str(&format!("{}Union{}\n", prefix, if *all { " ALL" } else { "" }));
                for input in inputs {
                    input.format_indent(f, indent + 1);
                }
            }
            LogicalPlan::Intersect { inputs, all } => {
                f.push_str(&format!(
                    "{}Intersect{}\n",
                    prefix,
                    if *all { " ALL" } else { "" }
                ));
                for input in inputs {
                    input.format_indent(f, indent + 1);
                }
            }
            LogicalPlan::Minus { inputs, all } => {
                f.push_str(&format!("{}Minus{}\n", prefix, if *all { " ALL" } else { "" }));
                for input in inputs {
                    input.format_indent(f, indent + 1);
                }
            }
            LogicalPlan::Exchange {
                distribution,
                input,
            } => {
                f.push_str(&format!(
                    "{}Exchange: {}\n",
                    prefix,
                    distribution.short_name()
                ));
                input.format_indent(f, indent + 1);
            }
            LogicalPlan::Correlate { left, right } => {
                f.push_str(&format!("{}Correlate\n", prefix));
                left.format_indent(f, indent + 1);
                right.format_indent(f, indent + 1);
            }
            LogicalPlan::Match { table, input } => {
                f.push_str(&format!("{}Match: {}\n", prefix, table));
                input.format_indent(f, indent + 1);
            }
            LogicalPlan::Values { rows } => {
                let rendered: Vec<String> = rows
                    .iter()
                    .map(|row| {
                        let cells: Vec<String> = row.iter().map(|e| e.to_string()).collect();
                        format!("({})", cells.join(", "))
                    })
                    .collect();
                f.push_str(&format!("{}Values: {}\n", prefix, rendered.join(", ")));
            }
            LogicalPlan::Modify { table, op, source } => {
                f.push_str(&format!("{}{}: {}\n", prefix, op, table));
                if let Some(source) = source {
                    source.format_indent(f, indent + 1);
                }
            }
        }
    }
}

impl fmt::Display for LogicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_indent(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::logical_expr::ScalarValue;

    fn scan(name: &str) -> Arc<LogicalPlan> {
        Arc::new(LogicalPlan::TableScan {
            table: TableRef::new("public", name),
        })
    }

    #[test]
    fn test_children() {
        let plan = LogicalPlan::Filter {
            predicate: LogicalExpr::column("id").eq(LogicalExpr::literal(ScalarValue::Int64(1))),
            input: scan("users"),
        };
        assert_eq!(plan.children().len(), 1);
        assert!(matches!(
            plan.children()[0],
            LogicalPlan::TableScan { .. }
        ));
    }

    #[test]
    fn test_leftmost_scan_through_join() {
        let plan = LogicalPlan::Join {
            left: Arc::new(LogicalPlan::Filter {
                predicate: LogicalExpr::column("active")
                    .eq(LogicalExpr::literal(ScalarValue::Boolean(true))),
                input: scan("users"),
            }),
            right: scan("orders"),
            join_type: JoinType::Inner,
            condition: None,
        };
        assert_eq!(
            plan.leftmost_scan().map(|t| t.qualified_name()),
            Some("public.users".to_string())
        );
    }

    #[test]
    fn test_modification_detection() {
        let plan = LogicalPlan::Modify {
            table: TableRef::new("public", "users"),
            op: ModifyOp::Insert,
            source: None,
        };
        assert!(plan.is_modification());
        assert_eq!(plan.modify_op(), Some(ModifyOp::Insert));

        let read = LogicalPlan::TableScan {
            table: TableRef::new("public", "users"),
        };
        assert!(!read.is_modification());
    }

    #[test]
    fn test_display_indent() {
        let plan = LogicalPlan::Project {
            exprs: vec![LogicalExpr::column("name")],
            input: Arc::new(LogicalPlan::Filter {
                predicate: LogicalExpr::column("age")
                    .gt(LogicalExpr::literal(ScalarValue::Int64(30))),
                input: scan("users"),
            }),
        };
        let rendered = plan.to_string();
        assert!(rendered.starts_with("Project: name\n"));
        assert!(rendered.contains("  Filter: age > 30\n"));
        assert!(rendered.contains("    TableScan: public.users\n"));
    }
}
