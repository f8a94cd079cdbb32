//! Scalar expressions appearing in logical query plans.
//!
//! The routing engine never evaluates expressions; it only needs enough of
//! the expression tree to fingerprint a plan and to collapse literal
//! constants into positional parameters.

use std::fmt;

/// A column reference in a logical plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    /// Optional relation (table) name
    pub relation: Option<String>,
    /// Column name
    pub name: String,
}

impl Column {
    /// Create an unqualified column reference.
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self {
            relation: None,
            name: name.into(),
        }
    }

    /// Create a qualified column reference.
    pub fn qualified(relation: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            relation: Some(relation.into()),
            name: name.into(),
        }
    }

    /// Get the fully qualified name.
    pub fn qualified_name(&self) -> String {
        match &self.relation {
            Some(r) => format!("{}.{}", r, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// A literal scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Boolean(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => write!(f, "'{}'", v),
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        };
        write!(f, "{}", symbol)
    }
}

/// A scalar expression in a logical plan.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalExpr {
    /// Column reference
    Column(Column),

    /// Literal value
    Literal(ScalarValue),

    /// Binary operation
    BinaryExpr {
        left: Box<LogicalExpr>,
        op: BinaryOp,
        right: Box<LogicalExpr>,
    },

    /// Scalar function call
    ScalarFunction {
        name: String,
        args: Vec<LogicalExpr>,
    },

    /// Positional parameter produced by the literal-collapsing rewrite
    Placeholder { index: usize },
}

impl LogicalExpr {
    /// Create a column expression.
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(Column::unqualified(name))
    }

    /// Create a qualified column expression.
    pub fn qualified_column(relation: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column(Column::qualified(relation, name))
    }

    /// Create a literal expression.
    pub fn literal(value: ScalarValue) -> Self {
        Self::Literal(value)
    }

    /// Create an AND expression.
    pub fn and(self, other: LogicalExpr) -> Self {
        Self::BinaryExpr {
            left: Box::new(self),
            op: BinaryOp::And,
            right: Box::new(other),
        }
    }

    /// Create an equality expression.
    pub fn eq(self, other: LogicalExpr) -> Self {
        Self::BinaryExpr {
            left: Box::new(self),
            op: BinaryOp::Eq,
            right: Box::new(other),
        }
    }

    /// Create a greater-than expression.
    pub fn gt(self, other: LogicalExpr) -> Self {
        Self::BinaryExpr {
            left: Box::new(self),
            op: BinaryOp::Gt,
            right: Box::new(other),
        }
    }
}

impl fmt::Display for LogicalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalExpr::Column(c) => write!(f, "{}", c),
            LogicalExpr::Literal(v) => write!(f, "{}", v),
            LogicalExpr::BinaryExpr { left, op, right } => {
                write!(f, "{} {} {}", left, op, right)
            }
            LogicalExpr::ScalarFunction { name, args } => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, rendered.join(", "))
            }
            LogicalExpr::Placeholder { index } => write!(f, "?{}", index),
        }
    }
}
