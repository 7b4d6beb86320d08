//! Typed SQL predicate tree.
//!
//! The encoder builds [`Expr`] values and the dialect renderer in
//! [`SqlWriter`](super::SqlWriter) turns them into text. Nothing in here knows
//! about a particular dialect.

use super::value::SqlValue;

/// A scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A (qualified) column reference, e.g. `mi.id`.
    Column(String),
    /// A bound parameter.
    Param(SqlValue),
    /// An inline integer literal.
    Literal(i64),
    Upper(Box<Operand>),
    BitAnd(Box<Operand>, Box<Operand>),
    /// -1, 0 or 1.
    Sign(Box<Operand>),
    Add(Box<Operand>, Box<Operand>),
    Sub(Box<Operand>, Box<Operand>),
    Concat(Box<Operand>, Box<Operand>),
    /// Integer left-padded with zeros to ten characters.
    PadId(Box<Operand>),
    /// `COALESCE(operand, default)`.
    Coalesce(Box<Operand>, i64),
}

impl Operand {
    pub fn column(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }

    pub fn param(value: impl Into<SqlValue>) -> Self {
        Operand::Param(value.into())
    }

    pub fn upper(self) -> Self {
        Operand::Upper(Box::new(self))
    }

    pub fn bit_and(self, other: Operand) -> Self {
        Operand::BitAnd(Box::new(self), Box::new(other))
    }

    pub fn sign(self) -> Self {
        Operand::Sign(Box::new(self))
    }

    pub fn add(self, other: Operand) -> Self {
        Operand::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Operand) -> Self {
        Operand::Sub(Box::new(self), Box::new(other))
    }

    pub fn concat(self, other: Operand) -> Self {
        Operand::Concat(Box::new(self), Box::new(other))
    }

    pub fn pad_id(self) -> Self {
        Operand::PadId(Box::new(self))
    }

    pub fn coalesce(self, default: i64) -> Self {
        Operand::Coalesce(Box::new(self), default)
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Operator for a lower bound.
    pub fn lower_bound(inclusive: bool) -> Self {
        if inclusive { CompareOp::Ge } else { CompareOp::Gt }
    }

    /// Operator for an upper bound.
    pub fn upper_bound(inclusive: bool) -> Self {
        if inclusive { CompareOp::Le } else { CompareOp::Lt }
    }
}

/// A boolean predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Matches nothing.
    False,
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    /// `operand [NOT] IN (?, ...)` with bound values.
    InSet {
        operand: Operand,
        values: Vec<SqlValue>,
        negated: bool,
    },
    /// `operand [NOT] IN (1, 2, ...)` with inline literals.
    InLiterals {
        operand: Operand,
        values: Vec<i64>,
        negated: bool,
    },
    /// `[NOT] EXISTS (SELECT * FROM table AS alias WHERE filter)`.
    Exists {
        table: String,
        alias: &'static str,
        filter: Box<Expr>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    /// Substring test of a text column.
    Contains {
        operand: Operand,
        needle: String,
        negated: bool,
    },
}

impl Expr {
    /// Conjunction of the parts; `None` when there are none.
    pub fn all(mut parts: Vec<Expr>) -> Option<Expr> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Expr::And(parts)),
        }
    }

    /// Disjunction of the parts; `None` when there are none.
    pub fn any(mut parts: Vec<Expr>) -> Option<Expr> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Expr::Or(parts)),
        }
    }

    pub fn negate(expr: Expr) -> Expr {
        Expr::Not(Box::new(expr))
    }

    pub fn compare(left: Operand, op: CompareOp, right: Operand) -> Expr {
        Expr::Compare { left, op, right }
    }

    /// `column = ?`
    pub fn eq_param(column: &str, value: impl Into<SqlValue>) -> Expr {
        Expr::compare(Operand::column(column), CompareOp::Eq, Operand::param(value))
    }

    /// `a = b` over two columns.
    pub fn columns_eq(a: &str, b: &str) -> Expr {
        Expr::compare(Operand::column(a), CompareOp::Eq, Operand::column(b))
    }

    pub fn in_set<V: Into<SqlValue>>(
        column: &str,
        values: impl IntoIterator<Item = V>,
        negated: bool,
    ) -> Expr {
        Expr::InSet {
            operand: Operand::column(column),
            values: values.into_iter().map(Into::into).collect(),
            negated,
        }
    }

    pub fn is_null(column: &str, negated: bool) -> Expr {
        Expr::IsNull {
            operand: Operand::column(column),
            negated,
        }
    }

    /// Number of placeholders the expression binds.
    pub fn param_count(&self) -> usize {
        match self {
            Expr::False | Expr::InLiterals { .. } => 0,
            Expr::And(parts) | Expr::Or(parts) => parts.iter().map(Expr::param_count).sum(),
            Expr::Not(inner) => inner.param_count(),
            Expr::Compare { left, right, .. } => left.param_count() + right.param_count(),
            Expr::InSet {
                operand, values, ..
            } => operand.param_count() + values.len(),
            Expr::Exists { filter, .. } => filter.param_count(),
            Expr::IsNull { operand, .. } => operand.param_count(),
            Expr::Contains { operand, .. } => operand.param_count() + 1,
        }
    }
}

impl Operand {
    /// Number of placeholders the operand binds.
    pub fn param_count(&self) -> usize {
        match self {
            Operand::Column(_) | Operand::Literal(_) => 0,
            Operand::Param(_) => 1,
            Operand::Upper(inner)
            | Operand::Sign(inner)
            | Operand::PadId(inner)
            | Operand::Coalesce(inner, _) => inner.param_count(),
            Operand::BitAnd(a, b) | Operand::Add(a, b) | Operand::Sub(a, b) | Operand::Concat(a, b) => {
                a.param_count() + b.param_count()
            }
        }
    }
}
