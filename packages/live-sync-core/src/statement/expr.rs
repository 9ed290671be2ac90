//! Expression tree for WHERE, JOIN ON, SET values and ORDER BY.

use std::fmt;

use crate::error::Result;
use crate::value::{Value, DATE_TIME_FORMAT};

/// Column reference, optionally qualified by a table name or alias.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    /// Table name or alias as written
    pub qualifier: Option<String>,
    /// Field name
    pub name: String,
    /// Index of the resolved FromRef, set during resolution
    pub source: Option<usize>,
}

impl ColumnRef {
    pub fn new(qualifier: Option<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier,
            name: name.into(),
            source: None,
        }
    }

    /// Creates an already-resolved reference.
    pub fn resolved(qualifier: Option<String>, name: impl Into<String>, source: usize) -> Self {
        Self {
            qualifier,
            name: name.into(),
            source: Some(source),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    /// `@name`
    Param(String),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Negate(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// Parenthesized expression
    Nested(Box<Expr>),
}

impl Expr {
    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// `column = @param`
    pub fn column_eq_param(column: ColumnRef, param: impl Into<String>) -> Self {
        Expr::binary(Expr::Column(column), BinaryOp::Eq, Expr::Param(param.into()))
    }

    /// Joins conditions with `AND`; `None` for an empty list.
    pub fn conjunction(conditions: Vec<Expr>) -> Option<Expr> {
        conditions
            .into_iter()
            .reduce(|left, right| Expr::binary(left, BinaryOp::And, right))
    }

    /// Appends `extra` to an optional existing condition with `AND`.
    ///
    /// The existing condition is parenthesized so an `OR` inside it keeps
    /// its meaning.
    pub fn and_also(existing: Option<Expr>, extra: Expr) -> Expr {
        match existing {
            None => extra,
            Some(existing) => Expr::binary(
                Expr::Nested(Box::new(existing)),
                BinaryOp::And,
                Expr::Nested(Box::new(extra)),
            ),
        }
    }

    /// Collects distinct parameter names in first-occurrence order.
    pub fn collect_params(&self, out: &mut Vec<String>) {
        self.walk(&mut |expr| {
            if let Expr::Param(name) = expr {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
        });
    }

    /// Visits this node and every child, parents first.
    pub fn walk(&self, visit: &mut dyn FnMut(&Expr)) {
        visit(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Param(_) => {}
            Expr::Binary { left, right, .. } => {
                left.walk(visit);
                right.walk(visit);
            }
            Expr::Not(inner) | Expr::Negate(inner) | Expr::Nested(inner) => inner.walk(visit),
            Expr::IsNull { expr, .. } => expr.walk(visit),
            Expr::InList { expr, list, .. } => {
                expr.walk(visit);
                for item in list {
                    item.walk(visit);
                }
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk(visit);
                pattern.walk(visit);
            }
            Expr::Between { expr, low, high, .. } => {
                expr.walk(visit);
                low.walk(visit);
                high.walk(visit);
            }
        }
    }

    /// Applies `resolve` to every column reference.
    pub fn resolve_columns(&mut self, resolve: &mut dyn FnMut(&mut ColumnRef) -> Result<()>) -> Result<()> {
        match self {
            Expr::Column(column) => resolve(column),
            Expr::Literal(_) | Expr::Param(_) => Ok(()),
            Expr::Binary { left, right, .. } => {
                left.resolve_columns(resolve)?;
                right.resolve_columns(resolve)
            }
            Expr::Not(inner) | Expr::Negate(inner) | Expr::Nested(inner) => inner.resolve_columns(resolve),
            Expr::IsNull { expr, .. } => expr.resolve_columns(resolve),
            Expr::InList { expr, list, .. } => {
                expr.resolve_columns(resolve)?;
                for item in list {
                    item.resolve_columns(resolve)?;
                }
                Ok(())
            }
            Expr::Like { expr, pattern, .. } => {
                expr.resolve_columns(resolve)?;
                pattern.resolve_columns(resolve)
            }
            Expr::Between { expr, low, high, .. } => {
                expr.resolve_columns(resolve)?;
                low.resolve_columns(resolve)?;
                high.resolve_columns(resolve)
            }
        }
    }
}

/// Renders a value as a SQL literal.
pub fn write_literal(f: &mut dyn fmt::Write, value: &Value) -> fmt::Result {
    match value {
        Value::Null => write!(f, "NULL"),
        Value::Bool(true) => write!(f, "TRUE"),
        Value::Bool(false) => write!(f, "FALSE"),
        Value::Int(i) => write!(f, "{}", i),
        Value::Float(x) => write!(f, "{:?}", x),
        Value::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
        Value::DateTime(dt) => write!(f, "'{}'", dt.format(DATE_TIME_FORMAT)),
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_literal(f, item)?;
            }
            Ok(())
        }
    }
}

/// Writes one literal value.
pub type LiteralWriter = dyn Fn(&mut dyn fmt::Write, &Value) -> fmt::Result;

impl Expr {
    /// Renders the expression, writing literals with `literal`.
    ///
    /// `Display` uses [`write_literal`]; backends pass their own writer to
    /// produce native filter text.
    pub fn render(&self, f: &mut dyn fmt::Write, literal: &LiteralWriter) -> fmt::Result {
        let not = |negated: bool| if negated { "NOT " } else { "" };
        match self {
            Expr::Column(column) => write!(f, "{}", column),
            Expr::Literal(value) => literal(f, value),
            Expr::Param(name) => write!(f, "@{}", name),
            Expr::Binary { left, op, right } => {
                left.render(f, literal)?;
                write!(f, " {} ", op.symbol())?;
                right.render(f, literal)
            }
            Expr::Not(inner) => {
                write!(f, "NOT ")?;
                inner.render(f, literal)
            }
            Expr::Negate(inner) => {
                write!(f, "-")?;
                inner.render(f, literal)
            }
            Expr::IsNull { expr, negated } => {
                expr.render(f, literal)?;
                write!(f, " IS {}NULL", not(*negated))
            }
            Expr::InList { expr, list, negated } => {
                expr.render(f, literal)?;
                write!(f, " {}IN (", not(*negated))?;
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    item.render(f, literal)?;
                }
                write!(f, ")")
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                expr.render(f, literal)?;
                write!(f, " {}LIKE ", not(*negated))?;
                pattern.render(f, literal)
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                expr.render(f, literal)?;
                write!(f, " {}BETWEEN ", not(*negated))?;
                low.render(f, literal)?;
                write!(f, " AND ")?;
                high.render(f, literal)
            }
            Expr::Nested(inner) => {
                write!(f, "(")?;
                inner.render(f, literal)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &write_literal)
    }
}
