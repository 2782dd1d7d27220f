//! Filter, BIND and ORDER BY expressions.
//!
//! Only the shape matters to the optimizer: which variables an expression
//! reads, and whether it is one of the equality forms the implicit-join and
//! identity-filter passes look for. Evaluation is the evaluator's business.

use crate::algebra::Algebra;
use oxrdf::Term;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    /// `=` (value equality)
    Equal,
    NotEqual,
    /// `sameTerm(a, b)` (term identity)
    SameTerm,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
}

impl BinaryOperator {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::SameTerm => "sameTerm",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Minus,
}

/// A SPARQL expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Variable(String),
    Constant(Term),
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
    Unary(UnaryOperator, Box<Expression>),
    /// `BOUND(?x)`
    Bound(String),
    /// Any other function, by IRI or keyword
    FunctionCall(String, Vec<Expression>),
    Exists(Arc<Algebra>),
    NotExists(Arc<Algebra>),
}

impl Expression {
    pub fn var(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn constant(term: impl Into<Term>) -> Self {
        Expression::Constant(term.into())
    }

    pub fn binary(op: BinaryOperator, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn equal(lhs: Expression, rhs: Expression) -> Self {
        Self::binary(BinaryOperator::Equal, lhs, rhs)
    }

    pub fn same_term(lhs: Expression, rhs: Expression) -> Self {
        Self::binary(BinaryOperator::SameTerm, lhs, rhs)
    }

    pub fn and(lhs: Expression, rhs: Expression) -> Self {
        Self::binary(BinaryOperator::And, lhs, rhs)
    }

    pub fn not(inner: Expression) -> Self {
        Expression::Unary(UnaryOperator::Not, Box::new(inner))
    }

    /// Conjunction of a list of expressions, `None` when the list is empty
    pub fn conjunction(expressions: impl IntoIterator<Item = Expression>) -> Option<Self> {
        expressions.into_iter().reduce(Expression::and)
    }

    /// Variables this expression reads.
    ///
    /// Variables of an embedded EXISTS pattern are included: they correlate
    /// with the surrounding solution.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<String>) {
        match self {
            Expression::Variable(name) | Expression::Bound(name) => {
                vars.insert(name.clone());
            }
            Expression::Constant(_) => {}
            Expression::Binary(_, lhs, rhs) => {
                lhs.collect_variables(vars);
                rhs.collect_variables(vars);
            }
            Expression::Unary(_, inner) => inner.collect_variables(vars),
            Expression::FunctionCall(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
            Expression::Exists(pattern) | Expression::NotExists(pattern) => {
                vars.extend(pattern.variables());
            }
        }
    }

    /// Name of the variable if this expression is a bare variable
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Expression::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// `(lhs, rhs, is_same_term)` when this is `?a = ?b` or `sameTerm(?a, ?b)`
    /// over two distinct variables
    pub fn as_variable_equality(&self) -> Option<(&str, &str, bool)> {
        let Expression::Binary(op, lhs, rhs) = self else {
            return None;
        };
        let same_term = match op {
            BinaryOperator::Equal => false,
            BinaryOperator::SameTerm => true,
            _ => return None,
        };
        match (lhs.as_variable(), rhs.as_variable()) {
            (Some(a), Some(b)) if a != b => Some((a, b, same_term)),
            _ => None,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Variable(name) => write!(f, "?{name}"),
            Expression::Constant(term) => write!(f, "{term}"),
            Expression::Binary(BinaryOperator::SameTerm, lhs, rhs) => {
                write!(f, "sameTerm({lhs}, {rhs})")
            }
            Expression::Binary(op, lhs, rhs) => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expression::Unary(UnaryOperator::Not, inner) => write!(f, "!{inner}"),
            Expression::Unary(UnaryOperator::Minus, inner) => write!(f, "-{inner}"),
            Expression::Bound(name) => write!(f, "BOUND(?{name})"),
            Expression::FunctionCall(name, args) => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                write!(f, "{name}({})", args.join(", "))
            }
            Expression::Exists(pattern) => write!(f, "EXISTS {{ {pattern} }}"),
            Expression::NotExists(pattern) => write!(f, "NOT EXISTS {{ {pattern} }}"),
        }
    }
}
