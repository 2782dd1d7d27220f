//! Identity filters.
//!
//! `FILTER(?x = <iri>)` and `FILTER(sameTerm(?x, term))` become
//! [`Algebra::IdentityFilter`], which the evaluator runs as a term
//! comparison instead of expression evaluation. Value equality against a
//! literal is left alone: `?x = 1` also matches `"01"^^xsd:integer`.

use super::AlgebraOptimizer;
use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use crate::expression::{BinaryOperator, Expression};
use oxrdf::Term;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFilterOptimizer;

impl IdentityFilterOptimizer {
    pub fn new() -> Self {
        IdentityFilterOptimizer
    }
}

/// `(variable, constant)` when the expression compares a variable with a
/// constant by identity, in either operand order
fn identity_comparison(expression: &Expression) -> Option<(&str, &Expression)> {
    let Expression::Binary(op, lhs, rhs) = expression else {
        return None;
    };
    let (variable, constant) = match (lhs.as_ref(), rhs.as_ref()) {
        (Expression::Variable(v), c @ Expression::Constant(_))
        | (c @ Expression::Constant(_), Expression::Variable(v)) => (v.as_str(), c),
        _ => return None,
    };
    let Expression::Constant(term) = constant else {
        return None;
    };
    match op {
        BinaryOperator::SameTerm => Some((variable, constant)),
        BinaryOperator::Equal if matches!(term, Term::NamedNode(_)) => Some((variable, constant)),
        _ => None,
    }
}

impl AlgebraOptimizer for IdentityFilterOptimizer {
    fn name(&self) -> &str {
        "identity_filter"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        if let Algebra::Filter { inner, expression } = algebra {
            if let Some((variable, term)) = identity_comparison(expression) {
                tracing::debug!(variable, "identity_filter_created");
                return Ok(Algebra::IdentityFilter {
                    inner: Arc::new(self.optimize(inner)),
                    variable: variable.to_string(),
                    term: term.clone(),
                });
            }
        }
        Ok(algebra.transform(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::TriplePattern;
    use crate::term::PatternItem;
    use oxrdf::{Literal, NamedNode};

    fn bgp() -> Algebra {
        Algebra::bgp(vec![TriplePattern::triple(
            PatternItem::variable("s"),
            PatternItem::iri("http://example.org/p"),
            PatternItem::variable("o"),
        )])
    }

    fn iri() -> Expression {
        Expression::constant(NamedNode::new_unchecked("http://example.org/a"))
    }

    #[test]
    fn test_iri_equality_in_either_order() {
        for expr in [
            Expression::equal(Expression::var("o"), iri()),
            Expression::equal(iri(), Expression::var("o")),
        ] {
            let out = IdentityFilterOptimizer.optimize(&Algebra::filter(bgp(), expr));
            let Algebra::IdentityFilter { variable, term, .. } = &out else {
                panic!("expected identity filter, got {out}");
            };
            assert_eq!(variable, "o");
            assert_eq!(term, &iri());
        }
    }

    #[test]
    fn test_literal_needs_same_term() {
        let one = Expression::constant(Literal::from(1_i64));
        let eq = Algebra::filter(bgp(), Expression::equal(Expression::var("o"), one.clone()));
        assert_eq!(IdentityFilterOptimizer.optimize(&eq), eq);

        let same = Algebra::filter(bgp(), Expression::same_term(Expression::var("o"), one));
        assert_eq!(
            IdentityFilterOptimizer.optimize(&same).name(),
            "IdentityFilter"
        );
    }

    #[test]
    fn test_nested_filters_are_reached() {
        let tree = Algebra::join(
            bgp(),
            Algebra::filter(bgp(), Expression::equal(Expression::var("s"), iri())),
        );
        let out = IdentityFilterOptimizer.optimize(&tree);
        assert!(out.contains_operator("IdentityFilter"));
        assert_eq!(out.variables(), tree.variables());
    }
}
