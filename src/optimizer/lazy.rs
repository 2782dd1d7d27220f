//! LIMIT-driven lazy evaluation.
//!
//! When a query needs only its first `LIMIT + OFFSET` solutions in
//! evaluation order, BGPs become [`Algebra::LazyBgp`] and unions become
//! [`Algebra::LazyUnion`], both of which stop once enough solutions exist.

use super::{is_disjoint, AlgebraOptimizer};
use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use crate::query::{QueryShape, UpdateCommand};
use std::sync::Arc;

/// Rewrites query algebra to stop once enough solutions exist
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyBgpOptimizer {
    required_results: Option<usize>,
}

impl LazyBgpOptimizer {
    /// Leaves the number of required results to the evaluator
    pub fn new() -> Self {
        LazyBgpOptimizer {
            required_results: None,
        }
    }

    /// Fix the number of solutions the lazy operators must produce
    pub fn with_required_results(required_results: usize) -> Self {
        LazyBgpOptimizer {
            required_results: Some(required_results),
        }
    }

    /// Derive the required results (`LIMIT + OFFSET`) from a query
    pub fn for_query(query: &QueryShape) -> Self {
        LazyBgpOptimizer {
            required_results: query
                .limit
                .map(|limit| limit.saturating_add(query.offset)),
        }
    }

    pub fn required_results(&self) -> Option<usize> {
        self.required_results
    }
}

impl AlgebraOptimizer for LazyBgpOptimizer {
    fn name(&self) -> &str {
        "lazy_bgp"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        Ok(match algebra {
            Algebra::Bgp { patterns } if !patterns.is_empty() => {
                Algebra::try_lazy_bgp(patterns.clone(), self.required_results)?
            }
            Algebra::Union { lhs, rhs } => Algebra::LazyUnion {
                lhs: Arc::new(self.optimize(lhs)),
                rhs: Arc::new(self.optimize(rhs)),
                required_results: self.required_results,
            },
            Algebra::Join { lhs, rhs } => {
                if is_disjoint(lhs, rhs) {
                    algebra.transform(self)
                } else {
                    algebra.transform_rhs(self)
                }
            }
            // Every left solution survives a left join, so limiting the left
            // side is safe. The optional side must be complete.
            Algebra::LeftJoin { .. } => algebra.transform_lhs(self),
            Algebra::Graph { .. }
            | Algebra::Extend { .. }
            | Algebra::Select { .. }
            | Algebra::OrderBy { .. }
            | Algebra::Slice { .. } => algebra.transform(self),
            Algebra::Bgp { .. }
            | Algebra::LazyBgp { .. }
            | Algebra::AskBgp { .. }
            | Algebra::NullOperator { .. }
            | Algebra::Filter { .. }
            | Algebra::IdentityFilter { .. }
            | Algebra::Service { .. }
            | Algebra::Minus { .. }
            | Algebra::AskUnion { .. }
            | Algebra::LazyUnion { .. }
            | Algebra::ParallelJoin { .. }
            | Algebra::ParallelUnion { .. }
            | Algebra::FilteredProduct { .. }
            | Algebra::Distinct { .. }
            | Algebra::Reduced { .. } => algebra.clone(),
        })
    }

    /// Only when no clause can require seeing every solution:
    /// `LIMIT > 0`, no DISTINCT, no GROUP BY/HAVING/BINDINGS, and any
    /// ORDER BY already satisfied by evaluation order
    fn is_applicable(&self, query: &QueryShape) -> bool {
        query.limit.is_some_and(|limit| limit > 0)
            && !query.distinct
            && query.order_by.as_ref().is_none_or(|o| o.optimizable)
            && query.group_by.is_none()
            && query.having.is_none()
            && query.bindings.is_none()
    }

    fn is_applicable_to_update(&self, _command: &UpdateCommand) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::OrderCondition;
    use crate::expression::Expression;
    use crate::pattern::TriplePattern;
    use crate::query::{OrderByShape, QueryType};
    use crate::term::PatternItem;

    fn bgp(s: &str, o: &str) -> Algebra {
        Algebra::bgp(vec![TriplePattern::triple(
            PatternItem::variable(s),
            PatternItem::iri("http://example.org/p"),
            PatternItem::variable(o),
        )])
    }

    fn limited(limit: usize) -> QueryShape {
        let mut shape = QueryShape::new(QueryType::Select);
        shape.limit = Some(limit);
        shape
    }

    #[test]
    fn test_bgp_and_union_become_lazy() {
        let tree = Algebra::union(bgp("s", "o"), bgp("a", "b"));
        let out = LazyBgpOptimizer::new().optimize(&tree);
        let text = out.to_string();
        assert!(text.starts_with("LazyUnion("));
        assert_eq!(text.matches("LazyBgp(").count(), 2);
    }

    #[test]
    fn test_left_join_limits_required_side_only() {
        let tree = Algebra::left_join(bgp("s", "o"), bgp("o", "x"), None);
        let out = LazyBgpOptimizer::new().optimize(&tree);
        let Algebra::LeftJoin { lhs, rhs, .. } = &out else {
            panic!("expected left join, got {out}");
        };
        assert!(matches!(**lhs, Algebra::LazyBgp { .. }));
        assert!(matches!(**rhs, Algebra::Bgp { .. }));
    }

    #[test]
    fn test_descends_through_slice_and_select() {
        let tree = Algebra::slice(Algebra::select(bgp("s", "o"), None), Some(10), 0);
        let out = LazyBgpOptimizer::with_required_results(10).optimize(&tree);
        assert_eq!(
            out.to_string(),
            "Slice(Select(LazyBgp(?s <http://example.org/p> ?o, 10), *), LIMIT 10)"
        );
    }

    #[test]
    fn test_for_query_adds_offset() {
        let mut shape = limited(10);
        shape.offset = 5;
        assert_eq!(
            LazyBgpOptimizer::for_query(&shape).required_results(),
            Some(15)
        );
        assert_eq!(
            LazyBgpOptimizer::for_query(&QueryShape::new(QueryType::Select)).required_results(),
            None
        );
    }

    #[test]
    fn test_applicability() {
        let opt = LazyBgpOptimizer::new();
        assert!(opt.is_applicable(&limited(10)));
        assert!(!opt.is_applicable(&limited(0)));
        assert!(!opt.is_applicable(&QueryShape::new(QueryType::Select)));

        let mut distinct = limited(10);
        distinct.distinct = true;
        assert!(!opt.is_applicable(&distinct));

        let mut grouped = limited(10);
        grouped.group_by = Some(vec![Expression::var("s")]);
        assert!(!opt.is_applicable(&grouped));

        let mut having = limited(10);
        having.having = Some(Expression::var("s"));
        assert!(!opt.is_applicable(&having));

        let mut bindings = limited(10);
        bindings.bindings = Some(vec!["s".to_string()]);
        assert!(!opt.is_applicable(&bindings));

        let mut ordered = limited(10);
        let mut order = OrderByShape::new(vec![OrderCondition::asc(Expression::var("s"))]);
        ordered.order_by = Some(order.clone());
        assert!(!opt.is_applicable(&ordered));
        order.optimizable = true;
        ordered.order_by = Some(order);
        assert!(opt.is_applicable(&ordered));
    }
}
