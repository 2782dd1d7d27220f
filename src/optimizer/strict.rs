//! Strict algebra normalization.
//!
//! Turns FILTER/BIND pseudo-patterns inside a BGP back into `Filter` and
//! `Extend` operators, for evaluators that only understand plain BGPs.
//!
//! ```text
//! Bgp(A . B . BIND(e AS ?v) . C . FILTER(f))
//!   -> Filter(Join(Extend(Bgp(A . B), e AS ?v), Bgp(C)), f)
//! ```
//!
//! Lazy and ask BGPs are normalized the same way. Their runs become plain
//! BGPs, since a run below an extracted filter cannot stop early.

use super::AlgebraOptimizer;
use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use crate::pattern::TriplePattern;

#[derive(Debug, Clone, Copy, Default)]
pub struct StrictAlgebraOptimizer;

impl StrictAlgebraOptimizer {
    pub fn new() -> Self {
        StrictAlgebraOptimizer
    }
}

fn to_strict(patterns: &[TriplePattern]) -> Algebra {
    let mut result = Algebra::empty();
    let mut run = Vec::new();
    for pattern in patterns {
        match pattern {
            TriplePattern::Filter(expression) => {
                result = Algebra::join(result, Algebra::bgp(std::mem::take(&mut run)));
                result = Algebra::filter(result, expression.clone());
            }
            TriplePattern::Bind(assignment) | TriplePattern::Let(assignment) => {
                result = Algebra::join(result, Algebra::bgp(std::mem::take(&mut run)));
                result = Algebra::extend(
                    result,
                    assignment.expression.clone(),
                    assignment.variable.clone(),
                );
            }
            other => run.push(other.clone()),
        }
    }
    Algebra::join(result, Algebra::bgp(run))
}

impl AlgebraOptimizer for StrictAlgebraOptimizer {
    fn name(&self) -> &str {
        "strict_algebra"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        if let Some(patterns) = algebra.patterns() {
            if patterns
                .iter()
                .any(TriplePattern::is_filter_or_assignment)
            {
                tracing::debug!(
                    operator = algebra.name(),
                    patterns = patterns.len(),
                    "bgp_made_strict"
                );
                return Ok(to_strict(patterns));
            }
            return Ok(algebra.clone());
        }
        Ok(algebra.transform(self))
    }
}
