//! Parallel evaluation hints.
//!
//! Marks joins of variable-disjoint sides and all unions as parallel. The
//! evaluator decides whether to actually run the sides concurrently.

use super::{is_disjoint, AlgebraOptimizer};
use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelEvaluationOptimizer;

impl ParallelEvaluationOptimizer {
    pub fn new() -> Self {
        ParallelEvaluationOptimizer
    }
}

impl AlgebraOptimizer for ParallelEvaluationOptimizer {
    fn name(&self) -> &str {
        "parallel_evaluation"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        Ok(match algebra {
            Algebra::Join { lhs, rhs } if is_disjoint(lhs, rhs) => Algebra::ParallelJoin {
                lhs: Arc::new(self.optimize(lhs)),
                rhs: Arc::new(self.optimize(rhs)),
            },
            // Union branches never see each other's bindings
            Algebra::Union { lhs, rhs } => Algebra::ParallelUnion {
                lhs: Arc::new(self.optimize(lhs)),
                rhs: Arc::new(self.optimize(rhs)),
            },
            _ => algebra.transform(self),
        })
    }
}
