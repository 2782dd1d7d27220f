//! ASK short-circuiting.
//!
//! An ASK query only needs one solution, so BGPs become [`Algebra::AskBgp`]
//! and unions become [`Algebra::AskUnion`]. FILTER and MINUS are not
//! entered: both may reject the first solution found below them.

use super::{is_disjoint, AlgebraOptimizer};
use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use crate::query::{QueryShape, QueryType, UpdateCommand};
use std::sync::Arc;

/// Rewrites ASK query algebra to stop at the first solution
#[derive(Debug, Clone, Copy, Default)]
pub struct AskBgpOptimizer;

impl AskBgpOptimizer {
    pub fn new() -> Self {
        AskBgpOptimizer
    }
}

impl AlgebraOptimizer for AskBgpOptimizer {
    fn name(&self) -> &str {
        "ask_bgp"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        Ok(match algebra {
            Algebra::Bgp { patterns } if !patterns.is_empty() => {
                Algebra::try_ask_bgp(patterns.clone())?
            }
            // The optional side cannot change whether the left side matches.
            // Its variables disappear, which is harmless for ASK.
            Algebra::LeftJoin { lhs, .. } => self.optimize(lhs),
            Algebra::Union { lhs, rhs } => Algebra::AskUnion {
                lhs: Arc::new(self.optimize(lhs)),
                rhs: Arc::new(self.optimize(rhs)),
            },
            Algebra::Join { lhs, rhs } => {
                if is_disjoint(lhs, rhs) {
                    // One match on each side answers the query
                    algebra.transform(self)
                } else {
                    // Every left solution may need checking against the right
                    algebra.transform_rhs(self)
                }
            }
            Algebra::Graph { .. }
            | Algebra::Extend { .. }
            | Algebra::Select { .. }
            | Algebra::Distinct { .. }
            | Algebra::Reduced { .. }
            | Algebra::OrderBy { .. } => algebra.transform(self),
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
            | Algebra::Slice { .. } => algebra.clone(),
        })
    }

    fn is_applicable(&self, query: &QueryShape) -> bool {
        query.query_type == QueryType::Ask
    }

    fn is_applicable_to_update(&self, _command: &UpdateCommand) -> bool {
        false
    }
}
