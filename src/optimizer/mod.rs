//! # Algebra Optimizers
//!
//! Independent tree-rewriting passes, each a function `Algebra -> Algebra`:
//!
//! - [`AskBgpOptimizer`]: stop at the first solution for ASK queries
//! - [`LazyBgpOptimizer`]: stop once LIMIT + OFFSET solutions exist
//! - [`ImplicitJoinOptimizer`]: `FILTER(?x = ?y)` -> substitution + `Extend`,
//!   or a `FilteredProduct` over a disjoint split
//! - [`VariableSubstitutionTransformer`]: rename a variable throughout a tree
//! - [`PropertyFunctionOptimizer`]: collapse magic-predicate patterns
//! - [`ParallelEvaluationOptimizer`]: mark independent joins/unions parallel
//! - [`StrictAlgebraOptimizer`]: FILTER/BIND pseudo-patterns -> operators
//! - [`IdentityFilterOptimizer`]: `FILTER(?x = <const>)` -> `IdentityFilter`
//! - [`VirtualNodeOptimizer`]: swap constants for store ids
//! - [`OrderByDistinctOptimizer`]: evaluate ORDER BY after DISTINCT/REDUCED
//!
//! ```text
//! Algebra (from GraphPattern::to_algebra) -> [pass 1] -> ... -> [pass n] -> Evaluator
//! ```
//!
//! Every pass is best-effort: [`AlgebraOptimizer::optimize`] returns its
//! input unchanged when [`AlgebraOptimizer::try_optimize`] fails, so a pass
//! can cost performance but never correctness.

pub mod ask;
pub mod identity_filter;
pub mod implicit_join;
pub mod lazy;
pub mod order_by;
pub mod parallel;
pub mod property_function;
pub mod strict;
pub mod substitution;
pub mod virtual_nodes;

pub use ask::AskBgpOptimizer;
pub use identity_filter::IdentityFilterOptimizer;
pub use implicit_join::ImplicitJoinOptimizer;
pub use lazy::LazyBgpOptimizer;
pub use order_by::OrderByDistinctOptimizer;
pub use parallel::ParallelEvaluationOptimizer;
pub use property_function::{
    DefaultPropertyFunctionExtractor, PropertyFunctionExtractor, PropertyFunctionFactory,
    PropertyFunctionMatch, PropertyFunctionOptimizer,
};
pub use strict::StrictAlgebraOptimizer;
pub use substitution::VariableSubstitutionTransformer;
pub use virtual_nodes::{VirtualNodeOptimizer, VirtualNodeProvider};

use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use crate::query::{QueryShape, UpdateCommand};

/// An algebra rewriting pass.
///
/// Implementors provide [`try_optimize`](AlgebraOptimizer::try_optimize);
/// nodes the pass does not handle must fall through to
/// [`Algebra::transform`] so their subtrees are still visited.
pub trait AlgebraOptimizer: Send + Sync {
    /// Stable pass name, used by the pipeline to remove passes
    fn name(&self) -> &str;

    /// Rewrite `algebra`, or report why the rewrite is not possible
    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra>;

    /// Rewrite `algebra`, returning it unchanged if the pass fails
    fn optimize(&self, algebra: &Algebra) -> Algebra {
        match self.try_optimize(algebra) {
            Ok(optimized) => optimized,
            Err(e) if e.is_recoverable() => {
                tracing::debug!(optimizer = self.name(), error = %e, "optimizer_skipped");
                algebra.clone()
            }
            Err(e) => {
                tracing::warn!(optimizer = self.name(), error = %e, "optimizer_failed");
                algebra.clone()
            }
        }
    }

    /// Whether the pipeline should run this pass for a query
    fn is_applicable(&self, _query: &QueryShape) -> bool {
        true
    }

    /// Whether the pipeline should run this pass for an update command
    fn is_applicable_to_update(&self, _command: &UpdateCommand) -> bool {
        true
    }
}

/// True when the two sides cannot share a binding
pub(crate) fn is_disjoint(lhs: &Algebra, rhs: &Algebra) -> bool {
    lhs.variables().is_disjoint(&rhs.variables())
}
