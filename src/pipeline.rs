//! # Optimizer Pipeline
//!
//! The ordered set of algebra passes plus the query optimizer that
//! reorders patterns before conversion. A pipeline is an explicit value:
//! hosts build one at start-up and hand it to [`Query::to_algebra`].
//!
//! ```text
//! GraphPattern --query optimizer--> GraphPattern --to_algebra--> Algebra
//!     --local passes--> --pipeline passes (if applicable)--> Algebra
//! ```
//!
//! [`Query::to_algebra`]: crate::query::Query::to_algebra

use crate::algebra::Algebra;
use crate::config::Config;
use crate::optimizer::{
    AlgebraOptimizer, AskBgpOptimizer, IdentityFilterOptimizer, ImplicitJoinOptimizer,
    LazyBgpOptimizer, OrderByDistinctOptimizer, ParallelEvaluationOptimizer,
    StrictAlgebraOptimizer,
};
use crate::pipeline_trace::PipelineTrace;
use crate::query::{QueryShape, UpdateCommand};
use crate::reorder::{DefaultOptimizer, QueryOptimizer, WeightedOptimizer};
use crate::statistics::Weightings;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Ordered algebra passes and the pattern reordering strategy
#[derive(Clone)]
pub struct OptimizerPipeline {
    query_optimizer: Arc<dyn QueryOptimizer>,
    optimizers: Vec<Arc<dyn AlgebraOptimizer>>,
    query_optimization: bool,
    algebra_optimization: bool,
}

impl fmt::Debug for OptimizerPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.optimizers.iter().map(|o| o.name()).collect();
        f.debug_struct("OptimizerPipeline")
            .field("query_optimizer", &self.query_optimizer.name())
            .field("optimizers", &names)
            .field("query_optimization", &self.query_optimization)
            .field("algebra_optimization", &self.algebra_optimization)
            .finish()
    }
}

impl Default for OptimizerPipeline {
    fn default() -> Self {
        OptimizerPipeline {
            query_optimizer: Arc::new(DefaultOptimizer::new()),
            optimizers: default_optimizers(),
            query_optimization: true,
            algebra_optimization: true,
        }
    }
}

/// ASK short-circuiting followed by LIMIT-driven lazy evaluation
pub fn default_optimizers() -> Vec<Arc<dyn AlgebraOptimizer>> {
    vec![
        Arc::new(AskBgpOptimizer::new()),
        Arc::new(LazyBgpOptimizer::new()),
    ]
}

impl OptimizerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline from configuration.
    ///
    /// `weightings` selects the statistics-driven comparer when
    /// `weighting.use_statistics` is set; without them the structural
    /// comparer is used.
    pub fn from_config(config: &Config, weightings: Option<Arc<Weightings>>) -> Self {
        let opts = &config.optimization;
        let query_optimizer: Arc<dyn QueryOptimizer> = match weightings {
            Some(weightings) if config.weighting.use_statistics => Arc::new(
                WeightedOptimizer::new(weightings).with_reordering(opts.reorder_patterns),
            ),
            _ => Arc::new(DefaultOptimizer::with_reordering(opts.reorder_patterns)),
        };

        // Normalization and implicit joins see plain BGPs, before the ask
        // and lazy passes wrap them
        let mut optimizers: Vec<Arc<dyn AlgebraOptimizer>> = Vec::new();
        if opts.strict_algebra {
            optimizers.push(Arc::new(StrictAlgebraOptimizer::new()));
        }
        if opts.implicit_joins {
            optimizers.push(Arc::new(ImplicitJoinOptimizer::with_unsafe_optimization(
                opts.unsafe_optimization,
            )));
        }
        optimizers.extend(default_optimizers());
        if opts.order_by_distinct {
            optimizers.push(Arc::new(OrderByDistinctOptimizer::new()));
        }
        if opts.identity_filters {
            optimizers.push(Arc::new(IdentityFilterOptimizer::new()));
        }
        if opts.parallel_evaluation {
            optimizers.push(Arc::new(ParallelEvaluationOptimizer::new()));
        }

        let pipeline = OptimizerPipeline {
            query_optimizer,
            optimizers,
            query_optimization: opts.query_optimization,
            algebra_optimization: opts.algebra_optimization,
        };
        tracing::debug!(pipeline = ?pipeline, "pipeline_configured");
        pipeline
    }

    /// Append a pass; it runs after the existing ones
    pub fn add_optimizer(&mut self, optimizer: Arc<dyn AlgebraOptimizer>) {
        self.optimizers.push(optimizer);
    }

    /// Remove every pass called `name`. Returns whether any was removed.
    pub fn remove_optimizer(&mut self, name: &str) -> bool {
        let before = self.optimizers.len();
        self.optimizers.retain(|o| o.name() != name);
        self.optimizers.len() != before
    }

    /// Restore the default passes and query optimizer
    pub fn reset_to_defaults(&mut self) {
        *self = Self::default();
    }

    pub fn query_optimizer(&self) -> &Arc<dyn QueryOptimizer> {
        &self.query_optimizer
    }

    pub fn set_query_optimizer(&mut self, optimizer: Arc<dyn QueryOptimizer>) {
        self.query_optimizer = optimizer;
    }

    pub fn optimizers(&self) -> &[Arc<dyn AlgebraOptimizer>] {
        &self.optimizers
    }

    pub fn query_optimization(&self) -> bool {
        self.query_optimization
    }

    pub fn set_query_optimization(&mut self, enable: bool) {
        self.query_optimization = enable;
    }

    pub fn algebra_optimization(&self) -> bool {
        self.algebra_optimization
    }

    pub fn set_algebra_optimization(&mut self, enable: bool) {
        self.algebra_optimization = enable;
    }

    /// Passes that apply to `shape`: the local ones first, then the pipeline's
    fn applicable<'a>(
        &'a self,
        shape: &QueryShape,
        local: &'a [Arc<dyn AlgebraOptimizer>],
    ) -> Vec<&'a Arc<dyn AlgebraOptimizer>> {
        if !self.algebra_optimization {
            return Vec::new();
        }
        local
            .iter()
            .chain(self.optimizers.iter())
            .filter(|o| o.is_applicable(shape))
            .collect()
    }

    /// Apply every applicable pass to the algebra of a query
    pub fn optimize(
        &self,
        algebra: Algebra,
        shape: &QueryShape,
        local: &[Arc<dyn AlgebraOptimizer>],
    ) -> Algebra {
        self.applicable(shape, local)
            .into_iter()
            .fold(algebra, |algebra, optimizer| {
                tracing::debug!(optimizer = optimizer.name(), "optimizer_applied");
                optimizer.optimize(&algebra)
            })
    }

    /// Like [`OptimizerPipeline::optimize`], recording each pass
    pub fn optimize_traced(
        &self,
        algebra: Algebra,
        shape: &QueryShape,
        local: &[Arc<dyn AlgebraOptimizer>],
    ) -> PipelineTrace {
        let mut trace = PipelineTrace::new(algebra);
        for optimizer in self.applicable(shape, local) {
            let output = optimizer.optimize(trace.output());
            trace.record(optimizer.name(), output);
        }
        trace
    }

    /// Apply the passes that accept `command` to the algebra of an update
    pub fn optimize_update(&self, algebra: Algebra, command: &UpdateCommand) -> Algebra {
        if !self.algebra_optimization || !command.has_pattern() {
            return algebra;
        }
        self.optimizers
            .iter()
            .filter(|o| o.is_applicable_to_update(command))
            .fold(algebra, |algebra, optimizer| {
                tracing::debug!(
                    optimizer = optimizer.name(),
                    command = ?command.command_type,
                    "optimizer_applied"
                );
                optimizer.optimize(&algebra)
            })
    }
}

/// A pipeline shared between threads and replaced at runtime.
///
/// Queries take a [`snapshot`](SharedPipeline::snapshot) so a concurrent
/// update never changes the passes of a query mid-conversion.
#[derive(Debug, Clone, Default)]
pub struct SharedPipeline {
    inner: Arc<RwLock<OptimizerPipeline>>,
}

impl SharedPipeline {
    pub fn new(pipeline: OptimizerPipeline) -> Self {
        SharedPipeline {
            inner: Arc::new(RwLock::new(pipeline)),
        }
    }

    pub fn snapshot(&self) -> OptimizerPipeline {
        self.inner.read().clone()
    }

    /// Modify the shared pipeline in place
    pub fn update<R>(&self, f: impl FnOnce(&mut OptimizerPipeline) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Swap in a new pipeline, returning the old one
    pub fn replace(&self, pipeline: OptimizerPipeline) -> OptimizerPipeline {
        std::mem::replace(&mut *self.inner.write(), pipeline)
    }
}
