//! ORDER BY after DISTINCT/REDUCED.
//!
//! Sorting fewer rows is cheaper, so when every ordering variable is
//! projected the sort moves above the duplicate elimination:
//!
//! ```text
//! Distinct(Select(OrderBy(x, c), vars)) -> OrderBy(Distinct(Select(x, vars)), c)
//! ```
//!
//! `SELECT *` is left alone, since its projection is not known here.

use super::AlgebraOptimizer;
use crate::algebra::{Algebra, OrderCondition};
use crate::error::OptimizerResult;
use crate::query::{QueryShape, UpdateCommand};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderByDistinctOptimizer;

impl OrderByDistinctOptimizer {
    pub fn new() -> Self {
        OrderByDistinctOptimizer
    }

    /// Rebuild `Select(OrderBy(x, c), vars)` as `OrderBy(wrap(Select(x, vars)), c)`
    fn pull_up(&self, inner: &Algebra, wrap: fn(Algebra) -> Algebra) -> Option<Algebra> {
        let Algebra::Select {
            inner: projected,
            variables: Some(variables),
        } = inner
        else {
            return None;
        };
        let Algebra::OrderBy {
            inner: ordered,
            conditions,
        } = projected.as_ref()
        else {
            return None;
        };

        let projection: BTreeSet<&str> = variables.iter().map(String::as_str).collect();
        let covered = conditions
            .iter()
            .flat_map(|c: &OrderCondition| c.expression.variables())
            .all(|v| projection.contains(v.as_str()));
        if !covered {
            return None;
        }

        let select = Algebra::select(self.optimize(ordered), Some(variables.clone()));
        Some(Algebra::order_by(wrap(select), conditions.clone()))
    }
}

impl AlgebraOptimizer for OrderByDistinctOptimizer {
    fn name(&self) -> &str {
        "order_by_distinct"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        let pulled = match algebra {
            Algebra::Distinct { inner } => self.pull_up(inner, Algebra::distinct),
            Algebra::Reduced { inner } => self.pull_up(inner, Algebra::reduced),
            _ => None,
        };
        Ok(pulled.unwrap_or_else(|| algebra.transform(self)))
    }

    fn is_applicable(&self, query: &QueryShape) -> bool {
        query.distinct || query.reduced
    }

    fn is_applicable_to_update(&self, _command: &UpdateCommand) -> bool {
        false
    }
}
