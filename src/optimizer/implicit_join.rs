//! Implicit join elimination.
//!
//! `FILTER(?x = ?y)` over a pattern that binds both variables is really a
//! join on `?x`. Strategies, in order:
//!
//! 1. Substitute `?y` with `?x` below the filter and re-expose `?y` with
//!    `Extend(..., ?x AS ?y)`
//! 2. Split the filtered pattern into two variable-disjoint halves the
//!    filter straddles and evaluate it as a [`Algebra::FilteredProduct`]
//! 3. Leave the filter in place and recurse
//!
//! Strategy 2 applies to any filter, not only equalities.
//!
//! Filters the reordering pass already placed inside a BGP are lifted back
//! out when one of the first two strategies applies to them.

use super::{AlgebraOptimizer, VariableSubstitutionTransformer};
use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use crate::expression::Expression;
use crate::pattern::TriplePattern;
use crate::term::PatternItem;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Rewrites variable-equality and cross-product filters
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplicitJoinOptimizer {
    unsafe_optimization: bool,
}

impl ImplicitJoinOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also substitute object positions under `=`.
    ///
    /// Value equality is weaker than term identity: `"1"^^xsd:integer`
    /// equals `"01"^^xsd:integer`, so this can change results.
    pub fn with_unsafe_optimization(unsafe_optimization: bool) -> Self {
        ImplicitJoinOptimizer {
            unsafe_optimization,
        }
    }

    pub fn unsafe_optimization(&self) -> bool {
        self.unsafe_optimization
    }

    fn rewrite_filter(&self, inner: &Algebra, expression: &Expression) -> Option<Algebra> {
        if let Some((lhs, rhs, same_term)) = expression.as_variable_equality() {
            let inner_vars = inner.variables();
            let mut one_sided = BTreeSet::new();
            union_one_sided_variables(inner, &mut one_sided);
            if inner_vars.contains(lhs)
                && inner_vars.contains(rhs)
                && !one_sided.contains(lhs)
                && !one_sided.contains(rhs)
            {
                let mut transformer =
                    VariableSubstitutionTransformer::new(rhs, PatternItem::variable(lhs));
                if same_term || self.unsafe_optimization {
                    transformer = transformer.with_object_replacement(true);
                }
                match transformer.transform(inner) {
                    Ok(rewritten) => {
                        tracing::debug!(find = rhs, replace = lhs, "implicit_join_substituted");
                        return Some(Algebra::extend(
                            self.optimize(&rewritten),
                            Expression::var(lhs),
                            rhs,
                        ));
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "implicit_join_substitution_rejected");
                    }
                }
            }
        }
        self.filtered_product(inner, expression)
    }

    fn filtered_product(&self, inner: &Algebra, expression: &Expression) -> Option<Algebra> {
        let filter_vars = expression.variables();
        if filter_vars.is_empty() {
            return None;
        }
        match inner {
            Algebra::Bgp { patterns } => {
                if patterns
                    .iter()
                    .any(|p| !p.is_match() || p.has_blank_variables())
                {
                    return None;
                }
                let split = disjoint_split(patterns, &filter_vars)?;
                let (lhs, rhs) = patterns.split_at(split);
                tracing::debug!(split, patterns = patterns.len(), "filtered_product_split");
                Some(Algebra::FilteredProduct {
                    lhs: Arc::new(Algebra::bgp(lhs.to_vec())),
                    rhs: Arc::new(Algebra::bgp(rhs.to_vec())),
                    expression: expression.clone(),
                })
            }
            Algebra::Join { lhs, rhs } if lhs.variables().is_disjoint(&rhs.variables()) => {
                tracing::debug!("filtered_product_join");
                Some(Algebra::FilteredProduct {
                    lhs: Arc::new(self.optimize(lhs)),
                    rhs: Arc::new(self.optimize(rhs)),
                    expression: expression.clone(),
                })
            }
            _ => None,
        }
    }

    /// Try the filter strategies on a FILTER pseudo-pattern inside a BGP.
    ///
    /// A placed filter whose variables are all bound by the patterns before
    /// it may equivalently filter the whole BGP.
    fn lift_placed_filter(&self, patterns: &[TriplePattern]) -> Option<Algebra> {
        let mut seen = BTreeSet::new();
        for (i, pattern) in patterns.iter().enumerate() {
            if let TriplePattern::Filter(expression) = pattern {
                if expression.variables().is_subset(&seen) {
                    let rest: Vec<TriplePattern> = patterns
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, p)| p.clone())
                        .collect();
                    if let Some(rewritten) = self.rewrite_filter(&Algebra::bgp(rest), expression)
                    {
                        return Some(rewritten);
                    }
                }
            }
            seen.extend(pattern.variables());
        }
        None
    }
}

/// Variables some union below `algebra` binds in one branch only.
///
/// Such a variable may be unbound in a solution, so substituting it would
/// bind it in rows the filter rejects.
fn union_one_sided_variables(algebra: &Algebra, out: &mut BTreeSet<String>) {
    match algebra {
        Algebra::Union { lhs, rhs }
        | Algebra::AskUnion { lhs, rhs }
        | Algebra::ParallelUnion { lhs, rhs }
        | Algebra::LazyUnion { lhs, rhs, .. } => {
            let (lhs_vars, rhs_vars) = (lhs.variables(), rhs.variables());
            out.extend(lhs_vars.symmetric_difference(&rhs_vars).cloned());
        }
        _ => {}
    }
    for child in algebra.children() {
        union_one_sided_variables(child, out);
    }
}

/// First index splitting `patterns` into variable-disjoint halves that
/// each read at least one filter variable and together bind all of them
fn disjoint_split(patterns: &[TriplePattern], filter_vars: &BTreeSet<String>) -> Option<usize> {
    let pattern_vars: Vec<BTreeSet<String>> =
        patterns.iter().map(TriplePattern::variables).collect();

    let mut suffixes = vec![BTreeSet::new(); patterns.len() + 1];
    for i in (0..patterns.len()).rev() {
        suffixes[i] = suffixes[i + 1].union(&pattern_vars[i]).cloned().collect();
    }

    let mut prefix = BTreeSet::new();
    for split in 1..patterns.len() {
        prefix.extend(pattern_vars[split - 1].iter().cloned());
        let suffix = &suffixes[split];
        if prefix.is_disjoint(suffix)
            && filter_vars.iter().any(|v| prefix.contains(v))
            && filter_vars.iter().any(|v| suffix.contains(v))
            && filter_vars
                .iter()
                .all(|v| prefix.contains(v) || suffix.contains(v))
        {
            return Some(split);
        }
    }
    None
}

impl AlgebraOptimizer for ImplicitJoinOptimizer {
    fn name(&self) -> &str {
        "implicit_join"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        Ok(match algebra {
            Algebra::Filter { inner, expression } => self
                .rewrite_filter(inner, expression)
                .unwrap_or_else(|| algebra.transform(self)),
            Algebra::Bgp { .. } | Algebra::LazyBgp { .. } | Algebra::AskBgp { .. } => algebra
                .patterns()
                .and_then(|patterns| self.lift_placed_filter(patterns))
                .unwrap_or_else(|| algebra.clone()),
            _ => algebra.transform(self),
        })
    }
}
