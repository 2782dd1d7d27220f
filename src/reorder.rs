//! # Triple Pattern Reordering
//!
//! Query-level optimization of one graph pattern scope, run before the
//! scope is converted to algebra.
//!
//! 1. Pull FILTER/BIND/LET pseudo-patterns back into the unplaced lists
//! 2. Sort the remaining patterns with a [`PatternComparer`]
//! 3. Relocate patterns so each one shares a variable with what came
//!    before it (reordering may be switched off)
//! 4. Place assignments, then filters, right after the earliest point where
//!    every variable they read is bound
//! 5. Recurse into child scopes with the variables bound so far
//!
//! ```text
//! GraphPattern -> [sort] -> [relocate] -> [place BIND] -> [place FILTER] -> children
//! ```
//!
//! The output pattern list is always a permutation of the input's ordinary
//! patterns plus the placed pseudo-patterns.

use crate::pattern::TriplePattern;
use crate::query::{GraphPattern, GraphPatternKind};
use crate::statistics::Weightings;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Ranks triple patterns; lower sorts first.
///
/// Implementations must be total orders, since the result feeds a sort.
pub trait PatternComparer: Send + Sync {
    fn compare(&self, a: &TriplePattern, b: &TriplePattern) -> Ordering;
}

/// More bound positions first, then by bound position, then fewer
/// distinct variables. Non-match patterns sort after all matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralComparer;

impl StructuralComparer {
    fn key(pattern: &TriplePattern) -> (u8, u8, usize) {
        let class = match pattern {
            TriplePattern::Match(_) => 0,
            TriplePattern::PropertyFunction(_) => 1,
            TriplePattern::PropertyPath(_) => 2,
            TriplePattern::SubQuery(_) => 3,
            TriplePattern::Filter(_) | TriplePattern::Bind(_) | TriplePattern::Let(_) => 4,
        };
        let rank = pattern.index_type().map_or(u8::MAX, |t| t.rank());
        (class, rank, pattern.variables().len())
    }
}

impl PatternComparer for StructuralComparer {
    fn compare(&self, a: &TriplePattern, b: &TriplePattern) -> Ordering {
        Self::key(a).cmp(&Self::key(b))
    }
}

/// Orders match patterns by estimated selectivity (product of the
/// positional weights), falling back to [`StructuralComparer`] on ties
#[derive(Debug, Clone)]
pub struct WeightingComparer {
    weightings: Arc<Weightings>,
}

impl WeightingComparer {
    pub fn new(weightings: Arc<Weightings>) -> Self {
        WeightingComparer { weightings }
    }

    pub fn weightings(&self) -> &Weightings {
        &self.weightings
    }
}

impl PatternComparer for WeightingComparer {
    fn compare(&self, a: &TriplePattern, b: &TriplePattern) -> Ordering {
        match (a, b) {
            (TriplePattern::Match(x), TriplePattern::Match(y)) => self
                .weightings
                .selectivity(x)
                .total_cmp(&self.weightings.selectivity(y))
                .then_with(|| StructuralComparer.compare(a, b)),
            _ => StructuralComparer.compare(a, b),
        }
    }
}

/// Treats all patterns as equal, so the sort keeps the written order
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReorderComparer;

impl PatternComparer for NoReorderComparer {
    fn compare(&self, _a: &TriplePattern, _b: &TriplePattern) -> Ordering {
        Ordering::Equal
    }
}

/// Query-level optimizer over graph pattern scopes
pub trait QueryOptimizer: Send + Sync {
    fn name(&self) -> &str;

    /// Optimize `pattern`, given the variables already bound by
    /// enclosing scopes and earlier siblings
    fn optimize(&self, pattern: &GraphPattern, bound: &BTreeSet<String>) -> GraphPattern;
}

impl fmt::Debug for dyn QueryOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryOptimizer({})", self.name())
    }
}

/// Structural ordering with connectivity-driven relocation
#[derive(Debug, Clone, Copy)]
pub struct DefaultOptimizer {
    reorder: bool,
}

impl Default for DefaultOptimizer {
    fn default() -> Self {
        DefaultOptimizer { reorder: true }
    }
}

impl DefaultOptimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorting and placement still run when reordering is off
    pub fn with_reordering(reorder: bool) -> Self {
        DefaultOptimizer { reorder }
    }

    pub fn set_reordering(&mut self, enable: bool) {
        self.reorder = enable;
    }

    pub fn reorders(&self) -> bool {
        self.reorder
    }
}

impl QueryOptimizer for DefaultOptimizer {
    fn name(&self) -> &str {
        "default"
    }

    fn optimize(&self, pattern: &GraphPattern, bound: &BTreeSet<String>) -> GraphPattern {
        optimize_scope(self, &StructuralComparer, self.reorder, pattern, bound)
    }
}

/// Selectivity ordering from dataset statistics
#[derive(Debug, Clone)]
pub struct WeightedOptimizer {
    comparer: WeightingComparer,
    reorder: bool,
}

impl WeightedOptimizer {
    pub fn new(weightings: Arc<Weightings>) -> Self {
        WeightedOptimizer {
            comparer: WeightingComparer::new(weightings),
            reorder: true,
        }
    }

    pub fn with_reordering(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    pub fn weightings(&self) -> &Weightings {
        self.comparer.weightings()
    }
}

impl QueryOptimizer for WeightedOptimizer {
    fn name(&self) -> &str {
        "weighted"
    }

    fn optimize(&self, pattern: &GraphPattern, bound: &BTreeSet<String>) -> GraphPattern {
        optimize_scope(self, &self.comparer, self.reorder, pattern, bound)
    }
}

/// Keeps the written pattern order but still places filters and assignments
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReorderOptimizer;

impl QueryOptimizer for NoReorderOptimizer {
    fn name(&self) -> &str {
        "no_reorder"
    }

    fn optimize(&self, pattern: &GraphPattern, bound: &BTreeSet<String>) -> GraphPattern {
        optimize_scope(self, &NoReorderComparer, false, pattern, bound)
    }
}

/// Shared scope algorithm; children are optimized through `optimizer` so
/// custom optimizers see every scope.
pub fn optimize_scope<Q: QueryOptimizer + ?Sized>(
    optimizer: &Q,
    comparer: &dyn PatternComparer,
    reorder: bool,
    pattern: &GraphPattern,
    bound: &BTreeSet<String>,
) -> GraphPattern {
    let mut scope = pattern.clone();

    // Placed pseudo-patterns are placed again from scratch
    let mut patterns = Vec::with_capacity(scope.triple_patterns.len());
    for p in std::mem::take(&mut scope.triple_patterns) {
        match p {
            TriplePattern::Filter(expression) => scope.unplaced_filters.push(expression),
            TriplePattern::Bind(assignment) | TriplePattern::Let(assignment) => {
                scope.unplaced_assignments.push(assignment);
            }
            other => patterns.push(other),
        }
    }

    let our_vars: BTreeSet<String> = patterns.iter().flat_map(TriplePattern::variables).collect();

    patterns.sort_by(|a, b| comparer.compare(a, b));

    if reorder && patterns.len() > 1 {
        if bound.is_empty() {
            let seen = patterns[0].variables();
            relocate_connected(&mut patterns, 1, seen);
        } else {
            relocate_nested(&mut patterns, bound);
        }
    }

    let has_patterns = !patterns.is_empty();

    let assignments = std::mem::take(&mut scope.unplaced_assignments);
    scope.unplaced_assignments = place_all(&mut patterns, assignments, |a| {
        (a.expression.variables(), TriplePattern::Bind(a.clone()))
    });

    if has_patterns {
        let filters = std::mem::take(&mut scope.unplaced_filters);
        scope.unplaced_filters = place_all(&mut patterns, filters, |f| {
            (f.variables(), TriplePattern::Filter(f.clone()))
        });
    }

    scope.triple_patterns = patterns;

    let mut available: BTreeSet<String> = bound.union(&our_vars).cloned().collect();
    let thread_siblings = scope.kind != GraphPatternKind::Union;
    let children = std::mem::take(&mut scope.children);
    scope.children = children
        .iter()
        .map(|child| {
            let optimized = optimizer.optimize(child, &available);
            if thread_siblings && child.kind != GraphPatternKind::Minus {
                available.extend(child.variables());
            }
            optimized
        })
        .collect();

    scope.optimized = true;
    tracing::trace!(
        optimizer = optimizer.name(),
        patterns = scope.triple_patterns.len(),
        unplaced_filters = scope.unplaced_filters.len(),
        unplaced_assignments = scope.unplaced_assignments.len(),
        "scope_optimized"
    );
    scope
}

/// Scan from `start`; whenever the next pattern shares nothing with the
/// variables seen so far, pull forward the first later pattern that does.
fn relocate_connected(patterns: &mut [TriplePattern], start: usize, mut seen: BTreeSet<String>) {
    for i in start..patterns.len() {
        let vars = patterns[i].variables();
        if !seen.is_empty() && !vars.is_empty() && seen.is_disjoint(&vars) {
            if let Some(offset) = patterns[i + 1..]
                .iter()
                .position(|p| !p.variables().is_disjoint(&seen))
            {
                let from = i + 1 + offset;
                patterns[i..=from].rotate_right(1);
                tracing::trace!(from, to = i, "pattern_relocated");
            }
        }
        seen.extend(patterns[i].variables());
    }
}

fn relocate_nested(patterns: &mut [TriplePattern], bound: &BTreeSet<String>) {
    if patterns[0].variables().is_disjoint(bound) {
        if let Some(offset) = patterns[1..]
            .iter()
            .position(|p| !p.variables().is_disjoint(bound))
        {
            let from = 1 + offset;
            patterns[..=from].rotate_right(1);
            tracing::trace!(from, to = 0, "pattern_relocated");
        }
    }
    if patterns.len() > 2 {
        let seen: BTreeSet<String> = bound.union(&patterns[0].variables()).cloned().collect();
        relocate_connected(patterns, 1, seen);
    }
}

/// Insert every item that can be placed, iterating until nothing changes.
/// Returns the items that could not be placed, in their original order.
fn place_all<T>(
    patterns: &mut Vec<TriplePattern>,
    items: Vec<T>,
    to_pattern: impl Fn(&T) -> (BTreeSet<String>, TriplePattern),
) -> Vec<T> {
    let mut remaining = items;
    loop {
        let before = remaining.len();
        let mut unplaced = Vec::with_capacity(remaining.len());
        for item in remaining {
            let (required, pattern) = to_pattern(&item);
            match insertion_point(patterns, &required) {
                Some(index) => {
                    tracing::trace!(pattern = %pattern, index, "pseudo_pattern_placed");
                    patterns.insert(index, pattern);
                }
                None => unplaced.push(item),
            }
        }
        remaining = unplaced;
        if remaining.is_empty() || remaining.len() == before {
            return remaining;
        }
    }
}

/// Earliest index after which every required variable is bound, moved past
/// pseudo-patterns already sitting there so placement order is kept
fn insertion_point(patterns: &[TriplePattern], required: &BTreeSet<String>) -> Option<usize> {
    let mut index = 0;
    if !required.is_empty() {
        let mut seen = BTreeSet::new();
        index = patterns.iter().enumerate().find_map(|(i, p)| {
            seen.extend(p.variables());
            required.is_subset(&seen).then_some(i + 1)
        })?;
    }
    while patterns
        .get(index)
        .is_some_and(TriplePattern::is_filter_or_assignment)
    {
        index += 1;
    }
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{BinaryOperator, Expression};
    use crate::pattern::Assignment;
    use crate::term::PatternItem;
    use oxrdf::Literal;

    fn var(name: &str) -> PatternItem {
        PatternItem::variable(name)
    }

    fn iri(suffix: &str) -> PatternItem {
        PatternItem::iri(&format!("http://example.org/{suffix}"))
    }

    fn rendered(gp: &GraphPattern) -> Vec<String> {
        gp.triple_patterns.iter().map(ToString::to_string).collect()
    }

    fn gt(name: &str, value: i64) -> Expression {
        Expression::binary(
            BinaryOperator::Greater,
            Expression::var(name),
            Expression::constant(Literal::from(value)),
        )
    }

    #[test]
    fn test_structural_sort_prefers_bound_positions() {
        let gp = GraphPattern::group()
            .with_triple(var("s"), var("p"), var("o"))
            .with_triple(var("s"), iri("name"), var("n"))
            .with_triple(iri("alice"), iri("knows"), var("s"));
        let out = DefaultOptimizer::new().optimize(&gp, &BTreeSet::new());
        assert_eq!(
            rendered(&out)[0],
            "<http://example.org/alice> <http://example.org/knows> ?s"
        );
        assert!(out.optimized);
    }

    #[test]
    fn test_disconnected_pattern_moved_back() {
        // After sorting: (?a p ?b) (?c p ?d) (?b p ?c)
        // Verify against a reference engine's plan: the first later pattern
        // sharing a variable is pulled forward however far back it sits.
        let gp = GraphPattern::group()
            .with_triple(var("a"), iri("p"), var("b"))
            .with_triple(var("c"), iri("p"), var("d"))
            .with_triple(var("b"), iri("p"), var("c"));
        let out = DefaultOptimizer::new().optimize(&gp, &BTreeSet::new());
        assert_eq!(
            rendered(&out),
            vec![
                "?a <http://example.org/p> ?b",
                "?b <http://example.org/p> ?c",
                "?c <http://example.org/p> ?d",
            ]
        );
    }

    #[test]
    fn test_reordering_disabled_keeps_sorted_order() {
        let gp = GraphPattern::group()
            .with_triple(var("a"), iri("p"), var("b"))
            .with_triple(var("c"), iri("p"), var("d"))
            .with_triple(var("b"), iri("p"), var("c"));
        let out = DefaultOptimizer::with_reordering(false).optimize(&gp, &BTreeSet::new());
        assert_eq!(rendered(&out)[1], "?c <http://example.org/p> ?d");
    }

    #[test]
    fn test_nested_scope_starts_with_bound_variable() {
        let gp = GraphPattern::group()
            .with_triple(var("x"), iri("p"), var("y"))
            .with_triple(var("s"), iri("q"), var("x"));
        let bound: BTreeSet<String> = ["s".to_string()].into();
        let out = DefaultOptimizer::new().optimize(&gp, &bound);
        assert_eq!(rendered(&out)[0], "?s <http://example.org/q> ?x");
    }

    #[test]
    fn test_nested_scope_stays_connected_after_relocation() {
        let gp = GraphPattern::group()
            .with_triple(var("a"), iri("p"), var("b"))
            .with_triple(var("c"), iri("p"), var("d"))
            .with_triple(var("s"), iri("p"), var("c"));
        let bound: BTreeSet<String> = ["s".to_string()].into();
        let out = DefaultOptimizer::new().optimize(&gp, &bound);
        assert_eq!(
            rendered(&out),
            vec![
                "?s <http://example.org/p> ?c",
                "?c <http://example.org/p> ?d",
                "?a <http://example.org/p> ?b",
            ]
        );
    }

    #[test]
    fn test_filter_placed_after_its_variables() {
        let gp = GraphPattern::group()
            .with_triple(var("s"), iri("p"), var("o"))
            .with_triple(var("s"), iri("q"), var("z"))
            .with_filter(gt("z", 5));
        let out = NoReorderOptimizer.optimize(&gp, &BTreeSet::new());
        assert_eq!(out.triple_patterns.len(), 3);
        assert!(matches!(out.triple_patterns[2], TriplePattern::Filter(_)));
        assert!(out.unplaced_filters.is_empty());
    }

    #[test]
    fn test_filter_with_missing_variable_stays_unplaced() {
        let gp = GraphPattern::group()
            .with_triple(var("s"), iri("p"), var("o"))
            .with_filter(gt("elsewhere", 1));
        let out = DefaultOptimizer::new().optimize(&gp, &BTreeSet::new());
        assert_eq!(out.unplaced_filters.len(), 1);
        assert_eq!(out.triple_patterns.len(), 1);
    }

    #[test]
    fn test_filters_not_placed_without_patterns() {
        let gp = GraphPattern::group()
            .with_child(GraphPattern::group().with_triple(var("s"), iri("p"), var("o")))
            .with_filter(Expression::Bound("o".to_string()));
        let out = DefaultOptimizer::new().optimize(&gp, &BTreeSet::new());
        assert!(out.triple_patterns.is_empty());
        assert_eq!(out.unplaced_filters.len(), 1);
    }

    #[test]
    fn test_assignments_reach_fixed_point() {
        // ?d needs ?c, which only becomes available once its BIND is placed
        let gp = GraphPattern::group()
            .with_triple(var("a"), iri("p"), var("b"))
            .with_assignment("d", Expression::var("c"))
            .with_assignment("c", Expression::var("a"))
            .with_assignment("k", Expression::constant(Literal::from(1_i64)));
        let out = NoReorderOptimizer.optimize(&gp, &BTreeSet::new());
        assert!(out.unplaced_assignments.is_empty());
        assert_eq!(
            rendered(&out),
            vec![
                "BIND(\"1\"^^<http://www.w3.org/2001/XMLSchema#integer> AS ?k)",
                "?a <http://example.org/p> ?b",
                "BIND(?a AS ?c)",
                "BIND(?c AS ?d)",
            ]
        );
    }

    #[test]
    fn test_placed_pseudo_patterns_are_placed_again() {
        let gp = GraphPattern::group()
            .with_pattern(TriplePattern::Let(Assignment::new("c", Expression::var("a"))))
            .with_triple(var("a"), iri("p"), var("b"));
        let out = NoReorderOptimizer.optimize(&gp, &BTreeSet::new());
        assert_eq!(rendered(&out)[1], "BIND(?a AS ?c)");
    }

    #[test]
    fn test_children_receive_bound_variables() {
        struct Recorder(parking_lot::Mutex<Vec<BTreeSet<String>>>);

        impl QueryOptimizer for Recorder {
            fn name(&self) -> &str {
                "recorder"
            }

            fn optimize(&self, pattern: &GraphPattern, bound: &BTreeSet<String>) -> GraphPattern {
                self.0.lock().push(bound.clone());
                optimize_scope(self, &StructuralComparer, true, pattern, bound)
            }
        }

        let gp = GraphPattern::group()
            .with_triple(var("s"), iri("p"), var("o"))
            .with_child(GraphPattern::optional().with_triple(var("o"), iri("q"), var("x")))
            .with_child(GraphPattern::group().with_triple(var("x"), iri("r"), var("y")));
        let recorder = Recorder(parking_lot::Mutex::new(Vec::new()));
        recorder.optimize(&gp, &BTreeSet::new());

        let seen = recorder.0.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen[0].is_empty());
        assert_eq!(seen[1], ["o".to_string(), "s".to_string()].into());
        assert!(seen[2].contains("x"));
    }

    #[test]
    fn test_weighting_comparer_uses_selectivity() {
        let comparer = WeightingComparer::new(Arc::new(Weightings::new(None)));
        // Bound subject (0.2) beats bound predicate (0.6)
        let a = TriplePattern::triple(iri("s"), var("p"), var("o"));
        let b = TriplePattern::triple(var("s"), iri("p"), var("o"));
        assert_eq!(comparer.compare(&a, &b), Ordering::Less);
        assert_eq!(comparer.compare(&a, &a), Ordering::Equal);
    }
}
