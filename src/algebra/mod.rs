//! # SPARQL Algebra
//!
//! The operator tree every optimization pass consumes and produces.
//!
//! Trees are immutable: children sit behind [`Arc`], and every rewrite
//! returns a new tree that shares the subtrees it did not touch.
//!
//! ```text
//! Terminal:  Bgp, LazyBgp, AskBgp, NullOperator, Service
//! Unary:     Filter, IdentityFilter, Extend, Graph,
//!            Select, Distinct, Reduced, OrderBy, Slice
//! Binary:    Join, LeftJoin, Union, Minus, AskUnion, LazyUnion,
//!            ParallelJoin, ParallelUnion, FilteredProduct
//! ```
//!
//! ## Transform protocol
//!
//! [`Algebra::transform`] rebuilds a node with each child replaced by
//! `optimizer.optimize(child)`. Binary nodes additionally offer
//! [`Algebra::transform_lhs`] and [`Algebra::transform_rhs`], which rewrite
//! only one side. Terminal nodes are fixed points of `transform`.

use crate::error::{OptimizerError, OptimizerResult};
use crate::expression::Expression;
use crate::optimizer::AlgebraOptimizer;
use crate::pattern::TriplePattern;
use crate::term::PatternItem;
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

/// One ORDER BY key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCondition {
    pub expression: Expression,
    pub descending: bool,
}

impl OrderCondition {
    pub fn asc(expression: Expression) -> Self {
        OrderCondition {
            expression,
            descending: false,
        }
    }

    pub fn desc(expression: Expression) -> Self {
        OrderCondition {
            expression,
            descending: true,
        }
    }
}

impl fmt::Display for OrderCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "DESC({})", self.expression)
        } else {
            write!(f, "{}", self.expression)
        }
    }
}

/// Algebra operator tree
#[derive(Debug, Clone, PartialEq)]
pub enum Algebra {
    /// Basic graph pattern
    Bgp { patterns: Vec<TriplePattern> },
    /// BGP that stops once `required_results` solutions exist
    /// (`None` lets the evaluator derive the count from LIMIT/OFFSET)
    LazyBgp {
        patterns: Vec<TriplePattern>,
        required_results: Option<usize>,
    },
    /// BGP that stops at the first solution
    AskBgp { patterns: Vec<TriplePattern> },
    /// Produces no solutions but still reports its variables
    NullOperator { variables: BTreeSet<String> },

    Filter {
        inner: Arc<Algebra>,
        expression: Expression,
    },
    /// `FILTER(?variable = term)` evaluated as a bind-and-check
    IdentityFilter {
        inner: Arc<Algebra>,
        variable: String,
        term: Expression,
    },
    /// BIND
    Extend {
        inner: Arc<Algebra>,
        expression: Expression,
        variable: String,
    },
    Graph {
        inner: Arc<Algebra>,
        graph: PatternItem,
    },
    /// Remote pattern. Passes never rewrite inside it.
    Service {
        inner: Arc<Algebra>,
        endpoint: PatternItem,
        silent: bool,
    },

    Join {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
    },
    LeftJoin {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
        filter: Option<Expression>,
    },
    Union {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
    },
    Minus {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
    },
    /// Union that stops after the first solution
    AskUnion {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
    },
    /// Union that evaluates `rhs` only if `lhs` did not produce enough
    LazyUnion {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
        required_results: Option<usize>,
    },
    /// Join of variable-disjoint sides, safe to evaluate concurrently
    ParallelJoin {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
    },
    ParallelUnion {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
    },
    /// Cross product with `expression` applied to each combined solution
    FilteredProduct {
        lhs: Arc<Algebra>,
        rhs: Arc<Algebra>,
        expression: Expression,
    },

    /// Projection; `None` means `SELECT *`
    Select {
        inner: Arc<Algebra>,
        variables: Option<Vec<String>>,
    },
    Distinct {
        inner: Arc<Algebra>,
    },
    Reduced {
        inner: Arc<Algebra>,
    },
    OrderBy {
        inner: Arc<Algebra>,
        conditions: Vec<OrderCondition>,
    },
    Slice {
        inner: Arc<Algebra>,
        limit: Option<usize>,
        offset: usize,
    },
}

impl Default for Algebra {
    fn default() -> Self {
        Algebra::empty()
    }
}

impl Algebra {
    // Constructors

    /// The empty BGP: one solution with no bindings
    pub fn empty() -> Self {
        Algebra::Bgp {
            patterns: Vec::new(),
        }
    }

    pub fn bgp(patterns: Vec<TriplePattern>) -> Self {
        Algebra::Bgp { patterns }
    }

    /// A lazy BGP. Only match, FILTER and BIND/LET patterns can be
    /// evaluated incrementally.
    pub fn try_lazy_bgp(
        patterns: Vec<TriplePattern>,
        required_results: Option<usize>,
    ) -> OptimizerResult<Self> {
        check_incremental(&patterns, "LazyBgp")?;
        Ok(Algebra::LazyBgp {
            patterns,
            required_results,
        })
    }

    /// An ask BGP, with the same pattern restriction as [`Algebra::try_lazy_bgp`]
    pub fn try_ask_bgp(patterns: Vec<TriplePattern>) -> OptimizerResult<Self> {
        check_incremental(&patterns, "AskBgp")?;
        Ok(Algebra::AskBgp { patterns })
    }

    pub fn filter(inner: Algebra, expression: Expression) -> Self {
        Algebra::Filter {
            inner: Arc::new(inner),
            expression,
        }
    }

    pub fn extend(inner: Algebra, expression: Expression, variable: impl Into<String>) -> Self {
        Algebra::Extend {
            inner: Arc::new(inner),
            expression,
            variable: variable.into(),
        }
    }

    /// Join two patterns, collapsing an empty BGP on either side
    pub fn join(lhs: Algebra, rhs: Algebra) -> Self {
        if lhs.is_empty_bgp() {
            rhs
        } else if rhs.is_empty_bgp() {
            lhs
        } else {
            Algebra::Join {
                lhs: Arc::new(lhs),
                rhs: Arc::new(rhs),
            }
        }
    }

    pub fn left_join(lhs: Algebra, rhs: Algebra, filter: Option<Expression>) -> Self {
        Algebra::LeftJoin {
            lhs: Arc::new(lhs),
            rhs: Arc::new(rhs),
            filter,
        }
    }

    pub fn union(lhs: Algebra, rhs: Algebra) -> Self {
        Algebra::Union {
            lhs: Arc::new(lhs),
            rhs: Arc::new(rhs),
        }
    }

    pub fn minus(lhs: Algebra, rhs: Algebra) -> Self {
        Algebra::Minus {
            lhs: Arc::new(lhs),
            rhs: Arc::new(rhs),
        }
    }

    pub fn graph(inner: Algebra, graph: PatternItem) -> Self {
        Algebra::Graph {
            inner: Arc::new(inner),
            graph,
        }
    }

    pub fn service(inner: Algebra, endpoint: PatternItem, silent: bool) -> Self {
        Algebra::Service {
            inner: Arc::new(inner),
            endpoint,
            silent,
        }
    }

    pub fn select(inner: Algebra, variables: Option<Vec<String>>) -> Self {
        Algebra::Select {
            inner: Arc::new(inner),
            variables,
        }
    }

    pub fn distinct(inner: Algebra) -> Self {
        Algebra::Distinct {
            inner: Arc::new(inner),
        }
    }

    pub fn reduced(inner: Algebra) -> Self {
        Algebra::Reduced {
            inner: Arc::new(inner),
        }
    }

    pub fn order_by(inner: Algebra, conditions: Vec<OrderCondition>) -> Self {
        Algebra::OrderBy {
            inner: Arc::new(inner),
            conditions,
        }
    }

    pub fn slice(inner: Algebra, limit: Option<usize>, offset: usize) -> Self {
        Algebra::Slice {
            inner: Arc::new(inner),
            limit,
            offset,
        }
    }

    // Inspection

    /// Patterns of a BGP-like terminal
    pub fn patterns(&self) -> Option<&[TriplePattern]> {
        match self {
            Algebra::Bgp { patterns }
            | Algebra::LazyBgp { patterns, .. }
            | Algebra::AskBgp { patterns } => Some(patterns),
            _ => None,
        }
    }

    pub fn is_empty_bgp(&self) -> bool {
        matches!(self, Algebra::Bgp { patterns } if patterns.is_empty())
    }

    /// Short operator name, as used in `Display`
    pub fn name(&self) -> &'static str {
        match self {
            Algebra::Bgp { .. } => "Bgp",
            Algebra::LazyBgp { .. } => "LazyBgp",
            Algebra::AskBgp { .. } => "AskBgp",
            Algebra::NullOperator { .. } => "NullOperator",
            Algebra::Filter { .. } => "Filter",
            Algebra::IdentityFilter { .. } => "IdentityFilter",
            Algebra::Extend { .. } => "Extend",
            Algebra::Graph { .. } => "Graph",
            Algebra::Service { .. } => "Service",
            Algebra::Join { .. } => "Join",
            Algebra::LeftJoin { .. } => "LeftJoin",
            Algebra::Union { .. } => "Union",
            Algebra::Minus { .. } => "Minus",
            Algebra::AskUnion { .. } => "AskUnion",
            Algebra::LazyUnion { .. } => "LazyUnion",
            Algebra::ParallelJoin { .. } => "ParallelJoin",
            Algebra::ParallelUnion { .. } => "ParallelUnion",
            Algebra::FilteredProduct { .. } => "FilteredProduct",
            Algebra::Select { .. } => "Select",
            Algebra::Distinct { .. } => "Distinct",
            Algebra::Reduced { .. } => "Reduced",
            Algebra::OrderBy { .. } => "OrderBy",
            Algebra::Slice { .. } => "Slice",
        }
    }

    /// Variables that evaluating this node can bind.
    ///
    /// Every pass must leave this set unchanged.
    pub fn variables(&self) -> BTreeSet<String> {
        match self {
            Algebra::Bgp { patterns }
            | Algebra::LazyBgp { patterns, .. }
            | Algebra::AskBgp { patterns } => {
                patterns.iter().flat_map(TriplePattern::variables).collect()
            }
            Algebra::NullOperator { variables } => variables.clone(),
            Algebra::Filter { inner, .. }
            | Algebra::IdentityFilter { inner, .. }
            | Algebra::Distinct { inner }
            | Algebra::Reduced { inner }
            | Algebra::OrderBy { inner, .. }
            | Algebra::Slice { inner, .. } => inner.variables(),
            Algebra::Extend {
                inner, variable, ..
            } => {
                let mut vars = inner.variables();
                vars.insert(variable.clone());
                vars
            }
            Algebra::Graph { inner, graph: item }
            | Algebra::Service {
                inner,
                endpoint: item,
                ..
            } => {
                let mut vars = inner.variables();
                vars.extend(item.binding_name());
                vars
            }
            Algebra::Join { lhs, rhs }
            | Algebra::LeftJoin { lhs, rhs, .. }
            | Algebra::Union { lhs, rhs }
            | Algebra::AskUnion { lhs, rhs }
            | Algebra::LazyUnion { lhs, rhs, .. }
            | Algebra::ParallelJoin { lhs, rhs }
            | Algebra::ParallelUnion { lhs, rhs }
            | Algebra::FilteredProduct { lhs, rhs, .. } => {
                let mut vars = lhs.variables();
                vars.extend(rhs.variables());
                vars
            }
            Algebra::Minus { lhs, .. } => lhs.variables(),
            Algebra::Select { inner, variables } => match variables {
                Some(vars) => vars.iter().cloned().collect(),
                None => inner.variables(),
            },
        }
    }

    /// Direct children, left to right
    pub fn children(&self) -> Vec<&Arc<Algebra>> {
        match self {
            Algebra::Bgp { .. }
            | Algebra::LazyBgp { .. }
            | Algebra::AskBgp { .. }
            | Algebra::NullOperator { .. } => Vec::new(),
            Algebra::Filter { inner, .. }
            | Algebra::IdentityFilter { inner, .. }
            | Algebra::Extend { inner, .. }
            | Algebra::Graph { inner, .. }
            | Algebra::Service { inner, .. }
            | Algebra::Select { inner, .. }
            | Algebra::Distinct { inner }
            | Algebra::Reduced { inner }
            | Algebra::OrderBy { inner, .. }
            | Algebra::Slice { inner, .. } => vec![inner],
            Algebra::Join { lhs, rhs }
            | Algebra::LeftJoin { lhs, rhs, .. }
            | Algebra::Union { lhs, rhs }
            | Algebra::Minus { lhs, rhs }
            | Algebra::AskUnion { lhs, rhs }
            | Algebra::LazyUnion { lhs, rhs, .. }
            | Algebra::ParallelJoin { lhs, rhs }
            | Algebra::ParallelUnion { lhs, rhs }
            | Algebra::FilteredProduct { lhs, rhs, .. } => vec![lhs, rhs],
        }
    }

    /// Total number of operator nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(|c| c.node_count())
            .sum::<usize>()
    }

    /// Whether any node in the tree has the given operator name
    pub fn contains_operator(&self, name: &str) -> bool {
        self.name() == name
            || self
                .children()
                .into_iter()
                .any(|c| c.contains_operator(name))
    }

    // Transform protocol

    /// Rebuild this node with every child mapped through `f`.
    ///
    /// Terminals (including `Service`, whose pattern is evaluated remotely)
    /// are returned unchanged.
    pub fn try_map_children<E>(
        &self,
        mut f: impl FnMut(&Algebra) -> Result<Algebra, E>,
    ) -> Result<Algebra, E> {
        let mut map = |child: &Arc<Algebra>| f(child.as_ref()).map(Arc::new);
        Ok(match self {
            Algebra::Bgp { .. }
            | Algebra::LazyBgp { .. }
            | Algebra::AskBgp { .. }
            | Algebra::NullOperator { .. }
            | Algebra::Service { .. } => self.clone(),
            Algebra::Filter { inner, expression } => Algebra::Filter {
                inner: map(inner)?,
                expression: expression.clone(),
            },
            Algebra::IdentityFilter {
                inner,
                variable,
                term,
            } => Algebra::IdentityFilter {
                inner: map(inner)?,
                variable: variable.clone(),
                term: term.clone(),
            },
            Algebra::Extend {
                inner,
                expression,
                variable,
            } => Algebra::Extend {
                inner: map(inner)?,
                expression: expression.clone(),
                variable: variable.clone(),
            },
            Algebra::Graph { inner, graph } => Algebra::Graph {
                inner: map(inner)?,
                graph: graph.clone(),
            },
            Algebra::Select { inner, variables } => Algebra::Select {
                inner: map(inner)?,
                variables: variables.clone(),
            },
            Algebra::Distinct { inner } => Algebra::Distinct {
                inner: map(inner)?,
            },
            Algebra::Reduced { inner } => Algebra::Reduced {
                inner: map(inner)?,
            },
            Algebra::OrderBy { inner, conditions } => Algebra::OrderBy {
                inner: map(inner)?,
                conditions: conditions.clone(),
            },
            Algebra::Slice {
                inner,
                limit,
                offset,
            } => Algebra::Slice {
                inner: map(inner)?,
                limit: *limit,
                offset: *offset,
            },
            Algebra::Join { lhs, rhs }
            | Algebra::LeftJoin { lhs, rhs, .. }
            | Algebra::Union { lhs, rhs }
            | Algebra::Minus { lhs, rhs }
            | Algebra::AskUnion { lhs, rhs }
            | Algebra::LazyUnion { lhs, rhs, .. }
            | Algebra::ParallelJoin { lhs, rhs }
            | Algebra::ParallelUnion { lhs, rhs }
            | Algebra::FilteredProduct { lhs, rhs, .. } => {
                let lhs = map(lhs)?;
                let rhs = map(rhs)?;
                self.with_sides(lhs, rhs)
            }
        })
    }

    /// Infallible form of [`Algebra::try_map_children`]
    pub fn map_children(&self, mut f: impl FnMut(&Algebra) -> Algebra) -> Algebra {
        match self.try_map_children(|child| Ok::<_, Infallible>(f(child))) {
            Ok(algebra) => algebra,
            Err(never) => match never {},
        }
    }

    /// Rebuild with every child replaced by `optimizer.optimize(child)`
    pub fn transform<O: AlgebraOptimizer + ?Sized>(&self, optimizer: &O) -> Algebra {
        self.map_children(|child| optimizer.optimize(child))
    }

    /// Rewrite only the left side of a binary node.
    ///
    /// Non-binary nodes fall back to [`Algebra::transform`].
    pub fn transform_lhs<O: AlgebraOptimizer + ?Sized>(&self, optimizer: &O) -> Algebra {
        match self.sides() {
            Some((lhs, rhs)) => self.with_sides(Arc::new(optimizer.optimize(lhs)), rhs.clone()),
            None => self.transform(optimizer),
        }
    }

    /// Rewrite only the right side of a binary node.
    ///
    /// Non-binary nodes fall back to [`Algebra::transform`].
    pub fn transform_rhs<O: AlgebraOptimizer + ?Sized>(&self, optimizer: &O) -> Algebra {
        match self.sides() {
            Some((lhs, rhs)) => self.with_sides(lhs.clone(), Arc::new(optimizer.optimize(rhs))),
            None => self.transform(optimizer),
        }
    }

    /// Both sides of a binary node
    pub fn sides(&self) -> Option<(&Arc<Algebra>, &Arc<Algebra>)> {
        match self {
            Algebra::Join { lhs, rhs }
            | Algebra::LeftJoin { lhs, rhs, .. }
            | Algebra::Union { lhs, rhs }
            | Algebra::Minus { lhs, rhs }
            | Algebra::AskUnion { lhs, rhs }
            | Algebra::LazyUnion { lhs, rhs, .. }
            | Algebra::ParallelJoin { lhs, rhs }
            | Algebra::ParallelUnion { lhs, rhs }
            | Algebra::FilteredProduct { lhs, rhs, .. } => Some((lhs, rhs)),
            _ => None,
        }
    }

    /// Same binary operator over new sides. Non-binary nodes are cloned.
    fn with_sides(&self, lhs: Arc<Algebra>, rhs: Arc<Algebra>) -> Algebra {
        match self {
            Algebra::Join { .. } => Algebra::Join { lhs, rhs },
            Algebra::LeftJoin { filter, .. } => Algebra::LeftJoin {
                lhs,
                rhs,
                filter: filter.clone(),
            },
            Algebra::Union { .. } => Algebra::Union { lhs, rhs },
            Algebra::Minus { .. } => Algebra::Minus { lhs, rhs },
            Algebra::AskUnion { .. } => Algebra::AskUnion { lhs, rhs },
            Algebra::LazyUnion {
                required_results, ..
            } => Algebra::LazyUnion {
                lhs,
                rhs,
                required_results: *required_results,
            },
            Algebra::ParallelJoin { .. } => Algebra::ParallelJoin { lhs, rhs },
            Algebra::ParallelUnion { .. } => Algebra::ParallelUnion { lhs, rhs },
            Algebra::FilteredProduct { expression, .. } => Algebra::FilteredProduct {
                lhs,
                rhs,
                expression: expression.clone(),
            },
            _ => self.clone(),
        }
    }
}

fn check_incremental(patterns: &[TriplePattern], operator: &str) -> OptimizerResult<()> {
    match patterns
        .iter()
        .find(|p| !(p.is_match() || p.is_filter_or_assignment()))
    {
        Some(p) => Err(OptimizerError::InvalidPattern(format!(
            "{operator} cannot evaluate {p}"
        ))),
        None => Ok(()),
    }
}

fn write_patterns(f: &mut fmt::Formatter<'_>, patterns: &[TriplePattern]) -> fmt::Result {
    let parts: Vec<String> = patterns.iter().map(ToString::to_string).collect();
    write!(f, "{}", parts.join(" . "))
}

fn write_variables<'a>(
    f: &mut fmt::Formatter<'_>,
    vars: impl IntoIterator<Item = &'a String>,
) -> fmt::Result {
    let parts: Vec<String> = vars.into_iter().map(|v| format!("?{v}")).collect();
    write!(f, "{}", parts.join(" "))
}

impl fmt::Display for Algebra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name())?;
        match self {
            Algebra::Bgp { patterns } | Algebra::AskBgp { patterns } => {
                write_patterns(f, patterns)?;
            }
            Algebra::LazyBgp {
                patterns,
                required_results,
            } => {
                write_patterns(f, patterns)?;
                if let Some(n) = required_results {
                    write!(f, ", {n}")?;
                }
            }
            Algebra::NullOperator { variables } => write_variables(f, variables)?,
            Algebra::Filter { inner, expression } => write!(f, "{inner}, {expression}")?,
            Algebra::IdentityFilter {
                inner,
                variable,
                term,
            } => write!(f, "{inner}, ?{variable}, {term}")?,
            Algebra::Extend {
                inner,
                expression,
                variable,
            } => write!(f, "{inner}, {expression} AS ?{variable}")?,
            Algebra::Graph { inner, graph } => write!(f, "{graph}, {inner}")?,
            Algebra::Service {
                inner,
                endpoint,
                silent,
            } => {
                let silent = if *silent { "SILENT " } else { "" };
                write!(f, "{silent}{endpoint}, {inner}")?;
            }
            Algebra::LeftJoin { lhs, rhs, filter } => {
                write!(f, "{lhs}, {rhs}")?;
                if let Some(filter) = filter {
                    write!(f, ", {filter}")?;
                }
            }
            Algebra::FilteredProduct {
                lhs,
                rhs,
                expression,
            } => write!(f, "{lhs}, {rhs}, {expression}")?,
            Algebra::Join { lhs, rhs }
            | Algebra::Union { lhs, rhs }
            | Algebra::Minus { lhs, rhs }
            | Algebra::AskUnion { lhs, rhs }
            | Algebra::LazyUnion { lhs, rhs, .. }
            | Algebra::ParallelJoin { lhs, rhs }
            | Algebra::ParallelUnion { lhs, rhs } => write!(f, "{lhs}, {rhs}")?,
            Algebra::Select { inner, variables } => {
                write!(f, "{inner}, ")?;
                match variables {
                    Some(vars) => write_variables(f, vars)?,
                    None => write!(f, "*")?,
                }
            }
            Algebra::Distinct { inner } | Algebra::Reduced { inner } => write!(f, "{inner}")?,
            Algebra::OrderBy { inner, conditions } => {
                let keys: Vec<String> = conditions.iter().map(ToString::to_string).collect();
                write!(f, "{inner}, {}", keys.join(" "))?;
            }
            Algebra::Slice {
                inner,
                limit,
                offset,
            } => {
                write!(f, "{inner}")?;
                if let Some(limit) = limit {
                    write!(f, ", LIMIT {limit}")?;
                }
                if *offset > 0 {
                    write!(f, ", OFFSET {offset}")?;
                }
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::AlgebraOptimizer;
    use crate::pattern::Assignment;
    use crate::pattern::SubQuery;

    fn var(name: &str) -> PatternItem {
        PatternItem::variable(name)
    }

    fn iri(suffix: &str) -> PatternItem {
        PatternItem::iri(&format!("http://example.org/{suffix}"))
    }

    fn bgp(triples: &[(&str, &str, &str)]) -> Algebra {
        Algebra::bgp(
            triples
                .iter()
                .map(|(s, p, o)| TriplePattern::triple(var(s), iri(p), var(o)))
                .collect(),
        )
    }

    /// Renames every Bgp to a LazyBgp without looking at structure
    struct Marker;

    impl AlgebraOptimizer for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
            match algebra {
                Algebra::Bgp { patterns } => Algebra::try_lazy_bgp(patterns.clone(), None),
                other => Ok(other.transform(self)),
            }
        }
    }

    #[test]
    fn test_join_collapses_empty_bgp() {
        let b = bgp(&[("s", "p", "o")]);
        assert_eq!(Algebra::join(Algebra::empty(), b.clone()), b);
        assert_eq!(Algebra::join(b.clone(), Algebra::empty()), b);
        assert!(matches!(
            Algebra::join(b.clone(), b.clone()),
            Algebra::Join { .. }
        ));
    }

    #[test]
    fn test_variables() {
        let left = bgp(&[("s", "p", "o")]);
        let right = bgp(&[("o", "q", "x")]);
        let tree = Algebra::extend(
            Algebra::left_join(left, right, None),
            Expression::var("x"),
            "y",
        );
        let vars: Vec<String> = tree.variables().into_iter().collect();
        assert_eq!(vars, vec!["o", "s", "x", "y"]);
    }

    #[test]
    fn test_minus_exposes_only_left_variables() {
        let tree = Algebra::minus(bgp(&[("s", "p", "o")]), bgp(&[("s", "q", "z")]));
        assert!(!tree.variables().contains("z"));
    }

    #[test]
    fn test_select_projection_variables() {
        let tree = Algebra::select(bgp(&[("s", "p", "o")]), Some(vec!["s".to_string()]));
        assert_eq!(tree.variables().len(), 1);
        let star = Algebra::select(bgp(&[("s", "p", "o")]), None);
        assert_eq!(star.variables().len(), 2);
    }

    #[test]
    fn test_transform_visits_both_sides() {
        let tree = Algebra::union(bgp(&[("s", "p", "o")]), bgp(&[("s", "q", "o")]));
        let out = tree.transform(&Marker);
        let text = out.to_string();
        assert!(text.starts_with("Union("));
        assert_eq!(text.matches("LazyBgp(").count(), 2);
    }

    #[test]
    fn test_transform_rhs_leaves_left_untouched() {
        let left = bgp(&[("s", "p", "o")]);
        let tree = Algebra::join(left.clone(), bgp(&[("o", "q", "x")]));
        let out = tree.transform_rhs(&Marker);
        let Algebra::Join { lhs, rhs } = &out else {
            panic!("expected join, got {out}");
        };
        assert_eq!(**lhs, left);
        assert!(matches!(**rhs, Algebra::LazyBgp { .. }));
    }

    #[test]
    fn test_transform_lhs_leaves_right_untouched() {
        let right = bgp(&[("o", "q", "x")]);
        let tree = Algebra::left_join(bgp(&[("s", "p", "o")]), right.clone(), None);
        let out = tree.transform_lhs(&Marker);
        let Algebra::LeftJoin { lhs, rhs, .. } = &out else {
            panic!("expected left join, got {out}");
        };
        assert!(matches!(**lhs, Algebra::LazyBgp { .. }));
        assert_eq!(**rhs, right);
    }

    #[test]
    fn test_transform_shares_unchanged_subtrees() {
        let shared = Arc::new(Algebra::NullOperator {
            variables: BTreeSet::new(),
        });
        let tree = Algebra::Join {
            lhs: shared.clone(),
            rhs: Arc::new(bgp(&[("s", "p", "o")])),
        };
        let out = tree.transform_rhs(&Marker);
        let Algebra::Join { lhs, .. } = &out else {
            panic!("expected join");
        };
        assert!(Arc::ptr_eq(lhs, &shared));
    }

    #[test]
    fn test_service_is_not_entered() {
        let tree = Algebra::service(bgp(&[("s", "p", "o")]), iri("endpoint"), false);
        assert_eq!(tree.transform(&Marker), tree);
    }

    #[test]
    fn test_lazy_bgp_rejects_sub_queries() {
        let patterns = vec![
            TriplePattern::triple(var("s"), iri("p"), var("o")),
            TriplePattern::SubQuery(SubQuery {
                algebra: Arc::new(bgp(&[("x", "p", "y")])),
                projection: vec!["x".to_string()],
            }),
        ];
        assert!(matches!(
            Algebra::try_lazy_bgp(patterns, None),
            Err(OptimizerError::InvalidPattern(_))
        ));

        let with_bind = vec![
            TriplePattern::triple(var("s"), iri("p"), var("o")),
            TriplePattern::Bind(Assignment::new("c", Expression::var("o"))),
        ];
        assert!(Algebra::try_ask_bgp(with_bind).is_ok());
    }

    #[test]
    fn test_node_count_and_contains() {
        let tree = Algebra::filter(
            Algebra::join(bgp(&[("s", "p", "o")]), bgp(&[("o", "q", "x")])),
            Expression::Bound("x".to_string()),
        );
        assert_eq!(tree.node_count(), 4);
        assert!(tree.contains_operator("Join"));
        assert!(!tree.contains_operator("Union"));
    }

    #[test]
    fn test_display() {
        let tree = Algebra::slice(
            Algebra::select(bgp(&[("s", "p", "o")]), Some(vec!["s".to_string()])),
            Some(10),
            5,
        );
        assert_eq!(
            tree.to_string(),
            "Slice(Select(Bgp(?s <http://example.org/p> ?o), ?s), LIMIT 10, OFFSET 5)"
        );
    }
}
