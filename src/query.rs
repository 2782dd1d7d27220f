//! Parser output the optimizer consumes: graph pattern scopes, the query
//! shape consulted by applicability checks, and update command shapes.
//!
//! ```text
//! Query { root: GraphPattern } -> [QueryOptimizer] -> GraphPattern::to_algebra
//!     -> solution modifiers -> [OptimizerPipeline] -> Algebra
//! ```

use crate::algebra::{Algebra, OrderCondition};
use crate::expression::Expression;
use crate::optimizer::AlgebraOptimizer;
use crate::pattern::{Assignment, TriplePattern};
use crate::pipeline::OptimizerPipeline;
use crate::reorder::QueryOptimizer;
use crate::term::PatternItem;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Query forms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Select,
    Ask,
    Construct,
    Describe,
}

/// ORDER BY clause as seen by applicability checks
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByShape {
    pub conditions: Vec<OrderCondition>,
    /// Evaluation order of the root scope already satisfies the ordering,
    /// so limiting evaluation cannot change which solutions come first
    pub optimizable: bool,
}

impl OrderByShape {
    pub fn new(conditions: Vec<OrderCondition>) -> Self {
        OrderByShape {
            conditions,
            optimizable: false,
        }
    }

    /// Whether evaluating `root` in pattern order yields solutions already
    /// in this order.
    ///
    /// True for an entirely empty root, or when every key is an ascending
    /// plain variable bound by the root's first pattern, which must be an
    /// ordinary match.
    pub fn is_optimizable_for(&self, root: &GraphPattern) -> bool {
        let Some(first) = root.triple_patterns.first() else {
            return root.children.is_empty();
        };
        if !first.is_match() {
            return false;
        }
        let vars = first.variables();
        self.conditions.iter().all(|c| {
            !c.descending
                && c
                    .expression
                    .as_variable()
                    .is_some_and(|v| vars.contains(v))
        })
    }
}

/// Everything about a query that decides whether a pass applies
#[derive(Debug, Clone, PartialEq)]
pub struct QueryShape {
    pub query_type: QueryType,
    pub limit: Option<usize>,
    pub offset: usize,
    pub distinct: bool,
    pub reduced: bool,
    pub order_by: Option<OrderByShape>,
    pub group_by: Option<Vec<Expression>>,
    pub having: Option<Expression>,
    /// Variables of a trailing BINDINGS/VALUES clause
    pub bindings: Option<Vec<String>>,
}

impl QueryShape {
    pub fn new(query_type: QueryType) -> Self {
        QueryShape {
            query_type,
            limit: None,
            offset: 0,
            distinct: false,
            reduced: false,
            order_by: None,
            group_by: None,
            having: None,
            bindings: None,
        }
    }
}

/// SPARQL Update operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateCommandType {
    Insert,
    Delete,
    Modify,
    InsertData,
    DeleteData,
    Load,
    Clear,
    Create,
    Drop,
    Copy,
    Move,
    Add,
}

/// Update command shape, for update applicability checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCommand {
    pub command_type: UpdateCommandType,
}

impl UpdateCommand {
    pub fn new(command_type: UpdateCommandType) -> Self {
        UpdateCommand { command_type }
    }

    /// Commands that evaluate a WHERE clause
    pub fn has_pattern(&self) -> bool {
        matches!(
            self.command_type,
            UpdateCommandType::Insert | UpdateCommandType::Delete | UpdateCommandType::Modify
        )
    }
}

/// How a graph pattern combines with its enclosing scope
#[derive(Debug, Clone, PartialEq)]
pub enum GraphPatternKind {
    Group,
    Optional,
    /// Branches are the children
    Union,
    Minus,
    Graph(PatternItem),
    Service { endpoint: PatternItem, silent: bool },
}

/// One `{ ... }` scope of a query.
///
/// Filters and assignments start out unplaced; the reordering pass moves
/// them into `triple_patterns` where that is safe.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPattern {
    pub kind: GraphPatternKind,
    pub triple_patterns: Vec<TriplePattern>,
    pub unplaced_filters: Vec<Expression>,
    pub unplaced_assignments: Vec<Assignment>,
    pub children: Vec<GraphPattern>,
    /// Set once a query optimizer has processed this scope
    pub optimized: bool,
}

impl Default for GraphPattern {
    fn default() -> Self {
        GraphPattern::new(GraphPatternKind::Group)
    }
}

impl GraphPattern {
    pub fn new(kind: GraphPatternKind) -> Self {
        GraphPattern {
            kind,
            triple_patterns: Vec::new(),
            unplaced_filters: Vec::new(),
            unplaced_assignments: Vec::new(),
            children: Vec::new(),
            optimized: false,
        }
    }

    pub fn group() -> Self {
        GraphPattern::new(GraphPatternKind::Group)
    }

    pub fn optional() -> Self {
        GraphPattern::new(GraphPatternKind::Optional)
    }

    pub fn minus() -> Self {
        GraphPattern::new(GraphPatternKind::Minus)
    }

    pub fn union(branches: Vec<GraphPattern>) -> Self {
        GraphPattern {
            children: branches,
            ..GraphPattern::new(GraphPatternKind::Union)
        }
    }

    pub fn graph(graph: PatternItem) -> Self {
        GraphPattern::new(GraphPatternKind::Graph(graph))
    }

    pub fn service(endpoint: PatternItem, silent: bool) -> Self {
        GraphPattern::new(GraphPatternKind::Service { endpoint, silent })
    }

    pub fn with_pattern(mut self, pattern: TriplePattern) -> Self {
        self.triple_patterns.push(pattern);
        self
    }

    pub fn with_triple(
        self,
        subject: PatternItem,
        predicate: PatternItem,
        object: PatternItem,
    ) -> Self {
        self.with_pattern(TriplePattern::triple(subject, predicate, object))
    }

    pub fn with_filter(mut self, expression: Expression) -> Self {
        self.unplaced_filters.push(expression);
        self
    }

    pub fn with_assignment(mut self, variable: impl Into<String>, expression: Expression) -> Self {
        self.unplaced_assignments
            .push(Assignment::new(variable, expression));
        self
    }

    pub fn with_child(mut self, child: GraphPattern) -> Self {
        self.children.push(child);
        self
    }

    /// True when some filter still applies to the whole scope
    pub fn is_filtered(&self) -> bool {
        !self.unplaced_filters.is_empty()
    }

    /// Variables this scope can bind, including nested scopes.
    ///
    /// MINUS children bind nothing outward.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut vars: BTreeSet<String> = self
            .triple_patterns
            .iter()
            .flat_map(TriplePattern::variables)
            .collect();
        vars.extend(self.unplaced_assignments.iter().map(|a| a.variable.clone()));
        for child in &self.children {
            if child.kind != GraphPatternKind::Minus {
                vars.extend(child.variables());
            }
        }
        if let GraphPatternKind::Graph(item) = &self.kind {
            vars.extend(item.binding_name());
        }
        vars
    }

    /// Conjunction of the unplaced filters
    pub fn filter_expression(&self) -> Option<Expression> {
        Expression::conjunction(self.unplaced_filters.iter().cloned())
    }

    /// Convert this scope to algebra.
    ///
    /// Children join left to right: OPTIONAL becomes `LeftJoin` (its
    /// unplaced filters become the join condition), MINUS becomes `Minus`,
    /// anything else a `Join`. Unplaced assignments extend the result and
    /// unplaced filters wrap the whole scope.
    pub fn to_algebra(&self) -> Algebra {
        match &self.kind {
            GraphPatternKind::Service { endpoint, silent } => Algebra::service(
                self.apply_filters(self.body_algebra()),
                endpoint.clone(),
                *silent,
            ),
            _ => self.apply_filters(self.unfiltered_algebra()),
        }
    }

    fn unfiltered_algebra(&self) -> Algebra {
        match &self.kind {
            GraphPatternKind::Union => {
                let mut branches = self.children.iter().map(GraphPattern::to_algebra);
                let first = branches.next().unwrap_or_default();
                branches.fold(first, Algebra::union)
            }
            GraphPatternKind::Graph(graph) => Algebra::graph(self.body_algebra(), graph.clone()),
            // Filters of a SERVICE scope are shipped with it
            GraphPatternKind::Service { .. } => self.to_algebra(),
            GraphPatternKind::Group | GraphPatternKind::Optional | GraphPatternKind::Minus => {
                self.body_algebra()
            }
        }
    }

    fn body_algebra(&self) -> Algebra {
        let mut algebra = Algebra::bgp(self.triple_patterns.clone());
        for child in &self.children {
            algebra = match child.kind {
                GraphPatternKind::Optional => Algebra::left_join(
                    algebra,
                    child.unfiltered_algebra(),
                    child.filter_expression(),
                ),
                GraphPatternKind::Minus => Algebra::minus(algebra, child.to_algebra()),
                _ => Algebra::join(algebra, child.to_algebra()),
            };
        }
        for assignment in &self.unplaced_assignments {
            algebra = Algebra::extend(
                algebra,
                assignment.expression.clone(),
                assignment.variable.clone(),
            );
        }
        algebra
    }

    fn apply_filters(&self, algebra: Algebra) -> Algebra {
        match self.filter_expression() {
            Some(expression) => Algebra::filter(algebra, expression),
            None => algebra,
        }
    }
}

/// A parsed query ready for optimization
#[derive(Clone)]
pub struct Query {
    pub shape: QueryShape,
    pub root: GraphPattern,
    /// Projected variables, `None` for `SELECT *`
    pub projection: Option<Vec<String>>,
    local_optimizers: Vec<Arc<dyn AlgebraOptimizer>>,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local: Vec<&str> = self.local_optimizers.iter().map(|o| o.name()).collect();
        f.debug_struct("Query")
            .field("shape", &self.shape)
            .field("root", &self.root)
            .field("projection", &self.projection)
            .field("local_optimizers", &local)
            .finish()
    }
}

impl Query {
    pub fn new(shape: QueryShape, root: GraphPattern) -> Self {
        Query {
            shape,
            root,
            projection: None,
            local_optimizers: Vec::new(),
        }
    }

    pub fn with_projection(mut self, variables: Vec<String>) -> Self {
        self.projection = Some(variables);
        self
    }

    /// Register a pass that runs before the pipeline's global passes
    pub fn add_local_optimizer(&mut self, optimizer: Arc<dyn AlgebraOptimizer>) {
        self.local_optimizers.push(optimizer);
    }

    pub fn local_optimizers(&self) -> &[Arc<dyn AlgebraOptimizer>] {
        &self.local_optimizers
    }

    /// Reorder the root scope and refresh the ORDER BY optimizability flag
    pub fn optimize(&mut self, optimizer: &dyn QueryOptimizer) {
        self.root = optimizer.optimize(&self.root, &BTreeSet::new());
        self.refresh_order_by();
    }

    fn refresh_order_by(&mut self) {
        if let Some(order) = &mut self.shape.order_by {
            order.optimizable = order.is_optimizable_for(&self.root);
        }
    }

    /// Build the optimized algebra for this query.
    ///
    /// Runs the pipeline's query optimizer (when enabled and not already
    /// applied), converts the root scope, adds ORDER BY / projection /
    /// DISTINCT / REDUCED / slice operators, then applies local passes
    /// followed by the pipeline's passes.
    pub fn to_algebra(&self, pipeline: &OptimizerPipeline) -> Algebra {
        let mut query = self.clone();
        if pipeline.query_optimization() && !query.root.optimized {
            query.optimize(pipeline.query_optimizer().as_ref());
        } else {
            query.refresh_order_by();
        }

        let mut algebra = query.root.to_algebra();
        if query.shape.query_type != QueryType::Ask {
            if let Some(order) = &query.shape.order_by {
                algebra = Algebra::order_by(algebra, order.conditions.clone());
            }
            algebra = Algebra::select(algebra, query.projection.clone());
            if query.shape.distinct {
                algebra = Algebra::distinct(algebra);
            } else if query.shape.reduced {
                algebra = Algebra::reduced(algebra);
            }
            if query.shape.limit.is_some() || query.shape.offset > 0 {
                algebra = Algebra::slice(algebra, query.shape.limit, query.shape.offset);
            }
        }

        pipeline.optimize(algebra, &query.shape, &query.local_optimizers)
    }
}
