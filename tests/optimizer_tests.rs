//! Algebra pass tests: the individual rewrites, and whole queries run
//! through `Query::to_algebra` with the implicit-join pass enabled.

use oxrdf::vocab::rdf;
use oxrdf::Literal;
use sparqlopt::optimizer::{
    AskBgpOptimizer, ImplicitJoinOptimizer, OrderByDistinctOptimizer,
    ParallelEvaluationOptimizer, StrictAlgebraOptimizer,
};
use sparqlopt::{
    Algebra, AlgebraOptimizer, Assignment, BinaryOperator, Expression, GraphPattern,
    OptimizerPipeline, OrderByShape, OrderCondition, PatternItem, Query, QueryShape, QueryType,
    TriplePattern, Weightings,
};
use std::sync::Arc;

fn var(name: &str) -> PatternItem {
    PatternItem::variable(name)
}

fn iri(suffix: &str) -> PatternItem {
    PatternItem::iri(&format!("http://example.org/{suffix}"))
}

fn a() -> PatternItem {
    PatternItem::bound(rdf::TYPE.into_owned())
}

fn triple(s: PatternItem, p: PatternItem, o: PatternItem) -> TriplePattern {
    TriplePattern::triple(s, p, o)
}

fn int(value: i64) -> Expression {
    Expression::constant(Literal::from(value))
}

fn eq(lhs: &str, rhs: &str) -> Expression {
    Expression::equal(Expression::var(lhs), Expression::var(rhs))
}

fn implicit_join_pipeline() -> OptimizerPipeline {
    let mut pipeline = OptimizerPipeline::default();
    pipeline.add_optimizer(Arc::new(ImplicitJoinOptimizer::new()));
    pipeline
}

fn select(root: GraphPattern) -> Query {
    Query::new(QueryShape::new(QueryType::Select), root)
}

// Documented rewrites

#[test]
fn test_implicit_join_becomes_extend() {
    let tree = Algebra::filter(
        Algebra::bgp(vec![
            triple(var("x"), a(), var("type")),
            triple(var("y"), a(), var("type")),
        ]),
        eq("x", "y"),
    );
    let out = ImplicitJoinOptimizer::new().optimize(&tree);

    let expected = Algebra::extend(
        Algebra::bgp(vec![
            triple(var("x"), a(), var("type")),
            triple(var("x"), a(), var("type")),
        ]),
        Expression::var("x"),
        "y",
    );
    assert_eq!(out, expected);
    assert_eq!(out.variables(), tree.variables());
}

#[test]
fn test_ask_discards_optional_side() {
    let lhs = vec![triple(var("s"), iri("p"), var("o"))];
    let tree = Algebra::left_join(
        Algebra::bgp(lhs.clone()),
        Algebra::bgp(vec![triple(var("s"), iri("q"), var("z"))]),
        None,
    );
    let out = AskBgpOptimizer::new().optimize(&tree);
    assert_eq!(out, Algebra::try_ask_bgp(lhs).unwrap());
}

#[test]
fn test_strict_algebra_bind_and_filter() {
    let bind = Expression::binary(BinaryOperator::Add, Expression::var("a"), int(1));
    let filter = Expression::binary(BinaryOperator::Greater, Expression::var("c"), int(5));
    let tree = Algebra::bgp(vec![
        triple(var("a"), iri("p1"), var("b")),
        TriplePattern::Bind(Assignment::new("c", bind.clone())),
        TriplePattern::Filter(filter.clone()),
    ]);

    let expected = Algebra::filter(
        Algebra::extend(
            Algebra::bgp(vec![triple(var("a"), iri("p1"), var("b"))]),
            bind,
            "c",
        ),
        filter,
    );
    assert_eq!(StrictAlgebraOptimizer::new().optimize(&tree), expected);
}

#[test]
fn test_empty_statistics_use_constant_defaults() {
    let w = Weightings::new(None);
    for item in [iri("a"), iri("b"), PatternItem::bound(Literal::from(7_i64))] {
        assert!((w.subject_weighting(&item) - 0.2).abs() < 1e-9);
        assert!((w.predicate_weighting(&item) - 0.6).abs() < 1e-9);
        assert!((w.object_weighting(&item) - 0.4).abs() < 1e-9);
    }
    assert!((w.object_weighting(&var("o")) - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_parallel_join_only_when_disjoint() {
    let lhs = Algebra::bgp(vec![triple(var("a"), iri("p"), var("b"))]);
    let rhs = Algebra::bgp(vec![triple(var("c"), iri("p"), var("d"))]);
    let disjoint = Algebra::join(lhs.clone(), rhs.clone());
    let out = ParallelEvaluationOptimizer::new().optimize(&disjoint);
    assert_eq!(
        out,
        Algebra::ParallelJoin {
            lhs: Arc::new(lhs.clone()),
            rhs: Arc::new(rhs),
        }
    );

    let shared = Algebra::bgp(vec![triple(var("b"), iri("p"), var("c"))]);
    let overlapping = Algebra::join(lhs, shared);
    assert_eq!(
        ParallelEvaluationOptimizer::new().optimize(&overlapping),
        overlapping
    );
}

// Whole queries

#[test]
fn test_query_subject_equality() {
    let root = GraphPattern::group()
        .with_triple(var("s"), var("p"), var("o"))
        .with_triple(var("x"), var("y"), var("z"))
        .with_filter(eq("s", "x"));
    let algebra = select(root).to_algebra(&implicit_join_pipeline());
    assert!(algebra.contains_operator("Extend"), "{algebra}");
    assert!(!algebra.contains_operator("Filter"), "{algebra}");
}

#[test]
fn test_query_object_equality_becomes_filtered_product() {
    let root = GraphPattern::group()
        .with_triple(var("s"), var("p"), var("o"))
        .with_triple(var("x"), var("y"), var("z"))
        .with_filter(eq("o", "z"));
    let algebra = select(root).to_algebra(&implicit_join_pipeline());
    assert!(algebra.contains_operator("FilteredProduct"), "{algebra}");
}

#[test]
fn test_query_arithmetic_filter_becomes_filtered_product() {
    let sum = Expression::binary(
        BinaryOperator::Add,
        Expression::var("o1"),
        Expression::var("o2"),
    );
    let root = GraphPattern::group()
        .with_triple(var("s1"), iri("p"), var("o1"))
        .with_triple(var("s2"), iri("p"), var("o2"))
        .with_filter(Expression::equal(sum, int(4)));
    let algebra = select(root).to_algebra(&implicit_join_pipeline());
    assert!(algebra.contains_operator("FilteredProduct"), "{algebra}");
}

#[test]
fn test_query_connected_filter_stays() {
    let root = GraphPattern::group()
        .with_triple(var("s"), iri("p"), var("o"))
        .with_triple(var("s"), iri("q"), var("z"))
        .with_filter(eq("o", "z"));
    let algebra = select(root).to_algebra(&implicit_join_pipeline());
    assert!(!algebra.contains_operator("Extend"), "{algebra}");
    assert!(!algebra.contains_operator("FilteredProduct"), "{algebra}");
    assert!(algebra.to_string().contains("FILTER"), "{algebra}");
}

#[test]
fn test_ask_query() {
    let root = GraphPattern::group().with_triple(var("s"), var("p"), var("o"));
    let query = Query::new(QueryShape::new(QueryType::Ask), root);
    let algebra = query.to_algebra(&OptimizerPipeline::default());
    assert_eq!(algebra.name(), "AskBgp");
}

#[test]
fn test_ask_union_query() {
    let branch = |p: &str| GraphPattern::group().with_triple(var("s"), iri(p), var("o"));
    let root =
        GraphPattern::group().with_child(GraphPattern::union(vec![branch("a"), branch("b")]));
    let query = Query::new(QueryShape::new(QueryType::Ask), root);
    let algebra = query.to_algebra(&OptimizerPipeline::default());
    assert_eq!(algebra.name(), "AskUnion", "{algebra}");
    assert!(algebra.contains_operator("AskBgp"));
}

#[test]
fn test_limit_query_is_lazy() {
    let root = GraphPattern::group().with_triple(var("s"), var("p"), var("o"));
    let mut shape = QueryShape::new(QueryType::Select);
    shape.limit = Some(10);
    let algebra = Query::new(shape, root).to_algebra(&OptimizerPipeline::default());
    assert!(algebra.contains_operator("LazyBgp"), "{algebra}");
    assert_eq!(algebra.name(), "Slice");
}

#[test]
fn test_distinct_order_by_query() {
    let mut pipeline = OptimizerPipeline::default();
    pipeline.add_optimizer(Arc::new(OrderByDistinctOptimizer::new()));

    let root = GraphPattern::group().with_triple(var("s"), var("p"), var("o"));
    let mut shape = QueryShape::new(QueryType::Select);
    shape.distinct = true;
    shape.order_by = Some(OrderByShape::new(vec![OrderCondition::asc(
        Expression::var("p"),
    )]));
    let projected = Query::new(shape.clone(), root.clone()).with_projection(vec!["p".to_string()]);
    let algebra = projected.to_algebra(&pipeline);
    assert!(
        algebra.to_string().starts_with("OrderBy(Distinct(Select("),
        "{algebra}"
    );

    // SELECT DISTINCT * keeps the sort below the projection
    let star = Query::new(shape, root).to_algebra(&pipeline);
    assert_eq!(star.name(), "Distinct", "{star}");
}

#[test]
fn test_filter_only_child_group() {
    let root = GraphPattern::group()
        .with_triple(var("s"), var("p"), var("o"))
        .with_child(GraphPattern::group().with_filter(Expression::Bound("o".to_string())));
    let algebra = select(root).to_algebra(&OptimizerPipeline::default());
    assert!(algebra.contains_operator("Filter"), "{algebra}");
}

#[test]
fn test_filter_only_optional_group() {
    let root = GraphPattern::group()
        .with_triple(var("s"), var("p"), var("o"))
        .with_child(GraphPattern::optional().with_filter(Expression::Bound("o".to_string())));
    let algebra = select(root).to_algebra(&OptimizerPipeline::default());
    assert!(algebra.contains_operator("LeftJoin"), "{algebra}");
}

#[test]
fn test_passes_preserve_variables_end_to_end() {
    let root = GraphPattern::group()
        .with_triple(var("s"), var("p"), var("o"))
        .with_triple(var("x"), var("y"), var("z"))
        .with_filter(eq("s", "x"))
        .with_assignment("k", int(1));
    let mut unoptimized = OptimizerPipeline::new();
    unoptimized.set_algebra_optimization(false);

    let before = select(root.clone()).to_algebra(&unoptimized);
    let after = select(root).to_algebra(&implicit_join_pipeline());
    assert_eq!(before.variables(), after.variables());
}
