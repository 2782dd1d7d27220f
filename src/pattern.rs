//! Triple patterns as they appear inside a BGP.
//!
//! Besides ordinary `s p o` matches a BGP may carry FILTER and BIND/LET
//! pseudo-patterns (placed there by the reordering pass), sub-queries,
//! property paths and extracted property functions.

use crate::algebra::Algebra;
use crate::expression::Expression;
use crate::term::PatternItem;
use oxrdf::NamedNode;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// An ordinary `subject predicate object` pattern
#[derive(Debug, Clone, PartialEq)]
pub struct MatchPattern {
    pub subject: PatternItem,
    pub predicate: PatternItem,
    pub object: PatternItem,
}

impl MatchPattern {
    pub fn new(subject: PatternItem, predicate: PatternItem, object: PatternItem) -> Self {
        MatchPattern {
            subject,
            predicate,
            object,
        }
    }

    pub fn items(&self) -> [&PatternItem; 3] {
        [&self.subject, &self.predicate, &self.object]
    }

    /// Classify which positions hold constants
    pub fn index_type(&self) -> IndexType {
        match (
            self.subject.is_bound(),
            self.predicate.is_bound(),
            self.object.is_bound(),
        ) {
            (true, true, true) => IndexType::NoVariables,
            (true, true, false) => IndexType::SubjectPredicate,
            (true, false, true) => IndexType::SubjectObject,
            (false, true, true) => IndexType::PredicateObject,
            (true, false, false) => IndexType::Subject,
            (false, true, false) => IndexType::Predicate,
            (false, false, true) => IndexType::Object,
            (false, false, false) => IndexType::Full,
        }
    }
}

/// Which positions of a match pattern are bound constants.
///
/// Used only to estimate selectivity; it has no effect on semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    NoVariables,
    SubjectPredicate,
    SubjectObject,
    PredicateObject,
    Subject,
    Predicate,
    Object,
    /// All three positions are variables
    Full,
}

impl IndexType {
    /// Number of variable positions
    pub fn variable_positions(self) -> usize {
        match self {
            IndexType::NoVariables => 0,
            IndexType::SubjectPredicate
            | IndexType::SubjectObject
            | IndexType::PredicateObject => 1,
            IndexType::Subject | IndexType::Predicate | IndexType::Object => 2,
            IndexType::Full => 3,
        }
    }

    /// Tie-break among patterns with the same number of constants: a bound
    /// subject narrows more than a bound object, which narrows more than a
    /// bound predicate
    pub(crate) fn rank(self) -> u8 {
        match self {
            IndexType::NoVariables => 0,
            IndexType::SubjectPredicate => 1,
            IndexType::SubjectObject => 2,
            IndexType::PredicateObject => 3,
            IndexType::Subject => 4,
            IndexType::Object => 5,
            IndexType::Predicate => 6,
            IndexType::Full => 7,
        }
    }
}

/// `BIND(expr AS ?var)` or the legacy `LET(?var := expr)`
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub variable: String,
    pub expression: Expression,
}

impl Assignment {
    pub fn new(variable: impl Into<String>, expression: Expression) -> Self {
        Assignment {
            variable: variable.into(),
            expression,
        }
    }
}

/// A nested SELECT evaluated as a single pattern
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub algebra: Arc<Algebra>,
    /// Variables the sub-query projects
    pub projection: Vec<String>,
}

/// SPARQL 1.1 property path expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyPath {
    Predicate(NamedNode),
    Inverse(Box<PropertyPath>),
    Sequence(Box<PropertyPath>, Box<PropertyPath>),
    Alternative(Box<PropertyPath>, Box<PropertyPath>),
    ZeroOrMore(Box<PropertyPath>),
    OneOrMore(Box<PropertyPath>),
    ZeroOrOne(Box<PropertyPath>),
    NegatedPropertySet(Vec<NamedNode>),
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyPath::Predicate(p) => write!(f, "{p}"),
            PropertyPath::Inverse(p) => write!(f, "^{p}"),
            PropertyPath::Sequence(a, b) => write!(f, "({a} / {b})"),
            PropertyPath::Alternative(a, b) => write!(f, "({a} | {b})"),
            PropertyPath::ZeroOrMore(p) => write!(f, "{p}*"),
            PropertyPath::OneOrMore(p) => write!(f, "{p}+"),
            PropertyPath::ZeroOrOne(p) => write!(f, "{p}?"),
            PropertyPath::NegatedPropertySet(ps) => {
                let ps: Vec<String> = ps.iter().map(ToString::to_string).collect();
                write!(f, "!({})", ps.join(" | "))
            }
        }
    }
}

/// `subject path object`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPathPattern {
    pub subject: PatternItem,
    pub path: PropertyPath,
    pub object: PatternItem,
}

/// A magic predicate together with the patterns it replaced
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFunctionPattern {
    pub function: NamedNode,
    pub subject_args: Vec<PatternItem>,
    pub object_args: Vec<PatternItem>,
    /// The consumed patterns, kept for the evaluator
    pub original_patterns: Vec<TriplePattern>,
}

/// One entry of a BGP
#[derive(Debug, Clone, PartialEq)]
pub enum TriplePattern {
    Match(MatchPattern),
    Filter(Expression),
    Bind(Assignment),
    /// Legacy alias of `Bind`
    Let(Assignment),
    SubQuery(SubQuery),
    PropertyPath(PropertyPathPattern),
    PropertyFunction(PropertyFunctionPattern),
}

impl TriplePattern {
    /// Convenience constructor for an ordinary match pattern
    pub fn triple(subject: PatternItem, predicate: PatternItem, object: PatternItem) -> Self {
        TriplePattern::Match(MatchPattern::new(subject, predicate, object))
    }

    /// Variables bound by evaluating this pattern
    pub fn variables(&self) -> BTreeSet<String> {
        match self {
            TriplePattern::Match(m) => m
                .items()
                .into_iter()
                .filter_map(PatternItem::binding_name)
                .collect(),
            TriplePattern::Filter(_) => BTreeSet::new(),
            TriplePattern::Bind(a) | TriplePattern::Let(a) => {
                std::iter::once(a.variable.clone()).collect()
            }
            TriplePattern::SubQuery(q) => q.projection.iter().cloned().collect(),
            TriplePattern::PropertyPath(p) => [&p.subject, &p.object]
                .into_iter()
                .filter_map(PatternItem::binding_name)
                .collect(),
            // The consumed patterns may contain list blank nodes the
            // argument lists no longer mention
            TriplePattern::PropertyFunction(pf) => pf
                .original_patterns
                .iter()
                .flat_map(TriplePattern::variables)
                .chain(
                    pf.subject_args
                        .iter()
                        .chain(&pf.object_args)
                        .filter_map(PatternItem::binding_name),
                )
                .collect(),
        }
    }

    /// Variables that must be bound before this pattern can run
    pub fn required_variables(&self) -> BTreeSet<String> {
        match self {
            TriplePattern::Filter(expr) => expr.variables(),
            TriplePattern::Bind(a) | TriplePattern::Let(a) => a.expression.variables(),
            _ => BTreeSet::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, TriplePattern::Match(_))
    }

    /// FILTER, BIND and LET pseudo-patterns
    pub fn is_filter_or_assignment(&self) -> bool {
        matches!(
            self,
            TriplePattern::Filter(_) | TriplePattern::Bind(_) | TriplePattern::Let(_)
        )
    }

    /// Index classification for match patterns, `None` for everything else
    pub fn index_type(&self) -> Option<IndexType> {
        match self {
            TriplePattern::Match(m) => Some(m.index_type()),
            _ => None,
        }
    }

    /// A pattern of three distinct variables matches every triple
    pub fn is_accept_all(&self) -> bool {
        match self {
            TriplePattern::Match(m) => {
                m.index_type() == IndexType::Full && self.variables().len() == 3
            }
            _ => false,
        }
    }

    /// Whether any position holds a blank node
    pub fn has_blank_variables(&self) -> bool {
        match self {
            TriplePattern::Match(m) => m.items().iter().any(|i| i.is_blank()),
            TriplePattern::PropertyPath(p) => p.subject.is_blank() || p.object.is_blank(),
            TriplePattern::PropertyFunction(pf) => pf
                .original_patterns
                .iter()
                .any(TriplePattern::has_blank_variables),
            _ => false,
        }
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriplePattern::Match(m) => write!(f, "{} {} {}", m.subject, m.predicate, m.object),
            TriplePattern::Filter(expr) => write!(f, "FILTER({expr})"),
            TriplePattern::Bind(a) => write!(f, "BIND({} AS ?{})", a.expression, a.variable),
            TriplePattern::Let(a) => write!(f, "LET(?{} := {})", a.variable, a.expression),
            TriplePattern::SubQuery(q) => write!(f, "{{ SUBQUERY {} }}", q.algebra),
            TriplePattern::PropertyPath(p) => write!(f, "{} {} {}", p.subject, p.path, p.object),
            TriplePattern::PropertyFunction(pf) => {
                let join = |items: &[PatternItem]| {
                    items
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(" ")
                };
                write!(
                    f,
                    "({}) {} ({})",
                    join(&pf.subject_args),
                    pf.function,
                    join(&pf.object_args)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::BinaryOperator;

    fn var(name: &str) -> PatternItem {
        PatternItem::variable(name)
    }

    fn iri(suffix: &str) -> PatternItem {
        PatternItem::iri(&format!("http://example.org/{suffix}"))
    }

    #[test]
    fn test_match_variables_include_blank_nodes() {
        let p = TriplePattern::triple(PatternItem::blank("b"), iri("p"), var("o"));
        let vars: Vec<String> = p.variables().into_iter().collect();
        assert_eq!(vars, vec!["_:b", "o"]);
        assert!(p.has_blank_variables());
    }

    #[test]
    fn test_filter_binds_nothing_but_requires_its_variables() {
        let p = TriplePattern::Filter(Expression::binary(
            BinaryOperator::Less,
            Expression::var("a"),
            Expression::var("b"),
        ));
        assert!(p.variables().is_empty());
        assert_eq!(p.required_variables().len(), 2);
    }

    #[test]
    fn test_bind_binds_its_target() {
        let p = TriplePattern::Bind(Assignment::new("c", Expression::var("a")));
        assert!(p.variables().contains("c"));
        assert!(p.required_variables().contains("a"));
        assert!(p.is_filter_or_assignment());
    }

    #[test]
    fn test_index_types() {
        let cases = [
            (iri("s"), iri("p"), iri("o"), IndexType::NoVariables),
            (iri("s"), iri("p"), var("o"), IndexType::SubjectPredicate),
            (var("s"), iri("p"), iri("o"), IndexType::PredicateObject),
            (var("s"), iri("p"), var("o"), IndexType::Predicate),
            (var("s"), var("p"), var("o"), IndexType::Full),
        ];
        for (s, p, o, expected) in cases {
            let pattern = MatchPattern::new(s, p, o);
            assert_eq!(pattern.index_type(), expected);
        }
        assert_eq!(IndexType::Full.variable_positions(), 3);
        assert_eq!(IndexType::SubjectObject.variable_positions(), 1);
    }

    #[test]
    fn test_accept_all() {
        assert!(TriplePattern::triple(var("s"), var("p"), var("o")).is_accept_all());
        // Repeated variable restricts the match
        assert!(!TriplePattern::triple(var("s"), var("p"), var("s")).is_accept_all());
        assert!(!TriplePattern::triple(var("s"), iri("p"), var("o")).is_accept_all());
    }

    #[test]
    fn test_display() {
        let p = TriplePattern::triple(var("s"), iri("p"), var("o"));
        assert_eq!(p.to_string(), "?s <http://example.org/p> ?o");
        let b = TriplePattern::Bind(Assignment::new("c", Expression::var("a")));
        assert_eq!(b.to_string(), "BIND(?a AS ?c)");
    }
}
