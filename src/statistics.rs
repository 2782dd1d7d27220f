//! Selectivity weighting from dataset statistics.
//!
//! Built from an optional statistics graph (see [`crate::vocab`]) carrying
//! per-position occurrence counts. A term seen `n` times weighs
//! `1 - 1/max(1, n)`: frequent terms approach 1 (unselective), rare terms
//! approach 0. Terms the statistics never mention fall back to a
//! per-position default.
//!
//! # Example
//!
//! ```
//! use oxrdf::{Graph, Literal, NamedNode, Triple};
//! use sparqlopt::statistics::Weightings;
//! use sparqlopt::term::PatternItem;
//! use sparqlopt::vocab;
//!
//! let p = NamedNode::new_unchecked("http://example.org/p");
//! let mut graph = Graph::new();
//! graph.insert(&Triple::new(
//!     p.clone(),
//!     vocab::PREDICATE_COUNT.into_owned(),
//!     Literal::from(1000_i64),
//! ));
//!
//! let weightings = Weightings::new(Some(&graph));
//! let w = weightings.predicate_weighting(&PatternItem::bound(p));
//! assert!((w - 0.999).abs() < 1e-9);
//! ```

use crate::error::{OptimizerError, OptimizerResult};
use crate::pattern::MatchPattern;
use crate::term::PatternItem;
use crate::vocab;
use oxrdf::vocab::xsd;
use oxrdf::{Graph, NamedNodeRef, Term, TermRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Smallest weight handed out, so products stay strictly positive
pub const MIN_WEIGHTING: f64 = 1e-6;

const INTEGER_TYPES: [NamedNodeRef<'static>; 8] = [
    xsd::INTEGER,
    xsd::LONG,
    xsd::INT,
    xsd::SHORT,
    xsd::NON_NEGATIVE_INTEGER,
    xsd::POSITIVE_INTEGER,
    xsd::UNSIGNED_LONG,
    xsd::UNSIGNED_INT,
];

/// Assumed selectivity per position for terms without statistics.
///
/// Stored weights are `1 - default`. The variable default is used as the
/// weight of a variable position directly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightingDefaults {
    pub subject: f64,
    pub predicate: f64,
    pub object: f64,
    pub variable: f64,
}

impl Default for WeightingDefaults {
    fn default() -> Self {
        WeightingDefaults {
            subject: 0.8,
            predicate: 0.4,
            object: 0.6,
            variable: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Position {
    Subject,
    Predicate,
    Object,
}

/// Per-position term weights used to rank triple patterns
#[derive(Debug, Clone, PartialEq)]
pub struct Weightings {
    subjects: HashMap<Term, f64>,
    predicates: HashMap<Term, f64>,
    objects: HashMap<Term, f64>,
    default_subject: f64,
    default_predicate: f64,
    default_object: f64,
    default_variable: f64,
}

impl Default for Weightings {
    fn default() -> Self {
        Weightings::new(None)
    }
}

impl Weightings {
    /// Weightings from an optional statistics graph with default fallbacks
    pub fn new(graph: Option<&Graph>) -> Self {
        Self::with_defaults(graph, WeightingDefaults::default())
    }

    /// Weightings with custom fallbacks. Unrecognized predicates and
    /// non-integer counts are ignored.
    pub fn with_defaults(graph: Option<&Graph>, defaults: WeightingDefaults) -> Self {
        let mut weightings = Self::empty(defaults);
        if let Some(graph) = graph {
            weightings.load(graph, false).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "statistics_load_failed");
            });
        }
        weightings
    }

    /// Like [`Weightings::with_defaults`] but rejects count triples whose
    /// value is not a non-negative integer
    pub fn from_graph_strict(graph: &Graph, defaults: WeightingDefaults) -> OptimizerResult<Self> {
        let mut weightings = Self::empty(defaults);
        weightings.load(graph, true)?;
        Ok(weightings)
    }

    fn empty(defaults: WeightingDefaults) -> Self {
        Weightings {
            subjects: HashMap::new(),
            predicates: HashMap::new(),
            objects: HashMap::new(),
            default_subject: clamp(1.0 - defaults.subject),
            default_predicate: clamp(1.0 - defaults.predicate),
            default_object: clamp(1.0 - defaults.object),
            default_variable: clamp(defaults.variable),
        }
    }

    fn load(&mut self, graph: &Graph, strict: bool) -> OptimizerResult<()> {
        let mut any_position: HashMap<Term, f64> = HashMap::new();

        for triple in graph {
            let position = if triple.predicate == vocab::SUBJECT_COUNT {
                Some(Position::Subject)
            } else if triple.predicate == vocab::PREDICATE_COUNT {
                Some(Position::Predicate)
            } else if triple.predicate == vocab::OBJECT_COUNT {
                Some(Position::Object)
            } else if triple.predicate == vocab::COUNT {
                None
            } else {
                continue;
            };

            let count = match parse_count(triple.object) {
                Some(count) if count >= 0 || !strict => count,
                _ if strict => {
                    return Err(OptimizerError::Statistics(format!(
                        "{} {} is not a non-negative integer",
                        triple.predicate, triple.object
                    )));
                }
                _ => continue,
            };

            let term = Term::from(triple.subject.into_owned());
            let weight = weight_for(count);
            match position {
                Some(Position::Subject) => self.subjects.insert(term, weight),
                Some(Position::Predicate) => self.predicates.insert(term, weight),
                Some(Position::Object) => self.objects.insert(term, weight),
                None => any_position.insert(term, weight),
            };
        }

        // Positional counts win over the position-independent count
        for (term, weight) in any_position {
            self.subjects.entry(term.clone()).or_insert(weight);
            self.predicates.entry(term.clone()).or_insert(weight);
            self.objects.entry(term).or_insert(weight);
        }

        tracing::debug!(
            subjects = self.subjects.len(),
            predicates = self.predicates.len(),
            objects = self.objects.len(),
            "weightings_loaded"
        );
        Ok(())
    }

    /// True when no statistics were loaded
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty() && self.predicates.is_empty() && self.objects.is_empty()
    }

    pub fn subject_weighting(&self, item: &PatternItem) -> f64 {
        self.lookup(item, &self.subjects, self.default_subject)
    }

    pub fn predicate_weighting(&self, item: &PatternItem) -> f64 {
        self.lookup(item, &self.predicates, self.default_predicate)
    }

    pub fn object_weighting(&self, item: &PatternItem) -> f64 {
        self.lookup(item, &self.objects, self.default_object)
    }

    /// Product of the three positional weights; lower is more selective
    pub fn selectivity(&self, pattern: &MatchPattern) -> f64 {
        self.subject_weighting(&pattern.subject)
            * self.predicate_weighting(&pattern.predicate)
            * self.object_weighting(&pattern.object)
    }

    fn lookup(&self, item: &PatternItem, weights: &HashMap<Term, f64>, default: f64) -> f64 {
        match item.term() {
            Some(term) => weights.get(term).copied().unwrap_or(default),
            None => self.default_variable,
        }
    }
}

fn weight_for(count: i64) -> f64 {
    clamp(1.0 - 1.0 / count.max(1) as f64)
}

fn clamp(weight: f64) -> f64 {
    if weight.is_nan() {
        return 1.0;
    }
    weight.clamp(MIN_WEIGHTING, 1.0)
}

fn parse_count(object: TermRef<'_>) -> Option<i64> {
    let TermRef::Literal(literal) = object else {
        return None;
    };
    let datatype = literal.datatype();
    if !INTEGER_TYPES.iter().any(|t| *t == datatype) {
        return None;
    }
    literal.value().trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxrdf::{Literal, NamedNode, Triple};

    fn node(suffix: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.org/{suffix}"))
    }

    fn stats(entries: &[(&str, NamedNodeRef<'static>, Literal)]) -> Graph {
        let mut graph = Graph::new();
        for (term, predicate, count) in entries {
            graph.insert(&Triple::new(
                node(term),
                predicate.into_owned(),
                count.clone(),
            ));
        }
        graph
    }

    #[test]
    fn test_no_statistics_uses_defaults() {
        let w = Weightings::new(None);
        let item = PatternItem::bound(node("anything"));
        assert_eq!(w.subject_weighting(&item), 1.0 - 0.8);
        assert_eq!(w.predicate_weighting(&item), 1.0 - 0.4);
        assert_eq!(w.object_weighting(&item), 1.0 - 0.6);
        assert_eq!(w.subject_weighting(&PatternItem::variable("s")), 1.0);
        assert!(w.is_empty());
    }

    #[test]
    fn test_counts_become_weights() {
        let graph = stats(&[
            ("rare", vocab::SUBJECT_COUNT, Literal::from(2_i64)),
            ("common", vocab::SUBJECT_COUNT, Literal::from(100_i64)),
        ]);
        let w = Weightings::new(Some(&graph));
        let rare = w.subject_weighting(&PatternItem::bound(node("rare")));
        let common = w.subject_weighting(&PatternItem::bound(node("common")));
        assert!((rare - 0.5).abs() < 1e-12);
        assert!((common - 0.99).abs() < 1e-12);
        assert!(rare < common);
    }

    #[test]
    fn test_single_occurrence_stays_positive() {
        let graph = stats(&[("once", vocab::OBJECT_COUNT, Literal::from(1_i64))]);
        let w = Weightings::new(Some(&graph));
        let weight = w.object_weighting(&PatternItem::bound(node("once")));
        assert!(weight > 0.0);
        assert_eq!(weight, MIN_WEIGHTING);
    }

    #[test]
    fn test_generic_count_fills_unset_positions() {
        let graph = stats(&[
            ("t", vocab::COUNT, Literal::from(10_i64)),
            ("t", vocab::PREDICATE_COUNT, Literal::from(2_i64)),
        ]);
        let w = Weightings::new(Some(&graph));
        let item = PatternItem::bound(node("t"));
        assert!((w.subject_weighting(&item) - 0.9).abs() < 1e-12);
        assert!((w.predicate_weighting(&item) - 0.5).abs() < 1e-12);
        assert!((w.object_weighting(&item) - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_non_integer_counts_ignored() {
        let graph = stats(&[
            ("t", vocab::SUBJECT_COUNT, Literal::new_simple_literal("lots")),
            ("u", vocab::SUBJECT_COUNT, Literal::from(1.5_f64)),
        ]);
        let w = Weightings::new(Some(&graph));
        assert!(w.is_empty());
        assert_eq!(
            w.subject_weighting(&PatternItem::bound(node("t"))),
            1.0 - 0.8
        );
    }

    #[test]
    fn test_strict_loading_rejects_bad_counts() {
        let graph = stats(&[("t", vocab::SUBJECT_COUNT, Literal::new_simple_literal("x"))]);
        let err = Weightings::from_graph_strict(&graph, WeightingDefaults::default());
        assert!(matches!(err, Err(OptimizerError::Statistics(_))));

        let graph = stats(&[("t", vocab::SUBJECT_COUNT, Literal::from(-3_i64))]);
        assert!(Weightings::from_graph_strict(&graph, WeightingDefaults::default()).is_err());

        let graph = stats(&[("t", vocab::SUBJECT_COUNT, Literal::from(3_i64))]);
        assert!(Weightings::from_graph_strict(&graph, WeightingDefaults::default()).is_ok());
    }

    #[test]
    fn test_unrelated_triples_ignored() {
        let graph = stats(&[("t", oxrdf::vocab::rdf::TYPE, Literal::from(3_i64))]);
        assert!(Weightings::new(Some(&graph)).is_empty());
    }

    #[test]
    fn test_selectivity_is_product() {
        let w = Weightings::new(None);
        let pattern = MatchPattern::new(
            PatternItem::variable("s"),
            PatternItem::bound(node("p")),
            PatternItem::variable("o"),
        );
        assert!((w.selectivity(&pattern) - (1.0 - 0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_custom_defaults_are_clamped() {
        let defaults = WeightingDefaults {
            subject: 1.0,
            predicate: 0.0,
            object: 0.5,
            variable: 1.0,
        };
        let w = Weightings::with_defaults(None, defaults);
        let item = PatternItem::bound(node("x"));
        assert_eq!(w.subject_weighting(&item), MIN_WEIGHTING);
        assert_eq!(w.predicate_weighting(&item), 1.0);
    }
}
