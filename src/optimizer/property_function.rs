//! Property function extraction.
//!
//! A property function ("magic predicate") is a predicate IRI the
//! evaluator computes instead of matching, e.g. a full-text search
//! predicate. Its arguments may be RDF collections written with
//! `( ... )` syntax, which parse into `rdf:first`/`rdf:rest` chains.
//!
//! ```text
//! ?doc text:search ( "rust" 10 )
//!   == ?doc text:search _:l0 . _:l0 rdf:first "rust" . _:l0 rdf:rest _:l1 .
//!      _:l1 rdf:first 10 . _:l1 rdf:rest rdf:nil
//!   -> (?doc) text:search ("rust" 10)
//! ```
//!
//! The patterns a match consumed are removed from the BGP and replaced by
//! one [`PropertyFunctionPattern`] at the position of the first of them.

use super::AlgebraOptimizer;
use crate::algebra::Algebra;
use crate::error::{OptimizerError, OptimizerResult};
use crate::pattern::{MatchPattern, PropertyFunctionPattern, TriplePattern};
use crate::term::PatternItem;
use oxrdf::vocab::rdf;
use oxrdf::{NamedNode, Term};
use std::collections::HashSet;
use std::sync::Arc;

/// Decides which predicates are property functions
pub trait PropertyFunctionFactory: Send + Sync {
    fn is_property_function(&self, function: &NamedNode) -> bool;
}

impl PropertyFunctionFactory for HashSet<NamedNode> {
    fn is_property_function(&self, function: &NamedNode) -> bool {
        self.contains(function)
    }
}

/// One property function found in a BGP
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFunctionMatch {
    pub function: NamedNode,
    pub subject_args: Vec<PatternItem>,
    pub object_args: Vec<PatternItem>,
    /// Every pattern this match replaces, the function pattern first
    pub consumed: Vec<TriplePattern>,
}

impl PropertyFunctionMatch {
    fn into_pattern(self) -> PropertyFunctionPattern {
        PropertyFunctionPattern {
            function: self.function,
            subject_args: self.subject_args,
            object_args: self.object_args,
            original_patterns: self.consumed,
        }
    }
}

/// Finds property function usages in a pattern list
pub trait PropertyFunctionExtractor: Send + Sync {
    fn extract(
        &self,
        patterns: &[TriplePattern],
        factory: &dyn PropertyFunctionFactory,
    ) -> Vec<PropertyFunctionMatch>;
}

/// Matches `subject <function> object` patterns, expanding blank-node
/// headed RDF collections on either side into argument lists
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPropertyFunctionExtractor;

impl DefaultPropertyFunctionExtractor {
    /// Arguments rooted at `head`, with the list patterns that spell them
    fn arguments(
        head: &PatternItem,
        patterns: &[TriplePattern],
    ) -> (Vec<PatternItem>, Vec<TriplePattern>) {
        match Self::collection(head, patterns) {
            Some(list) => list,
            None => (vec![head.clone()], Vec::new()),
        }
    }

    fn collection(
        head: &PatternItem,
        patterns: &[TriplePattern],
    ) -> Option<(Vec<PatternItem>, Vec<TriplePattern>)> {
        if !head.is_blank() {
            return None;
        }
        let nil = PatternItem::bound(rdf::NIL.into_owned());
        let mut items = Vec::new();
        let mut consumed = Vec::new();
        let mut node = head.clone();

        // Each list cell consumes two patterns, which bounds the walk
        for _ in 0..=patterns.len() / 2 {
            let first = find_list_pattern(patterns, &node, rdf::FIRST.into_owned())?;
            let rest = find_list_pattern(patterns, &node, rdf::REST.into_owned())?;
            items.push(first.object.clone());
            let next = rest.object.clone();
            consumed.push(TriplePattern::Match(first.clone()));
            consumed.push(TriplePattern::Match(rest.clone()));
            if next == nil {
                return Some((items, consumed));
            }
            node = next;
        }
        None
    }
}

fn find_list_pattern<'a>(
    patterns: &'a [TriplePattern],
    subject: &PatternItem,
    predicate: NamedNode,
) -> Option<&'a MatchPattern> {
    let predicate = PatternItem::bound(predicate);
    patterns.iter().find_map(|p| match p {
        TriplePattern::Match(m) if m.subject == *subject && m.predicate == predicate => Some(m),
        _ => None,
    })
}

impl PropertyFunctionExtractor for DefaultPropertyFunctionExtractor {
    fn extract(
        &self,
        patterns: &[TriplePattern],
        factory: &dyn PropertyFunctionFactory,
    ) -> Vec<PropertyFunctionMatch> {
        patterns
            .iter()
            .filter_map(|pattern| {
                let TriplePattern::Match(m) = pattern else {
                    return None;
                };
                let Some(Term::NamedNode(function)) = m.predicate.term() else {
                    return None;
                };
                if !factory.is_property_function(function) {
                    return None;
                }
                let (subject_args, subject_list) = Self::arguments(&m.subject, patterns);
                let (object_args, object_list) = Self::arguments(&m.object, patterns);
                let mut consumed = vec![pattern.clone()];
                consumed.extend(subject_list);
                consumed.extend(object_list);
                Some(PropertyFunctionMatch {
                    function: function.clone(),
                    subject_args,
                    object_args,
                    consumed,
                })
            })
            .collect()
    }
}

/// Replace the patterns each match consumed with one property function
/// pattern, placed where the first consumed pattern was.
///
/// Fails with [`OptimizerError::InconsistentExtraction`] when a match
/// names a pattern that is missing or already consumed by another match.
pub fn extract_property_functions(
    patterns: &[TriplePattern],
    extractor: &dyn PropertyFunctionExtractor,
    factory: &dyn PropertyFunctionFactory,
) -> OptimizerResult<Vec<TriplePattern>> {
    let matches = extractor.extract(patterns, factory);
    if matches.is_empty() {
        return Ok(patterns.to_vec());
    }

    let mut claimed = vec![false; patterns.len()];
    let mut placed: Vec<(usize, PropertyFunctionPattern)> = Vec::with_capacity(matches.len());
    for found in matches {
        if found.consumed.is_empty() {
            return Err(OptimizerError::InconsistentExtraction(format!(
                "{} consumed no patterns",
                found.function
            )));
        }
        let mut first = usize::MAX;
        for pattern in &found.consumed {
            let index = (0..patterns.len())
                .find(|&i| !claimed[i] && patterns[i] == *pattern)
                .ok_or_else(|| {
                    OptimizerError::InconsistentExtraction(format!(
                        "{pattern} is not available for {}",
                        found.function
                    ))
                })?;
            claimed[index] = true;
            first = first.min(index);
        }
        tracing::debug!(function = %found.function, at = first, "property_function_extracted");
        placed.push((first, found.into_pattern()));
    }

    let mut output = Vec::with_capacity(patterns.len());
    for (i, pattern) in patterns.iter().enumerate() {
        if let Some(position) = placed.iter().position(|(at, _)| *at == i) {
            let (_, function) = placed.swap_remove(position);
            output.push(TriplePattern::PropertyFunction(function));
        }
        if !claimed[i] {
            output.push(pattern.clone());
        }
    }
    Ok(output)
}

/// Collapses property function usages in every BGP of a tree
#[derive(Clone)]
pub struct PropertyFunctionOptimizer {
    factory: Arc<dyn PropertyFunctionFactory>,
    extractor: Arc<dyn PropertyFunctionExtractor>,
}

impl std::fmt::Debug for PropertyFunctionOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyFunctionOptimizer").finish_non_exhaustive()
    }
}

impl PropertyFunctionOptimizer {
    pub fn new(factory: Arc<dyn PropertyFunctionFactory>) -> Self {
        PropertyFunctionOptimizer {
            factory,
            extractor: Arc::new(DefaultPropertyFunctionExtractor),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PropertyFunctionExtractor>) -> Self {
        self.extractor = extractor;
        self
    }
}

impl AlgebraOptimizer for PropertyFunctionOptimizer {
    fn name(&self) -> &str {
        "property_function"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        match algebra {
            Algebra::Bgp { patterns } => Ok(Algebra::bgp(extract_property_functions(
                patterns,
                self.extractor.as_ref(),
                self.factory.as_ref(),
            )?)),
            _ => algebra.try_map_children(|child| self.try_optimize(child)),
        }
    }
}
