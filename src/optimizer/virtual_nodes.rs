//! Virtual node substitution.
//!
//! Stores that key triples by internal ids can resolve the constants of a
//! query once, up front. Bound terms become [`PatternItem::Virtual`]; a BGP
//! mentioning a term the store has never seen cannot match anything and
//! becomes a [`Algebra::NullOperator`] over the same variables.

use super::AlgebraOptimizer;
use crate::algebra::Algebra;
use crate::error::OptimizerResult;
use crate::pattern::{MatchPattern, TriplePattern};
use crate::term::{PatternItem, VirtualNode};
use oxrdf::Term;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves terms to store ids
pub trait VirtualNodeProvider: Send + Sync {
    fn virtual_id(&self, term: &Term) -> Option<u64>;
}

impl VirtualNodeProvider for HashMap<Term, u64> {
    fn virtual_id(&self, term: &Term) -> Option<u64> {
        self.get(term).copied()
    }
}

#[derive(Clone)]
pub struct VirtualNodeOptimizer {
    provider: Arc<dyn VirtualNodeProvider>,
}

impl std::fmt::Debug for VirtualNodeOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualNodeOptimizer").finish_non_exhaustive()
    }
}

impl VirtualNodeOptimizer {
    pub fn new(provider: Arc<dyn VirtualNodeProvider>) -> Self {
        VirtualNodeOptimizer { provider }
    }

    /// `None` when some bound term is unknown to the store
    fn virtualize_item(&self, item: &PatternItem) -> Option<PatternItem> {
        match item {
            PatternItem::Bound(term) => {
                let id = self.provider.virtual_id(term)?;
                Some(PatternItem::Virtual(VirtualNode {
                    id,
                    term: term.clone(),
                }))
            }
            other => Some(other.clone()),
        }
    }

    fn virtualize(&self, patterns: &[TriplePattern]) -> Option<Vec<TriplePattern>> {
        patterns
            .iter()
            .map(|pattern| match pattern {
                TriplePattern::Match(m) => Some(TriplePattern::Match(MatchPattern::new(
                    self.virtualize_item(&m.subject)?,
                    self.virtualize_item(&m.predicate)?,
                    self.virtualize_item(&m.object)?,
                ))),
                other => Some(other.clone()),
            })
            .collect()
    }
}

impl AlgebraOptimizer for VirtualNodeOptimizer {
    fn name(&self) -> &str {
        "virtual_nodes"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        Ok(match algebra {
            Algebra::Bgp { patterns } => match self.virtualize(patterns) {
                Some(patterns) => Algebra::bgp(patterns),
                None => {
                    tracing::debug!("bgp_references_unknown_term");
                    Algebra::NullOperator {
                        variables: algebra.variables(),
                    }
                }
            },
            _ => algebra.transform(self),
        })
    }
}
