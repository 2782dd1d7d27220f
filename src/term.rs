//! Pattern items: the subject/predicate/object slots of a triple pattern.

use oxrdf::{NamedNode, Term};
use std::fmt;

/// One position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternItem {
    /// A named variable (`?x`), stored without the leading `?`
    Variable(String),
    /// A concrete RDF term
    Bound(Term),
    /// A blank node in a query pattern (non-distinguished variable)
    BlankNode(String),
    /// A bound term already resolved to a store-internal id
    Virtual(VirtualNode),
}

/// A term paired with the id the underlying store uses for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualNode {
    pub id: u64,
    pub term: Term,
}

impl PatternItem {
    pub fn variable(name: impl Into<String>) -> Self {
        PatternItem::Variable(name.into())
    }

    pub fn bound(term: impl Into<Term>) -> Self {
        PatternItem::Bound(term.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        PatternItem::BlankNode(label.into())
    }

    /// Shorthand for a bound IRI. The IRI is not validated.
    pub fn iri(iri: &str) -> Self {
        PatternItem::Bound(NamedNode::new_unchecked(iri).into())
    }

    /// Name under which this item binds a solution variable.
    ///
    /// Blank nodes bind as `_:label` so they never collide with named variables.
    pub fn binding_name(&self) -> Option<String> {
        match self {
            PatternItem::Variable(name) => Some(name.clone()),
            PatternItem::BlankNode(label) => Some(format!("_:{label}")),
            PatternItem::Bound(_) | PatternItem::Virtual(_) => None,
        }
    }

    /// Name of a named variable, `None` for every other item
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            PatternItem::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// True for constants, including virtualized ones
    pub fn is_bound(&self) -> bool {
        matches!(self, PatternItem::Bound(_) | PatternItem::Virtual(_))
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, PatternItem::BlankNode(_))
    }

    /// The RDF term behind a bound item
    pub fn term(&self) -> Option<&Term> {
        match self {
            PatternItem::Bound(term) => Some(term),
            PatternItem::Virtual(node) => Some(&node.term),
            PatternItem::Variable(_) | PatternItem::BlankNode(_) => None,
        }
    }
}

impl fmt::Display for PatternItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternItem::Variable(name) => write!(f, "?{name}"),
            PatternItem::Bound(term) => write!(f, "{term}"),
            PatternItem::BlankNode(label) => write!(f, "_:{label}"),
            PatternItem::Virtual(node) => write!(f, "{}#{}", node.term, node.id),
        }
    }
}
