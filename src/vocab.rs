//! Vocabulary of the optimizer statistics graph.
//!
//! A statistics graph holds triples `(term, stats:subjectCount, n)` and
//! friends, counting how often `term` occurs in each triple position of
//! the dataset.

use oxrdf::NamedNodeRef;

/// Namespace of the statistics vocabulary
pub const STATS_NAMESPACE: &str = "http://sparqlopt.dev/ns/statistics#";

/// Occurrences of the term as a subject
pub const SUBJECT_COUNT: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://sparqlopt.dev/ns/statistics#subjectCount");

/// Occurrences of the term as a predicate
pub const PREDICATE_COUNT: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://sparqlopt.dev/ns/statistics#predicateCount");

/// Occurrences of the term as an object
pub const OBJECT_COUNT: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://sparqlopt.dev/ns/statistics#objectCount");

/// Occurrences in any position, used where no positional count is given
pub const COUNT: NamedNodeRef<'static> =
    NamedNodeRef::new_unchecked("http://sparqlopt.dev/ns/statistics#count");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_live_in_namespace() {
        for term in [SUBJECT_COUNT, PREDICATE_COUNT, OBJECT_COUNT, COUNT] {
            assert!(term.as_str().starts_with(STATS_NAMESPACE));
        }
    }
}
