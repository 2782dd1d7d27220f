//! # sparqlopt
//!
//! Algebra optimization for SPARQL query processing. Takes the graph
//! patterns of a parsed query and produces an equivalent, cheaper
//! algebra tree for an evaluator.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! Parsed query (GraphPattern + QueryShape)
//!     ↓
//! [Query optimizer (reorder)]    → patterns sorted by selectivity,
//!     ↓                            FILTER/BIND placed early
//! [GraphPattern::to_algebra]     → Bgp / Join / LeftJoin / Union / ...
//!     ↓
//! [Solution modifiers]           → OrderBy / Select / Distinct / Slice
//!     ↓
//! [Local passes]                 → per-query algebra optimizers
//!     ↓
//! [Pipeline passes]              → ImplicitJoin, AskBgp, LazyBgp, ...
//!     ↓
//! Algebra for the evaluator
//! ```
//!
//! Every algebra pass is fail-soft: a pass that cannot handle a tree
//! returns it unchanged, so a pass can cost speed but never correctness.
//!
//! ## Usage
//!
//! ```
//! use sparqlopt::{
//!     Config, Expression, GraphPattern, OptimizerPipeline, PatternItem, Query, QueryShape,
//!     QueryType,
//! };
//!
//! let config = Config::default();
//! let pipeline = OptimizerPipeline::from_config(&config, None);
//!
//! // SELECT * WHERE { ?s ?p ?o . ?x <http://example.org/name> ?name FILTER(?s = ?x) }
//! let root = GraphPattern::group()
//!     .with_triple(
//!         PatternItem::variable("s"),
//!         PatternItem::variable("p"),
//!         PatternItem::variable("o"),
//!     )
//!     .with_triple(
//!         PatternItem::variable("x"),
//!         PatternItem::iri("http://example.org/name"),
//!         PatternItem::variable("name"),
//!     )
//!     .with_filter(Expression::equal(Expression::var("s"), Expression::var("x")));
//!
//! let query = Query::new(QueryShape::new(QueryType::Select), root);
//! let algebra = query.to_algebra(&pipeline);
//! // ?x is renamed to ?s inside the BGP and re-bound afterwards
//! assert!(algebra.to_string().starts_with("Select(Extend("));
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `term`, `pattern`, `expression` | Pattern items, triple patterns, filter expressions |
//! | `algebra` | Algebra tree and the transform protocol |
//! | `query` | Graph patterns, query shape, algebra conversion |
//! | `reorder` | Pattern reordering and FILTER/BIND placement |
//! | `statistics` | Selectivity weightings from a statistics graph |
//! | `optimizer` | Algebra passes |
//! | `pipeline` | Ordered pass composition |
//! | `pipeline_trace` | Per-pass trace for debugging |
//! | `config`, `logging` | Configuration and tracing setup |

pub mod algebra;
pub mod config;
pub mod error;
pub mod expression;
pub mod logging;
pub mod optimizer;
pub mod pattern;
pub mod pipeline;
pub mod pipeline_trace;
pub mod query;
pub mod reorder;
pub mod statistics;
pub mod term;
pub mod vocab;

pub use algebra::{Algebra, OrderCondition};
pub use config::Config;
pub use error::{OptimizerError, OptimizerResult};
pub use expression::{BinaryOperator, Expression, UnaryOperator};
pub use optimizer::AlgebraOptimizer;
pub use pattern::{Assignment, IndexType, MatchPattern, TriplePattern};
pub use pipeline::{OptimizerPipeline, SharedPipeline};
pub use pipeline_trace::PipelineTrace;
pub use query::{
    GraphPattern, GraphPatternKind, OrderByShape, Query, QueryShape, QueryType, UpdateCommand,
    UpdateCommandType,
};
pub use reorder::{DefaultOptimizer, NoReorderOptimizer, QueryOptimizer, WeightedOptimizer};
pub use statistics::{WeightingDefaults, Weightings};
pub use term::{PatternItem, VirtualNode};
