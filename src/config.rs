//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - sparqlopt.toml (default configuration)
//! - sparqlopt.local.toml (git-ignored local overrides)
//! - Environment variables (SPARQLOPT_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # sparqlopt.toml
//! [optimization]
//! reorder_patterns = true
//! unsafe_optimization = false
//! parallel_evaluation = true
//!
//! [weighting]
//! default_predicate = 0.5
//! use_statistics = true
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SPARQLOPT_OPTIMIZATION__STRICT_ALGEBRA=true
//! SPARQLOPT_LOGGING__LEVEL=debug
//! ```

use crate::statistics::WeightingDefaults;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub optimization: OptimizationConfig,
    #[serde(default)]
    pub weighting: WeightingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which optimizations run, and how
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// Reorder and place patterns before algebra conversion
    #[serde(default = "default_true")]
    pub query_optimization: bool,

    /// Run the algebra pass pipeline after conversion
    #[serde(default = "default_true")]
    pub algebra_optimization: bool,

    /// Sort triple patterns by selectivity. With this off only filters and
    /// assignments are placed.
    #[serde(default = "default_true")]
    pub reorder_patterns: bool,

    /// Allow implicit joins to substitute object positions under `=`.
    /// Only safe when the data has no value-equal but distinct literals.
    #[serde(default)]
    pub unsafe_optimization: bool,

    #[serde(default = "default_true")]
    pub implicit_joins: bool,

    #[serde(default = "default_true")]
    pub identity_filters: bool,

    #[serde(default)]
    pub parallel_evaluation: bool,

    /// Evaluate ORDER BY after DISTINCT/REDUCED when the projection allows
    #[serde(default = "default_true")]
    pub order_by_distinct: bool,

    /// Turn FILTER/BIND pseudo-patterns back into operators
    #[serde(default)]
    pub strict_algebra: bool,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig {
            query_optimization: true,
            algebra_optimization: true,
            reorder_patterns: true,
            unsafe_optimization: false,
            implicit_joins: true,
            identity_filters: true,
            parallel_evaluation: false,
            order_by_distinct: true,
            strict_algebra: false,
        }
    }
}

/// Default selectivity weights for terms without statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightingConfig {
    #[serde(default = "default_subject_weight")]
    pub default_subject: f64,

    #[serde(default = "default_predicate_weight")]
    pub default_predicate: f64,

    #[serde(default = "default_object_weight")]
    pub default_object: f64,

    #[serde(default = "default_variable_weight")]
    pub default_variable: f64,

    /// Prefer the statistics-driven comparer when the host supplies weightings
    #[serde(default)]
    pub use_statistics: bool,
}

impl WeightingConfig {
    pub fn defaults(&self) -> WeightingDefaults {
        WeightingDefaults {
            subject: self.default_subject,
            predicate: self.default_predicate,
            object: self.default_object,
            variable: self.default_variable,
        }
    }
}

impl Default for WeightingConfig {
    fn default() -> Self {
        WeightingConfig {
            default_subject: default_subject_weight(),
            default_predicate: default_predicate_weight(),
            default_object: default_object_weight(),
            default_variable: default_variable_weight(),
            use_statistics: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Append logs to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_subject_weight() -> f64 {
    WeightingDefaults::default().subject
}

fn default_predicate_weight() -> f64 {
    WeightingDefaults::default().predicate
}

fn default_object_weight() -> f64 {
    WeightingDefaults::default().object
}

fn default_variable_weight() -> f64 {
    WeightingDefaults::default().variable
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("sparqlopt.toml"))
            .merge(Toml::file("sparqlopt.local.toml"))
            .merge(Env::prefixed("SPARQLOPT_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SPARQLOPT_").split("__"))
            .extract()
    }
}
