//! Variable substitution.
//!
//! Renames one variable to another variable, or binds it to a constant,
//! throughout an algebra tree: triple patterns, placed FILTER/BIND
//! pseudo-patterns, filter and extend expressions, and EXISTS patterns
//! nested in those expressions.
//!
//! Constructs whose scoping rules this pass does not model make it fail
//! with [`OptimizerError::UnsupportedConstruct`]; the implicit-join pass
//! relies on that to choose a fallback.

use super::AlgebraOptimizer;
use crate::algebra::Algebra;
use crate::error::{OptimizerError, OptimizerResult};
use crate::expression::Expression;
use crate::pattern::{Assignment, MatchPattern, TriplePattern};
use crate::term::PatternItem;
use std::sync::Arc;

/// Replaces `?find` with `replace` throughout a tree
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSubstitutionTransformer {
    find: String,
    replace: PatternItem,
    can_replace_objects: Option<bool>,
}

impl VariableSubstitutionTransformer {
    /// `replace` must be a variable or a bound term
    pub fn new(find: impl Into<String>, replace: PatternItem) -> Self {
        VariableSubstitutionTransformer {
            find: find.into(),
            replace,
            can_replace_objects: None,
        }
    }

    /// Override the default object-position rule.
    ///
    /// By default an object occurrence may be replaced by a constant, or by
    /// a variable when the same BGP already uses `?find` as a subject or
    /// predicate.
    pub fn with_object_replacement(mut self, allowed: bool) -> Self {
        self.can_replace_objects = Some(allowed);
        self
    }

    pub fn find(&self) -> &str {
        &self.find
    }

    pub fn replacement(&self) -> &PatternItem {
        &self.replace
    }

    /// Apply the substitution to a whole tree
    pub fn transform(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        if !matches!(self.replace, PatternItem::Variable(_) | PatternItem::Bound(_)) {
            return Err(unsupported(format!(
                "cannot substitute ?{} with {}",
                self.find, self.replace
            )));
        }

        Ok(match algebra {
            Algebra::Bgp { patterns } => Algebra::Bgp {
                patterns: self.substitute_patterns(patterns)?,
            },
            Algebra::LazyBgp {
                patterns,
                required_results,
            } => Algebra::LazyBgp {
                patterns: self.substitute_patterns(patterns)?,
                required_results: *required_results,
            },
            Algebra::AskBgp { patterns } => Algebra::AskBgp {
                patterns: self.substitute_patterns(patterns)?,
            },
            Algebra::NullOperator { variables } => {
                let mut variables = variables.clone();
                if variables.remove(&self.find) {
                    if let PatternItem::Variable(name) = &self.replace {
                        variables.insert(name.clone());
                    }
                }
                Algebra::NullOperator { variables }
            }
            Algebra::Service { .. } => return Err(unsupported("SERVICE".to_string())),
            Algebra::Select { .. }
            | Algebra::Distinct { .. }
            | Algebra::Reduced { .. }
            | Algebra::OrderBy { .. }
            | Algebra::Slice { .. } => {
                return Err(unsupported(format!("nested {}", algebra.name())));
            }
            Algebra::Filter { inner, expression } => Algebra::Filter {
                inner: Arc::new(self.transform(inner)?),
                expression: self.substitute_expression(expression)?,
            },
            Algebra::IdentityFilter {
                inner,
                variable,
                term,
            } => Algebra::IdentityFilter {
                inner: Arc::new(self.transform(inner)?),
                variable: self.rename_target(variable)?,
                term: self.substitute_expression(term)?,
            },
            Algebra::Extend {
                inner,
                expression,
                variable,
            } => {
                self.check_assignment_target(variable)?;
                Algebra::Extend {
                    inner: Arc::new(self.transform(inner)?),
                    expression: self.substitute_expression(expression)?,
                    variable: variable.clone(),
                }
            }
            Algebra::Graph { inner, graph } => Algebra::Graph {
                inner: Arc::new(self.transform(inner)?),
                graph: self.substitute_item(graph),
            },
            Algebra::LeftJoin { lhs, rhs, filter } => Algebra::LeftJoin {
                lhs: Arc::new(self.transform(lhs)?),
                rhs: Arc::new(self.transform(rhs)?),
                filter: filter
                    .as_ref()
                    .map(|f| self.substitute_expression(f))
                    .transpose()?,
            },
            Algebra::FilteredProduct {
                lhs,
                rhs,
                expression,
            } => Algebra::FilteredProduct {
                lhs: Arc::new(self.transform(lhs)?),
                rhs: Arc::new(self.transform(rhs)?),
                expression: self.substitute_expression(expression)?,
            },
            Algebra::Join { .. }
            | Algebra::Union { .. }
            | Algebra::Minus { .. }
            | Algebra::AskUnion { .. }
            | Algebra::LazyUnion { .. }
            | Algebra::ParallelJoin { .. }
            | Algebra::ParallelUnion { .. } => {
                algebra.try_map_children(|child| self.transform(child))?
            }
        })
    }

    fn substitute_patterns(
        &self,
        patterns: &[TriplePattern],
    ) -> OptimizerResult<Vec<TriplePattern>> {
        let allow_objects = self.can_replace_objects.unwrap_or_else(|| {
            self.replace.is_bound()
                || patterns.iter().any(|p| match p {
                    TriplePattern::Match(m) => {
                        self.is_find(&m.subject) || self.is_find(&m.predicate)
                    }
                    _ => false,
                })
        });

        patterns
            .iter()
            .map(|pattern| match pattern {
                TriplePattern::Match(m) => {
                    if self.is_find(&m.object) && !allow_objects {
                        return Err(unsupported(format!(
                            "unsafe object substitution of ?{} in {pattern}",
                            self.find
                        )));
                    }
                    Ok(TriplePattern::Match(MatchPattern::new(
                        self.substitute_item(&m.subject),
                        self.substitute_item(&m.predicate),
                        self.substitute_item(&m.object),
                    )))
                }
                TriplePattern::Filter(expression) => {
                    Ok(TriplePattern::Filter(self.substitute_expression(expression)?))
                }
                TriplePattern::Bind(a) => Ok(TriplePattern::Bind(self.substitute_assignment(a)?)),
                TriplePattern::Let(a) => Ok(TriplePattern::Let(self.substitute_assignment(a)?)),
                TriplePattern::SubQuery(_) => Err(unsupported("sub-query".to_string())),
                TriplePattern::PropertyPath(_) => Err(unsupported("property path".to_string())),
                TriplePattern::PropertyFunction(_) => {
                    Err(unsupported("property function".to_string()))
                }
            })
            .collect()
    }

    fn substitute_assignment(&self, assignment: &Assignment) -> OptimizerResult<Assignment> {
        self.check_assignment_target(&assignment.variable)?;
        Ok(Assignment::new(
            assignment.variable.clone(),
            self.substitute_expression(&assignment.expression)?,
        ))
    }

    fn substitute_expression(&self, expression: &Expression) -> OptimizerResult<Expression> {
        Ok(match expression {
            Expression::Variable(name) if *name == self.find => match &self.replace {
                PatternItem::Variable(new) => Expression::Variable(new.clone()),
                PatternItem::Bound(term) => Expression::Constant(term.clone()),
                other => return Err(unsupported(format!("cannot substitute with {other}"))),
            },
            Expression::Bound(name) if *name == self.find => {
                Expression::Bound(self.rename_target(name)?)
            }
            Expression::Variable(_) | Expression::Constant(_) | Expression::Bound(_) => {
                expression.clone()
            }
            Expression::Binary(op, lhs, rhs) => Expression::binary(
                *op,
                self.substitute_expression(lhs)?,
                self.substitute_expression(rhs)?,
            ),
            Expression::Unary(op, inner) => {
                Expression::Unary(*op, Box::new(self.substitute_expression(inner)?))
            }
            Expression::FunctionCall(name, args) => Expression::FunctionCall(
                name.clone(),
                args.iter()
                    .map(|a| self.substitute_expression(a))
                    .collect::<OptimizerResult<_>>()?,
            ),
            Expression::Exists(pattern) => Expression::Exists(Arc::new(self.transform(pattern)?)),
            Expression::NotExists(pattern) => {
                Expression::NotExists(Arc::new(self.transform(pattern)?))
            }
        })
    }

    fn substitute_item(&self, item: &PatternItem) -> PatternItem {
        if self.is_find(item) {
            self.replace.clone()
        } else {
            item.clone()
        }
    }

    fn is_find(&self, item: &PatternItem) -> bool {
        item.variable_name() == Some(self.find.as_str())
    }

    /// A variable name in a position that cannot hold a constant
    fn rename_target(&self, variable: &str) -> OptimizerResult<String> {
        if variable != self.find {
            return Ok(variable.to_string());
        }
        match &self.replace {
            PatternItem::Variable(new) => Ok(new.clone()),
            other => Err(unsupported(format!("?{variable} cannot become {other}"))),
        }
    }

    /// Assigning to either side of the substitution would bind it twice
    fn check_assignment_target(&self, variable: &str) -> OptimizerResult<()> {
        if variable == self.find || self.replace.variable_name() == Some(variable) {
            return Err(unsupported(format!("assignment to ?{variable}")));
        }
        Ok(())
    }
}

impl AlgebraOptimizer for VariableSubstitutionTransformer {
    fn name(&self) -> &str {
        "variable_substitution"
    }

    fn try_optimize(&self, algebra: &Algebra) -> OptimizerResult<Algebra> {
        self.transform(algebra)
    }
}

fn unsupported(what: String) -> OptimizerError {
    OptimizerError::UnsupportedConstruct(what)
}
