//! # Pipeline Trace
//!
//! Utility for visualizing the algebra pass pipeline.
//! Shows the algebra before the first pass and after each pass:
//! Input -> pass 1 -> ... -> pass n
//!
//! Useful for debugging which passes fired on a query.

use crate::algebra::Algebra;

/// Trace of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineTrace {
    /// Algebra handed to the first pass
    pub input: Algebra,

    /// One entry per pass that ran, in order
    pub steps: Vec<TraceStep>,

    pub stats: OptimizationStats,
}

/// A single pass application
#[derive(Debug, Clone)]
pub struct TraceStep {
    pub optimizer: String,
    pub nodes_before: usize,
    pub nodes_after: usize,
    pub changed: bool,
    /// Algebra produced by the pass
    pub output: Algebra,
}

/// Statistics about the passes applied
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationStats {
    pub passes_run: usize,

    /// Passes whose output differed from their input
    pub passes_changed: usize,

    /// Total operator nodes before the first pass
    pub nodes_before: usize,

    /// Total operator nodes after the last pass
    pub nodes_after: usize,
}

impl PipelineTrace {
    /// Start a trace at `input`
    pub fn new(input: Algebra) -> Self {
        let nodes = input.node_count();
        PipelineTrace {
            input,
            steps: Vec::new(),
            stats: OptimizationStats {
                nodes_before: nodes,
                nodes_after: nodes,
                ..OptimizationStats::default()
            },
        }
    }

    /// Record that `optimizer` turned the current output into `output`
    pub fn record(&mut self, optimizer: &str, output: Algebra) {
        let before = self.output();
        let nodes_before = before.node_count();
        let changed = *before != output;
        let nodes_after = output.node_count();

        self.stats.passes_run += 1;
        if changed {
            self.stats.passes_changed += 1;
        }
        self.stats.nodes_after = nodes_after;
        self.steps.push(TraceStep {
            optimizer: optimizer.to_string(),
            nodes_before,
            nodes_after,
            changed,
            output,
        });
    }

    /// Algebra after the last recorded pass
    pub fn output(&self) -> &Algebra {
        self.steps.last().map_or(&self.input, |step| &step.output)
    }

    pub fn into_output(self) -> Algebra {
        match self.steps.into_iter().last() {
            Some(step) => step.output,
            None => self.input,
        }
    }

    /// Names of the passes that changed the algebra
    pub fn changed_passes(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|step| step.changed)
            .map(|step| step.optimizer.as_str())
            .collect()
    }

    /// Format the trace for display
    pub fn format_trace(&self) -> String {
        let mut output = String::new();

        output.push_str("═══════════════════════════════════════════════════════════\n");
        output.push_str("                    PIPELINE TRACE                          \n");
        output.push_str("═══════════════════════════════════════════════════════════\n\n");

        output.push_str("┌---------------------------------------------------------┐\n");
        output.push_str("| INPUT                                                   |\n");
        output.push_str("`---------------------------------------------------------┘\n");
        output.push_str(&format!("  Nodes: {}\n", self.stats.nodes_before));
        output.push_str(&format!("  {}\n\n", self.input));

        for (i, step) in self.steps.iter().enumerate() {
            output.push_str("┌---------------------------------------------------------┐\n");
            output.push_str(&format!("| PASS {:<51}|\n", format!("{}: {}", i + 1, step.optimizer)));
            output.push_str("`---------------------------------------------------------┘\n");
            if step.changed {
                output.push_str(&format!(
                    "  Nodes: {} -> {}\n",
                    step.nodes_before, step.nodes_after
                ));
                output.push_str(&format!("  {}\n\n", step.output));
            } else {
                output.push_str("  (unchanged)\n\n");
            }
        }

        output.push_str(&format!(
            "  {} passes run, {} changed the algebra, nodes {} -> {}\n",
            self.stats.passes_run,
            self.stats.passes_changed,
            self.stats.nodes_before,
            self.stats.nodes_after
        ));
        output.push_str("═══════════════════════════════════════════════════════════\n");

        output
    }
}
