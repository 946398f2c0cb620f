//! Reporting utilities for optimization runs.
//!
//! Provides formatted console output and JSON export capabilities.

use crate::domain::optimization::{OptimizationRun, ParameterDomain, ParameterSpace};
use anyhow::{Context, Result};
use std::path::Path;

/// Reporter for optimization run output.
pub struct OptimizeReporter {
    output_dir: String,
}

impl OptimizeReporter {
    /// Creates a new reporter with the given output directory.
    pub fn new(output_dir: &str) -> Self {
        Self {
            output_dir: output_dir.to_string(),
        }
    }

    /// Prints the header banner for an optimization run.
    pub fn print_header(&self, strategy_id: &str, method: &str, objective: &str) {
        println!("{}", "=".repeat(80));
        println!("🔍 STRATEGY PARAMETER OPTIMIZER");
        println!("{}", "=".repeat(80));
        println!("Strategy:     {}", strategy_id);
        println!("Method:       {}", method);
        println!("Objective:    {}", objective);
        println!("{}", "=".repeat(80));
    }

    /// Prints the parameter space configuration.
    pub fn print_space_info(&self, space: &ParameterSpace, range_steps: usize) {
        println!("\n📊 Parameter Space:");
        for (name, domain) in space.params() {
            match domain {
                ParameterDomain::Discrete(values) => {
                    let rendered: Vec<String> =
                        values.iter().map(|v| v.to_string()).collect();
                    println!("  {:<24} [{}]", name, rendered.join(", "));
                }
                ParameterDomain::Range { lo, hi } => {
                    println!("  {:<24} {} .. {}", name, lo, hi);
                }
            }
        }
        println!(
            "\n🔢 Grid cells at {} range steps: {}",
            range_steps,
            space.grid_size(range_steps)
        );
    }

    /// Prints a formatted table of the trial history.
    pub fn print_trials_table(&self, run: &OptimizationRun) {
        println!("\n{}", "=".repeat(80));
        println!(
            "✅ OPTIMIZATION {} - {} trials",
            run.termination_reason()
                .map(|r| r.to_string().to_uppercase())
                .unwrap_or_else(|| "IN PROGRESS".to_string()),
            run.trials.len()
        );
        println!("{}", "=".repeat(80));

        println!(
            "{:<6} | {:>12} | {}",
            "#", "Objective", "Assignment"
        );
        println!("{}", "-".repeat(80));

        for trial in &run.trials {
            match trial.objective {
                Some(value) => println!(
                    "{:<6} | {:>12.6} | {}",
                    trial.index, value, trial.assignment
                ),
                None => println!(
                    "{:<6} | {:>12} | {}  ({})",
                    trial.index,
                    "failed",
                    trial.assignment,
                    trial.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }

        println!("{}\n", "=".repeat(80));
    }

    /// Prints the best assignment found, if any trial succeeded.
    pub fn print_best(&self, run: &OptimizationRun) {
        match run.best() {
            Some(best) => {
                println!("🏆 BEST ASSIGNMENT (trial {}):", best.index);
                for (name, value) in &best.assignment.values {
                    println!("  {:<24} {}", name, value);
                }
                println!(
                    "\n  {}:  {:.6}",
                    run.objective,
                    best.objective.unwrap_or_default()
                );
                println!("{}\n", "=".repeat(80));
            }
            None => println!("⚠️  No successful trials recorded."),
        }
    }

    /// Exports the full run (trial history included) to a JSON file.
    pub fn export_json(&self, run: &OptimizationRun, filename: &str) -> Result<()> {
        let output_path = if filename.contains('/') {
            filename.to_string()
        } else {
            format!("{}/{}", self.output_dir, filename)
        };

        if let Some(parent) = Path::new(&output_path).parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }

        let json_output =
            serde_json::to_string_pretty(run).context("Failed to serialize run to JSON")?;

        std::fs::write(&output_path, json_output)
            .context(format!("Failed to write run to {}", output_path))?;

        println!("💾 Run saved to: {}", output_path);
        Ok(())
    }
}

impl Default for OptimizeReporter {
    fn default() -> Self {
        Self::new(".")
    }
}
