//! Optimization engine for strategy parameter search.
//!
//! Runs grid, random or Bayesian search against an external evaluation
//! collaborator (a backtest/metric engine), one evaluation per trial,
//! under iteration, wall-clock, convergence and failure budgets.

use crate::application::optimization::search::{
    BayesianProposer, grid_assignments, random_assignment,
};
use crate::domain::errors::OptimizationError;
use crate::domain::optimization::{
    Assignment, OptimizationRun, OptimizationTrial, ParameterSpace, SearchMethod,
    TerminationReason,
};
use crate::domain::ports::StrategyEvaluator;
use crate::infrastructure::observability::Metrics;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Budgets bounding one optimization run
#[derive(Debug, Clone)]
pub struct OptimizerBudget {
    pub max_iterations: usize,
    pub timeout: Duration,
    /// Best-so-far improvement below this counts as a stall
    pub convergence_epsilon: f64,
    /// Consecutive stalled successful trials before the run converges
    pub convergence_patience: usize,
    /// Consecutive evaluation failures tolerated before the run fails
    pub max_consecutive_failures: usize,
    /// Discretization step count for continuous ranges under grid search
    pub range_steps: usize,
}

impl Default for OptimizerBudget {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            timeout: Duration::from_secs(300),
            convergence_epsilon: 1e-4,
            convergence_patience: 8,
            max_consecutive_failures: 3,
            range_steps: 5,
        }
    }
}

impl OptimizerBudget {
    fn validate(&self) -> Result<(), OptimizationError> {
        if self.max_iterations == 0 {
            return Err(OptimizationError::InvalidBudget {
                reason: "max_iterations must be at least 1".to_string(),
            });
        }
        if self.convergence_patience == 0 {
            return Err(OptimizationError::InvalidBudget {
                reason: "convergence_patience must be at least 1".to_string(),
            });
        }
        if self.range_steps < 2 {
            return Err(OptimizationError::InvalidBudget {
                reason: "range_steps must be at least 2".to_string(),
            });
        }
        Ok(())
    }
}

/// Drives one optimization run to a terminal state.
///
/// Runs move `Pending → Running` on the first trial dispatch and end in
/// exactly one of the four terminal reasons. The trial history is append-only
/// and kept in dispatch order; a run that fails keeps everything evaluated so
/// far.
pub struct OptimizationEngine {
    evaluator: Arc<dyn StrategyEvaluator>,
    budget: OptimizerBudget,
    metrics: Metrics,
}

impl OptimizationEngine {
    pub fn new(evaluator: Arc<dyn StrategyEvaluator>, metrics: Metrics) -> Self {
        Self {
            evaluator,
            budget: OptimizerBudget::default(),
            metrics,
        }
    }

    pub fn with_budget(mut self, budget: OptimizerBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Maximizes the named objective over the parameter space.
    pub async fn optimize(
        &self,
        strategy_id: &str,
        strategy_code: &str,
        space: ParameterSpace,
        method: SearchMethod,
        objective: &str,
    ) -> Result<OptimizationRun, OptimizationError> {
        self.budget.validate()?;

        info!(
            "Starting {} optimization of '{}' over {} parameters (budget: {} iterations, {}s)",
            method,
            strategy_id,
            space.len(),
            self.budget.max_iterations,
            self.budget.timeout.as_secs()
        );

        let mut run = OptimizationRun::new(strategy_id, space.clone(), method, objective);
        let deadline = Instant::now() + self.budget.timeout;

        let grid = match method {
            SearchMethod::Grid => Some(grid_assignments(&space, self.budget.range_steps)),
            _ => None,
        };
        let proposer = BayesianProposer::new(space.clone());
        let mut tried: HashSet<String> = HashSet::new();
        let mut rng = rand::rng();

        let mut consecutive_failures = 0usize;
        let mut stalled = 0usize;
        let mut index = 0usize;

        let reason = loop {
            if index >= self.budget.max_iterations {
                break TerminationReason::Exhausted;
            }

            let assignment = match method {
                SearchMethod::Grid => match grid.as_ref().and_then(|g| g.get(index)) {
                    Some(assignment) => assignment.clone(),
                    None => break TerminationReason::Exhausted,
                },
                SearchMethod::Random => random_assignment(&space, &mut rng),
                SearchMethod::Bayesian => {
                    let observed: Vec<(Assignment, f64)> = run
                        .trials
                        .iter()
                        .filter_map(|t| t.objective.map(|y| (t.assignment.clone(), y)))
                        .collect();
                    match proposer.propose(&observed, &tried, &mut rng) {
                        Some(assignment) => assignment,
                        None => break TerminationReason::Exhausted,
                    }
                }
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break TerminationReason::TimedOut;
            }

            run.start();
            tried.insert(assignment.key());
            debug!("Trial {}: {}", index, assignment);

            match tokio::time::timeout(
                remaining,
                self.evaluator.evaluate(strategy_code, &assignment),
            )
            .await
            {
                // Wall clock expired mid-evaluation: the in-flight trial is
                // cancelled, completed trials are retained.
                Err(_) => {
                    warn!("Trial {} cancelled by the wall-clock budget", index);
                    break TerminationReason::TimedOut;
                }
                Ok(Ok(value)) => {
                    let previous_best = run.best_objective();
                    run.record_trial(OptimizationTrial::succeeded(index, assignment, value));
                    self.metrics.inc_trial(&method.to_string(), "ok");
                    if let Some(best) = run.best_objective() {
                        self.metrics.best_objective.set(best);
                    }
                    consecutive_failures = 0;

                    let improved = match previous_best {
                        None => true,
                        Some(best) => value > best + self.budget.convergence_epsilon,
                    };
                    if improved {
                        stalled = 0;
                    } else {
                        stalled += 1;
                        if stalled >= self.budget.convergence_patience {
                            break TerminationReason::Converged;
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Trial {} evaluation failed: {}", index, e);
                    run.record_trial(OptimizationTrial::failed(index, assignment, e.to_string()));
                    self.metrics.inc_trial(&method.to_string(), "error");
                    consecutive_failures += 1;
                    if consecutive_failures > self.budget.max_consecutive_failures {
                        break TerminationReason::Failed {
                            cause: format!(
                                "{} consecutive evaluation failures, last: {}",
                                consecutive_failures, e
                            ),
                        };
                    }
                }
            }

            index += 1;
        };

        info!(
            "Run {} terminated ({}) after {} trials, best objective {:?}",
            run.id,
            reason,
            run.trials.len(),
            run.best_objective()
        );
        run.terminate(reason);
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::EvaluationError;
    use crate::domain::optimization::{ParameterDomain, ParameterValue, RunState};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FnEvaluator<F>(F);

    #[async_trait]
    impl<F> StrategyEvaluator for FnEvaluator<F>
    where
        F: Fn(&Assignment) -> Result<f64, EvaluationError> + Send + Sync,
    {
        async fn evaluate(
            &self,
            _strategy_code: &str,
            assignment: &Assignment,
        ) -> Result<f64, EvaluationError> {
            (self.0)(assignment)
        }
    }

    struct SlowEvaluator {
        delay: Duration,
    }

    #[async_trait]
    impl StrategyEvaluator for SlowEvaluator {
        async fn evaluate(
            &self,
            _strategy_code: &str,
            assignment: &Assignment,
        ) -> Result<f64, EvaluationError> {
            tokio::time::sleep(self.delay).await;
            Ok(assignment.values[0].1.as_f64())
        }
    }

    fn ma_rsi_space() -> ParameterSpace {
        ParameterSpace::new(vec![
            (
                "ma_period".to_string(),
                ParameterDomain::Discrete(vec![
                    ParameterValue::Int(5),
                    ParameterValue::Int(10),
                    ParameterValue::Int(20),
                ]),
            ),
            (
                "rsi_period".to_string(),
                ParameterDomain::Discrete(vec![ParameterValue::Int(14)]),
            ),
        ])
        .unwrap()
    }

    fn engine_with<F>(objective: F, budget: OptimizerBudget) -> OptimizationEngine
    where
        F: Fn(&Assignment) -> Result<f64, EvaluationError> + Send + Sync + 'static,
    {
        OptimizationEngine::new(Arc::new(FnEvaluator(objective)), Metrics::new().unwrap())
            .with_budget(budget)
    }

    #[tokio::test]
    async fn test_grid_smaller_than_budget_exhausts_cleanly() {
        let engine = engine_with(
            |a| Ok(a.get("ma_period").unwrap().as_f64()),
            OptimizerBudget {
                max_iterations: 10,
                convergence_patience: 20,
                ..OptimizerBudget::default()
            },
        );

        let run = engine
            .optimize("strat-1", "code", ma_rsi_space(), SearchMethod::Grid, "sharpe")
            .await
            .unwrap();

        assert_eq!(run.trials.len(), 3);
        assert_eq!(
            run.state,
            RunState::Terminated(TerminationReason::Exhausted)
        );
        // Grid order is declaration order: best is the last (ma=20)
        assert!((run.best_objective().unwrap() - 20.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_grid_truncated_by_iteration_budget() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let engine = engine_with(
            move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(0.0)
            },
            OptimizerBudget {
                max_iterations: 2,
                convergence_patience: 20,
                ..OptimizerBudget::default()
            },
        );

        let run = engine
            .optimize("strat-1", "code", ma_rsi_space(), SearchMethod::Grid, "sharpe")
            .await
            .unwrap();

        assert_eq!(run.trials.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        // Deterministic truncation prefix in declaration order
        assert_eq!(
            *run.trials[0].assignment.get("ma_period").unwrap(),
            ParameterValue::Int(5)
        );
        assert_eq!(
            *run.trials[1].assignment.get("ma_period").unwrap(),
            ParameterValue::Int(10)
        );
    }

    #[tokio::test]
    async fn test_flat_objective_converges() {
        let engine = engine_with(
            |_| Ok(1.0),
            OptimizerBudget {
                max_iterations: 100,
                convergence_patience: 4,
                ..OptimizerBudget::default()
            },
        );

        let run = engine
            .optimize(
                "strat-1",
                "code",
                ma_rsi_space(),
                SearchMethod::Random,
                "sharpe",
            )
            .await
            .unwrap();

        assert_eq!(
            run.state,
            RunState::Terminated(TerminationReason::Converged)
        );
        // First trial improves (from nothing), then 4 stalls
        assert_eq!(run.trials.len(), 5);
    }

    #[tokio::test]
    async fn test_consecutive_failures_fail_the_run_preserving_history() {
        let engine = engine_with(
            |_| {
                Err(EvaluationError::Failed {
                    reason: "backtest blew up".to_string(),
                })
            },
            OptimizerBudget {
                max_iterations: 100,
                max_consecutive_failures: 2,
                ..OptimizerBudget::default()
            },
        );

        let run = engine
            .optimize(
                "strat-1",
                "code",
                ma_rsi_space(),
                SearchMethod::Random,
                "sharpe",
            )
            .await
            .unwrap();

        match run.termination_reason() {
            Some(TerminationReason::Failed { cause }) => {
                assert!(cause.contains("backtest blew up"))
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        // Threshold 2 tolerated, the third consecutive failure ends the run
        assert_eq!(run.trials.len(), 3);
        assert!(run.trials.iter().all(|t| t.error.is_some()));
        assert!(run.best_objective().is_none());
    }

    #[tokio::test]
    async fn test_wall_clock_cancels_inflight_trial() {
        let engine = OptimizationEngine::new(
            Arc::new(SlowEvaluator {
                delay: Duration::from_millis(40),
            }),
            Metrics::new().unwrap(),
        )
        .with_budget(OptimizerBudget {
            max_iterations: 1000,
            timeout: Duration::from_millis(100),
            convergence_patience: 100,
            ..OptimizerBudget::default()
        });

        let run = engine
            .optimize(
                "strat-1",
                "code",
                ma_rsi_space(),
                SearchMethod::Random,
                "sharpe",
            )
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Terminated(TerminationReason::TimedOut));
        // ~2 trials of 40ms fit the 100ms budget; the cancelled third is
        // not recorded.
        assert!(!run.trials.is_empty());
        assert!(run.trials.len() <= 3);
        assert!(run.trials.iter().all(|t| t.objective.is_some()));
    }

    #[tokio::test]
    async fn test_bayesian_best_is_monotone_non_decreasing() {
        let engine = engine_with(
            |a| {
                let ma = a.get("ma_period").unwrap().as_f64();
                let rsi = a.get("rsi_period").unwrap().as_f64();
                Ok(-(ma - 12.0).abs() - (rsi - 14.0).abs())
            },
            OptimizerBudget {
                max_iterations: 3,
                convergence_patience: 50,
                ..OptimizerBudget::default()
            },
        );

        let run = engine
            .optimize(
                "strat-1",
                "code",
                ma_rsi_space(),
                SearchMethod::Bayesian,
                "sharpe",
            )
            .await
            .unwrap();

        let mut best = f64::NEG_INFINITY;
        let mut bests = Vec::new();
        for trial in &run.trials {
            if let Some(y) = trial.objective {
                best = best.max(y);
            }
            bests.push(best);
        }
        for window in bests.windows(2) {
            assert!(window[1] >= window[0], "best-so-far decreased");
        }
    }

    #[tokio::test]
    async fn test_zero_iteration_budget_rejected() {
        let engine = engine_with(
            |_| Ok(0.0),
            OptimizerBudget {
                max_iterations: 0,
                ..OptimizerBudget::default()
            },
        );
        let err = engine
            .optimize(
                "strat-1",
                "code",
                ma_rsi_space(),
                SearchMethod::Grid,
                "sharpe",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OptimizationError::InvalidBudget { .. }));
    }
}
