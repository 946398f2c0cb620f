use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::errors::OptimizationError;

/// One candidate value for a tunable parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ParameterValue::Int(v) => *v as f64,
            ParameterValue::Float(v) => *v,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Allowed values for one parameter: an explicit candidate set or a bounded
/// continuous range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterDomain {
    Discrete(Vec<ParameterValue>),
    Range { lo: f64, hi: f64 },
}

impl ParameterDomain {
    /// Grid points for this domain. Ranges are discretized into `steps`
    /// evenly spaced points including both endpoints.
    pub fn grid_points(&self, steps: usize) -> Vec<ParameterValue> {
        match self {
            ParameterDomain::Discrete(values) => values.clone(),
            ParameterDomain::Range { lo, hi } => {
                let steps = steps.max(2);
                (0..steps)
                    .map(|i| {
                        let t = i as f64 / (steps - 1) as f64;
                        ParameterValue::Float(lo + t * (hi - lo))
                    })
                    .collect()
            }
        }
    }

    /// Maps a value into [0, 1] relative to this domain, for surrogate
    /// distance computation.
    pub fn normalized(&self, value: &ParameterValue) -> f64 {
        match self {
            ParameterDomain::Discrete(values) => {
                if values.len() <= 1 {
                    return 0.5;
                }
                let idx = values
                    .iter()
                    .position(|v| v == value)
                    .unwrap_or(0);
                idx as f64 / (values.len() - 1) as f64
            }
            ParameterDomain::Range { lo, hi } => {
                if (hi - lo).abs() < f64::EPSILON {
                    return 0.5;
                }
                ((value.as_f64() - lo) / (hi - lo)).clamp(0.0, 1.0)
            }
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ParameterDomain::Discrete(values) => values.is_empty(),
            ParameterDomain::Range { lo, hi } => !(hi > lo),
        }
    }
}

/// Ordered mapping from parameter name to its domain. Declaration order is
/// significant: grid enumeration and truncation follow it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpace {
    params: Vec<(String, ParameterDomain)>,
}

impl ParameterSpace {
    /// Builds a space, rejecting empty spaces and parameters with no
    /// candidate values or an empty range.
    pub fn new(params: Vec<(String, ParameterDomain)>) -> Result<Self, OptimizationError> {
        if params.is_empty() {
            return Err(OptimizationError::EmptySpace);
        }
        for (name, domain) in &params {
            if domain.is_empty() {
                return Err(OptimizationError::InvalidSpace {
                    reason: format!("Parameter '{}' has no candidate values", name),
                });
            }
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &[(String, ParameterDomain)] {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Total number of grid cells given a range discretization step count
    pub fn grid_size(&self, range_steps: usize) -> usize {
        self.params
            .iter()
            .map(|(_, d)| d.grid_points(range_steps).len())
            .product()
    }

    /// Number of distinct assignments if every domain is discrete; `None`
    /// when any continuous range makes the space unbounded.
    pub fn discrete_cardinality(&self) -> Option<usize> {
        self.params
            .iter()
            .map(|(_, d)| match d {
                ParameterDomain::Discrete(values) => Some(values.len()),
                ParameterDomain::Range { .. } => None,
            })
            .product()
    }
}

/// A concrete parameter assignment in space declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub values: Vec<(String, ParameterValue)>,
}

impl Assignment {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Canonical dedup key for exact-assignment comparison
    pub fn key(&self) -> String {
        self.values
            .iter()
            .map(|(n, v)| format!("{}={:?}", n, v))
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .values
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Search algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchMethod {
    Grid,
    Random,
    Bayesian,
}

impl std::str::FromStr for SearchMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "grid" => Ok(SearchMethod::Grid),
            "random" => Ok(SearchMethod::Random),
            "bayesian" | "bayes" => Ok(SearchMethod::Bayesian),
            _ => anyhow::bail!(
                "Invalid search method: {}. Must be 'grid', 'random' or 'bayesian'",
                s
            ),
        }
    }
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMethod::Grid => write!(f, "grid"),
            SearchMethod::Random => write!(f, "random"),
            SearchMethod::Bayesian => write!(f, "bayesian"),
        }
    }
}

/// One evaluation of a specific parameter assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationTrial {
    pub index: usize,
    pub assignment: Assignment,
    pub objective: Option<f64>,
    pub error: Option<String>,
    pub evaluated_at: DateTime<Utc>,
}

impl OptimizationTrial {
    pub fn succeeded(index: usize, assignment: Assignment, objective: f64) -> Self {
        Self {
            index,
            assignment,
            objective: Some(objective),
            error: None,
            evaluated_at: Utc::now(),
        }
    }

    pub fn failed(index: usize, assignment: Assignment, error: impl Into<String>) -> Self {
        Self {
            index,
            assignment,
            objective: None,
            error: Some(error.into()),
            evaluated_at: Utc::now(),
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminationReason {
    Converged,
    Exhausted,
    TimedOut,
    Failed { cause: String },
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Converged => write!(f, "converged"),
            TerminationReason::Exhausted => write!(f, "exhausted"),
            TerminationReason::TimedOut => write!(f, "timed out"),
            TerminationReason::Failed { cause } => write!(f, "failed: {}", cause),
        }
    }
}

/// Run lifecycle: Pending until the first trial is dispatched, Running while
/// trials accumulate, then exactly one terminal reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running,
    Terminated(TerminationReason),
}

/// An optimization run and its append-only trial history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRun {
    pub id: Uuid,
    pub strategy_id: String,
    pub space: ParameterSpace,
    pub method: SearchMethod,
    pub objective: String,
    pub trials: Vec<OptimizationTrial>,
    pub best_index: Option<usize>,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OptimizationRun {
    pub fn new(
        strategy_id: impl Into<String>,
        space: ParameterSpace,
        method: SearchMethod,
        objective: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            space,
            method,
            objective: objective.into(),
            trials: Vec::new(),
            best_index: None,
            state: RunState::Pending,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Marks the run as dispatching trials. Idempotent.
    pub fn start(&mut self) {
        if self.state == RunState::Pending {
            self.state = RunState::Running;
        }
    }

    /// Appends a trial and updates the running best (maximization). The best
    /// objective is a running max, so it is non-decreasing by construction.
    pub fn record_trial(&mut self, trial: OptimizationTrial) {
        if let Some(objective) = trial.objective {
            let improved = match self.best_objective() {
                Some(best) => objective > best,
                None => true,
            };
            if improved {
                self.best_index = Some(self.trials.len());
            }
        }
        self.trials.push(trial);
    }

    pub fn terminate(&mut self, reason: TerminationReason) {
        self.state = RunState::Terminated(reason);
        self.finished_at = Some(Utc::now());
    }

    pub fn best(&self) -> Option<&OptimizationTrial> {
        self.best_index.and_then(|i| self.trials.get(i))
    }

    pub fn best_objective(&self) -> Option<f64> {
        self.best().and_then(|t| t.objective)
    }

    pub fn termination_reason(&self) -> Option<&TerminationReason> {
        match &self.state {
            RunState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }
}
