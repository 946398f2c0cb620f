use serde::{Deserialize, Serialize};

/// Weight applied to each score component. Weights must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub completeness: f64,
    pub indicator_usage: f64,
    pub syntax_compliance: f64,
    pub latency: f64,
}

impl ScoreWeights {
    pub fn new(
        completeness: f64,
        indicator_usage: f64,
        syntax_compliance: f64,
        latency: f64,
    ) -> anyhow::Result<Self> {
        let sum = completeness + indicator_usage + syntax_compliance + latency;
        if (sum - 1.0).abs() > 1e-9 {
            anyhow::bail!("Score weights must sum to 1.0, got {}", sum);
        }
        Ok(Self {
            completeness,
            indicator_usage,
            syntax_compliance,
            latency,
        })
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            completeness: 0.30,
            indicator_usage: 0.25,
            syntax_compliance: 0.25,
            latency: 0.20,
        }
    }
}

/// Per-result component scores, each in [0, 1], and their weighted total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub completeness: f64,
    pub indicator_usage: f64,
    pub syntax_compliance: f64,
    pub latency_score: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn weighted(
        weights: &ScoreWeights,
        completeness: f64,
        indicator_usage: f64,
        syntax_compliance: f64,
        latency_score: f64,
    ) -> Self {
        let total = completeness * weights.completeness
            + indicator_usage * weights.indicator_usage
            + syntax_compliance * weights.syntax_compliance
            + latency_score * weights.latency;
        Self {
            completeness,
            indicator_usage,
            syntax_compliance,
            latency_score,
            total,
        }
    }
}
