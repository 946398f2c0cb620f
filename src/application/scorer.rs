use crate::application::validator::INDICATOR_CHECKLIST_LEN;
use crate::domain::scoring::{ScoreBreakdown, ScoreWeights};
use crate::domain::types::ProviderResult;
use crate::domain::validation::ValidationReport;

/// Score deduction per compliance warning
const WARNING_PENALTY: f64 = 0.1;

/// Combines validator output and result metadata into a single comparable
/// confidence score. Pure and deterministic: identical inputs always yield
/// the identical breakdown.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ScoreWeights,
}

impl ConfidenceScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, result: &ProviderResult, report: &ValidationReport) -> ScoreBreakdown {
        // Gating component: any structural/security ERROR zeroes it.
        let completeness = if report.error_count() == 0 { 1.0 } else { 0.0 };

        let indicator_usage =
            (report.indicators_found.len() as f64 / INDICATOR_CHECKLIST_LEN as f64).clamp(0.0, 1.0);

        let syntax_compliance =
            (1.0 - WARNING_PENALTY * report.warning_count() as f64).max(0.0);

        let latency_score = 1.0 / (1.0 + result.latency_ms as f64 / 1000.0);

        ScoreBreakdown::weighted(
            &self.weights,
            completeness,
            indicator_usage,
            syntax_compliance,
            latency_score,
        )
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::{Finding, ValidationStage};
    use chrono::Utc;

    fn result_with_latency(latency_ms: u64) -> ProviderResult {
        ProviderResult {
            provider: "mock".to_string(),
            code: "def initialize(): ...".to_string(),
            latency_ms,
            success: true,
            created_at: Utc::now(),
        }
    }

    fn clean_report(indicators: &[&str]) -> ValidationReport {
        ValidationReport::new(
            Vec::new(),
            indicators.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_score_is_pure() {
        let scorer = ConfidenceScorer::default();
        let result = result_with_latency(840);
        let report = clean_report(&["sma", "rsi", "macd"]);

        let first = scorer.score(&result, &report);
        let second = scorer.score(&result, &report);
        assert_eq!(first, second);
    }

    #[test]
    fn test_error_zeroes_completeness() {
        let scorer = ConfidenceScorer::default();
        let result = result_with_latency(100);
        let report = ValidationReport::new(
            vec![Finding::error(ValidationStage::Security, "eval")],
            vec![],
        );
        let breakdown = scorer.score(&result, &report);
        assert_eq!(breakdown.completeness, 0.0);
    }

    #[test]
    fn test_warning_penalty_floors_at_zero() {
        let scorer = ConfidenceScorer::default();
        let result = result_with_latency(100);
        let findings = (0..15)
            .map(|i| Finding::warning(ValidationStage::Compliance, format!("w{}", i)))
            .collect();
        let report = ValidationReport::new(findings, vec![]);
        let breakdown = scorer.score(&result, &report);
        assert_eq!(breakdown.syntax_compliance, 0.0);
        assert!(breakdown.total >= 0.0);
    }

    #[test]
    fn test_latency_score_monotonically_decreasing() {
        let scorer = ConfidenceScorer::default();
        let report = clean_report(&["sma"]);
        let fast = scorer.score(&result_with_latency(50), &report);
        let slow = scorer.score(&result_with_latency(5000), &report);
        assert!(fast.latency_score > slow.latency_score);
        assert!(fast.total > slow.total);
    }

    #[test]
    fn test_indicator_fraction() {
        let scorer = ConfidenceScorer::default();
        let result = result_with_latency(0);
        let breakdown = scorer.score(
            &result,
            &clean_report(&["sma", "ema", "rsi", "macd", "atr"]),
        );
        assert!((breakdown.indicator_usage - 0.5).abs() < 1e-9);
    }
}
