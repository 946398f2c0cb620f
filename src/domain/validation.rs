use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStage {
    Syntax,
    Security,
    Compliance,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationStage::Syntax => write!(f, "SYNTAX"),
            ValidationStage::Security => write!(f, "SECURITY"),
            ValidationStage::Compliance => write!(f, "COMPLIANCE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// One reported issue in generated code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub stage: ValidationStage,
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn error(stage: ValidationStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(stage: ValidationStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

/// Outcome of validating one code artifact. Immutable after creation.
///
/// `passed` is ERROR-driven only: warnings degrade the confidence score but
/// never fail validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
    /// Recognized indicator calls collected by the compliance stage,
    /// consumed by the confidence scorer.
    pub indicators_found: Vec<String>,
    pub passed: bool,
}

impl ValidationReport {
    pub fn new(findings: Vec<Finding>, indicators_found: Vec<String>) -> Self {
        let passed = !findings.iter().any(|f| f.severity == Severity::Error);
        Self {
            findings,
            indicators_found,
            passed,
        }
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    pub fn has_stage_error(&self, stage: ValidationStage) -> bool {
        self.findings
            .iter()
            .any(|f| f.stage == stage && f.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_fail_is_error_driven() {
        let report = ValidationReport::new(
            vec![
                Finding::warning(ValidationStage::Compliance, "no indicators"),
                Finding::warning(ValidationStage::Compliance, "no signal column"),
            ],
            vec![],
        );
        assert!(report.passed);
        assert_eq!(report.warning_count(), 2);

        let report = ValidationReport::new(
            vec![Finding::error(ValidationStage::Security, "eval() call")],
            vec![],
        );
        assert!(!report.passed);
        assert!(report.has_stage_error(ValidationStage::Security));
    }

    #[test]
    fn test_stage_display_tags() {
        assert_eq!(ValidationStage::Security.to_string(), "SECURITY");
        assert_eq!(Severity::Warning.to_string(), "WARNING");
    }
}
