//! Validation pipeline scenarios over representative generated artifacts.

use stratforge::application::scorer::ConfidenceScorer;
use stratforge::application::validator::CodeValidator;
use stratforge::domain::types::{ProviderResult, SyntaxDialect};
use stratforge::domain::validation::{Severity, ValidationStage};

fn validator() -> CodeValidator {
    CodeValidator::new(SyntaxDialect::Python)
}

#[test]
fn test_clean_artifact_full_pass() {
    let code = r#"
import numpy as np

def initialize(context):
    context.ema_fast = 12
    context.ema_slow = 26
    context.rsi_period = 14

def generate_signals(context, data):
    data['ema_fast'] = data['close'].ewm(span=context.ema_fast).mean()
    data['ema_slow'] = data['close'].ewm(span=context.ema_slow).mean()
    data['rsi'] = compute_rsi(data['close'], context.rsi_period)
    data['macd'] = data['ema_fast'] - data['ema_slow']
    data['signal'] = np.where(data['macd'] > 0, 1, -1)
    return data
"#;
    let report = validator().validate(code);
    assert!(report.passed, "findings: {:?}", report.findings);
    assert!(report.findings.is_empty());
    for indicator in ["ema", "rsi", "macd"] {
        assert!(
            report.indicators_found.contains(&indicator.to_string()),
            "missing {}",
            indicator
        );
    }
}

#[test]
fn test_denylisted_operations_always_fail() {
    let payloads = [
        "open('/etc/passwd')",
        "os.system('rm -rf /')",
        "subprocess.Popen(['curl', url])",
        "socket.create_connection(addr)",
        "eval(user_input)",
        "exec(payload)",
        "__import__('os')",
    ];

    for payload in payloads {
        let code = format!(
            "def initialize(context):\n    pass\n\ndef generate_signals(context, data):\n    {}\n    data['signal'] = 1\n    return data\n",
            payload
        );
        let report = validator().validate(&code);
        assert!(!report.passed, "payload escaped the denylist: {}", payload);
        assert!(
            report
                .findings
                .iter()
                .any(|f| f.stage == ValidationStage::Security && f.severity == Severity::Error),
            "no SECURITY ERROR for: {}",
            payload
        );
    }
}

#[test]
fn test_structural_failure_short_circuits_downstream_stages() {
    // The artifact both lacks an entry point and references eval();
    // short-circuiting means the security stage never reports.
    let code = "import os\n\nresult = eval('1 + 1')\n";
    let report = validator().validate(code);

    assert!(!report.passed);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].stage, ValidationStage::Syntax);
    assert!(!report.has_stage_error(ValidationStage::Security));
}

#[test]
fn test_warnings_degrade_score_but_pass() {
    let bare = "def initialize(context):\n    context.qty = 1\n\ndef generate_signals(context, data):\n    return data\n";
    let report = validator().validate(bare);

    // No indicators, no signal column: two warnings, still a pass
    assert!(report.passed);
    assert_eq!(report.warning_count(), 2);

    let scorer = ConfidenceScorer::default();
    let result = ProviderResult {
        provider: "mock".to_string(),
        code: bare.to_string(),
        latency_ms: 500,
        success: true,
        created_at: chrono::Utc::now(),
    };
    let breakdown = scorer.score(&result, &report);

    assert_eq!(breakdown.completeness, 1.0);
    assert_eq!(breakdown.indicator_usage, 0.0);
    assert!((breakdown.syntax_compliance - 0.8).abs() < 1e-9);
    assert!(breakdown.total < 0.7);
}

#[test]
fn test_score_orders_artifacts_by_quality() {
    let scorer = ConfidenceScorer::default();
    let validator = validator();

    let rich = r#"
def initialize(context):
    context.period = 20

def generate_signals(context, data):
    data['sma'] = data['close'].rolling(20).mean()
    data['ema'] = data['close'].ewm(span=20).mean()
    data['rsi'] = 50
    data['atr'] = 1.0
    data['signal'] = 1
    return data
"#;
    let poor = "def initialize(context):\n    pass\n\ndef generate_signals(context, data):\n    return data\n";

    let score_of = |code: &str| {
        let report = validator.validate(code);
        let result = ProviderResult {
            provider: "mock".to_string(),
            code: code.to_string(),
            latency_ms: 100,
            success: true,
            created_at: chrono::Utc::now(),
        };
        scorer.score(&result, &report).total
    };

    assert!(score_of(rich) > score_of(poor));
}

#[test]
fn test_pine_dialect_end_to_end() {
    let code = r#"
//@version=5
strategy("Breakout", overlay=true)
length = input.int(20)
upper = ta.highest(high, length)
basis = ta.sma(close, length)
atr = ta.atr(14)
if close > upper
    strategy.entry("long", strategy.long)
strategy.exit("tp", "long", profit=atr * 2)
"#;
    let report = CodeValidator::new(SyntaxDialect::Pine).validate(code);
    assert!(report.passed, "findings: {:?}", report.findings);
    assert!(report.indicators_found.contains(&"ta.sma".to_string()));
    assert!(report.indicators_found.contains(&"ta.atr".to_string()));
}
