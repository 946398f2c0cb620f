use crate::domain::types::SyntaxDialect;
use crate::domain::validation::{Finding, ValidationReport, ValidationStage};
use tracing::{debug, warn};

/// Number of indicators on the reference checklist. Both dialect profiles
/// carry exactly this many entries; the confidence scorer normalizes
/// indicator usage against it.
pub const INDICATOR_CHECKLIST_LEN: usize = 10;

/// Static per-dialect validation profile
struct DialectProfile {
    name: &'static str,
    /// (needle, human-readable description). Both must be present.
    entry_points: &'static [(&'static str, &'static str)],
    /// (identifier, operation category). Any match is a security ERROR.
    denylist: &'static [(&'static str, &'static str)],
    /// Reference checklist of recognized technical-indicator calls
    indicators: &'static [&'static str],
    /// Markers for the designated trading-signal output
    signal_markers: &'static [&'static str],
    signal_hint: &'static str,
    line_comment: &'static str,
}

static PYTHON_PROFILE: DialectProfile = DialectProfile {
    name: "python",
    entry_points: &[
        ("def initialize", "initializer 'initialize'"),
        ("def generate_signals", "signal generator 'generate_signals'"),
    ],
    denylist: &[
        ("open", "file I/O"),
        ("os.system", "process spawning"),
        ("os.popen", "process spawning"),
        ("subprocess", "process spawning"),
        ("socket", "network access"),
        ("requests", "network access"),
        ("urllib", "network access"),
        ("http.client", "network access"),
        ("eval", "dynamic code evaluation"),
        ("exec", "dynamic code evaluation"),
        ("__import__", "dynamic code evaluation"),
        ("compile", "dynamic code evaluation"),
        ("pickle.loads", "dynamic code evaluation"),
    ],
    indicators: &[
        "sma",
        "ema",
        "rsi",
        "macd",
        "bollinger",
        "atr",
        "stochastic",
        "adx",
        "obv",
        "vwap",
    ],
    signal_markers: &["'signal'", "\"signal\""],
    signal_hint: "no assignment to the designated 'signal' output column",
    line_comment: "#",
};

static PINE_PROFILE: DialectProfile = DialectProfile {
    name: "pine",
    entry_points: &[
        ("strategy(", "strategy() declaration"),
        ("strategy.entry", "strategy.entry() order call"),
    ],
    // Pine scripts cannot reach the filesystem or spawn processes; the
    // sandbox makes the denylist empty for this dialect.
    denylist: &[],
    indicators: &[
        "ta.sma",
        "ta.ema",
        "ta.rsi",
        "ta.macd",
        "ta.bb",
        "ta.atr",
        "ta.stoch",
        "ta.wma",
        "ta.obv",
        "ta.vwap",
    ],
    signal_markers: &["strategy.exit", "plot("],
    signal_hint: "no strategy.exit() or plot() emitting the trading signal",
    line_comment: "//",
};

/// Multi-stage static validator for generated strategy code.
///
/// Stages run in a fixed order (syntax, security, compliance); a fatal
/// structural problem short-circuits the remaining stages, mirroring the
/// fail-fast behavior of the order-validation pipeline this is modeled on.
pub struct CodeValidator {
    profile: &'static DialectProfile,
}

impl CodeValidator {
    pub fn new(dialect: SyntaxDialect) -> Self {
        let profile = match dialect {
            SyntaxDialect::Python => &PYTHON_PROFILE,
            SyntaxDialect::Pine => &PINE_PROFILE,
        };
        Self { profile }
    }

    /// Runs the full pipeline over one code artifact.
    pub fn validate(&self, code: &str) -> ValidationReport {
        debug!(
            "Validating {} bytes of {} strategy code",
            code.len(),
            self.profile.name
        );

        // Comments and string literals carry no executable operations;
        // every stage scans the stripped text.
        let stripped = strip_literals(code, self.profile.line_comment);

        // Stage 1: syntax. A structural failure short-circuits everything.
        if let Some(finding) = self.check_structure(code, &stripped) {
            warn!("Syntax stage failed: {}", finding.message);
            return ValidationReport::new(vec![finding], Vec::new());
        }

        let mut findings = Vec::new();

        // Stage 2: security denylist
        for (needle, category) in self.profile.denylist {
            if contains_identifier(&stripped, needle) {
                findings.push(Finding::error(
                    ValidationStage::Security,
                    format!("Forbidden operation '{}' ({})", needle, category),
                ));
            }
        }

        // Stage 3: compliance (style issues only, never fatal). Indicator
        // usage is scanned over the raw text: pandas-style column names
        // ('fast_sma', 'rsi') are string literals and still count as usage.
        let lower = code.to_lowercase();
        let indicators_found: Vec<String> = self
            .profile
            .indicators
            .iter()
            .filter(|name| contains_identifier(&lower, name))
            .map(|name| name.to_string())
            .collect();

        if indicators_found.is_empty() {
            findings.push(Finding::warning(
                ValidationStage::Compliance,
                "No recognized technical-indicator calls",
            ));
        }

        let has_signal_output = self
            .profile
            .signal_markers
            .iter()
            .any(|marker| code.contains(marker));
        if !has_signal_output {
            findings.push(Finding::warning(
                ValidationStage::Compliance,
                self.profile.signal_hint,
            ));
        }

        ValidationReport::new(findings, indicators_found)
    }

    /// Structural checks: parseability (balanced delimiters) and the
    /// presence of both strategy entry points. Returns the single fatal
    /// finding if the code cannot be accepted.
    fn check_structure(&self, code: &str, stripped: &str) -> Option<Finding> {
        if code.trim().is_empty() {
            return Some(Finding::error(
                ValidationStage::Syntax,
                "Code does not parse: empty source",
            ));
        }

        if let Err(reason) = check_balanced(stripped) {
            return Some(Finding::error(
                ValidationStage::Syntax,
                format!("Code does not parse: {}", reason),
            ));
        }

        let missing: Vec<&str> = self
            .profile
            .entry_points
            .iter()
            .filter(|(needle, _)| !code.contains(needle))
            .map(|(_, label)| *label)
            .collect();
        if !missing.is_empty() {
            return Some(Finding::error(
                ValidationStage::Syntax,
                format!("Missing strategy entry point: {}", missing.join(", ")),
            ));
        }

        None
    }
}

/// Replaces string-literal and comment contents with spaces so later scans
/// only see executable text. Line-based; handles ', ", and line comments.
fn strip_literals(code: &str, line_comment: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for line in code.lines() {
        let mut stripped = String::with_capacity(line.len());
        let mut chars = line.chars();
        let mut in_string: Option<char> = None;
        while let Some(c) = chars.next() {
            match in_string {
                Some(quote) => {
                    if c == '\\' {
                        chars.next();
                        stripped.push(' ');
                        stripped.push(' ');
                    } else if c == quote {
                        in_string = None;
                        stripped.push(c);
                    } else {
                        stripped.push(' ');
                    }
                }
                None => {
                    if c == '\'' || c == '"' {
                        in_string = Some(c);
                        stripped.push(c);
                    } else {
                        stripped.push(c);
                        if stripped.ends_with(line_comment) {
                            // Drop the rest of the line
                            for _ in 0..line_comment.len() {
                                stripped.pop();
                            }
                            break;
                        }
                    }
                }
            }
        }
        out.push_str(&stripped);
        out.push('\n');
    }
    out
}

/// Checks (), [] and {} nesting over pre-stripped text.
fn check_balanced(stripped: &str) -> Result<(), String> {
    let mut stack: Vec<char> = Vec::new();
    for c in stripped.chars() {
        match c {
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some(open) if open == expected => {}
                    _ => return Err(format!("unbalanced '{}'", c)),
                }
            }
            _ => {}
        }
    }
    if let Some(open) = stack.last() {
        return Err(format!("unclosed '{}'", open));
    }
    Ok(())
}

/// Identifier-boundary substring match. Dotted needles match as written;
/// a leading '.' on the haystack side is rejected so attribute access like
/// `df.open` does not trip the `open` rule. Underscores count as a boundary
/// so `rolling_sma` still registers an `sma` usage.
fn contains_identifier(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = match start.checked_sub(1).map(|i| bytes[i] as char) {
            Some(c) => !c.is_ascii_alphanumeric() && c != '.',
            None => true,
        };
        let after_ok = match bytes.get(end).map(|&b| b as char) {
            Some(c) => !c.is_ascii_alphanumeric(),
            None => true,
        };
        if before_ok && after_ok {
            return true;
        }
        from = start + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::Severity;

    const VALID_STRATEGY: &str = r#"
import pandas as pd

def initialize(context):
    context.ma_period = 20
    context.rsi_period = 14

def generate_signals(context, data):
    df = data.copy()
    df['fast_sma'] = df['close'].rolling(context.ma_period).mean()
    df['rsi'] = compute_rsi(df['close'], context.rsi_period)
    df['signal'] = 0
    df.loc[(df['close'] > df['fast_sma']) & (df['rsi'] < 30), 'signal'] = 1
    df.loc[(df['close'] < df['fast_sma']) & (df['rsi'] > 70), 'signal'] = -1
    return df
"#;

    #[test]
    fn test_valid_strategy_passes() {
        let report = CodeValidator::new(SyntaxDialect::Python).validate(VALID_STRATEGY);
        assert!(report.passed, "findings: {:?}", report.findings);
        assert!(report.indicators_found.contains(&"sma".to_string()));
        assert!(report.indicators_found.contains(&"rsi".to_string()));
    }

    #[test]
    fn test_missing_entry_point_short_circuits() {
        let code = "def initialize(context):\n    pass\n";
        let report = CodeValidator::new(SyntaxDialect::Python).validate(code);
        assert!(!report.passed);
        // A structural failure yields exactly one finding, nothing from
        // later stages.
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].stage, ValidationStage::Syntax);
        assert!(report.findings[0].message.contains("generate_signals"));
    }

    #[test]
    fn test_unbalanced_code_does_not_parse() {
        let code = "def initialize(context:\n    pass\ndef generate_signals(context, data):\n";
        let report = CodeValidator::new(SyntaxDialect::Python).validate(code);
        assert!(!report.passed);
        assert_eq!(report.findings.len(), 1);
        assert!(report.findings[0].message.contains("does not parse"));
    }

    #[test]
    fn test_denylisted_operation_is_security_error() {
        let code = format!(
            "{}\ndef leak(path):\n    return open(path).read()\n",
            VALID_STRATEGY
        );
        let report = CodeValidator::new(SyntaxDialect::Python).validate(&code);
        assert!(!report.passed);
        assert!(report.has_stage_error(ValidationStage::Security));
    }

    #[test]
    fn test_denylist_ignores_strings_and_attributes() {
        let code = format!(
            "{}\ndef describe(df):\n    label = 'uses open prices'\n    return df.open\n",
            VALID_STRATEGY
        );
        let report = CodeValidator::new(SyntaxDialect::Python).validate(&code);
        assert!(report.passed, "findings: {:?}", report.findings);
    }

    #[test]
    fn test_subprocess_and_eval_each_reported() {
        let code = format!(
            "{}\ndef bad(cmd):\n    subprocess.run(cmd)\n    return eval(cmd)\n",
            VALID_STRATEGY
        );
        let report = CodeValidator::new(SyntaxDialect::Python).validate(&code);
        let security_errors = report
            .findings
            .iter()
            .filter(|f| f.stage == ValidationStage::Security && f.severity == Severity::Error)
            .count();
        assert_eq!(security_errors, 2);
    }

    #[test]
    fn test_no_indicators_is_warning_not_error() {
        let code = "def initialize(context):\n    pass\n\ndef generate_signals(context, data):\n    data['signal'] = 1\n    return data\n";
        let report = CodeValidator::new(SyntaxDialect::Python).validate(code);
        assert!(report.passed);
        assert_eq!(report.warning_count(), 1);
        assert!(report.indicators_found.is_empty());
    }

    #[test]
    fn test_missing_signal_column_is_warning() {
        let code = "def initialize(context):\n    pass\n\ndef generate_signals(context, data):\n    data['rsi'] = 50\n    return data\n";
        let report = CodeValidator::new(SyntaxDialect::Python).validate(code);
        assert!(report.passed);
        assert!(
            report
                .findings
                .iter()
                .any(|f| f.message.contains("'signal'"))
        );
    }

    #[test]
    fn test_pine_profile_entry_points() {
        let code = r#"
//@version=5
strategy("Momentum", overlay=true)
fast = ta.sma(close, 10)
slow = ta.sma(close, 50)
if ta.crossover(fast, slow)
    strategy.entry("long", strategy.long)
strategy.exit("exit", "long", profit=100, loss=50)
"#;
        let report = CodeValidator::new(SyntaxDialect::Pine).validate(code);
        assert!(report.passed, "findings: {:?}", report.findings);
        assert!(report.indicators_found.contains(&"ta.sma".to_string()));

        let report = CodeValidator::new(SyntaxDialect::Pine).validate("x = close\n");
        assert!(!report.passed);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn test_checklist_lengths_match_constant() {
        assert_eq!(PYTHON_PROFILE.indicators.len(), INDICATOR_CHECKLIST_LEN);
        assert_eq!(PINE_PROFILE.indicators.len(), INDICATOR_CHECKLIST_LEN);
    }
}
