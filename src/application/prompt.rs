use crate::domain::types::{RiskLevel, StrategyRequest, SyntaxDialect};

/// Assembles the provider prompt for a strategy request.
///
/// The prompt pins down the structural contract the validator later checks
/// (entry points, signal output), so provider output and validation stay in
/// agreement.
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn build(request: &StrategyRequest, template: Option<&str>) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!(
            "Write an algorithmic trading strategy for the {} market on the {} timeframe.\n",
            request.market, request.timeframe
        ));
        prompt.push_str(&format!("Strategy description: {}\n", request.description));
        prompt.push_str(&format!(
            "Risk profile: {} ({}).\n",
            request.risk_level,
            risk_guidance(request.risk_level)
        ));

        match request.dialect {
            SyntaxDialect::Python => {
                prompt.push_str(
                    "Output Python. Define `initialize(context)` for parameter setup and \
                     `generate_signals(context, data)` returning the dataframe with a 'signal' \
                     column (1 = long, -1 = short, 0 = flat).\n",
                );
                prompt.push_str(
                    "Use only pandas/numpy and standard technical indicators. \
                     No file, network, process or eval/exec access.\n",
                );
            }
            SyntaxDialect::Pine => {
                prompt.push_str(
                    "Output Pine Script v5. Declare the script with `strategy()` and emit \
                     orders via `strategy.entry` / `strategy.exit`.\n",
                );
            }
        }

        if let Some(template) = template {
            prompt.push_str("\nBase the implementation on this template:\n");
            prompt.push_str(template);
            prompt.push('\n');
        }

        prompt.push_str("\nReturn only the code, no explanations.\n");
        prompt
    }
}

fn risk_guidance(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Conservative => "tight stops, small position sizing, high-confirmation entries",
        RiskLevel::Moderate => "balanced stops and sizing",
        RiskLevel::Aggressive => "wide stops, momentum entries, larger sizing",
    }
}
