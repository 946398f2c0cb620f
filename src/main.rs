//! StratForge CLI
//!
//! Generates trading-strategy code through the configured LLM providers,
//! validates standalone strategy files, and runs parameter optimization.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use stratforge::application::coordinator::RequestCoordinator;
use stratforge::application::optimization::engine::OptimizationEngine;
use stratforge::application::optimization::reporting::OptimizeReporter;
use stratforge::application::validator::CodeValidator;
use stratforge::config::Config;
use stratforge::domain::optimization::{
    ParameterDomain, ParameterSpace, ParameterValue, SearchMethod,
};
use stratforge::domain::types::{
    RiskLevel, StrategyRequest, SyntaxDialect, TargetMarket, Timeframe,
};
use stratforge::domain::ports::StrategyRepository;
use stratforge::infrastructure::mock::SyntheticEvaluator;
use stratforge::infrastructure::observability::Metrics;
use stratforge::infrastructure::persistence::FileStrategyRepository;
use stratforge::infrastructure::registry::ProviderFactory;
use stratforge::infrastructure::templates::FileTemplateStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "LLM strategy generation and optimization", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate strategies from every configured provider and rank them
    Generate {
        /// Free-text strategy description
        #[arg(short, long)]
        description: String,

        /// Target market (crypto, equities, forex)
        #[arg(long, default_value = "crypto")]
        market: String,

        /// Timeframe (1m, 5m, 15m, 1h, 4h, 1d)
        #[arg(long, default_value = "1h")]
        timeframe: String,

        /// Risk level (conservative, moderate, aggressive)
        #[arg(long, default_value = "moderate")]
        risk: String,

        /// Comma-separated provider ids to fan out to
        #[arg(short, long, default_value = "openai,anthropic")]
        providers: String,

        /// Code dialect (python, pine)
        #[arg(long, default_value = "python")]
        dialect: String,

        /// Template id to seed the prompt with
        #[arg(long)]
        template: Option<String>,

        /// Output JSON file for the ranked results
        #[arg(short, long, default_value = "generation_results.json")]
        output: String,
    },
    /// Validate a strategy source file
    Validate {
        /// Path to the strategy source
        file: String,

        /// Code dialect (python, pine)
        #[arg(long, default_value = "python")]
        dialect: String,
    },
    /// Run parameter optimization against the synthetic demo objective
    Optimize {
        /// Strategy identifier recorded on the run
        #[arg(short, long, default_value = "strategy")]
        strategy_id: String,

        /// Path to the strategy source (optional for the demo objective)
        #[arg(long)]
        code: Option<String>,

        /// TOML file describing the parameter space
        #[arg(long)]
        space: String,

        /// Search method (grid, random, bayesian)
        #[arg(short, long, default_value = "grid")]
        method: String,

        /// Objective metric name recorded on the run
        #[arg(long, default_value = "sharpe_ratio")]
        objective: String,

        /// Output JSON file for the run history
        #[arg(short, long, default_value = "optimization_run.json")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            description,
            market,
            timeframe,
            risk,
            providers,
            dialect,
            template,
            output,
        } => {
            let config = Config::from_env().context("Failed to load config from environment")?;
            let metrics = Metrics::new()?;
            let registry = Arc::new(ProviderFactory::create_registry(&config));

            let mut coordinator = RequestCoordinator::new(registry, metrics)
                .with_timeouts(config.provider_timeout(), config.overall_timeout());
            if let Some(dir) = &config.template_dir {
                coordinator = coordinator.with_templates(Arc::new(FileTemplateStore::new(dir)));
            }

            let provider_list: Vec<String> =
                providers.split(',').map(|s| s.trim().to_string()).collect();
            let mut request = StrategyRequest::new(
                description,
                market.parse::<TargetMarket>()?,
                timeframe.parse::<Timeframe>()?,
                risk.parse::<RiskLevel>()?,
                provider_list,
            )
            .with_dialect(dialect.parse::<SyntaxDialect>()?);
            if let Some(template) = template {
                request = request.with_template(template);
            }

            info!("Submitting request {}", request.id);
            let outcome = coordinator.generate_strategies(&request).await?;

            println!("\n{}", "=".repeat(80));
            println!("✅ GENERATION COMPLETE - {} ranked results", outcome.ranked.len());
            println!("{}", "=".repeat(80));
            println!(
                "{:<4} | {:<12} | {:>7} | {:>6} | {:>6} | {:>6} | {:>6} | {:>9} | {}",
                "#", "Provider", "Total", "Comp", "Ind", "Syn", "Lat", "Time (ms)", "Passed"
            );
            println!("{}", "-".repeat(80));
            for (i, entry) in outcome.ranked.iter().enumerate() {
                println!(
                    "{:<4} | {:<12} | {:>7.4} | {:>6.2} | {:>6.2} | {:>6.2} | {:>6.2} | {:>9} | {}",
                    i + 1,
                    entry.result.provider,
                    entry.score.total,
                    entry.score.completeness,
                    entry.score.indicator_usage,
                    entry.score.syntax_compliance,
                    entry.score.latency_score,
                    entry.result.latency_ms,
                    entry.report.passed
                );
            }
            println!("{}", "=".repeat(80));

            if !outcome.failures.is_empty() {
                println!("\n⚠️  Provider failures:");
                for failure in &outcome.failures {
                    println!("  {:<12} {}", failure.provider, failure.error);
                }
            }

            let json = serde_json::to_string_pretty(&outcome.ranked)
                .context("Failed to serialize results")?;
            std::fs::write(&output, json)
                .context(format!("Failed to write results to {}", output))?;
            println!("\n💾 Results saved to: {}", output);

            // Persist the winning artifact; the pipeline itself stores
            // nothing.
            if let Some(best) = outcome.ranked.first() {
                let repository = FileStrategyRepository::new("strategies");
                let mut metadata = HashMap::new();
                metadata.insert("provider".to_string(), best.result.provider.clone());
                metadata.insert("score".to_string(), format!("{:.4}", best.score.total));
                metadata.insert("passed".to_string(), best.report.passed.to_string());
                repository
                    .store(&request.id.to_string(), &best.result.code, metadata)
                    .await?;
                println!("💾 Best strategy stored under strategies/{}", request.id);
            }
        }
        Commands::Validate { file, dialect } => {
            let code = std::fs::read_to_string(&file)
                .context(format!("Failed to read strategy file: {}", file))?;
            let validator = CodeValidator::new(dialect.parse::<SyntaxDialect>()?);
            let report = validator.validate(&code);

            println!("\nValidation report for {}:", file);
            if report.findings.is_empty() {
                println!("  No findings.");
            }
            for finding in &report.findings {
                println!(
                    "  [{}] {}: {}",
                    finding.severity, finding.stage, finding.message
                );
            }
            println!(
                "\n{} ({} errors, {} warnings)",
                if report.passed { "✅ PASSED" } else { "❌ FAILED" },
                report.error_count(),
                report.warning_count()
            );

            if !report.passed {
                std::process::exit(1);
            }
        }
        Commands::Optimize {
            strategy_id,
            code,
            space,
            method,
            objective,
            output,
        } => {
            let config = Config::from_env().unwrap_or_else(|_| default_optimizer_config());
            let method = SearchMethod::from_str(&method)?;
            let parameter_space = load_space_from_toml(&space)?;
            let strategy_code = match code {
                Some(path) => std::fs::read_to_string(&path)
                    .context(format!("Failed to read strategy file: {}", path))?,
                None => String::new(),
            };

            let reporter = OptimizeReporter::default();
            reporter.print_header(&strategy_id, &method.to_string(), &objective);
            reporter.print_space_info(&parameter_space, config.optimizer_range_steps);
            println!("{}\n", "=".repeat(80));

            println!("🚀 Starting optimization...\n");
            let engine = OptimizationEngine::new(Arc::new(SyntheticEvaluator), Metrics::new()?)
                .with_budget(config.optimizer_budget());
            let run = engine
                .optimize(
                    &strategy_id,
                    &strategy_code,
                    parameter_space,
                    method,
                    &objective,
                )
                .await?;

            reporter.print_trials_table(&run);
            reporter.print_best(&run);
            reporter.export_json(&run, &output)?;
            println!("✅ Optimization complete!\n");
        }
    }

    Ok(())
}

/// Optimizer defaults for runs that never touch provider credentials.
fn default_optimizer_config() -> Config {
    Config {
        enabled_providers: Vec::new(),
        openai_api_key: String::new(),
        openai_base_url: "https://api.openai.com".to_string(),
        openai_model: "gpt-4o".to_string(),
        anthropic_api_key: String::new(),
        anthropic_base_url: "https://api.anthropic.com".to_string(),
        anthropic_model: "claude-sonnet-4-20250514".to_string(),
        provider_timeout_secs: 30,
        overall_timeout_secs: 45,
        template_dir: None,
        optimizer_max_iterations: 100,
        optimizer_timeout_secs: 300,
        optimizer_convergence_epsilon: 1e-4,
        optimizer_convergence_patience: 8,
        optimizer_max_consecutive_failures: 3,
        optimizer_range_steps: 5,
    }
}

// ===== Parameter space TOML loading =====

#[derive(serde::Deserialize)]
struct SpaceFile {
    params: Vec<ParamSpec>,
}

#[derive(serde::Deserialize)]
struct ParamSpec {
    name: String,
    #[serde(default)]
    values: Option<Vec<toml::Value>>,
    #[serde(default)]
    lo: Option<f64>,
    #[serde(default)]
    hi: Option<f64>,
}

/// Loads a parameter space from a TOML file of the form:
///
/// ```toml
/// [[params]]
/// name = "ma_period"
/// values = [5, 10, 20]
///
/// [[params]]
/// name = "stop_loss_pct"
/// lo = 0.01
/// hi = 0.10
/// ```
fn load_space_from_toml(path: &str) -> Result<ParameterSpace> {
    let content = std::fs::read_to_string(path)
        .context(format!("Failed to read space config file: {}", path))?;
    let file: SpaceFile =
        toml::from_str(&content).context(format!("Failed to parse space config TOML: {}", path))?;

    let mut params = Vec::with_capacity(file.params.len());
    for param in file.params {
        let domain = match (param.values, param.lo, param.hi) {
            (Some(values), None, None) => {
                let converted: Result<Vec<ParameterValue>> =
                    values.into_iter().map(convert_toml_value).collect();
                ParameterDomain::Discrete(converted?)
            }
            (None, Some(lo), Some(hi)) => ParameterDomain::Range { lo, hi },
            _ => anyhow::bail!(
                "Parameter '{}' must define either `values` or both `lo` and `hi`",
                param.name
            ),
        };
        params.push((param.name, domain));
    }

    ParameterSpace::new(params).map_err(Into::into)
}

fn convert_toml_value(value: toml::Value) -> Result<ParameterValue> {
    match value {
        toml::Value::Integer(v) => Ok(ParameterValue::Int(v)),
        toml::Value::Float(v) => Ok(ParameterValue::Float(v)),
        other => anyhow::bail!("Unsupported parameter value: {}", other),
    }
}
