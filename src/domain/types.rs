use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetMarket {
    Crypto,
    Equities,
    Forex,
}

impl std::str::FromStr for TargetMarket {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crypto" => Ok(TargetMarket::Crypto),
            "equities" | "stocks" => Ok(TargetMarket::Equities),
            "forex" => Ok(TargetMarket::Forex),
            _ => anyhow::bail!(
                "Invalid market: {}. Must be 'crypto', 'equities' or 'forex'",
                s
            ),
        }
    }
}

impl fmt::Display for TargetMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMarket::Crypto => write!(f, "crypto"),
            TargetMarket::Equities => write!(f, "equities"),
            TargetMarket::Forex => write!(f, "forex"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl std::str::FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "m1" => Ok(Timeframe::M1),
            "5m" | "m5" => Ok(Timeframe::M5),
            "15m" | "m15" => Ok(Timeframe::M15),
            "1h" | "h1" => Ok(Timeframe::H1),
            "4h" | "h4" => Ok(Timeframe::H4),
            "1d" | "d1" => Ok(Timeframe::D1),
            _ => anyhow::bail!("Invalid timeframe: {}", s),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::M1 => write!(f, "1m"),
            Timeframe::M5 => write!(f, "5m"),
            Timeframe::M15 => write!(f, "15m"),
            Timeframe::H1 => write!(f, "1h"),
            Timeframe::H4 => write!(f, "4h"),
            Timeframe::D1 => write!(f, "1d"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Conservative,
    Moderate,
    Aggressive,
}

impl std::str::FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conservative" | "low" => Ok(RiskLevel::Conservative),
            "moderate" | "medium" => Ok(RiskLevel::Moderate),
            "aggressive" | "high" => Ok(RiskLevel::Aggressive),
            _ => anyhow::bail!(
                "Invalid risk level: {}. Must be 'conservative', 'moderate' or 'aggressive'",
                s
            ),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Conservative => write!(f, "conservative"),
            RiskLevel::Moderate => write!(f, "moderate"),
            RiskLevel::Aggressive => write!(f, "aggressive"),
        }
    }
}

/// Source dialect the generated strategy code is expected to be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyntaxDialect {
    #[default]
    Python,
    Pine,
}

impl std::str::FromStr for SyntaxDialect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(SyntaxDialect::Python),
            "pine" | "pinescript" => Ok(SyntaxDialect::Pine),
            _ => anyhow::bail!("Invalid dialect: {}. Must be 'python' or 'pine'", s),
        }
    }
}

/// A single strategy-generation request. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRequest {
    pub id: Uuid,
    pub description: String,
    pub market: TargetMarket,
    pub timeframe: Timeframe,
    pub risk_level: RiskLevel,
    pub providers: Vec<String>,
    pub dialect: SyntaxDialect,
    pub template_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StrategyRequest {
    pub fn new(
        description: impl Into<String>,
        market: TargetMarket,
        timeframe: Timeframe,
        risk_level: RiskLevel,
        providers: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            market,
            timeframe,
            risk_level,
            providers,
            dialect: SyntaxDialect::default(),
            template_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_dialect(mut self, dialect: SyntaxDialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }
}

/// One provider's generation output. Created by the coordinator, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: String,
    pub code: String,
    pub latency_ms: u64,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Tuning knobs forwarded to the provider boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            temperature: 0.4,
        }
    }
}

/// Static capability set advertised by a provider adapter
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub supports_batching: bool,
    pub supports_streaming: bool,
    pub max_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_market_round_trip() {
        for s in ["crypto", "equities", "forex"] {
            let market = TargetMarket::from_str(s).unwrap();
            assert_eq!(market.to_string(), s);
        }
        assert!(TargetMarket::from_str("bonds").is_err());
    }

    #[test]
    fn test_timeframe_aliases() {
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::H1);
        assert_eq!(Timeframe::from_str("H1").unwrap(), Timeframe::H1);
        assert!(Timeframe::from_str("2h").is_err());
    }

    #[test]
    fn test_request_builder_defaults() {
        let request = StrategyRequest::new(
            "momentum breakout",
            TargetMarket::Crypto,
            Timeframe::H1,
            RiskLevel::Moderate,
            vec!["openai".to_string()],
        );
        assert_eq!(request.dialect, SyntaxDialect::Python);
        assert!(request.template_id.is_none());

        let request = request.with_dialect(SyntaxDialect::Pine).with_template("trend");
        assert_eq!(request.dialect, SyntaxDialect::Pine);
        assert_eq!(request.template_id.as_deref(), Some("trend"));
    }
}
