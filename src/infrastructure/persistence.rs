use crate::domain::ports::StrategyRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// File-backed strategy persistence for CLI callers: the code artifact and a
/// JSON metadata sidecar per strategy id.
pub struct FileStrategyRepository {
    dir: PathBuf,
}

impl FileStrategyRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl StrategyRepository for FileStrategyRepository {
    async fn store(
        &self,
        strategy_id: &str,
        code: &str,
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context(format!("Failed to create directory {:?}", self.dir))?;

        let code_path = self.dir.join(format!("{}.code.txt", strategy_id));
        tokio::fs::write(&code_path, code)
            .await
            .context(format!("Failed to write strategy code to {:?}", code_path))?;

        let meta_path = self.dir.join(format!("{}.json", strategy_id));
        let json = serde_json::to_string_pretty(&metadata)
            .context("Failed to serialize strategy metadata")?;
        tokio::fs::write(&meta_path, json)
            .await
            .context(format!("Failed to write metadata to {:?}", meta_path))?;

        info!("Stored strategy {} under {:?}", strategy_id, self.dir);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_writes_code_and_metadata() {
        let dir = std::env::temp_dir().join("stratforge-persistence-test");
        let repository = FileStrategyRepository::new(&dir);

        let mut metadata = HashMap::new();
        metadata.insert("provider".to_string(), "openai".to_string());
        metadata.insert("score".to_string(), "0.81".to_string());

        repository
            .store("abc-123", "def initialize(context): pass", metadata)
            .await
            .unwrap();

        let code = tokio::fs::read_to_string(dir.join("abc-123.code.txt"))
            .await
            .unwrap();
        assert!(code.contains("initialize"));

        let meta = tokio::fs::read_to_string(dir.join("abc-123.json"))
            .await
            .unwrap();
        assert!(meta.contains("openai"));
    }
}
