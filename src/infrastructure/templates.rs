use crate::domain::ports::TemplateStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Directory-backed template collaborator: `<dir>/<id>.txt`.
///
/// A missing file is `Ok(None)`, never an error, so generation proceeds
/// without augmentation.
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl TemplateStore for FileTemplateStore {
    async fn get_template(&self, id: &str) -> Result<Option<String>> {
        // Template ids map to file names; reject anything path-like.
        if id.contains('/') || id.contains("..") {
            anyhow::bail!("Invalid template id: {}", id);
        }

        let path = self.dir.join(format!("{}.txt", id));
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                debug!("Loaded template '{}' ({} bytes)", id, contents.len());
                Ok(Some(contents))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context(format!("Failed to read template {:?}", path)),
        }
    }
}
