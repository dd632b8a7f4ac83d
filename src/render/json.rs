use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::PharmGuardError;

pub fn to_pretty<T: Serialize>(value: &T) -> Result<String, PharmGuardError> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Raw-JSON panel. Copy and download both operate on [`JsonViewer::text`],
/// so what is exported is exactly what is displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonViewer {
    value: serde_json::Value,
}

impl JsonViewer {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    pub fn text(&self) -> Result<String, PharmGuardError> {
        to_pretty(&self.value)
    }

    pub fn copy(&self) -> Result<(), PharmGuardError> {
        let text = self.text()?;
        let mut clipboard =
            arboard::Clipboard::new().map_err(|err| PharmGuardError::Clipboard(err.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|err| PharmGuardError::Clipboard(err.to_string()))?;
        info!("JSON copied to clipboard");
        Ok(())
    }

    pub async fn download(&self, dir: &Path) -> Result<PathBuf, PharmGuardError> {
        let text = self.text()?;
        let path = dir.join(crate::utils::download::export_file_name());
        crate::utils::download::write_new(&path, text.as_bytes()).await?;
        info!(path = %path.display(), "JSON downloaded");
        Ok(path)
    }
}
