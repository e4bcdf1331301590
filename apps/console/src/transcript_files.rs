use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use studio_core::StudioController;
use tracing::info;

/// Writes the current transcript into `dir`. Returns `None` when there is nothing to export.
pub async fn write_export(controller: &StudioController, dir: &Path) -> Result<Option<PathBuf>> {
    let export = controller.export_transcript().await;
    if export.message_count == 0 {
        return Ok(None);
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create export directory '{}'", dir.display()))?;
    let path = dir.join(export.file_name());
    let json = export.to_json_pretty()?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("failed to write '{}'", path.display()))?;

    info!(path = %path.display(), messages = export.message_count, "transcript exported");
    Ok(Some(path))
}

pub async fn read_import(controller: &StudioController, path: &Path) -> Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let count = controller
        .import_transcript(&raw)
        .await
        .with_context(|| format!("'{}' is not a usable transcript export", path.display()))?;
    Ok(count)
}
