//! Export persistence

use anyhow::{Context, Result};
use cecd_core::ExportBundle;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for an export taken at the bundle's export time
pub fn export_file_name(bundle: &ExportBundle) -> String {
    format!(
        "cec_commands_{}.json",
        bundle.export_time.format("%Y%m%d_%H%M%S")
    )
}

/// Write an export bundle as pretty JSON into `dir`, returning the file path
pub async fn save_export(bundle: &ExportBundle, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let path = dir.join(export_file_name(bundle));
    let content = serde_json::to_string_pretty(bundle)?;
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(
        path = %path.display(),
        commands = bundle.total_successful_commands,
        "Command history saved"
    );
    Ok(path)
}
