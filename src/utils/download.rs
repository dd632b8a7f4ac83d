use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;

use crate::error::PharmGuardError;

const EXPORT_PREFIX: &str = "pharmguard-analysis";

/// Where JSON exports go when no directory is given.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(std::env::temp_dir)
}

pub fn export_file_name() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("{EXPORT_PREFIX}-{millis}.json")
}

/// Writes `content` through a temporary sibling and renames it into place.
pub async fn write_new(path: &Path, content: &[u8]) -> Result<(), PharmGuardError> {
    let Some(dir) = path.parent() else {
        return Err(PharmGuardError::InvalidArgument(format!(
            "Invalid export path (no parent directory): {}",
            path.display()
        )));
    };
    tokio::fs::create_dir_all(dir).await?;

    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Err(PharmGuardError::InvalidArgument(format!(
            "Invalid export path: {}",
            path.display()
        )));
    };

    let mut tmp_path = None;
    let mut file_opt = None;
    for attempt in 0..32_u32 {
        let candidate = dir.join(format!(".{name}.{}.{attempt}.tmp", std::process::id()));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(file) => {
                tmp_path = Some(candidate);
                file_opt = Some(file);
                break;
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        }
    }
    let (Some(tmp_path), Some(mut file)) = (tmp_path, file_opt) else {
        return Err(PharmGuardError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "Unable to allocate temporary export file",
        )));
    };

    file.write_all(content).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
