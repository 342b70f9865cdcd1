//! Writing results to disk.
//!
//! All output goes through [`write_atomic`]: the content is written next to
//! its destination under a `.tmp` name and renamed into place, so a reader
//! never sees a half-written file and a failed run leaves no partial output.

use crate::error::OcrError;
use std::path::{Path, PathBuf};

/// Write `contents` to `path` via a temp file and rename.
///
/// Missing parent directories are created.
pub async fn write_atomic(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), OcrError> {
    let fail = |source| OcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let tmp_path = tmp_path_for(path);
    if let Err(e) = tokio::fs::write(&tmp_path, contents.as_ref()).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    Ok(())
}

/// `report.json` → `report.json.tmp`
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
