//! Content-addressed attachment blobs under `resources/attachments/`.

use std::fs;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use super::layout::{ATTACHMENTS_DIR, Layout, RESOURCES_DIR};
use super::{StoreError, io_err, write_atomic};

/// Where a blob landed and what it is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    /// Workspace-relative, `/`-separated.
    pub relative_path: String,
    pub sha256: String,
    pub bytes: u64,
    pub original_name: String,
}

/// Copy `src` into the workspace keyed by its SHA-256. Identical content is
/// stored once.
pub fn store_file(
    layout: &Layout,
    src: &Path,
    max_bytes: Option<u64>,
) -> Result<StoredBlob, StoreError> {
    let meta = fs::metadata(src).map_err(|source| io_err(src, source))?;
    if let Some(max) = max_bytes
        && meta.len() > max
    {
        return Err(StoreError::AttachmentTooLarge {
            bytes: meta.len(),
            max,
        });
    }
    let data = fs::read(src).map_err(|source| io_err(src, source))?;
    let sha256 = hex::encode(Sha256::digest(&data));
    let extension = src
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);
    let file_name = match &extension {
        Some(ext) => format!("{sha256}.{ext}"),
        None => sha256.clone(),
    };
    let shard = &sha256[..2];
    let relative_path = format!("{RESOURCES_DIR}/{ATTACHMENTS_DIR}/{shard}/{file_name}");
    let dest = layout.attachments_dir().join(shard).join(&file_name);
    if dest.is_file() {
        tracing::debug!(path = %dest.display(), "attachment content already stored");
    } else {
        write_atomic(&dest, &data)?;
    }
    let original_name = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(StoredBlob {
        relative_path,
        sha256,
        bytes: data.len() as u64,
        original_name,
    })
}

/// Absolute path for a workspace-relative attachment path. Absolute paths and
/// `..` components are refused.
pub fn resolve(layout: &Layout, relative: &str) -> Result<PathBuf, StoreError> {
    let rel = Path::new(relative);
    let clean = rel
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.is_empty() || !clean {
        return Err(StoreError::PathOutsideWorkspace(relative.to_string()));
    }
    Ok(layout.root().join(rel))
}
