//! Work items and the receipts a successful transfer produces.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One unit of work handed to the scheduler.
///
/// `id` identifies the item across retries and is matched against
/// [`Receipt::id`] when computing which items are still unresolved.
/// `name` keys the in-flight progress table.
pub trait WorkItem: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

/// Result of a successful transfer. Its id must equal the id of the item it
/// was produced for.
pub trait Receipt: Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// A local file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileItem {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl FileItem {
    /// Build an item from a path on disk. The id is the path as given, the
    /// name is the final path component.
    pub fn from_path(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        if !meta.is_file() {
            anyhow::bail!("not a regular file: {}", path.display());
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?;
        Ok(Self {
            id: path.to_string_lossy().into_owned(),
            name,
            path: path.to_path_buf(),
            size: meta.len(),
        })
    }
}

impl WorkItem for FileItem {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Collect upload items from the given paths. Directories are expanded one
/// level (regular files only, sorted by name); plain files are taken as is.
pub fn collect_files(paths: &[PathBuf]) -> Result<Vec<FileItem>> {
    let mut items = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut children: Vec<PathBuf> = fs::read_dir(path)
                .with_context(|| format!("read dir {}", path.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            children.sort();
            for child in children {
                items.push(FileItem::from_path(&child)?);
            }
        } else {
            items.push(FileItem::from_path(path)?);
        }
    }
    Ok(items)
}

/// Proof of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReceipt {
    /// Id of the uploaded [`FileItem`].
    pub id: String,
    pub name: String,
    /// Final URL the file was PUT to.
    pub url: String,
    /// HTTP status returned by the server.
    pub status: u32,
    pub bytes: u64,
}

impl Receipt for UploadReceipt {
    fn id(&self) -> &str {
        &self.id
    }
}
